//! `syntonic-mgmt`: query a running daemon over its local management
//! endpoint with standard PTP management GETs.

use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::error;
use syntonic::datastructures::common::{ClockIdentity, PortIdentity, PtpText};
use syntonic::datastructures::datasets::{CurrentDS, DefaultDS, ParentDS, TimePropertiesDS};
use syntonic::datastructures::messages::{
    ManagementAction, ManagementId, ManagementMsg, Tlv, MAX_DATA_LEN,
};
use syntonic::datastructures::WireFormat;
use syntonic_linux::uds::UDS_PATH;

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
#[clap(rename_all = "SCREAMING_SNAKE_CASE")]
enum Query {
    UserDescription,
    DefaultDataSet,
    CurrentDataSet,
    ParentDataSet,
    TimePropertiesDataSet,
    TimeStatusNp,
}

impl Query {
    fn id(self) -> ManagementId {
        match self {
            Query::UserDescription => ManagementId::UserDescription,
            Query::DefaultDataSet => ManagementId::DefaultDataSet,
            Query::CurrentDataSet => ManagementId::CurrentDataSet,
            Query::ParentDataSet => ManagementId::ParentDataSet,
            Query::TimePropertiesDataSet => ManagementId::TimePropertiesDataSet,
            Query::TimeStatusNp => ManagementId::TimeStatusNp,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Query a syntonic daemon over its management endpoint", long_about = None)]
struct Args {
    /// Set desired logging level
    #[clap(short, long, default_value_t = log::LevelFilter::Info)]
    loglevel: log::LevelFilter,

    /// Path of the daemon's management endpoint
    #[clap(short, long, default_value = UDS_PATH)]
    socket: PathBuf,

    /// The PTP domain to address
    #[clap(short, long, default_value_t = 0)]
    domain: u8,

    /// Datasets to query
    #[clap(value_enum, required = true)]
    queries: Vec<Query>,
}

/// Removes the client socket path when the query run is over.
struct ClientSocket {
    socket: UnixDatagram,
    path: PathBuf,
}

impl ClientSocket {
    fn bind() -> std::io::Result<ClientSocket> {
        let path =
            std::env::temp_dir().join(format!("syntonic-mgmt.{}", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let socket = UnixDatagram::bind(&path)?;
        socket.set_read_timeout(Some(Duration::from_secs(1)))?;
        Ok(ClientSocket { socket, path })
    }
}

impl Drop for ClientSocket {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn request(id: ManagementId, domain: u8, sequence_id: u16) -> ManagementMsg {
    let mut msg = ManagementMsg::new(domain, ManagementAction::Get);
    msg.header.source_port_identity = PortIdentity {
        clock_identity: ClockIdentity::default(),
        port_number: std::process::id() as u16,
    };
    msg.header.sequence_id = sequence_id;
    msg.starting_boundary_hops = 1;
    msg.boundary_hops = 1;
    msg.tlvs.push(Tlv::management(id, &[]));
    msg
}

fn print_tlv(source: PortIdentity, tlv: &Tlv) {
    let Some(id) = tlv.management_id() else {
        println!("{source} unrecognized TLV type {:#06x}", tlv.tlv_type);
        return;
    };
    if tlv.tlv_type == Tlv::MANAGEMENT_ERROR_STATUS {
        println!(
            "{source} {:?} failed: {:?}",
            id,
            tlv.management_error_id()
        );
        return;
    }

    let data = tlv.management_data();
    let parsed: Result<(), syntonic::datastructures::WireFormatError> = match id {
        ManagementId::UserDescription => PtpText::deserialize(data).map(|text| {
            println!("{source} USER_DESCRIPTION");
            println!("  userDescription {}", text.as_str());
        }),
        ManagementId::DefaultDataSet => DefaultDS::deserialize(data).map(|dds| {
            println!("{source} DEFAULT_DATA_SET");
            println!("  twoStepFlag     {}", dds.two_step as u8);
            println!("  slaveOnly       {}", dds.slave_only as u8);
            println!("  numberPorts     {}", dds.number_ports);
            println!("  priority1       {}", dds.priority1);
            println!("  clockClass      {}", dds.clock_quality.clock_class);
            println!("  clockAccuracy   {:#04x}", dds.clock_quality.clock_accuracy);
            println!(
                "  offsetScaledLogVariance {:#06x}",
                dds.clock_quality.offset_scaled_log_variance
            );
            println!("  priority2       {}", dds.priority2);
            println!("  clockIdentity   {}", dds.clock_identity);
            println!("  domainNumber    {}", dds.domain_number);
        }),
        ManagementId::CurrentDataSet => CurrentDS::deserialize(data).map(|cur| {
            println!("{source} CURRENT_DATA_SET");
            println!("  stepsRemoved     {}", cur.steps_removed);
            println!("  offsetFromMaster {:.1}", cur.offset_from_master.to_nanos());
            println!("  meanPathDelay    {:.1}", cur.mean_path_delay.to_nanos());
        }),
        ManagementId::ParentDataSet => ParentDS::deserialize(data).map(|dad| {
            println!("{source} PARENT_DATA_SET");
            println!("  parentPortIdentity      {}", dad.parent_port_identity);
            println!("  grandmasterIdentity     {}", dad.grandmaster_identity);
            println!("  grandmasterPriority1    {}", dad.grandmaster_priority1);
            println!(
                "  grandmasterClockClass   {}",
                dad.grandmaster_clock_quality.clock_class
            );
            println!("  grandmasterPriority2    {}", dad.grandmaster_priority2);
        }),
        ManagementId::TimePropertiesDataSet => TimePropertiesDS::deserialize(data).map(|tds| {
            println!("{source} TIME_PROPERTIES_DATA_SET");
            println!("  currentUtcOffset {}", tds.current_utc_offset);
            println!("  flags            {:#04x}", tds.flags.raw());
            println!("  timeSource       {:#04x}", tds.time_source.to_primitive());
        }),
        ManagementId::TimeStatusNp => {
            if data.len() < 50 {
                Err(syntonic::datastructures::WireFormatError::BufferTooShort)
            } else {
                println!("{source} TIME_STATUS_NP");
                println!(
                    "  master_offset {}",
                    i64::from_be_bytes(data[0..8].try_into().unwrap())
                );
                println!(
                    "  ingress_time  {}",
                    i64::from_be_bytes(data[8..16].try_into().unwrap())
                );
                println!(
                    "  cumulativeScaledRateOffset {}",
                    u32::from_be_bytes(data[16..20].try_into().unwrap())
                );
                println!(
                    "  gmTimeBaseIndicator {}",
                    u16::from_be_bytes(data[24..26].try_into().unwrap())
                );
                println!(
                    "  gmPresent     {}",
                    u32::from_be_bytes(data[38..42].try_into().unwrap()) != 0
                );
                let gm = ClockIdentity(data[42..50].try_into().unwrap());
                println!("  gmIdentity    {}", gm);
                Ok(())
            }
        }
        other => {
            println!("{source} unexpected response id {:?}", other);
            Ok(())
        }
    };

    if let Err(err) = parsed {
        error!("malformed {:?} response: {}", id, err);
    }
}

fn run(args: &Args) -> std::io::Result<()> {
    let client = ClientSocket::bind()?;

    let mut failures = 0;
    for (sequence, query) in args.queries.iter().enumerate() {
        let msg = request(query.id(), args.domain, sequence as u16);
        let frame = msg
            .serialize_vec()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        client.socket.send_to(&frame, &args.socket)?;

        let mut buffer = [0; MAX_DATA_LEN];
        match client.socket.recv(&mut buffer) {
            Ok(len) => match ManagementMsg::deserialize(&buffer[..len]) {
                Ok(rsp) => {
                    for tlv in &rsp.tlvs {
                        print_tlv(rsp.header.source_port_identity, tlv);
                    }
                }
                Err(err) => {
                    error!("malformed response: {}", err);
                    failures += 1;
                }
            },
            Err(err) => {
                error!("no response for {:?}: {}", query, err);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("{failures} queries failed"),
        ));
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(err) = syntonic_linux::setup_logger(args.loglevel) {
        eprintln!("could not setup logging: {err}");
        std::process::exit(1);
    }

    if let Err(err) = run(&args) {
        error!("{}", err);
        std::process::exit(1);
    }
}
