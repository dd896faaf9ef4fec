//! The local management endpoint: a datagram socket on the filesystem
//! that accepts management messages framed exactly like the network-side
//! PTP wire format. Realized as a [`Port`] so the aggregator polls it
//! like any other port; replies go back to the most recent sender.

use std::io;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{SocketAddr, UnixDatagram};
use std::path::{Path, PathBuf};

use log::debug;
use syntonic::datastructures::common::{ClockIdentity, PortIdentity};
use syntonic::datastructures::messages::{ManagementMsg, MAX_DATA_LEN};
use syntonic::port::{
    FdArray, ForeignClock, FsmEvent, Port, PortAction, PortActions, PortState, EMPTY_FDS,
};

/// Default filesystem path of the management endpoint.
pub const UDS_PATH: &str = "/var/run/syntonic";

pub struct UdsPort {
    socket: UnixDatagram,
    path: PathBuf,
    identity: PortIdentity,
    state: PortState,
    peer: Option<SocketAddr>,
}

impl UdsPort {
    /// Bind the endpoint, replacing a stale socket from a previous run.
    pub fn open(path: &Path, clock_identity: ClockIdentity) -> io::Result<UdsPort> {
        let _ = std::fs::remove_file(path);
        let socket = UnixDatagram::bind(path)?;
        socket.set_nonblocking(true)?;
        Ok(UdsPort {
            socket,
            path: path.to_owned(),
            identity: PortIdentity {
                clock_identity,
                port_number: 0,
            },
            state: PortState::Initializing,
            peer: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Port for UdsPort {
    fn identity(&self) -> PortIdentity {
        self.identity
    }

    fn state(&self) -> PortState {
        self.state
    }

    fn fds(&self) -> FdArray {
        let mut fds = EMPTY_FDS;
        fds[0] = self.socket.as_raw_fd();
        fds
    }

    fn event(&mut self, slot: usize, actions: &mut PortActions) -> FsmEvent {
        if slot != 0 {
            return FsmEvent::None;
        }
        let mut buffer = [0; MAX_DATA_LEN];
        let (len, peer) = match self.socket.recv_from(&mut buffer) {
            Ok(received) => received,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return FsmEvent::None,
            Err(err) => {
                debug!("management endpoint receive failed: {}", err);
                return FsmEvent::None;
            }
        };
        match ManagementMsg::deserialize(&buffer[..len]) {
            Ok(msg) => {
                self.peer = Some(peer);
                let _ = actions.try_push(PortAction::Management(msg));
            }
            Err(err) => debug!("ignoring malformed management message: {}", err),
        }
        FsmEvent::None
    }

    fn dispatch(&mut self, event: FsmEvent, _master_changed: bool) {
        if event == FsmEvent::Initialize {
            self.state = PortState::Listening;
        }
    }

    fn best_foreign(&mut self) -> Option<ForeignClock> {
        None
    }

    fn manage(&mut self, _msg: &ManagementMsg) -> bool {
        false
    }

    fn forward(&mut self, frame: &[u8]) -> io::Result<()> {
        let Some(peer) = &self.peer else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no management client yet",
            ));
        };
        let Some(path) = peer.as_pathname() else {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "unnamed management client",
            ));
        };
        self.socket.send_to(frame, path).map(|_| ())
    }
}

impl Drop for UdsPort {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
