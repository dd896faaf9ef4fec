//! Timekeeper realizations for the linux platform: the system realtime
//! clock and PTP hardware clock devices, both driven through
//! `clock_adjtime(2)`.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use syntonic::time::{Tmv, NS_PER_SEC};
use syntonic::timekeeper::{Timekeeper, TimekeeperError};

/// Adjustment range of the system clock, in ppb.
const SYSCLK_MAX_PPB: f64 = 512_000.0;

/// The kernel expresses frequency in parts per million with a 16-bit
/// binary fraction, so one ppb is 65.536 units.
const PPB_TO_TIMEX: f64 = 65.536;

/// `_IOR('=', 1, struct ptp_clock_caps)`
const PTP_CLOCK_GETCAPS: libc::c_ulong = 0x8050_3d01;

#[repr(C)]
struct PtpClockCaps {
    max_adj: libc::c_int,
    n_alarm: libc::c_int,
    n_ext_ts: libc::c_int,
    n_per_out: libc::c_int,
    pps: libc::c_int,
    n_pins: libc::c_int,
    cross_timestamping: libc::c_int,
    adjust_phase: libc::c_int,
    rsv: [libc::c_int; 12],
}

/// `FD_TO_CLOCKID`: a character device fd doubles as a dynamic clock id.
fn phc_clockid(fd: libc::c_int) -> libc::clockid_t {
    (!(fd as libc::clockid_t) << 3) | 3
}

/// An adjustable linux clock, either `CLOCK_REALTIME` or a `/dev/ptpN`
/// hardware clock.
pub struct LinuxClock {
    clkid: libc::clockid_t,
    max_ppb: f64,
    /// Keeps the device open for as long as the clock id is in use.
    _phc: Option<OwnedFd>,
}

impl LinuxClock {
    /// The system realtime clock. Note that it counts UTC seconds.
    pub fn system() -> Self {
        LinuxClock {
            clkid: libc::CLOCK_REALTIME,
            max_ppb: SYSCLK_MAX_PPB,
            _phc: None,
        }
    }

    /// Open a PTP hardware clock device.
    pub fn open_phc(path: &Path) -> Result<Self, TimekeeperError> {
        let cpath = std::ffi::CString::new(path.as_os_str().as_bytes())
            .map_err(|_| TimekeeperError::Io(io::ErrorKind::InvalidInput.into()))?;
        let fd = unsafe { libc::open(cpath.as_ptr(), libc::O_RDWR) };
        if fd < 0 {
            return Err(TimekeeperError::Io(io::Error::last_os_error()));
        }
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let mut caps: PtpClockCaps = unsafe { std::mem::zeroed() };
        if unsafe { libc::ioctl(fd.as_raw_fd(), PTP_CLOCK_GETCAPS as _, &mut caps) } < 0 {
            return Err(TimekeeperError::Io(io::Error::last_os_error()));
        }
        if caps.max_adj == 0 {
            return Err(TimekeeperError::NotAdjustable);
        }

        Ok(LinuxClock {
            clkid: phc_clockid(fd.as_raw_fd()),
            max_ppb: caps.max_adj as f64,
            _phc: Some(fd),
        })
    }

    /// Open `/dev/ptp<index>`.
    pub fn phc(index: u32) -> Result<Self, TimekeeperError> {
        Self::open_phc(Path::new(&format!("/dev/ptp{index}")))
    }

    fn adjtime(&self, tx: &mut libc::timex) -> Result<(), TimekeeperError> {
        if unsafe { libc::clock_adjtime(self.clkid, tx) } < 0 {
            return Err(TimekeeperError::Io(io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl Timekeeper for LinuxClock {
    fn read_ppb(&self) -> Result<f64, TimekeeperError> {
        let mut tx: libc::timex = unsafe { std::mem::zeroed() };
        self.adjtime(&mut tx)?;
        Ok(tx.freq as f64 / PPB_TO_TIMEX)
    }

    fn write_ppb(&mut self, ppb: f64) -> Result<(), TimekeeperError> {
        let mut tx: libc::timex = unsafe { std::mem::zeroed() };
        tx.modes = libc::ADJ_FREQUENCY;
        tx.freq = (ppb * PPB_TO_TIMEX) as libc::c_long;
        self.adjtime(&mut tx)
    }

    fn step(&mut self, nanos: i64) -> Result<(), TimekeeperError> {
        let sign = if nanos < 0 { -1 } else { 1 };
        let nanos = nanos.abs();

        let mut tx: libc::timex = unsafe { std::mem::zeroed() };
        tx.modes = libc::ADJ_SETOFFSET | libc::ADJ_NANO;
        tx.time.tv_sec = sign * (nanos / NS_PER_SEC);
        // The value of a timeval is the sum of its fields, but the field
        // tv_usec must always be non-negative.
        tx.time.tv_usec = (sign * (nanos % NS_PER_SEC)) as libc::suseconds_t;
        if tx.time.tv_usec < 0 {
            tx.time.tv_sec -= 1;
            tx.time.tv_usec += 1_000_000_000;
        }
        self.adjtime(&mut tx)
    }

    fn now(&self) -> Result<Tmv, TimekeeperError> {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        if unsafe { libc::clock_gettime(self.clkid, &mut ts) } < 0 {
            return Err(TimekeeperError::Io(io::Error::last_os_error()));
        }
        Ok(Tmv::from_sec_nsec(ts.tv_sec, ts.tv_nsec as u32))
    }

    fn max_ppb(&self) -> f64 {
        self.max_ppb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_reads() {
        let clock = LinuxClock::system();
        // Reading the adjustment state needs no privileges.
        let ppb = clock.read_ppb().unwrap();
        assert!(ppb.is_finite());
        assert!(clock.now().unwrap().nanos() > 0);
        assert_eq!(clock.max_ppb(), SYSCLK_MAX_PPB);
    }

    #[test]
    fn phc_clockid_mapping() {
        assert_eq!(phc_clockid(3), ((-3 - 1) << 3) | 3);
    }
}
