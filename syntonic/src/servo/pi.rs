use super::{Servo, ServoState};
use crate::time::Tmv;

const KP_HARDWARE: f64 = 0.7;
const KI_HARDWARE: f64 = 0.3;
const KP_SOFTWARE: f64 = 0.1;
const KI_SOFTWARE: f64 = 0.001;

/// A proportional-integral servo.
///
/// The first sample is only recorded. The second yields a drift estimate
/// from the two offsets and requests a step of the remaining phase error.
/// From then on the loop slews: the integral term accumulates into the
/// drift, the proportional term follows the instantaneous offset.
#[derive(Debug)]
pub struct PiServo {
    kp: f64,
    ki: f64,
    max_ppb: f64,
    drift: f64,
    count: u32,
    last_offset: Tmv,
    last_ts: Tmv,
}

impl PiServo {
    /// `initial_ppb` seeds the drift estimate, usually the negated
    /// frequency adjustment the timekeeper was left with. `max_ppb` is
    /// the timekeeper's adjustment range; outputs are clamped to it.
    pub fn new(initial_ppb: f64, max_ppb: f64, software_ts: bool) -> Self {
        let (kp, ki) = if software_ts {
            (KP_SOFTWARE, KI_SOFTWARE)
        } else {
            (KP_HARDWARE, KI_HARDWARE)
        };
        PiServo {
            kp,
            ki,
            max_ppb,
            drift: initial_ppb.clamp(-max_ppb, max_ppb),
            count: 0,
            last_offset: Tmv::ZERO,
            last_ts: Tmv::ZERO,
        }
    }

    fn clamp(&self, ppb: f64) -> f64 {
        ppb.clamp(-self.max_ppb, self.max_ppb)
    }
}

impl Servo for PiServo {
    fn sample(&mut self, offset: Tmv, local_ts: Tmv) -> (f64, ServoState) {
        match self.count {
            0 => {
                self.last_offset = offset;
                self.last_ts = local_ts;
                self.count = 1;
                (0.0, ServoState::Unlocked)
            }
            1 => {
                let interval = (local_ts - self.last_ts).as_f64();
                if interval <= 0.0 {
                    // Indistinguishable timestamps, start over.
                    self.last_offset = offset;
                    self.last_ts = local_ts;
                    return (0.0, ServoState::Unlocked);
                }
                let drift = (offset - self.last_offset).as_f64() / interval * 1e9;
                self.drift = self.clamp(self.drift + drift);
                self.count = 2;
                (self.drift, ServoState::Jump)
            }
            _ => {
                let off = offset.as_f64();
                self.drift = self.clamp(self.drift + self.ki * off);
                let ppb = self.clamp(self.kp * off + self.drift);
                (ppb, ServoState::Locked)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(sec: i64) -> Tmv {
        Tmv::from_seconds(sec)
    }

    #[test]
    fn locks_after_jump() {
        let mut servo = PiServo::new(0.0, 100_000.0, false);

        let (ppb, state) = servo.sample(Tmv::from_nanos(1_000_000), at(0));
        assert_eq!(state, ServoState::Unlocked);
        assert_eq!(ppb, 0.0);

        // 500 ppb of apparent drift over one second
        let (ppb, state) = servo.sample(Tmv::from_nanos(1_000_500), at(1));
        assert_eq!(state, ServoState::Jump);
        assert!((ppb - 500.0).abs() < 1e-9);

        let (_, state) = servo.sample(Tmv::from_nanos(20), at(2));
        assert_eq!(state, ServoState::Locked);
    }

    #[test]
    fn output_is_clamped() {
        let mut servo = PiServo::new(0.0, 1000.0, false);
        servo.sample(Tmv::ZERO, at(0));
        servo.sample(Tmv::from_nanos(10_000_000), at(1));
        let (ppb, _) = servo.sample(Tmv::from_nanos(10_000_000), at(2));
        assert!(ppb <= 1000.0);
    }

    #[test]
    fn equal_timestamps_restart_measurement() {
        let mut servo = PiServo::new(0.0, 1000.0, false);
        servo.sample(Tmv::from_nanos(100), at(5));
        let (_, state) = servo.sample(Tmv::from_nanos(200), at(5));
        assert_eq!(state, ServoState::Unlocked);
    }
}
