use super::{Dataset, DatasetOrdering};
use crate::port::PortState;

fn compare_opt(a: &Dataset, b: Option<&Dataset>) -> DatasetOrdering {
    // A missing candidate loses against any present one.
    match b {
        Some(b) => a.compare(b),
        None => DatasetOrdering::Better,
    }
}

/// The recommended-state decision for one port.
///
/// `own` is the clock's view of itself, `clock_best` the best foreign
/// candidate across all ports, `port_best` the best candidate seen on this
/// port, and `port_is_clock_best` whether this port is the one the
/// clock-wide best was learned on.
///
/// The branches follow the M1/M2/M3, P1/P2 and S1 cases of
/// *IEEE1588-2019 figure 33*.
pub fn state_decision(
    own: &Dataset,
    clock_best: Option<&Dataset>,
    port_best: Option<&Dataset>,
    current_state: PortState,
    port_is_clock_best: bool,
) -> PortState {
    if port_best.is_none() && current_state == PortState::Listening {
        return PortState::Listening;
    }

    if own.quality.clock_class <= 127 {
        return if compare_opt(own, port_best).is_better() {
            PortState::GrandMaster // M1
        } else {
            PortState::Passive // P1
        };
    }

    if compare_opt(own, clock_best).is_better() {
        return PortState::GrandMaster; // M2
    }

    if port_is_clock_best {
        return PortState::Slave; // S1
    }

    match (clock_best, port_best) {
        (Some(cb), Some(pb)) if cb.compare(pb) == DatasetOrdering::BetterByTopology => {
            PortState::Passive // P2
        }
        _ => PortState::Master, // M3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::{ClockIdentity, ClockQuality, PortIdentity};

    fn own(clock_class: u8, priority1: u8) -> Dataset {
        let identity = ClockIdentity([9; 8]);
        Dataset {
            priority1,
            identity,
            quality: ClockQuality {
                clock_class,
                ..ClockQuality::default()
            },
            priority2: 128,
            steps_removed: 0,
            sender: PortIdentity {
                clock_identity: identity,
                port_number: 0,
            },
            receiver: PortIdentity {
                clock_identity: identity,
                port_number: 0,
            },
        }
    }

    fn foreign(priority1: u8) -> Dataset {
        let identity = ClockIdentity([1; 8]);
        Dataset {
            priority1,
            identity,
            quality: ClockQuality::default(),
            priority2: 128,
            steps_removed: 1,
            sender: PortIdentity {
                clock_identity: identity,
                port_number: 1,
            },
            receiver: PortIdentity {
                clock_identity: ClockIdentity([9; 8]),
                port_number: 1,
            },
        }
    }

    #[test]
    fn listening_is_sticky_without_candidates() {
        let own = own(248, 128);
        assert_eq!(
            state_decision(&own, None, None, PortState::Listening, false),
            PortState::Listening,
        );
    }

    #[test]
    fn grandmaster_without_better_foreign() {
        let own = own(248, 128);
        assert_eq!(
            state_decision(&own, None, None, PortState::Master, false),
            PortState::GrandMaster,
        );
    }

    #[test]
    fn slave_on_the_best_port_master_elsewhere() {
        let own = own(248, 128);
        let best = foreign(100);
        assert_eq!(
            state_decision(&own, Some(&best), Some(&best), PortState::Listening, true),
            PortState::Slave,
        );
        assert_eq!(
            state_decision(&own, Some(&best), None, PortState::Master, false),
            PortState::Master,
        );
    }

    #[test]
    fn low_clock_class_never_follows() {
        let own = own(6, 128);
        let best = foreign(0);
        assert_eq!(
            state_decision(&own, Some(&best), Some(&best), PortState::Slave, true),
            PortState::Passive,
        );
        assert_eq!(
            state_decision(&own, None, None, PortState::Master, false),
            PortState::GrandMaster,
        );
    }
}
