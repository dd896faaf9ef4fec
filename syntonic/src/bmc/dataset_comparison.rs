//! Implementation of chapter 9.3.4 Data set comparison algorithm

use core::cmp::Ordering;

use crate::datastructures::common::{ClockIdentity, ClockQuality, PortIdentity};

/// The data gathered about one candidate grandmaster, either from the
/// qualified announce messages of a foreign clock or from the local
/// DefaultDS. Two candidates are ranked with [`Dataset::compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dataset {
    pub priority1: u8,
    /// Identity of the grandmaster this candidate leads to.
    pub identity: ClockIdentity,
    pub quality: ClockQuality,
    pub priority2: u8,
    pub steps_removed: u16,
    /// The port that transmitted the announce message.
    pub sender: PortIdentity,
    /// The local port that received it.
    pub receiver: PortIdentity,
}

impl Dataset {
    /// Returns the ordering of `self` in comparison to other.
    pub fn compare(&self, other: &Self) -> DatasetOrdering {
        if self.identity == other.identity {
            self.compare_same_identity(other)
        } else {
            self.compare_different_identity(other)
        }
    }

    /// The two candidates lead to different grandmaster instances.
    fn compare_different_identity(&self, other: &Self) -> DatasetOrdering {
        // Figure 34
        let ordering = (self.priority1.cmp(&other.priority1))
            .then_with(|| self.quality.clock_class.cmp(&other.quality.clock_class))
            .then_with(|| self.quality.clock_accuracy.cmp(&other.quality.clock_accuracy))
            .then_with(|| {
                self.quality
                    .offset_scaled_log_variance
                    .cmp(&other.quality.offset_scaled_log_variance)
            })
            .then_with(|| self.priority2.cmp(&other.priority2))
            .then_with(|| self.identity.cmp(&other.identity));

        match ordering {
            Ordering::Equal => unreachable!("identity is guaranteed to be different"),
            Ordering::Greater => DatasetOrdering::Worse,
            Ordering::Less => DatasetOrdering::Better,
        }
    }

    /// Potentially two views of the same grandmaster instance.
    fn compare_same_identity(&self, other: &Self) -> DatasetOrdering {
        let steps_removed_difference = self.steps_removed as i32 - other.steps_removed as i32;

        // Figure 35
        match steps_removed_difference {
            2..=i32::MAX => DatasetOrdering::Worse,
            i32::MIN..=-2 => DatasetOrdering::Better,
            1 => match Ord::cmp(&self.receiver.clock_identity, &self.sender.clock_identity) {
                Ordering::Less => DatasetOrdering::Worse,
                Ordering::Equal => DatasetOrdering::Error1,
                Ordering::Greater => DatasetOrdering::WorseByTopology,
            },
            -1 => match Ord::cmp(&other.receiver.clock_identity, &other.sender.clock_identity) {
                Ordering::Less => DatasetOrdering::Better,
                Ordering::Equal => DatasetOrdering::Error1,
                Ordering::Greater => DatasetOrdering::BetterByTopology,
            },
            0 => {
                let senders = self.sender.clock_identity.cmp(&other.sender.clock_identity);
                let receivers = self.receiver.port_number.cmp(&other.receiver.port_number);

                match senders.then(receivers) {
                    Ordering::Less => DatasetOrdering::BetterByTopology,
                    Ordering::Equal => DatasetOrdering::Error2,
                    Ordering::Greater => DatasetOrdering::WorseByTopology,
                }
            }
        }
    }
}

/// The ordering result of the dataset comparison algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetOrdering {
    /// `self` is better than the candidate compared against
    Better,
    /// Of equal quality, but preferred because of the network topology
    BetterByTopology,
    /// Equal in quality and topology
    Error1,
    /// Probably based on the same set of data
    Error2,
    /// Of equal quality, but not preferred because of the network topology
    WorseByTopology,
    /// `self` is worse than the candidate compared against
    Worse,
}

impl DatasetOrdering {
    pub const fn as_ordering(self) -> Ordering {
        // Errors mean two announce messages are functionally the same,
        // either pick is valid
        match self {
            DatasetOrdering::Better | DatasetOrdering::BetterByTopology => Ordering::Greater,
            DatasetOrdering::Error1 | DatasetOrdering::Error2 => Ordering::Equal,
            DatasetOrdering::WorseByTopology | DatasetOrdering::Worse => Ordering::Less,
        }
    }

    pub const fn is_better(self) -> bool {
        matches!(self, DatasetOrdering::Better | DatasetOrdering::BetterByTopology)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY_A: ClockIdentity = ClockIdentity([1, 1, 1, 1, 1, 1, 1, 1]);
    const IDENTITY_B: ClockIdentity = ClockIdentity([2, 2, 2, 2, 2, 2, 2, 2]);
    const IDENTITY_C: ClockIdentity = ClockIdentity([3, 3, 3, 3, 3, 3, 3, 3]);

    pub(crate) fn empty_dataset() -> Dataset {
        Dataset {
            priority1: 0,
            identity: ClockIdentity::default(),
            quality: ClockQuality {
                clock_class: 0,
                clock_accuracy: 0,
                offset_scaled_log_variance: 0,
            },
            priority2: 0,
            steps_removed: 0,
            sender: PortIdentity::default(),
            receiver: PortIdentity::default(),
        }
    }

    #[test]
    fn figure_34() {
        // Start from two identical datasets and work bottom up through the
        // attribute chain, flipping which one wins at every level so a
        // stale result cannot leak through.
        let mut a = empty_dataset();
        let mut b = empty_dataset();

        a.identity = IDENTITY_A;
        b.identity = IDENTITY_B;

        assert_eq!(a.compare(&b), DatasetOrdering::Better);
        assert_eq!(b.compare(&a), DatasetOrdering::Worse);

        a.priority2 = 1;
        b.priority2 = 0;

        assert_eq!(a.compare(&b), DatasetOrdering::Worse);
        assert_eq!(b.compare(&a), DatasetOrdering::Better);

        a.quality.offset_scaled_log_variance = 0;
        b.quality.offset_scaled_log_variance = 1;

        assert_eq!(a.compare(&b), DatasetOrdering::Better);
        assert_eq!(b.compare(&a), DatasetOrdering::Worse);

        a.quality.clock_accuracy = 0x23; // 1 us
        b.quality.clock_accuracy = 0x21; // 100 ns

        assert_eq!(a.compare(&b), DatasetOrdering::Worse);
        assert_eq!(b.compare(&a), DatasetOrdering::Better);

        a.quality.clock_class = 0;
        b.quality.clock_class = 1;

        assert_eq!(a.compare(&b), DatasetOrdering::Better);
        assert_eq!(b.compare(&a), DatasetOrdering::Worse);

        a.priority1 = 1;
        b.priority1 = 0;

        assert_eq!(a.compare(&b), DatasetOrdering::Worse);
        assert_eq!(b.compare(&a), DatasetOrdering::Better);
    }

    #[test]
    fn figure_35() {
        let mut a = empty_dataset();
        let mut b = empty_dataset();

        assert_eq!(a.compare(&b), DatasetOrdering::Error2);
        assert_eq!(b.compare(&a), DatasetOrdering::Error2);

        a.receiver.port_number = 1;
        b.receiver.port_number = 0;

        assert_eq!(a.compare(&b), DatasetOrdering::WorseByTopology);
        assert_eq!(b.compare(&a), DatasetOrdering::BetterByTopology);

        a.sender.clock_identity = IDENTITY_A;
        b.sender.clock_identity = IDENTITY_B;

        assert_eq!(a.compare(&b), DatasetOrdering::BetterByTopology);
        assert_eq!(b.compare(&a), DatasetOrdering::WorseByTopology);

        a.steps_removed = 0;
        a.receiver.clock_identity = IDENTITY_A;
        b.steps_removed = 1;
        b.receiver.clock_identity = IDENTITY_B;

        assert_eq!(a.compare(&b), DatasetOrdering::Error1);
        assert_eq!(b.compare(&a), DatasetOrdering::Error1);

        a.receiver.clock_identity = IDENTITY_B;
        b.receiver.clock_identity = IDENTITY_C;

        assert_eq!(a.compare(&b), DatasetOrdering::BetterByTopology);
        assert_eq!(b.compare(&a), DatasetOrdering::WorseByTopology);

        // the inverse of the sender identities
        a.receiver.clock_identity = IDENTITY_B;
        b.receiver.clock_identity = IDENTITY_A;

        assert_eq!(a.compare(&b), DatasetOrdering::Better);
        assert_eq!(b.compare(&a), DatasetOrdering::Worse);

        a.steps_removed = 0;
        b.steps_removed = 2;

        assert_eq!(a.compare(&b), DatasetOrdering::Better);
        assert_eq!(b.compare(&a), DatasetOrdering::Worse);
    }
}
