//! The best master clock algorithm: the dataset comparison of
//! *IEEE1588-2019 section 9.3.4* and the per-port recommended state
//! decision built on top of it.

mod dataset_comparison;
mod state_decision;

pub use dataset_comparison::{Dataset, DatasetOrdering};
pub use state_decision::state_decision;
