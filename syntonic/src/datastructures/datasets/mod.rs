//! The data sets a PTP clock maintains and exposes through the
//! management plane. Serialized forms follow the management TLV layouts
//! of *IEEE1588-2019 section 15.5.3*.

mod current;
mod default;
mod parent;
mod time_properties;
mod time_status;

pub use current::CurrentDS;
pub use default::DefaultDS;
pub use parent::{ParentDS, PATH_TRACE_MAX};
pub use time_properties::TimePropertiesDS;
pub use time_status::{ScaledNs, TimeStatus};
