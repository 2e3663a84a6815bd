pub mod call;
pub mod status;

pub use call::{CallRecord, CallSnapshot, DurationSource};
pub use status::{StatusKind, StatusLabels};
