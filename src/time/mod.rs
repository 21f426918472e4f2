//! Wall-clock access for every context.

pub mod source;

pub use source::{Clock, SharedClock, SystemClock, local_instant};

#[cfg(any(test, feature = "testing-support"))]
pub use source::ManualClock;
