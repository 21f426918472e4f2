//! Core scheduling logic.
//!
//! - [`period`]: pure classification of wall-clock time into circadian periods
//! - [`resolver`]: the background context that turns settings, time and any
//!   preview override into the single authoritative `current_temp`

pub mod period;
pub mod resolver;

pub use resolver::{Resolution, ResolverHandle, TemperatureResolver};
