//! Domain models for clinic intake.

mod patient;
mod stats;

pub use patient::*;
pub use stats::*;
