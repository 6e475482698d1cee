//! ECG-Core: Foundation types for the ECG stream monitor
//!
//! Sample range, transport events, metrics snapshots and the shared error type.

pub mod sample;
pub mod vitals;
pub mod error;

pub use sample::*;
pub use vitals::*;
pub use error::{EcgError, EcgResult};
