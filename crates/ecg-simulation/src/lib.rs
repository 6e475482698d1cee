//! ECG-Simulation: Synthetic ECG sample generation
//!
//! Produces device-scale integer samples so the monitor can run without hardware.

pub mod real_time_stream;
pub mod signal_patterns;
pub mod ecg_simulator;

pub use ecg_simulator::*;
pub use real_time_stream::*;
pub use signal_patterns::*;
