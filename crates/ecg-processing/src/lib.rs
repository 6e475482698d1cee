//! ECG-Processing: Streaming signal pipeline for the ECG monitor
//!
//! Smoothing filter, plot and analysis buffers, the peak-counting metrics
//! estimator and the per-session stream controller.

pub mod config;
pub mod filters;
pub mod buffers;
pub mod metrics;
pub mod controller;

pub use config::{MonitorConfig, MonitorProfile, FilterParams, DisplayParams, AnalysisParams};
pub use filters::SampleFilter;
pub use buffers::{DisplayBuffer, AnalysisWindow};
pub use metrics::{MetricsEstimator, count_rising_edges};
pub use controller::{
    StreamController, StreamState, StreamEvent, ControlAction, Outcome, SessionStats
};
