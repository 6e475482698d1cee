//! Error handling for the ECG monitor
//!
//! None of these errors is fatal to a session: the stream controller absorbs
//! them and reflects them as status or as a missing metrics publication.

use core::fmt;

/// Result type alias for ECG monitor operations
pub type EcgResult<T> = Result<T, EcgError>;

/// Error type for all ECG monitor operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EcgError {
    /// Raw sample outside the device range
    InvalidSample {
        /// Offending raw value
        value: i32,
        /// Lowest accepted value
        min: i32,
        /// Highest accepted value
        max: i32,
    },

    /// Analysis window too short for estimation
    InsufficientData {
        /// Current window length
        len: usize,
        /// Minimum length required
        required: usize,
    },

    /// Configuration rejected by validation
    InvalidConfig {
        /// Description of the configuration error
        reason: String,
    },

    /// Sample transport failure
    TransportError {
        /// Transport-level description
        reason: String,
    },

    /// Signal simulation failure
    SimulationError {
        /// Simulation error description
        reason: String,
    },

    /// A channel between tasks was closed
    ChannelClosed {
        /// Name of the channel
        channel: &'static str,
    },
}

impl EcgError {
    /// Whether the error only suppresses output instead of signalling a fault
    pub fn is_silent(&self) -> bool {
        matches!(self, EcgError::InsufficientData { .. })
    }
}

impl fmt::Display for EcgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcgError::InvalidSample { value, min, max } => {
                write!(f, "Invalid sample {}: outside range {}..={}", value, min, max)
            }
            EcgError::InsufficientData { len, required } => {
                write!(f, "Insufficient data: {} samples, need at least {}",
                       len, required)
            }
            EcgError::InvalidConfig { reason } => {
                write!(f, "Invalid configuration: {}", reason)
            }
            EcgError::TransportError { reason } => {
                write!(f, "Transport error: {}", reason)
            }
            EcgError::SimulationError { reason } => {
                write!(f, "Simulation error: {}", reason)
            }
            EcgError::ChannelClosed { channel } => {
                write!(f, "Channel closed: {}", channel)
            }
        }
    }
}

impl std::error::Error for EcgError {}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)+) => {
        $crate::error::EcgError::InvalidConfig {
            reason: format!($($arg)+),
        }
    };
}
