//! Raw samples, the device range and transport-facing events

use serde::{Deserialize, Serialize};
use crate::error::{EcgError, EcgResult};

/// Raw device sample as delivered by the transport
pub type RawSample = i32;

/// Device-defined sample scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRange {
    /// Lowest value the device can report
    pub min: RawSample,
    /// Highest value the device can report
    pub max: RawSample,
    /// Value reserved for "electrodes disconnected"
    pub disconnect_sentinel: RawSample,
}

/// Classification of one raw sample against the device range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// In range and carrying signal content
    Signal(RawSample),
    /// The disconnect sentinel
    Disconnected,
    /// Outside the declared range
    OutOfRange(RawSample),
}

impl SampleRange {
    /// 10-bit ADC scale with zero reserved for lead-off
    pub const TEN_BIT: SampleRange = SampleRange {
        min: 0,
        max: 1023,
        disconnect_sentinel: 0,
    };

    /// Create a range, checking that it is non-empty and contains the sentinel
    pub fn new(min: RawSample, max: RawSample, disconnect_sentinel: RawSample) -> EcgResult<Self> {
        let range = SampleRange { min, max, disconnect_sentinel };
        range.validate()?;
        Ok(range)
    }

    /// Validate range bounds
    pub fn validate(&self) -> EcgResult<()> {
        if self.min >= self.max {
            return Err(EcgError::InvalidConfig {
                reason: format!("Sample range {}..={} is empty", self.min, self.max),
            });
        }

        if !self.contains(self.disconnect_sentinel) {
            return Err(EcgError::InvalidConfig {
                reason: format!(
                    "Disconnect sentinel {} outside sample range {}..={}",
                    self.disconnect_sentinel, self.min, self.max
                ),
            });
        }

        Ok(())
    }

    /// Whether `value` lies within the range (inclusive)
    pub fn contains(&self, value: RawSample) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Sentinel check happens before the range check
    pub fn classify(&self, raw: RawSample) -> SampleKind {
        if raw == self.disconnect_sentinel {
            SampleKind::Disconnected
        } else if self.contains(raw) {
            SampleKind::Signal(raw)
        } else {
            SampleKind::OutOfRange(raw)
        }
    }

    /// Error describing `raw` as out of range
    pub fn reject(&self, raw: RawSample) -> EcgError {
        EcgError::InvalidSample {
            value: raw,
            min: self.min,
            max: self.max,
        }
    }

    /// Midpoint of the scale, rounded up (512 for 0..=1023)
    pub fn midpoint(&self) -> RawSample {
        let (min, max) = (i64::from(self.min), i64::from(self.max));
        // Never exceeds max, so it fits back into a sample
        (min + (max - min + 1) / 2) as RawSample
    }

    /// Full span of the scale
    pub fn span(&self) -> u32 {
        (i64::from(self.max) - i64::from(self.min)) as u32
    }
}

impl Default for SampleRange {
    fn default() -> Self {
        SampleRange::TEN_BIT
    }
}

/// Lifecycle and data events delivered by a sample transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A connection attempt has started
    Connecting,
    /// The connection is open
    Opened,
    /// One raw sample
    Sample(RawSample),
    /// The connection was closed
    Closed,
    /// The connection failed
    Errored(String),
}
