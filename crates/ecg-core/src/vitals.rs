//! Vital-sign output types: metrics snapshots, quality labels and link status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Qualitative signal-quality label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalQuality {
    /// Enough amplitude and at least one detected beat
    Good,
    /// Amplitude below the usable threshold
    Low,
    /// Usable amplitude but no beat crossed the threshold
    NoPulseDetected,
}

impl SignalQuality {
    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            SignalQuality::Good => "Good",
            SignalQuality::Low => "Low",
            SignalQuality::NoPulseDetected => "No pulse detected",
        }
    }
}

impl std::fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Metrics derived from one analysis window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Peak-to-peak amplitude in device units
    pub amplitude: u32,
    /// Heart rate estimate in beats per minute
    pub heart_rate_bpm: u32,
    /// Quality label
    pub quality: SignalQuality,
    /// Threshold up-crossings found in the window
    pub peaks: u32,
    /// Number of samples the estimate was computed from
    pub window_len: usize,
    /// Publication time, stamped by the controller
    pub published_at: Option<DateTime<Utc>>,
}

impl MetricsSnapshot {
    /// Same snapshot stamped with a publication time
    pub fn stamped(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    /// Compare the computed metrics, ignoring the publication stamp
    pub fn same_metrics(&self, other: &MetricsSnapshot) -> bool {
        self.amplitude == other.amplitude
            && self.heart_rate_bpm == other.heart_rate_bpm
            && self.quality == other.quality
            && self.peaks == other.peaks
            && self.window_len == other.window_len
    }
}

/// Connection status surfaced to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Connected,
    Disconnected,
    Connecting,
    Error,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Connected => "connected",
            LinkStatus::Disconnected => "disconnected",
            LinkStatus::Connecting => "connecting",
            LinkStatus::Error => "error",
        }
    }

    /// Whether the status should be shown as healthy
    pub fn is_healthy(&self) -> bool {
        matches!(self, LinkStatus::Connected)
    }
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of one monitoring session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            amplitude: 198,
            heart_rate_bpm: 72,
            quality: SignalQuality::Good,
            peaks: 6,
            window_len: 100,
            published_at: None,
        }
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(LinkStatus::Connected.to_string(), "connected");
        assert_eq!(LinkStatus::Disconnected.to_string(), "disconnected");
        assert_eq!(LinkStatus::Connecting.to_string(), "connecting");
        assert_eq!(LinkStatus::Error.to_string(), "error");
        assert!(LinkStatus::Connected.is_healthy());
        assert!(!LinkStatus::Error.is_healthy());
    }

    #[test]
    fn test_stamp_does_not_change_metrics() {
        let plain = snapshot();
        let stamped = plain.clone().stamped(Utc::now());
        assert!(stamped.published_at.is_some());
        assert!(plain.same_metrics(&stamped));
        assert_ne!(plain, stamped);
    }

    #[test]
    fn test_snapshot_json() {
        let json = serde_json::to_string(&snapshot()).unwrap();
        assert!(json.contains("\"heart_rate_bpm\":72"));
        assert!(json.contains("\"Good\""));

        let status = serde_json::to_string(&LinkStatus::Connecting).unwrap();
        assert_eq!(status, "\"connecting\"");
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
