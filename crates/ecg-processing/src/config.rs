//! Configuration management for the monitoring pipeline

use ecg_core::{EcgError, EcgResult, RawSample, SampleRange};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Configuration name/profile
    pub name: String,
    /// Target use case
    pub profile: MonitorProfile,
    /// Device sample scale
    pub sample_range: SampleRange,
    /// Smoothing parameters
    pub filter: FilterParams,
    /// Display buffer parameters
    pub display: DisplayParams,
    /// Metrics estimation parameters
    pub analysis: AnalysisParams,
}

/// Monitor profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorProfile {
    /// Reference device settings
    Standard,
    /// Shorter window and cadence for quicker feedback
    Responsive,
    /// Custom profile
    Custom,
}

/// Moving-average smoothing parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Number of raw samples averaged (K)
    pub window_size: usize,
}

/// Plot buffer parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayParams {
    /// Number of points kept for plotting (N)
    pub capacity: usize,
    /// Value the buffer is filled with on start and reset
    pub baseline: RawSample,
}

/// Metrics estimation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Samples retained for estimation (M)
    pub window_capacity: usize,
    /// Minimum samples before any estimate is published
    pub min_window_len: usize,
    /// Accepted samples between evaluations
    pub cadence: usize,
    /// Position of the peak threshold between min and max (0..1)
    pub threshold_ratio: f64,
    /// Amplitude below which quality is reported as low
    pub low_amplitude: u32,
    /// Assumed interval between device samples in milliseconds
    pub sample_interval_ms: f64,
}

impl MonitorConfig {
    /// Reference device: 10-bit samples every 50ms
    pub fn standard() -> Self {
        MonitorConfig {
            name: "Standard ECG".to_string(),
            profile: MonitorProfile::Standard,
            sample_range: SampleRange::TEN_BIT,
            filter: FilterParams { window_size: 5 },
            display: DisplayParams {
                capacity: 250,
                baseline: 512,
            },
            analysis: AnalysisParams {
                window_capacity: 100,
                min_window_len: 30,
                cadence: 20,
                threshold_ratio: 0.6,
                low_amplitude: 100,
                sample_interval_ms: 50.0,
            },
        }
    }

    /// Shorter analysis window and cadence, same device scale
    pub fn responsive() -> Self {
        let mut config = Self::standard();
        config.name = "Responsive ECG".to_string();
        config.profile = MonitorProfile::Responsive;
        config.filter.window_size = 3;
        config.analysis.window_capacity = 60;
        config.analysis.cadence = 10;
        config
    }

    /// Create configuration suitable for given profile
    pub fn for_profile(profile: MonitorProfile) -> Self {
        match profile {
            MonitorProfile::Standard => Self::standard(),
            MonitorProfile::Responsive => Self::responsive(),
            MonitorProfile::Custom => Self::standard(),
        }
    }

    /// Validate entire configuration
    pub fn validate(&self) -> EcgResult<()> {
        self.sample_range.validate()?;

        if self.filter.window_size == 0 {
            return Err(invalid("Filter window size must be greater than 0"));
        }

        if self.display.capacity == 0 {
            return Err(invalid("Display capacity must be greater than 0"));
        }

        if !self.sample_range.contains(self.display.baseline) {
            return Err(EcgError::InvalidConfig {
                reason: format!(
                    "Display baseline {} outside sample range {}..={}",
                    self.display.baseline, self.sample_range.min, self.sample_range.max
                ),
            });
        }

        let analysis = &self.analysis;
        if analysis.window_capacity == 0 {
            return Err(invalid("Analysis window capacity must be greater than 0"));
        }

        if analysis.min_window_len > analysis.window_capacity {
            return Err(EcgError::InvalidConfig {
                reason: format!(
                    "Minimum window length {} exceeds window capacity {}",
                    analysis.min_window_len, analysis.window_capacity
                ),
            });
        }

        if analysis.cadence == 0 {
            return Err(invalid("Metrics cadence must be greater than 0"));
        }

        if !(analysis.threshold_ratio > 0.0 && analysis.threshold_ratio < 1.0) {
            return Err(invalid("Threshold ratio must lie strictly between 0 and 1"));
        }

        if !(analysis.sample_interval_ms > 0.0) || !analysis.sample_interval_ms.is_finite() {
            return Err(invalid("Sample interval must be positive"));
        }

        Ok(())
    }

    /// Wall-clock duration a full analysis window represents
    pub fn window_duration_secs(&self) -> f64 {
        self.analysis.window_capacity as f64 * self.analysis.sample_interval_ms / 1000.0
    }

    /// Peaks-to-BPM multiplier (12 for 100 samples at 50ms)
    pub fn beats_per_minute_factor(&self) -> f64 {
        60.0 / self.window_duration_secs()
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> EcgResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EcgError::InvalidConfig {
            reason: format!("Failed to serialize configuration: {}", e),
        })
    }

    /// Import and validate configuration from JSON
    pub fn from_json(json: &str) -> EcgResult<Self> {
        let config: MonitorConfig = serde_json::from_str(json).map_err(|e| EcgError::InvalidConfig {
            reason: format!("Failed to deserialize configuration: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> EcgResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| EcgError::InvalidConfig {
            reason: format!("Failed to read {}: {}", path.display(), e),
        })?;
        Self::from_json(&json)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::standard()
    }
}

fn invalid(reason: &str) -> EcgError {
    EcgError::InvalidConfig {
        reason: reason.to_string(),
    }
}
