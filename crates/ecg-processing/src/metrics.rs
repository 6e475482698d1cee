//! Vital-sign estimation from an analysis window
//!
//! The estimate is deliberately coarse: beats are counted as rising crossings
//! of a threshold placed between the window minimum and maximum, and the count
//! is scaled by the wall-clock duration a full window is assumed to cover.

use crate::config::MonitorConfig;
use ecg_core::{EcgError, EcgResult, MetricsSnapshot, RawSample, SignalQuality};
use serde::{Deserialize, Serialize};

/// Estimator parameters, fixed for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsEstimator {
    /// Threshold position between min and max
    pub threshold_ratio: f64,
    /// Amplitude below which quality is `Low`
    pub low_amplitude: u32,
    /// Multiplier from peak count to beats per minute
    pub bpm_factor: f64,
    /// Minimum window length accepted by `try_evaluate`
    pub min_window_len: usize,
}

impl MetricsEstimator {
    pub fn from_config(config: &MonitorConfig) -> Self {
        MetricsEstimator {
            threshold_ratio: config.analysis.threshold_ratio,
            low_amplitude: config.analysis.low_amplitude,
            bpm_factor: config.beats_per_minute_factor(),
            min_window_len: config.analysis.min_window_len,
        }
    }

    /// Evaluate a window, refusing windows shorter than `min_window_len`
    pub fn try_evaluate(&self, window: &[RawSample]) -> EcgResult<MetricsSnapshot> {
        if window.len() < self.min_window_len {
            return Err(EcgError::InsufficientData {
                len: window.len(),
                required: self.min_window_len,
            });
        }
        Ok(self.evaluate(window))
    }

    /// Evaluate a window without the length precondition
    ///
    /// An empty window yields zero amplitude and therefore `Low` quality.
    pub fn evaluate(&self, window: &[RawSample]) -> MetricsSnapshot {
        let (min, max) = match min_max(window) {
            Some(bounds) => bounds,
            None => (0, 0),
        };

        let amplitude = (i64::from(max) - i64::from(min)) as u32;
        let threshold = f64::from(min) + f64::from(amplitude) * self.threshold_ratio;
        let peaks = count_rising_edges(window, threshold);
        let heart_rate_bpm = (f64::from(peaks) * self.bpm_factor).round() as u32;

        MetricsSnapshot {
            amplitude,
            heart_rate_bpm,
            quality: self.classify(amplitude, peaks),
            peaks,
            window_len: window.len(),
            published_at: None,
        }
    }

    /// Amplitude is checked before the peak count
    pub fn classify(&self, amplitude: u32, peaks: u32) -> SignalQuality {
        if amplitude < self.low_amplitude {
            SignalQuality::Low
        } else if peaks == 0 {
            SignalQuality::NoPulseDetected
        } else {
            SignalQuality::Good
        }
    }
}

impl Default for MetricsEstimator {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::standard())
    }
}

/// Count rising crossings of `threshold`
///
/// A sample strictly above the threshold arms the detector and counts a peak,
/// a sample strictly below disarms it. Samples equal to the threshold never
/// change state.
pub fn count_rising_edges(window: &[RawSample], threshold: f64) -> u32 {
    let mut peaks = 0;
    let mut above = false;

    for &sample in window {
        let value = f64::from(sample);
        if !above && value > threshold {
            above = true;
            peaks += 1;
        } else if above && value < threshold {
            above = false;
        }
    }

    peaks
}

fn min_max(window: &[RawSample]) -> Option<(RawSample, RawSample)> {
    let first = *window.first()?;
    Some(window.iter().fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))))
}
