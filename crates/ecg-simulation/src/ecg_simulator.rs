//! ECG sample simulator producing device-scale integer readings

use crate::signal_patterns::EcgPattern;
use ecg_core::{config_error, EcgError, EcgResult, RawSample, SampleRange};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for ECG simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcgConfig {
    /// Range of the emulated converter
    pub sample_range: SampleRange,
    /// Time between consecutive samples
    pub sample_interval_ms: f64,
    /// Waveform to generate
    pub pattern: EcgPattern,
    /// Noise configuration
    pub noise: NoiseConfig,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

/// Noise and artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Gaussian noise standard deviation in device units (0.0 = no noise)
    pub gaussian_std: f32,
    /// Baseline wander amplitude in device units
    pub baseline_wander: f32,
    /// Per-sample probability that a lead-off episode starts (0.0 to 1.0)
    pub dropout_prob: f32,
    /// Samples emitted as the disconnect sentinel per episode
    pub dropout_len: usize,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gaussian_std: 4.0,
            baseline_wander: 15.0,
            dropout_prob: 0.0,
            dropout_len: 10,
        }
    }
}

impl NoiseConfig {
    /// Noise-free output
    pub fn none() -> Self {
        Self {
            gaussian_std: 0.0,
            baseline_wander: 0.0,
            dropout_prob: 0.0,
            dropout_len: 0,
        }
    }
}

impl Default for EcgConfig {
    fn default() -> Self {
        Self {
            sample_range: SampleRange::TEN_BIT,
            sample_interval_ms: 50.0,
            pattern: EcgPattern::default(),
            noise: NoiseConfig::default(),
            seed: None,
        }
    }
}

impl EcgConfig {
    pub fn validate(&self) -> EcgResult<()> {
        self.sample_range.validate()?;

        if !self.sample_interval_ms.is_finite() || self.sample_interval_ms <= 0.0 {
            return Err(config_error!(
                "sample interval must be positive, got {}ms",
                self.sample_interval_ms
            ));
        }
        if !(0.0..=1.0).contains(&self.noise.dropout_prob) {
            return Err(config_error!(
                "dropout probability must be within 0..=1, got {}",
                self.noise.dropout_prob
            ));
        }
        if !self.noise.gaussian_std.is_finite() || self.noise.gaussian_std < 0.0 {
            return Err(config_error!(
                "noise deviation must be non-negative, got {}",
                self.noise.gaussian_std
            ));
        }
        Ok(())
    }

    /// Sample period as a timer duration
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs_f64(self.sample_interval_ms / 1000.0)
    }
}

/// ECG simulator
pub struct EcgSimulator {
    config: EcgConfig,
    rng: StdRng,
    normal_dist: Normal<f32>,
    time_offset: f64,
    dropout_remaining: usize,
}

impl EcgSimulator {
    /// Create new ECG simulator with configuration
    pub fn new(config: EcgConfig) -> EcgResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let normal_dist = noise_distribution(&config.noise)?;

        Ok(EcgSimulator {
            config,
            rng,
            normal_dist,
            time_offset: 0.0,
            dropout_remaining: 0,
        })
    }

    /// Produce the next reading
    pub fn next_sample(&mut self) -> RawSample {
        let time = self.time_offset;
        self.time_offset += self.config.sample_interval_ms / 1000.0;

        if self.in_dropout() {
            return self.config.sample_range.disconnect_sentinel;
        }

        let mut value = self.config.pattern.level_at(time as f32);
        value += self.noise(time);

        self.quantize(value)
    }

    /// Generate `count` consecutive readings
    pub fn generate(&mut self, count: usize) -> Vec<RawSample> {
        (0..count).map(|_| self.next_sample()).collect()
    }

    fn in_dropout(&mut self) -> bool {
        if self.dropout_remaining > 0 {
            self.dropout_remaining -= 1;
            return true;
        }

        let noise = &self.config.noise;
        if noise.dropout_len > 0 && self.rng.gen::<f32>() < noise.dropout_prob {
            self.dropout_remaining = noise.dropout_len - 1;
            return true;
        }
        false
    }

    fn noise(&mut self, time: f64) -> f32 {
        let mut noise = 0.0;

        // Gaussian noise
        noise += self.normal_dist.sample(&mut self.rng);

        // Respiratory baseline wander (~0.25Hz)
        noise += self.config.noise.baseline_wander
            * (2.0 * std::f64::consts::PI * 0.25 * time).sin() as f32;

        noise
    }

    /// Round into the converter range, never landing on the sentinel
    fn quantize(&self, value: f32) -> RawSample {
        let range = &self.config.sample_range;
        let mut sample = (value.round() as RawSample).clamp(range.min, range.max);

        if sample == range.disconnect_sentinel {
            sample = if sample < range.max { sample + 1 } else { sample - 1 };
        }
        sample
    }

    /// Reset time offset (useful for restarting simulation)
    pub fn reset_time(&mut self) {
        self.time_offset = 0.0;
        self.dropout_remaining = 0;
    }

    /// Get current configuration
    pub fn config(&self) -> &EcgConfig {
        &self.config
    }

    /// Update configuration
    pub fn update_config(&mut self, config: EcgConfig) -> EcgResult<()> {
        config.validate()?;

        self.normal_dist = noise_distribution(&config.noise)?;
        self.config = config;
        Ok(())
    }

    /// Switch waveform without restarting the clock
    pub fn set_pattern(&mut self, pattern: EcgPattern) {
        self.config.pattern = pattern;
    }

    pub fn set_dropout_probability(&mut self, probability: f32) -> EcgResult<()> {
        let mut config = self.config.clone();
        config.noise.dropout_prob = probability;
        self.update_config(config)
    }
}

fn noise_distribution(noise: &NoiseConfig) -> EcgResult<Normal<f32>> {
    Normal::new(0.0, noise.gaussian_std).map_err(|e| EcgError::SimulationError {
        reason: format!("Failed to create normal distribution: {}", e),
    })
}
