//! Pre-defined ECG waveform patterns for simulation

use serde::{Deserialize, Serialize};

/// Shortest beat period the waveform model supports (150 BPM)
const MIN_PERIOD_SECS: f32 = 0.4;

/// Predefined ECG patterns, in device units around a baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EcgPattern {
    /// No cardiac activity
    Flatline { level: f32 },
    /// Regular P-QRS-T complexes
    Sinus {
        /// Beats per minute
        bpm: f32,
        /// Height of the R wave above baseline
        r_amplitude: f32,
        /// Isoelectric level
        baseline: f32,
    },
}

/// One gaussian component of the PQRST complex
struct Wave {
    /// Centre, in seconds from beat onset
    centre: f32,
    /// Width (standard deviation) in seconds
    width: f32,
    /// Height relative to the R wave
    scale: f32,
}

const PQRST: [Wave; 5] = [
    Wave { centre: 0.10, width: 0.040, scale: 0.12 },
    Wave { centre: 0.21, width: 0.015, scale: -0.10 },
    Wave { centre: 0.24, width: 0.040, scale: 1.00 },
    Wave { centre: 0.28, width: 0.015, scale: -0.15 },
    Wave { centre: 0.48, width: 0.070, scale: 0.25 },
];

impl EcgPattern {
    /// Signal level at `time` seconds
    pub fn level_at(&self, time: f32) -> f32 {
        match self {
            EcgPattern::Flatline { level } => *level,

            EcgPattern::Sinus { bpm, r_amplitude, baseline } => {
                if *bpm <= 0.0 {
                    return *baseline;
                }
                let period = (60.0 / bpm).max(MIN_PERIOD_SECS);
                let t = time.rem_euclid(period);

                let complex: f32 = PQRST
                    .iter()
                    .map(|w| {
                        let d = (t - w.centre) / w.width;
                        w.scale * (-0.5 * d * d).exp()
                    })
                    .sum();

                baseline + r_amplitude * complex
            }
        }
    }

    /// Nominal heart rate of the pattern
    pub fn nominal_bpm(&self) -> f32 {
        match self {
            EcgPattern::Flatline { .. } => 0.0,
            EcgPattern::Sinus { bpm, .. } => *bpm,
        }
    }

    /// Get pattern description
    pub fn description(&self) -> &'static str {
        match self {
            EcgPattern::Flatline { .. } => "Flatline",
            EcgPattern::Sinus { r_amplitude, .. } if *r_amplitude < 100.0 => "Weak sinus rhythm",
            EcgPattern::Sinus { .. } => "Sinus rhythm",
        }
    }

    /// Look up a preset by its name
    pub fn preset(name: &str) -> Option<EcgPattern> {
        Self::presets()
            .into_iter()
            .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
            .map(|(_, pattern)| pattern)
    }

    /// Create common preset patterns
    pub fn presets() -> Vec<(&'static str, EcgPattern)> {
        vec![
            ("resting", EcgPattern::Sinus { bpm: 72.0, r_amplitude: 300.0, baseline: 480.0 }),
            ("tachycardia", EcgPattern::Sinus { bpm: 130.0, r_amplitude: 280.0, baseline: 480.0 }),
            ("bradycardia", EcgPattern::Sinus { bpm: 45.0, r_amplitude: 320.0, baseline: 480.0 }),
            ("weak", EcgPattern::Sinus { bpm: 72.0, r_amplitude: 40.0, baseline: 500.0 }),
            ("flatline", EcgPattern::Flatline { level: 512.0 }),
        ]
    }
}

impl Default for EcgPattern {
    fn default() -> Self {
        EcgPattern::Sinus { bpm: 72.0, r_amplitude: 300.0, baseline: 480.0 }
    }
}
