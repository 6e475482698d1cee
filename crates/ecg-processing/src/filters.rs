//! Moving-average smoothing of raw samples

use ecg_core::RawSample;
use std::collections::VecDeque;

/// Moving average over the last `K` raw samples
///
/// The history starts as `K` zeros, so the first outputs ramp up from zero
/// until the window has been filled with real samples. The output is the mean
/// rounded half away from zero, computed in integer arithmetic so that it is
/// exact for every window size.
#[derive(Debug, Clone)]
pub struct SampleFilter {
    window_size: usize,
    history: VecDeque<RawSample>,
    sum: i64,
}

impl SampleFilter {
    /// Create new filter; a zero window is treated as a window of one
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);

        SampleFilter {
            window_size,
            history: std::iter::repeat(0).take(window_size).collect(),
            sum: 0,
        }
    }

    /// Admit one raw sample and return the smoothed value
    pub fn admit(&mut self, raw: RawSample) -> RawSample {
        if let Some(oldest) = self.history.pop_front() {
            self.sum -= i64::from(oldest);
        }
        self.history.push_back(raw);
        self.sum += i64::from(raw);

        rounded_mean(self.sum, self.window_size as i64)
    }

    /// Restore the all-zero history
    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|v| *v = 0);
        self.sum = 0;
    }

    /// Retained raw samples, oldest first
    pub fn history(&self) -> Vec<RawSample> {
        self.history.iter().copied().collect()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}

/// `sum / count` rounded half away from zero
fn rounded_mean(sum: i64, count: i64) -> RawSample {
    let half = count / 2;
    let mean = if sum >= 0 {
        (sum + half) / count
    } else {
        -((-sum + half) / count)
    };
    mean as RawSample
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_history_is_zero() {
        let filter = SampleFilter::new(5);
        assert_eq!(filter.history(), vec![0; 5]);
    }

    #[test]
    fn test_ramp_up_from_zero_history() {
        let mut filter = SampleFilter::new(5);
        assert_eq!(filter.admit(500), 100);
        assert_eq!(filter.admit(500), 200);
        assert_eq!(filter.admit(500), 300);
        assert_eq!(filter.admit(500), 400);
        assert_eq!(filter.admit(500), 500);
        assert_eq!(filter.admit(500), 500);
    }

    #[test]
    fn test_only_last_window_matters() {
        let mut a = SampleFilter::new(5);
        let mut b = SampleFilter::new(5);

        for v in [1000, 3, 900, 17, 650, 222] {
            a.admit(v);
        }
        for v in [1, 1, 1] {
            b.admit(v);
        }

        let tail = [412, 420, 430, 600, 611];
        let mut last_a = 0;
        let mut last_b = 0;
        for v in tail {
            last_a = a.admit(v);
            last_b = b.admit(v);
        }

        // (412 + 420 + 430 + 600 + 611) / 5 = 494.6
        assert_eq!(last_a, 495);
        assert_eq!(last_a, last_b);
        assert_eq!(a.history(), tail.to_vec());
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        assert_eq!(rounded_mean(6, 4), 2);
        assert_eq!(rounded_mean(5, 4), 1);
        assert_eq!(rounded_mean(-6, 4), -2);
        assert_eq!(rounded_mean(7, 2), 4);
        assert_eq!(rounded_mean(-7, 2), -4);
    }

    #[test]
    fn test_reset_restores_zeros() {
        let mut filter = SampleFilter::new(5);
        for v in [700, 710, 720] {
            filter.admit(v);
        }
        filter.reset();
        assert_eq!(filter.history(), vec![0; 5]);
        assert_eq!(filter.admit(5), 1);
    }
}
