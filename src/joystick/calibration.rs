//! Rest-position calibration
//!
//! Samples the joystick while it is untouched and takes the median of each
//! axis as its center. Median rather than mean, so single spikes from a noisy
//! ADC read do not shift the neutral zone.

use super::{AxisChannels, AxisSource};
use crate::config::CalibrationConfig;
use crate::error::CalibrationError;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-session baseline for one axis pair. Immutable once computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalibrationProfile {
    pub center_x: i32,
    pub center_y: i32,
    pub delta: i32,
}

impl CalibrationProfile {
    pub fn new(center_x: i32, center_y: i32, delta: i32) -> Self {
        Self {
            center_x,
            center_y,
            delta,
        }
    }

    /// `(low, high)` bounds of the X neutral zone
    pub fn x_thresholds(&self) -> (i32, i32) {
        thresholds(self.center_x, self.delta)
    }

    /// `(low, high)` bounds of the Y neutral zone
    pub fn y_thresholds(&self) -> (i32, i32) {
        thresholds(self.center_y, self.delta)
    }
}

fn thresholds(center: i32, delta: i32) -> (i32, i32) {
    (center.saturating_sub(delta), center.saturating_add(delta))
}

/// Median of `values`; the mean of the two middle values (rounded down) for
/// even lengths. `None` when empty.
pub fn median(values: &mut [i32]) -> Option<i32> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        let sum = i64::from(values[mid - 1]) + i64::from(values[mid]);
        Some(sum.div_euclid(2) as i32)
    }
}

/// One-shot rest sampler run at the start of every session
#[derive(Clone, Debug)]
pub struct Calibrator {
    channels: AxisChannels,
    sample_count: usize,
    settle_delay: Duration,
    sample_delay: Duration,
    threshold_delta: i32,
}

impl Calibrator {
    pub fn new(channels: AxisChannels, config: &CalibrationConfig) -> Self {
        Self {
            channels,
            sample_count: config.samples,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            sample_delay: Duration::from_millis(config.sample_delay_ms),
            threshold_delta: config.threshold_delta,
        }
    }

    /// Waits for the stick to settle, then takes `sample_count` readings of
    /// both axes spaced `sample_delay` apart.
    ///
    /// Any failed read aborts calibration; there is no per-sample retry.
    pub async fn calibrate<A: AxisSource>(
        &self,
        source: &mut A,
    ) -> Result<CalibrationProfile, CalibrationError> {
        if self.sample_count == 0 {
            return Err(CalibrationError::NoSamples);
        }

        info!(
            "Calibrating joystick center ({} samples), keep the stick centered",
            self.sample_count
        );
        tokio::time::sleep(self.settle_delay).await;

        let mut xs = Vec::with_capacity(self.sample_count);
        let mut ys = Vec::with_capacity(self.sample_count);
        for sample in 0..self.sample_count {
            let (x, y) = source
                .read_pair(self.channels)
                .await
                .map_err(|source| CalibrationError::Sensor { sample, source })?;
            xs.push(x);
            ys.push(y);
            if sample + 1 < self.sample_count {
                tokio::time::sleep(self.sample_delay).await;
            }
        }

        let center_x = median(&mut xs).ok_or(CalibrationError::NoSamples)?;
        let center_y = median(&mut ys).ok_or(CalibrationError::NoSamples)?;
        // median() sorted both vectors in place
        debug!(
            "Median center X: {} (range {}..={}), Y: {} (range {}..={})",
            center_x,
            xs[0],
            xs[xs.len() - 1],
            center_y,
            ys[0],
            ys[ys.len() - 1]
        );

        if self.threshold_delta <= 0 {
            warn!(
                "Non-positive threshold delta {}, neutral zone is empty",
                self.threshold_delta
            );
        }

        let profile = CalibrationProfile::new(center_x, center_y, self.threshold_delta);
        let (x_low, x_high) = profile.x_thresholds();
        let (y_low, y_high) = profile.y_thresholds();
        info!(
            "Calibration complete: X neutral {}..={}, Y neutral {}..={}",
            x_low, x_high, y_low, y_high
        );
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorError;
    use std::collections::VecDeque;

    /// Replays scripted `(x, y)` pairs
    struct Scripted {
        pairs: VecDeque<(i32, i32)>,
        pending_y: Option<i32>,
        reads: usize,
    }

    impl Scripted {
        fn new(pairs: &[(i32, i32)]) -> Self {
            Self {
                pairs: pairs.iter().copied().collect(),
                pending_y: None,
                reads: 0,
            }
        }
    }

    impl AxisSource for Scripted {
        async fn read_axis(&mut self, channel: u8) -> Result<i32, SensorError> {
            self.reads += 1;
            if channel == 1 {
                return self
                    .pending_y
                    .take()
                    .ok_or(SensorError::Unavailable("y before x".into()));
            }
            let (x, y) = self
                .pairs
                .pop_front()
                .ok_or(SensorError::Bus("script exhausted".into()))?;
            self.pending_y = Some(y);
            Ok(x)
        }
    }

    fn calibrator(samples: usize) -> Calibrator {
        Calibrator::new(
            AxisChannels { x: 0, y: 1 },
            &CalibrationConfig {
                samples,
                settle_delay_ms: 500,
                sample_delay_ms: 20,
                threshold_delta: 2_500,
            },
        )
    }

    #[test]
    fn median_ignores_outlier() {
        assert_eq!(median(&mut [10, 10, 10, 10, 1000]), Some(10));
        assert_eq!(median(&mut [1000, 10, 10, 10, 10]), Some(10));
    }

    #[test]
    fn median_even_length_averages_middle_pair() {
        assert_eq!(median(&mut [4, 1, 3, 2]), Some(2));
        assert_eq!(median(&mut [-3, -2]), Some(-3));
        assert_eq!(median(&mut []), None);
    }

    #[tokio::test(start_paused = true)]
    async fn computes_median_center_per_axis() {
        let mut source = Scripted::new(&[
            (10, 200),
            (10, 200),
            (1000, 200),
            (10, -5000),
            (10, 200),
        ]);
        let started = tokio::time::Instant::now();
        let profile = calibrator(5).calibrate(&mut source).await.unwrap();

        assert_eq!(profile, CalibrationProfile::new(10, 200, 2_500));
        assert_eq!(profile.x_thresholds(), (-2_490, 2_510));
        assert_eq!(source.reads, 10);
        // settle delay plus four gaps between five samples
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(500 + 4 * 20), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(500 + 5 * 20), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn read_failure_aborts_calibration() {
        let mut source = Scripted::new(&[(1, 1), (1, 1)]);
        let err = calibrator(3).calibrate(&mut source).await.unwrap_err();
        assert!(matches!(err, CalibrationError::Sensor { sample: 2, .. }));
    }

    #[tokio::test]
    async fn zero_samples_is_rejected() {
        let mut source = Scripted::new(&[]);
        let err = calibrator(0).calibrate(&mut source).await.unwrap_err();
        assert!(matches!(err, CalibrationError::NoSamples));
        assert_eq!(source.reads, 0);
    }
}
