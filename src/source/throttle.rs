//! Minimum interval / minimum distance filtering of raw fixes
//!
//! Some platforms ignore the cadence hints passed when tracking starts and
//! deliver every fix. The throttle enforces [`TrackingOptions`] at the source
//! boundary: a sample is admitted only when both the interval and the
//! distance since the last admitted sample have been reached.
//!
//! Fixes too inaccurate to be used downstream are passed through without
//! becoming the reference point, so a discarded fix never holds back a good one.

use crate::algorithms::haversine_distance;
use crate::core::PositionSample;
use crate::source::TrackingOptions;

#[derive(Debug, Clone)]
pub struct SampleThrottle {
    min_interval_ms: u64,
    min_distance_m: f64,
    max_accuracy_m: Option<f64>,
    last_admitted: Option<PositionSample>,
}

impl SampleThrottle {
    pub fn new(min_interval_ms: u64, min_distance_m: f64) -> Self {
        Self {
            min_interval_ms,
            min_distance_m: min_distance_m.max(0.0),
            max_accuracy_m: None,
            last_admitted: None,
        }
    }

    pub fn with_accuracy_ceiling(mut self, max_accuracy_m: Option<f64>) -> Self {
        self.max_accuracy_m = max_accuracy_m;
        self
    }

    pub fn from_options(options: &TrackingOptions) -> Self {
        Self::new(options.min_interval_ms, options.min_distance_m)
            .with_accuracy_ceiling(options.max_accuracy_m)
    }

    /// Decide whether `sample` should be delivered, recording it if so
    pub fn admit(&mut self, sample: &PositionSample) -> bool {
        if let Some(ceiling) = self.max_accuracy_m {
            if !(sample.accuracy_m.is_finite() && sample.accuracy_m <= ceiling) {
                return true;
            }
        }

        let Some(last) = self.last_admitted else {
            self.last_admitted = Some(*sample);
            return true;
        };

        let elapsed_ms = sample.captured_at_ms.saturating_sub(last.captured_at_ms);
        if elapsed_ms < self.min_interval_ms {
            return false;
        }

        if self.min_distance_m > 0.0 {
            // An unmeasurable sample is passed on so the consumer can reject it itself
            if let Ok(moved) = haversine_distance(&last.coordinate, &sample.coordinate) {
                if moved < self.min_distance_m {
                    return false;
                }
            }
        }

        self.last_admitted = Some(*sample);
        true
    }

    pub fn reset(&mut self) {
        self.last_admitted = None;
    }
}
