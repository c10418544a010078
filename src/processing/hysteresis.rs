//! Hysteresis over raw radius classifications
//!
//! GPS noise of 5-20 m routinely crosses event radii of 10-100 m, so a raw
//! classification per sample flaps at the boundary. The filter keeps the last
//! few raw classifications and only changes the published value when:
//!
//! - the window is full and unanimous in the new classification, or
//! - the sample crosses the radius by more than its own accuracy
//!   (a single high-confidence sample is trusted on its own).
//!
//! Without an override, a published value therefore changes at most once per
//! `window` accepted samples.

use crate::core::{Proximity, DEFAULT_HYSTERESIS_WINDOW};
use std::collections::VecDeque;

/// Why the published classification changed (or was first set)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First classification of the session
    Initial,
    /// The whole window agreed on the new classification
    Unanimous,
    /// One sample crossed the radius by more than its accuracy
    ConfidentCrossing,
}

/// Result of feeding one raw classification into the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HysteresisOutcome {
    /// Value to publish after this sample
    pub published: Proximity,
    /// Set when `published` differs from the previous value
    pub transition: Option<Transition>,
}

/// Ring buffer of recent raw classifications with a published value
#[derive(Debug, Clone)]
pub struct HysteresisFilter {
    window: VecDeque<Proximity>,
    capacity: usize,
    published: Option<Proximity>,
}

impl Default for HysteresisFilter {
    fn default() -> Self {
        Self::new(DEFAULT_HYSTERESIS_WINDOW)
    }
}

impl HysteresisFilter {
    /// Create a filter over the last `capacity` classifications (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::new(),
            capacity,
            published: None,
        }
    }

    /// Record one accepted sample's raw classification.
    ///
    /// `distance_m`, `radius_m` and `accuracy_m` decide whether the sample is
    /// confident enough to override the window on its own.
    pub fn update(
        &mut self,
        raw: Proximity,
        distance_m: f64,
        radius_m: f64,
        accuracy_m: f64,
    ) -> HysteresisOutcome {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(raw);

        let transition = match self.published {
            None => Some(Transition::Initial),
            Some(current) if current == raw => None,
            Some(_) => {
                if self.is_unanimous(raw) {
                    Some(Transition::Unanimous)
                } else if (distance_m - radius_m).abs() > accuracy_m {
                    Some(Transition::ConfidentCrossing)
                } else {
                    None
                }
            }
        };

        if transition.is_some() {
            self.published = Some(raw);
        }

        HysteresisOutcome {
            published: self.published.unwrap_or(raw),
            transition,
        }
    }

    /// Currently published classification, if any sample has been seen
    pub fn published(&self) -> Option<Proximity> {
        self.published
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of classifications currently held
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.published = None;
    }

    fn is_unanimous(&self, candidate: Proximity) -> bool {
        self.window.len() == self.capacity && self.window.iter().all(|p| *p == candidate)
    }
}
