//! Freshness tracking for published proximity state

use crate::core::{Staleness, DEFAULT_STALENESS_WINDOW_MS};
use std::time::Duration;
use tokio::time::Instant;

/// Tracks when the last sample was accepted and derives [`Staleness`].
///
/// Time is measured on the host's monotonic clock at acceptance, not from the
/// sample's capture timestamp, since device clocks may drift from the host.
#[derive(Debug, Clone)]
pub struct StalenessMonitor {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Default for StalenessMonitor {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_STALENESS_WINDOW_MS))
    }
}

impl StalenessMonitor {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    /// Record an accepted sample at `now`
    pub fn mark_fresh(&mut self, now: Instant) {
        self.last_accepted = Some(now);
    }

    /// Staleness as of `now`
    pub fn evaluate(&self, now: Instant) -> Staleness {
        match self.last_accepted {
            None => Staleness::Unknown,
            Some(at) if now.saturating_duration_since(at) >= self.window => Staleness::Stale,
            Some(_) => Staleness::Fresh,
        }
    }

    /// Instant at which the state becomes stale, if a sample has been accepted
    pub fn deadline(&self) -> Option<Instant> {
        self.last_accepted.map(|at| at + self.window)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_before_first_sample() {
        let monitor = StalenessMonitor::default();
        assert_eq!(monitor.evaluate(Instant::now()), Staleness::Unknown);
        assert!(monitor.deadline().is_none());
    }

    #[test]
    fn test_fresh_then_stale() {
        let mut monitor = StalenessMonitor::new(Duration::from_secs(10));
        let start = Instant::now();
        monitor.mark_fresh(start);

        assert_eq!(monitor.evaluate(start), Staleness::Fresh);
        assert_eq!(
            monitor.evaluate(start + Duration::from_millis(9_999)),
            Staleness::Fresh
        );
        assert_eq!(
            monitor.evaluate(start + Duration::from_secs(10)),
            Staleness::Stale
        );
        assert_eq!(monitor.deadline(), Some(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_new_sample_refreshes() {
        let mut monitor = StalenessMonitor::new(Duration::from_secs(10));
        let start = Instant::now();
        monitor.mark_fresh(start);
        let later = start + Duration::from_secs(15);
        assert_eq!(monitor.evaluate(later), Staleness::Stale);

        monitor.mark_fresh(later);
        assert_eq!(monitor.evaluate(later), Staleness::Fresh);
    }

    #[test]
    fn test_clock_before_last_sample_counts_as_fresh() {
        let mut monitor = StalenessMonitor::new(Duration::from_secs(1));
        let start = Instant::now() + Duration::from_secs(5);
        monitor.mark_fresh(start);
        assert_eq!(monitor.evaluate(Instant::now()), Staleness::Fresh);
    }
}
