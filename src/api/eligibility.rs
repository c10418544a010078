//! Join eligibility derived from proximity state
//!
//! Joining an event requires a confirmed, current fix inside the radius. A
//! stale or unknown reading never qualifies, even if it last said "within".

use crate::core::{ProximityState, Staleness};
use serde::{Deserialize, Serialize};

/// Why a join is not currently possible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnconfirmedReason {
    /// No sample has been accepted yet
    NoFix,
    /// The last accepted sample is older than the staleness window
    StaleReading,
}

/// Whether the user may join the event right now
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JoinEligibility {
    Eligible,
    /// A fresh fix places the user outside the radius
    NotNearby { distance_m: f64 },
    /// Proximity cannot be confirmed
    Unconfirmed(UnconfirmedReason),
}

impl JoinEligibility {
    pub fn from_state(state: &ProximityState) -> Self {
        match state.staleness {
            Staleness::Unknown => return JoinEligibility::Unconfirmed(UnconfirmedReason::NoFix),
            Staleness::Stale => {
                return JoinEligibility::Unconfirmed(UnconfirmedReason::StaleReading)
            }
            Staleness::Fresh => {}
        }

        match (state.within_radius, state.distance_m) {
            (Some(true), _) => JoinEligibility::Eligible,
            (Some(false), Some(distance_m)) => JoinEligibility::NotNearby { distance_m },
            _ => JoinEligibility::Unconfirmed(UnconfirmedReason::NoFix),
        }
    }

    pub fn is_eligible(&self) -> bool {
        matches!(self, JoinEligibility::Eligible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(within: bool, staleness: Staleness) -> ProximityState {
        ProximityState {
            distance_m: Some(if within { 20.0 } else { 400.0 }),
            within_radius: Some(within),
            last_updated_ms: Some(5_000),
            staleness,
        }
    }

    #[test]
    fn test_fresh_within_is_eligible() {
        assert!(JoinEligibility::from_state(&state(true, Staleness::Fresh)).is_eligible());
    }

    #[test]
    fn test_outside_is_not_nearby() {
        assert_eq!(
            JoinEligibility::from_state(&state(false, Staleness::Fresh)),
            JoinEligibility::NotNearby { distance_m: 400.0 }
        );
    }

    #[test]
    fn test_stale_within_is_unconfirmed() {
        assert_eq!(
            JoinEligibility::from_state(&state(true, Staleness::Stale)),
            JoinEligibility::Unconfirmed(UnconfirmedReason::StaleReading)
        );
    }

    #[test]
    fn test_initial_state_has_no_fix() {
        assert_eq!(
            JoinEligibility::from_state(&ProximityState::initial()),
            JoinEligibility::Unconfirmed(UnconfirmedReason::NoFix)
        );
    }
}
