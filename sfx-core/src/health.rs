//! Health states and worst-state aggregation
//!
//! Every entity the explorer shows carries a health state. Container nodes
//! color their icon by the most severe state among their members, whether
//! those members were fetched (authoritative) or only known through the
//! cluster health snapshot (approximate).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Health state reported by the cluster for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthState {
    /// Not yet evaluated, or reported as `Invalid`.
    #[serde(alias = "Invalid")]
    Unknown,
    Ok,
    Warning,
    Error,
}

impl HealthState {
    /// Fixed severity priority: Error(3) > Warning(2) > Ok(1) > Unknown(0).
    pub fn severity(self) -> u8 {
        match self {
            HealthState::Unknown => 0,
            HealthState::Ok => 1,
            HealthState::Warning => 2,
            HealthState::Error => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Unknown => "Unknown",
            HealthState::Ok => "Ok",
            HealthState::Warning => "Warning",
            HealthState::Error => "Error",
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Most severe state among `states`, skipping absent entries.
///
/// Returns `None` when every entry is absent (including the empty input).
pub fn worst<I>(states: I) -> Option<HealthState>
where
    I: IntoIterator<Item = Option<HealthState>>,
{
    states
        .into_iter()
        .flatten()
        .max_by_key(|state| state.severity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_worst_picks_error() {
        let states = [
            Some(HealthState::Ok),
            Some(HealthState::Warning),
            Some(HealthState::Error),
        ];
        assert_eq!(worst(states), Some(HealthState::Error));
    }

    #[test]
    fn test_worst_skips_absent() {
        assert_eq!(
            worst([None, Some(HealthState::Ok), None]),
            Some(HealthState::Ok)
        );
    }

    #[test]
    fn test_worst_of_nothing_is_absent() {
        assert_eq!(worst(Vec::<Option<HealthState>>::new()), None);
        assert_eq!(worst([None, None]), None);
    }

    #[test]
    fn test_unknown_still_counts() {
        assert_eq!(worst([None, Some(HealthState::Unknown)]), Some(HealthState::Unknown));
    }

    #[test]
    fn test_invalid_reads_as_unknown() {
        let state: HealthState = serde_json::from_str("\"Invalid\"").unwrap();
        assert_eq!(state, HealthState::Unknown);
        let state: HealthState = serde_json::from_str("\"Warning\"").unwrap();
        assert_eq!(state, HealthState::Warning);
    }

    fn arb_state() -> impl Strategy<Value = Option<HealthState>> {
        prop_oneof![
            Just(None),
            Just(Some(HealthState::Unknown)),
            Just(Some(HealthState::Ok)),
            Just(Some(HealthState::Warning)),
            Just(Some(HealthState::Error)),
        ]
    }

    proptest! {
        #[test]
        fn worst_is_an_upper_bound(states in prop::collection::vec(arb_state(), 0..16)) {
            let result = worst(states.clone());
            for state in states.iter().flatten() {
                prop_assert!(result.map(|r| r.severity()).unwrap_or(0) >= state.severity());
            }
            prop_assert_eq!(result.is_none(), states.iter().all(Option::is_none));
        }

        #[test]
        fn worst_ignores_order(mut states in prop::collection::vec(arb_state(), 0..16)) {
            let forward = worst(states.clone());
            states.reverse();
            prop_assert_eq!(forward, worst(states));
        }
    }
}
