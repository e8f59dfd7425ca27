//! Audit scenarios
//!
//! Each scenario is one independent check over a pinned `Snapshot`. The
//! `Auditor` runs all of them concurrently, each under its own timeout, and
//! collects the outcomes into an `AuditReport`.
//!
//! ## Scenarios
//!
//! | name | checks |
//! |---|---|
//! | `live-request-count` | live requests never exceed `RequestCount` |
//! | `max-request-id` | no request id above `RequestCount` |
//! | `orphan-results` | every result has a request waiting on it |
//! | `result-request-counts` | each result's `request_count` matches its requests |
//! | `deposit-solvency` | escrow balance covers all deposits and fees |
//! | `vrf-freshness` | local VRF output changes every block |
//! | `result-randomness` | fulfilled randomness looks uniformly random |
//! | `local-vrf-randomness` | current local VRF output looks uniformly random |

pub mod executor;
pub mod report;

pub use executor::Auditor;
pub use report::{AuditReport, ScenarioOutcome, ScenarioStatus};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    EnumString,
    Display,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    LiveRequestCount,
    MaxRequestId,
    OrphanResults,
    ResultRequestCounts,
    DepositSolvency,
    VrfFreshness,
    ResultRandomness,
    LocalVrfRandomness,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_scenario_names() {
        let names: Vec<String> = Scenario::iter().map(|s| s.to_string()).collect();
        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "live-request-count");
        assert_eq!(names[7], "local-vrf-randomness");

        for scenario in Scenario::iter() {
            assert_eq!(Scenario::from_str(scenario.as_ref()).unwrap(), scenario);
        }
        assert!(Scenario::from_str("no-such-check").is_err());
    }

    #[test]
    fn test_serde_name_matches_display() {
        let json = serde_json::to_string(&Scenario::DepositSolvency).unwrap();
        assert_eq!(json, "\"deposit-solvency\"");
    }
}
