//! Audit report
//!
//! Outcomes of one audit run, printable as a boxed summary or serialisable
//! to JSON for tooling.

use super::Scenario;
use crate::types::{BlockHash, BlockNumber};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// How a single scenario ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioStatus {
    Passed,
    Failed { reasons: Vec<String> },
    /// Exceeded the per-scenario timeout. Counts as a failure.
    TimedOut { after_ms: u64 },
    Skipped { reason: String },
}

impl ScenarioStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::TimedOut { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Passed => "PASS",
            Self::Failed { .. } => "FAIL",
            Self::TimedOut { .. } => "TIMEOUT",
            Self::Skipped { .. } => "SKIP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    #[serde(flatten)]
    pub status: ScenarioStatus,
    pub elapsed_ms: u64,
}

/// Audit report
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    /// Audited block
    pub block_number: BlockNumber,
    pub block_hash: BlockHash,

    /// Live requests in the snapshot
    pub request_count: usize,

    /// Results in the snapshot
    pub result_count: usize,

    pub started_at: DateTime<Utc>,

    /// One entry per scenario, in the order they were selected
    pub outcomes: Vec<ScenarioOutcome>,
}

impl AuditReport {
    /// True when no scenario failed or timed out
    pub fn success(&self) -> bool {
        !self.outcomes.iter().any(|o| o.status.is_failure())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_failure())
    }

    pub fn outcome(&self, scenario: Scenario) -> Option<&ScenarioOutcome> {
        self.outcomes.iter().find(|o| o.scenario == scenario)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Full `0x`-prefixed block hash
    pub fn block_hash_hex(&self) -> String {
        format!("{:?}", self.block_hash)
    }

    /// Print report to stdout
    pub fn print(&self) {
        let started = self.started_at.to_rfc3339();
        let passed = self
            .outcomes
            .iter()
            .filter(|o| o.status == ScenarioStatus::Passed)
            .count();
        let scenarios = format!(
            "{} run, {} passed, {} failed",
            self.outcomes.len(),
            passed,
            self.failures().count()
        );

        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║  Randomness Audit Report                                   ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Block: #{:<49} ║", self.block_number);
        println!("║  Started: {:<48} ║", started);
        println!("║  Requests: {:<47} ║", self.request_count);
        println!("║  Results: {:<48} ║", self.result_count);
        println!("║  Scenarios: {:<46} ║", scenarios);
        println!(
            "║  Status: {:<49} ║",
            if self.success() {
                "SUCCESS ✓"
            } else {
                "FAILED ✗"
            }
        );
        println!("╚════════════════════════════════════════════════════════════╝");
        println!("Block hash: {}\n", self.block_hash_hex());

        println!("Scenarios:");
        println!("══════════");
        for outcome in &self.outcomes {
            println!(
                "  [{:<7}] {} ({} ms)",
                outcome.status.label(),
                outcome.scenario,
                outcome.elapsed_ms
            );
            match &outcome.status {
                ScenarioStatus::Failed { reasons } => {
                    for reason in reasons {
                        println!("      - {}", reason);
                    }
                }
                ScenarioStatus::TimedOut { after_ms } => {
                    println!("      - no result after {} ms", after_ms);
                }
                ScenarioStatus::Skipped { reason } => {
                    println!("      - {}", reason);
                }
                ScenarioStatus::Passed => {}
            }
        }
    }
}
