//! Audit execution engine
//!
//! Builds one `Snapshot` at the target block, then runs every selected
//! scenario over it concurrently.
//!
//! # Example
//!
//! ```rust,ignore
//! use randomness_audit::{AuditConfig, Auditor, RpcProvider};
//!
//! let provider = RpcProvider::new("http://127.0.0.1:9944")?;
//! let report = Auditor::new(provider, AuditConfig::default()).run().await?;
//!
//! report.print();
//! assert!(report.success());
//! ```

use super::report::{AuditReport, ScenarioOutcome, ScenarioStatus};
use super::Scenario;
use crate::config::AuditConfig;
use crate::error::FetchError;
use crate::fetcher::SnapshotFetcher;
use crate::provider::ChainDataProvider;
use crate::reconcile::{self, CheckResult};
use crate::stats;
use crate::types::Snapshot;
use chrono::Utc;
use futures::future::join_all;
use indexmap::IndexSet;
use log::{debug, error, info, warn};
use strum::IntoEnumIterator;
use tokio::time::{timeout, Instant};

/// Runs audit scenarios against a chain data provider
pub struct Auditor<P> {
    provider: P,
    config: AuditConfig,
    scenarios: Vec<Scenario>,
}

impl<P: ChainDataProvider> Auditor<P> {
    /// Auditor running every scenario
    pub fn new(provider: P, config: AuditConfig) -> Self {
        Self {
            provider,
            config,
            scenarios: Scenario::iter().collect(),
        }
    }

    /// Restrict the run to `scenarios`, in first-seen order without repeats
    pub fn with_scenarios(mut self, scenarios: impl IntoIterator<Item = Scenario>) -> Self {
        let unique: IndexSet<Scenario> = scenarios.into_iter().collect();
        self.scenarios = unique.into_iter().collect();
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Execute the audit
    ///
    /// Scenario failures and timeouts end up in the report. Only failing to
    /// build the snapshot aborts the run.
    pub async fn run(&self) -> Result<AuditReport, FetchError> {
        self.config.validate()?;
        let started_at = Utc::now();

        let block_number = match self.config.block_number {
            Some(number) => number,
            None => self.provider.get_header().await?.number,
        };
        info!("Auditing randomness pallet at block #{}", block_number);

        let fetcher = SnapshotFetcher::new(&self.provider)
            .with_page_size(self.config.page_size)
            .with_max_pages(self.config.max_pages);

        let snapshot = timeout(self.config.fetch_timeout, fetcher.fetch(block_number))
            .await
            .map_err(|_| FetchError::Timeout {
                secs: self.config.fetch_timeout.as_secs(),
                during: "fetching snapshot",
            })
            .and_then(|result| result)
            .map_err(|e| {
                error!("Failed to fetch snapshot at #{}: {}", block_number, e);
                e
            })?;

        let outcomes = join_all(
            self.scenarios
                .iter()
                .map(|scenario| self.run_scenario(*scenario, &snapshot, &fetcher)),
        )
        .await;

        let report = AuditReport {
            block_number: snapshot.block_number,
            block_hash: snapshot.block_hash,
            request_count: snapshot.requests.len(),
            result_count: snapshot.results.len(),
            started_at,
            outcomes,
        };
        info!(
            "Audit of block #{} finished: {} of {} scenarios failed",
            report.block_number,
            report.failures().count(),
            report.outcomes.len()
        );
        Ok(report)
    }

    async fn run_scenario(
        &self,
        scenario: Scenario,
        snapshot: &Snapshot,
        fetcher: &SnapshotFetcher<'_, P>,
    ) -> ScenarioOutcome {
        let start = Instant::now();
        let status = match timeout(
            self.config.scenario_timeout,
            self.evaluate(scenario, snapshot, fetcher),
        )
        .await
        {
            Ok(status) => status,
            Err(_) => ScenarioStatus::TimedOut {
                after_ms: self.config.scenario_timeout.as_millis() as u64,
            },
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &status {
            ScenarioStatus::Passed => info!("{} passed", scenario),
            ScenarioStatus::Skipped { reason } => info!("{} skipped: {}", scenario, reason),
            ScenarioStatus::Failed { reasons } => {
                warn!("{} failed:", scenario);
                for reason in reasons {
                    warn!("  {}", reason);
                }
            }
            ScenarioStatus::TimedOut { after_ms } => {
                warn!("{} timed out after {} ms", scenario, after_ms)
            }
        }

        ScenarioOutcome {
            scenario,
            status,
            elapsed_ms,
        }
    }

    async fn evaluate(
        &self,
        scenario: Scenario,
        snapshot: &Snapshot,
        fetcher: &SnapshotFetcher<'_, P>,
    ) -> ScenarioStatus {
        match scenario {
            Scenario::LiveRequestCount => from_check(reconcile::check_live_request_count(snapshot)),
            Scenario::MaxRequestId => from_check(reconcile::check_max_request_id(snapshot)),
            Scenario::OrphanResults => from_check(reconcile::check_orphan_results(snapshot)),
            Scenario::ResultRequestCounts => {
                from_check(reconcile::check_result_request_counts(snapshot))
            }
            Scenario::DepositSolvency => from_check(reconcile::check_deposit_solvency(snapshot)),
            Scenario::VrfFreshness => vrf_freshness(snapshot, fetcher).await,
            Scenario::ResultRandomness => result_randomness(snapshot),
            Scenario::LocalVrfRandomness => local_vrf_randomness(snapshot),
        }
    }
}

fn from_check(result: CheckResult) -> ScenarioStatus {
    match result {
        Ok(()) => ScenarioStatus::Passed,
        Err(violations) => ScenarioStatus::Failed {
            reasons: violations.iter().map(ToString::to_string).collect(),
        },
    }
}

async fn vrf_freshness<P: ChainDataProvider>(
    snapshot: &Snapshot,
    fetcher: &SnapshotFetcher<'_, P>,
) -> ScenarioStatus {
    if !reconcile::vrf_freshness_applies(snapshot) {
        return ScenarioStatus::Skipped {
            reason: "NotFirstBlock is not set".to_string(),
        };
    }

    let previous = match snapshot.block_number.checked_sub(1) {
        Some(previous_block) => match fetcher.fetch_vrf_state(previous_block).await {
            Ok(state) => Some(state),
            Err(e) => {
                return ScenarioStatus::Failed {
                    reasons: vec![format!(
                        "Could not read VRF state at block #{}: {}",
                        previous_block, e
                    )],
                }
            }
        },
        None => None,
    };

    from_check(reconcile::check_vrf_freshness(snapshot, previous.as_ref()))
}

fn result_randomness(snapshot: &Snapshot) -> ScenarioStatus {
    let mut checked = 0usize;
    let mut reasons = Vec::new();
    for (trigger, randomness) in snapshot.available_randomness() {
        checked += 1;
        if let Err(failures) = stats::is_plausibly_random(randomness.as_fixed_bytes()) {
            debug!("Randomness for {}: {:?}", trigger, randomness);
            reasons.extend(
                failures
                    .into_iter()
                    .map(|failure| format!("{}: {}", trigger, failure)),
            );
        }
    }

    if checked == 0 {
        return ScenarioStatus::Skipped {
            reason: "no fulfilled randomness results".to_string(),
        };
    }
    if reasons.is_empty() {
        ScenarioStatus::Passed
    } else {
        ScenarioStatus::Failed { reasons }
    }
}

fn local_vrf_randomness(snapshot: &Snapshot) -> ScenarioStatus {
    let output = match (snapshot.not_first_block, snapshot.local_vrf_output) {
        (true, Some(output)) => output,
        (false, _) => {
            return ScenarioStatus::Skipped {
                reason: "NotFirstBlock is not set".to_string(),
            }
        }
        (true, None) => {
            return ScenarioStatus::Skipped {
                reason: "no local VRF output".to_string(),
            }
        }
    };

    match stats::is_plausibly_random(output.as_fixed_bytes()) {
        Ok(()) => ScenarioStatus::Passed,
        Err(failures) => {
            debug!("Local VRF output: {:?}", output);
            ScenarioStatus::Failed {
                reasons: failures.iter().map(ToString::to_string).collect(),
            }
        }
    }
}
