// File: randomness-audit/src/reconcile.rs
//
// Request/result reconciliation
//
// Cross-checks the independently stored request map, result map, lifetime
// counter and escrow balance of a single snapshot. Every check is pure,
// reports all violations it finds, and never depends on another check.

use crate::error::ConsistencyViolation;
use crate::types::{Snapshot, TriggerCondition, VrfState};
use indexmap::IndexMap;

/// `Ok` when the invariant holds, otherwise every violation found
pub type CheckResult = Result<(), Vec<ConsistencyViolation>>;

fn into_result(violations: Vec<ConsistencyViolation>) -> CheckResult {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Number of live requests per trigger, in first-seen order
pub fn count_requests_by_trigger(snapshot: &Snapshot) -> IndexMap<TriggerCondition, u64> {
    let mut counts = IndexMap::new();
    for request in &snapshot.requests {
        *counts.entry(request.trigger).or_insert(0u64) += 1;
    }
    counts
}

/// Live requests can never outnumber the lifetime counter: fulfilled
/// requests are removed while the counter keeps growing.
pub fn check_live_request_count(snapshot: &Snapshot) -> CheckResult {
    let live = snapshot.requests.len() as u64;
    if live > snapshot.declared_request_count {
        return Err(vec![ConsistencyViolation::LiveRequestsExceedCounter {
            live,
            declared: snapshot.declared_request_count,
        }]);
    }
    Ok(())
}

/// Ids are assigned from the same counter, so none may exceed it.
pub fn check_max_request_id(snapshot: &Snapshot) -> CheckResult {
    let declared = snapshot.declared_request_count;
    match snapshot.requests.iter().map(|r| r.id).max() {
        Some(id) if id > declared => Err(vec![ConsistencyViolation::RequestIdAboveCounter {
            id,
            declared,
        }]),
        _ => Ok(()),
    }
}

pub fn check_orphan_results(snapshot: &Snapshot) -> CheckResult {
    let counts = count_requests_by_trigger(snapshot);
    into_result(
        snapshot
            .results
            .iter()
            .filter(|result| !counts.contains_key(&result.trigger))
            .map(|result| ConsistencyViolation::OrphanResult {
                trigger: result.trigger,
            })
            .collect(),
    )
}

/// Each result's declared request count must match the live requests waiting on it.
pub fn check_result_request_counts(snapshot: &Snapshot) -> CheckResult {
    let counts = count_requests_by_trigger(snapshot);
    into_result(
        snapshot
            .results
            .iter()
            .filter_map(|result| {
                let counted = counts.get(&result.trigger).copied().unwrap_or(0);
                (counted != result.request_count).then_some(
                    ConsistencyViolation::RequestCountMismatch {
                        trigger: result.trigger,
                        counted,
                        declared: result.request_count,
                    },
                )
            })
            .collect(),
    )
}

/// Sum of deposits and fees over all live requests.
///
/// On overflow the error holds the number of requests summed before it.
pub fn total_reserved(snapshot: &Snapshot) -> Result<u128, usize> {
    snapshot
        .requests
        .iter()
        .enumerate()
        .try_fold(0u128, |total, (idx, request)| {
            request
                .reserved()
                .and_then(|reserved| total.checked_add(reserved))
                .ok_or(idx)
        })
}

/// The escrow account must hold at least what outstanding requests reserve.
pub fn check_deposit_solvency(snapshot: &Snapshot) -> CheckResult {
    let balance = snapshot.pallet_account_balance;
    match total_reserved(snapshot) {
        Ok(reserved) if reserved > balance => {
            Err(vec![ConsistencyViolation::InsufficientEscrow { reserved, balance }])
        }
        Ok(_) => Ok(()),
        Err(processed) => Err(vec![ConsistencyViolation::ReservedOverflow { processed }]),
    }
}

/// Whether the VRF freshness check applies to this snapshot at all
pub fn vrf_freshness_applies(snapshot: &Snapshot) -> bool {
    snapshot.not_first_block
}

/// The local VRF output is regenerated on every block after the first, and
/// `InherentIncluded` is cleared in `on_finalize`.
///
/// `previous` is the VRF state at `block_number - 1`; it is only consulted
/// when the snapshot says it is past the first block.
pub fn check_vrf_freshness(current: &Snapshot, previous: Option<&VrfState>) -> CheckResult {
    if !vrf_freshness_applies(current) {
        return Ok(());
    }

    let block = current.block_number;
    let mut violations = Vec::new();

    if block == 0 {
        violations.push(ConsistencyViolation::NotFirstBlockAtGenesis { block });
    }

    let previous_block = block.saturating_sub(1);
    let previous_output = previous.and_then(|state| state.local_vrf_output);
    // Genesis has no previous block, NotFirstBlockAtGenesis already covers it
    if previous_output.is_none() && block > 0 {
        violations.push(ConsistencyViolation::MissingVrfOutput {
            block: previous_block,
        });
    }
    if current.local_vrf_output.is_none() {
        violations.push(ConsistencyViolation::MissingVrfOutput { block });
    }
    if let (Some(prev), Some(cur)) = (previous_output, current.local_vrf_output) {
        if prev == cur {
            violations.push(ConsistencyViolation::StaleVrfOutput {
                block,
                previous: previous_block,
                output: cur,
            });
        }
    }

    if current.inherent_included {
        violations.push(ConsistencyViolation::InherentNotCleared { block });
    }

    into_result(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RequestRecord, ResultRecord};
    use primitive_types::H256;

    fn request(id: u64, trigger: TriggerCondition) -> RequestRecord {
        RequestRecord {
            id,
            deposit: 0,
            fee: 0,
            trigger,
        }
    }

    fn result(trigger: TriggerCondition, request_count: u64) -> ResultRecord {
        ResultRecord {
            trigger,
            request_count,
            randomness: None,
        }
    }

    fn snapshot(requests: Vec<RequestRecord>, results: Vec<ResultRecord>) -> Snapshot {
        Snapshot {
            block_number: 100,
            block_hash: H256::repeat_byte(1),
            declared_request_count: requests.iter().map(|r| r.id).max().unwrap_or(0),
            requests,
            results,
            pallet_account_balance: 0,
            local_vrf_output: Some(H256::repeat_byte(0xaa)),
            not_first_block: true,
            inherent_included: false,
        }
    }

    fn consistent_snapshot() -> Snapshot {
        snapshot(
            vec![
                request(1, TriggerCondition::BabeEpoch(5)),
                request(2, TriggerCondition::BabeEpoch(5)),
                request(3, TriggerCondition::LocalBlock(120)),
            ],
            vec![
                result(TriggerCondition::BabeEpoch(5), 2),
                result(TriggerCondition::LocalBlock(120), 1),
            ],
        )
    }

    #[test]
    fn test_consistent_snapshot_passes_all_checks() {
        let snap = consistent_snapshot();
        assert_eq!(check_live_request_count(&snap), Ok(()));
        assert_eq!(check_max_request_id(&snap), Ok(()));
        assert_eq!(check_orphan_results(&snap), Ok(()));
        assert_eq!(check_result_request_counts(&snap), Ok(()));
        assert_eq!(check_deposit_solvency(&snap), Ok(()));
    }

    #[test]
    fn test_live_count_above_counter() {
        let mut snap = consistent_snapshot();
        snap.declared_request_count = 2;
        assert_eq!(
            check_live_request_count(&snap),
            Err(vec![ConsistencyViolation::LiveRequestsExceedCounter {
                live: 3,
                declared: 2
            }])
        );
    }

    #[test]
    fn test_request_id_above_counter() {
        let mut snap = consistent_snapshot();
        snap.requests.push(request(900, TriggerCondition::LocalBlock(120)));
        snap.declared_request_count = 10;
        assert_eq!(
            check_max_request_id(&snap),
            Err(vec![ConsistencyViolation::RequestIdAboveCounter {
                id: 900,
                declared: 10
            }])
        );
    }

    #[test]
    fn test_empty_snapshot_passes() {
        let snap = snapshot(vec![], vec![]);
        assert_eq!(check_max_request_id(&snap), Ok(()));
        assert_eq!(check_live_request_count(&snap), Ok(()));
        assert_eq!(check_deposit_solvency(&snap), Ok(()));
    }

    #[test]
    fn test_orphan_result_is_named() {
        let mut snap = consistent_snapshot();
        snap.results.push(result(TriggerCondition::BabeEpoch(6), 1));
        assert_eq!(
            check_orphan_results(&snap),
            Err(vec![ConsistencyViolation::OrphanResult {
                trigger: TriggerCondition::BabeEpoch(6)
            }])
        );
    }

    #[test]
    fn test_epoch_and_block_with_same_value_do_not_collide() {
        let snap = snapshot(
            vec![request(1, TriggerCondition::BabeEpoch(7))],
            vec![
                result(TriggerCondition::BabeEpoch(7), 1),
                result(TriggerCondition::LocalBlock(7), 1),
            ],
        );
        assert_eq!(
            check_orphan_results(&snap),
            Err(vec![ConsistencyViolation::OrphanResult {
                trigger: TriggerCondition::LocalBlock(7)
            }])
        );
        assert_eq!(
            check_result_request_counts(&snap),
            Err(vec![ConsistencyViolation::RequestCountMismatch {
                trigger: TriggerCondition::LocalBlock(7),
                counted: 0,
                declared: 1
            }])
        );
    }

    #[test]
    fn test_request_count_mismatches_are_all_reported() {
        let mut snap = consistent_snapshot();
        snap.results[0].request_count = 3;
        snap.results[1].request_count = 0;
        let violations = check_result_request_counts(&snap).unwrap_err();
        assert_eq!(
            violations,
            vec![
                ConsistencyViolation::RequestCountMismatch {
                    trigger: TriggerCondition::BabeEpoch(5),
                    counted: 2,
                    declared: 3
                },
                ConsistencyViolation::RequestCountMismatch {
                    trigger: TriggerCondition::LocalBlock(120),
                    counted: 1,
                    declared: 0
                },
            ]
        );
    }

    #[test]
    fn test_deposit_solvency_boundary() {
        let mut snap = consistent_snapshot();
        for (i, r) in snap.requests.iter_mut().enumerate() {
            r.deposit = 1_000_000_000_000_000_000 * (i as u128 + 1);
            r.fee = 5;
        }
        let reserved = total_reserved(&snap).unwrap();
        assert_eq!(reserved, 6_000_000_000_000_000_015);

        snap.pallet_account_balance = reserved;
        assert_eq!(check_deposit_solvency(&snap), Ok(()));

        snap.pallet_account_balance = reserved - 1;
        assert_eq!(
            check_deposit_solvency(&snap),
            Err(vec![ConsistencyViolation::InsufficientEscrow {
                reserved,
                balance: reserved - 1
            }])
        );
    }

    #[test]
    fn test_deposit_overflow_is_a_violation() {
        let mut snap = consistent_snapshot();
        snap.requests[0].deposit = u128::MAX;
        snap.requests[1].deposit = 1;
        assert_eq!(
            check_deposit_solvency(&snap),
            Err(vec![ConsistencyViolation::ReservedOverflow { processed: 1 }])
        );
    }

    fn previous_state(output: Option<H256>) -> VrfState {
        VrfState {
            block_number: 99,
            local_vrf_output: output,
            not_first_block: true,
            inherent_included: false,
        }
    }

    #[test]
    fn test_vrf_freshness_passes_on_new_output() {
        let snap = consistent_snapshot();
        let prev = previous_state(Some(H256::repeat_byte(0xbb)));
        assert_eq!(check_vrf_freshness(&snap, Some(&prev)), Ok(()));
    }

    #[test]
    fn test_vrf_freshness_rejects_unchanged_output() {
        let snap = consistent_snapshot();
        let prev = previous_state(snap.local_vrf_output);
        assert_eq!(
            check_vrf_freshness(&snap, Some(&prev)),
            Err(vec![ConsistencyViolation::StaleVrfOutput {
                block: 100,
                previous: 99,
                output: H256::repeat_byte(0xaa)
            }])
        );
    }

    #[test]
    fn test_vrf_freshness_rejects_missing_previous() {
        let mut snap = consistent_snapshot();
        let prev = previous_state(None);
        assert_eq!(
            check_vrf_freshness(&snap, Some(&prev)),
            Err(vec![ConsistencyViolation::MissingVrfOutput { block: 99 }])
        );

        snap.local_vrf_output = None;
        assert_eq!(
            check_vrf_freshness(&snap, None),
            Err(vec![
                ConsistencyViolation::MissingVrfOutput { block: 99 },
                ConsistencyViolation::MissingVrfOutput { block: 100 },
            ])
        );
    }

    #[test]
    fn test_vrf_freshness_rejects_uncleared_inherent() {
        let mut snap = consistent_snapshot();
        snap.inherent_included = true;
        let prev = previous_state(Some(H256::repeat_byte(0xbb)));
        assert_eq!(
            check_vrf_freshness(&snap, Some(&prev)),
            Err(vec![ConsistencyViolation::InherentNotCleared { block: 100 }])
        );
    }

    #[test]
    fn test_vrf_freshness_at_genesis_reports_only_genesis() {
        let mut snap = consistent_snapshot();
        snap.block_number = 0;
        assert_eq!(
            check_vrf_freshness(&snap, None),
            Err(vec![ConsistencyViolation::NotFirstBlockAtGenesis { block: 0 }])
        );
    }

    #[test]
    fn test_vrf_freshness_skipped_on_first_block() {
        let mut snap = consistent_snapshot();
        snap.not_first_block = false;
        snap.local_vrf_output = None;
        assert!(!vrf_freshness_applies(&snap));
        assert_eq!(check_vrf_freshness(&snap, None), Ok(()));
    }
}
