// SPDX-License-Identifier: Apache-2.0

//! Merges the off-chain record with live contract reads into one status.

use chama_model::{Chama, ChamaStatus};
use serde::{Deserialize, Serialize};

/// Contract view-function results relevant to status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OnChainSnapshot {
    pub member_count: u32,
    pub member_target: u32,
    /// 0 until the first round opens.
    pub current_round: u32,
    pub total_rounds: u32,
    pub completed: bool,
}

impl OnChainSnapshot {
    #[must_use]
    pub const fn derived_status(&self) -> ChamaStatus {
        if self.completed {
            ChamaStatus::Completed
        } else if self.current_round >= 1 {
            ChamaStatus::Active
        } else {
            ChamaStatus::Registered
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainObservation {
    NotQueried,
    Fetched(OnChainSnapshot),
    Failed { reason: String },
    /// The recorded address holds no chama contract.
    Missing { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayStatus {
    Known { status: ChamaStatus },
    /// Chain read failed; keep showing the last known status and offer a retry.
    Stale { last_known: ChamaStatus },
    /// Off-chain and on-chain records contradict each other.
    NeedsResync { reason: String },
}

impl DisplayStatus {
    #[must_use]
    pub const fn status(&self) -> Option<ChamaStatus> {
        match self {
            Self::Known { status } => Some(*status),
            Self::Stale { last_known } => Some(*last_known),
            Self::NeedsResync { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledStatus {
    pub display: DisplayStatus,
    pub on_chain: bool,
    pub deployable: bool,
    /// Chain-derived status is ahead of the stored record.
    pub offchain_behind: bool,
}

#[must_use]
pub fn reconcile_status(chama: &Chama, chain: &ChainObservation) -> ReconciledStatus {
    let status = chama.status;
    let Some(address) = chama.onchain_address.as_ref() else {
        if status.is_on_chain() {
            return needs_resync(
                false,
                format!("status {status} recorded without an on-chain address"),
            );
        }
        return ReconciledStatus {
            display: DisplayStatus::Known { status },
            on_chain: false,
            deployable: status.is_deployable(),
            offchain_behind: false,
        };
    };

    if !status.is_on_chain() {
        return needs_resync(
            true,
            format!("on-chain address {address} present but off-chain status is {status}"),
        );
    }

    match chain {
        ChainObservation::NotQueried => ReconciledStatus {
            display: DisplayStatus::Known { status },
            on_chain: true,
            deployable: false,
            offchain_behind: false,
        },
        ChainObservation::Failed { .. } => ReconciledStatus {
            display: DisplayStatus::Stale { last_known: status },
            on_chain: true,
            deployable: false,
            offchain_behind: false,
        },
        ChainObservation::Missing { reason } => needs_resync(true, reason.clone()),
        ChainObservation::Fetched(snapshot) => {
            let derived = snapshot.derived_status();
            if derived < status {
                return needs_resync(
                    true,
                    format!("off-chain status {status} is ahead of chain-derived {derived}"),
                );
            }
            ReconciledStatus {
                display: DisplayStatus::Known { status: derived },
                on_chain: true,
                deployable: false,
                offchain_behind: derived > status,
            }
        }
    }
}

fn needs_resync(on_chain: bool, reason: String) -> ReconciledStatus {
    ReconciledStatus {
        display: DisplayStatus::NeedsResync { reason },
        on_chain,
        deployable: false,
        offchain_behind: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chama_model::{ChamaId, EvmAddress};

    fn chama(status: ChamaStatus, with_address: bool) -> Chama {
        Chama {
            id: ChamaId::new("c1").expect("id"),
            name: "C1".to_string(),
            contribution_amount: 10,
            deposit_amount: 0,
            cycle_duration_secs: 60,
            grace_period_secs: 60,
            max_members: 3,
            status,
            onchain_address: with_address.then(|| {
                EvmAddress::new("0x00000000000000000000000000000000000000aa").expect("addr")
            }),
            creator: EvmAddress::new("0x0000000000000000000000000000000000000001").expect("addr"),
            created_at: 0,
        }
    }

    fn snapshot(current_round: u32, completed: bool) -> OnChainSnapshot {
        OnChainSnapshot {
            member_count: 3,
            member_target: 3,
            current_round,
            total_rounds: 3,
            completed,
        }
    }

    #[test]
    fn deployable_only_for_pre_chain_recruiting_or_waiting() {
        for status in ChamaStatus::ALL {
            if status.is_on_chain() {
                continue;
            }
            let out = reconcile_status(&chama(status, false), &ChainObservation::NotQueried);
            assert_eq!(
                out.deployable,
                matches!(status, ChamaStatus::Recruiting | ChamaStatus::Waiting),
                "{status}"
            );
            assert_eq!(out.display, DisplayStatus::Known { status });
        }
    }

    #[test]
    fn rpc_failure_reports_stale_instead_of_demoting() {
        let out = reconcile_status(
            &chama(ChamaStatus::Active, true),
            &ChainObservation::Failed {
                reason: "timeout".to_string(),
            },
        );
        assert_eq!(
            out.display,
            DisplayStatus::Stale {
                last_known: ChamaStatus::Active
            }
        );
        assert!(out.on_chain);
        assert!(!out.deployable);
    }

    #[test]
    fn chain_is_authoritative_once_fetched() {
        let out = reconcile_status(
            &chama(ChamaStatus::Registered, true),
            &ChainObservation::Fetched(snapshot(2, false)),
        );
        assert_eq!(
            out.display,
            DisplayStatus::Known {
                status: ChamaStatus::Active
            }
        );
        assert!(out.offchain_behind);

        let done = reconcile_status(
            &chama(ChamaStatus::Active, true),
            &ChainObservation::Fetched(snapshot(3, true)),
        );
        assert_eq!(done.display.status(), Some(ChamaStatus::Completed));

        let same = reconcile_status(
            &chama(ChamaStatus::Registered, true),
            &ChainObservation::Fetched(snapshot(0, false)),
        );
        assert!(!same.offchain_behind);
    }

    #[test]
    fn inconsistent_records_need_resync() {
        let stale_offchain = reconcile_status(
            &chama(ChamaStatus::Waiting, true),
            &ChainObservation::Fetched(snapshot(1, false)),
        );
        assert!(matches!(
            stale_offchain.display,
            DisplayStatus::NeedsResync { .. }
        ));
        assert!(!stale_offchain.deployable);

        let missing_address =
            reconcile_status(&chama(ChamaStatus::Active, false), &ChainObservation::NotQueried);
        assert!(matches!(
            missing_address.display,
            DisplayStatus::NeedsResync { .. }
        ));

        let missing_contract = reconcile_status(
            &chama(ChamaStatus::Registered, true),
            &ChainObservation::Missing {
                reason: "no code at address".to_string(),
            },
        );
        assert_eq!(missing_contract.display.status(), None);
    }

    #[test]
    fn chain_behind_the_record_is_never_adopted() {
        let completed = reconcile_status(
            &chama(ChamaStatus::Completed, true),
            &ChainObservation::Fetched(snapshot(1, false)),
        );
        assert!(matches!(
            completed.display,
            DisplayStatus::NeedsResync { .. }
        ));
        assert!(!completed.offchain_behind);
        assert!(completed.on_chain);

        let active = reconcile_status(
            &chama(ChamaStatus::Active, true),
            &ChainObservation::Fetched(snapshot(0, false)),
        );
        assert_eq!(active.display.status(), None);
        assert!(!active.offchain_behind);
    }
}
