// SPDX-License-Identifier: Apache-2.0

use chama_core::{
    classify_contribution, reconcile_status, resolve_access, AccessLevel, AccessSnapshot,
    ChainObservation, ContributionStatus, DisplayStatus, ReliabilityPolicy, RoundLedger,
    RoundWindow,
};
use chama_model::{
    Chama, ChamaId, ChamaStatus, ContributionRecord, EvmAddress, Member, MembershipStatus,
    PayoutRecord, Round,
};

fn addr(byte: u8) -> EvmAddress {
    EvmAddress::new(format!("0x{}", format!("{byte:02x}").repeat(20))).expect("address")
}

fn chama(status: ChamaStatus) -> Chama {
    Chama {
        id: ChamaId::new("harvest-circle").expect("id"),
        name: "Harvest Circle".to_string(),
        contribution_amount: 100,
        deposit_amount: 0,
        cycle_duration_secs: 1_000,
        grace_period_secs: 500,
        max_members: 3,
        status,
        onchain_address: status.is_on_chain().then(|| addr(0xaa)),
        creator: addr(1),
        created_at: 0,
    }
}

#[test]
fn third_member_closes_the_join_window() {
    let record = chama(ChamaStatus::Recruiting);
    let outsider = addr(9);

    let two = AccessSnapshot::from_chama(&record, vec![addr(1), addr(2)]);
    assert_eq!(resolve_access(Some(&outsider), &two), AccessLevel::CanJoin);

    let three = AccessSnapshot::from_chama(&record, vec![addr(1), addr(2), addr(3)]);
    assert_eq!(resolve_access(Some(&outsider), &three), AccessLevel::Viewer);
    assert_eq!(resolve_access(Some(&addr(3)), &three), AccessLevel::Member);
}

#[test]
fn creator_is_reported_even_when_not_in_member_list() {
    let record = chama(ChamaStatus::Recruiting);
    let snapshot = AccessSnapshot::from_chama(&record, vec![]);
    assert_eq!(resolve_access(Some(&addr(1)), &snapshot), AccessLevel::Creator);
    assert!(AccessLevel::Creator.can_manage());
    assert!(!AccessLevel::Viewer.can_contribute());
}

#[test]
fn contribution_at_deadline_is_on_time() {
    let window = RoundWindow {
        number: 1,
        due_at: 1_000,
        default_at: 1_500,
    };
    assert_eq!(
        classify_contribution(&window, Some(1_000), 2_000),
        ContributionStatus::OnTime
    );
}

#[test]
fn failed_chain_read_keeps_last_known_status() {
    let record = chama(ChamaStatus::Registered);
    let out = reconcile_status(
        &record,
        &ChainObservation::Failed {
            reason: "rpc timeout".to_string(),
        },
    );
    assert_eq!(
        out.display,
        DisplayStatus::Stale {
            last_known: ChamaStatus::Registered
        }
    );
}

#[test]
fn ledger_derives_member_statuses_from_rounds() {
    let record = chama(ChamaStatus::Active);
    let members: Vec<Member> = (1..=3)
        .map(|n| Member::joined(record.id.clone(), addr(n), "m", false, 0))
        .collect();
    let contribution = |member: EvmAddress, timestamp: u64| ContributionRecord {
        member,
        amount: 100,
        timestamp,
    };
    let rounds = vec![
        Round {
            number: 1,
            recipient: addr(1),
            opened_at: 0,
            due_at: 1_000,
            default_at: 1_500,
            contributions: vec![
                contribution(addr(1), 900),
                contribution(addr(2), 1_000),
                contribution(addr(3), 1_200),
            ],
            payout: Some(PayoutRecord {
                recipient: addr(1),
                amount: 300,
                paid_at: 1_600,
                tx: None,
            }),
        },
        Round {
            number: 2,
            recipient: addr(2),
            opened_at: 1_600,
            due_at: 2_600,
            default_at: 3_100,
            contributions: vec![contribution(addr(2), 2_000)],
            payout: None,
        },
    ];

    let ledger = RoundLedger::build(
        &record,
        &members,
        &rounds,
        3_200,
        &ReliabilityPolicy::default(),
    )
    .expect("ledger");
    assert_eq!(ledger.current_round, Some(2));
    assert_eq!(ledger.completed_rounds, 1);
    assert_eq!(ledger.pot_per_round, 300);

    let winner = ledger.standing(&addr(1)).expect("winner");
    assert_eq!(winner.status, MembershipStatus::Defaulted);
    assert_eq!(winner.payout_round, Some(1));

    let steady = ledger.standing(&addr(2)).expect("steady");
    assert_eq!(steady.status, MembershipStatus::Contributed);
    assert_eq!(steady.reliability, 100);
    assert_eq!(steady.total_contributed, 200);

    let late = ledger.standing(&addr(3)).expect("late");
    assert_eq!(late.status, MembershipStatus::Defaulted);
    assert_eq!(late.rounds[0].status, ContributionStatus::Late);
}
