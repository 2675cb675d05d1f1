// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use chama_core::InviteError;
use chama_model::{Chama, ChamaId, ChamaStatus, EvmAddress, Invite, Member};
use chama_store::{
    ChamaQuery, InMemoryRecordStore, RecordStore, RedeemError, StoreErrorCode,
};

fn addr(byte: u8) -> EvmAddress {
    EvmAddress::new(format!("0x{}", format!("{byte:02x}").repeat(20))).expect("address")
}

fn chama(id: &str, name: &str) -> Chama {
    Chama {
        id: ChamaId::new(id).expect("id"),
        name: name.to_string(),
        contribution_amount: 100,
        deposit_amount: 0,
        cycle_duration_secs: 604_800,
        grace_period_secs: 172_800,
        max_members: 3,
        status: ChamaStatus::Recruiting,
        onchain_address: None,
        creator: addr(1),
        created_at: 1,
    }
}

fn invite(code: &str, max_uses: u32) -> Invite {
    Invite {
        code: code.to_string(),
        inviter: addr(1),
        chama_id: None,
        created_at: 0,
        expires_at: 10_000,
        max_uses,
        current_uses: 0,
        is_active: true,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_slot_is_redeemed_exactly_once() {
    let store = Arc::new(InMemoryRecordStore::new());
    store
        .insert_invite(invite("CHM-010101-ALL-1-000000", 1))
        .await
        .expect("insert invite");

    let handles: Vec<_> = (2..=3_u8)
        .map(|n| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .redeem_invite("CHM-010101-ALL-1-000000", &addr(n), 5)
                    .await
            })
        })
        .collect();

    let mut successes = 0;
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => successes += 1,
            Err(RedeemError::Rejected(InviteError::Exhausted { max_uses: 1 })) => exhausted += 1,
            Err(other) => panic!("unexpected redemption failure: {other}"),
        }
    }
    assert_eq!((successes, exhausted), (1, 1));
    let stored = store
        .get_invite("CHM-010101-ALL-1-000000")
        .await
        .expect("invite");
    assert_eq!(stored.current_uses, 1);
}

#[tokio::test]
async fn redemption_lookup_is_case_insensitive_and_reports_missing_codes() {
    let store = InMemoryRecordStore::new();
    store
        .insert_invite(invite("CHM-010101-ALL-1-ABCDEF", 2))
        .await
        .expect("insert");
    let redeemed = store
        .redeem_invite("chm-010101-all-1-abcdef", &addr(2), 5)
        .await
        .expect("redeem");
    assert_eq!(redeemed.current_uses, 1);

    let missing = store
        .redeem_invite("CHM-010101-ALL-1-ZZZZZZ", &addr(2), 5)
        .await
        .expect_err("missing");
    assert_eq!(missing, RedeemError::Rejected(InviteError::NotFound));

    store
        .deactivate_invite("CHM-010101-ALL-1-ABCDEF")
        .await
        .expect("deactivate");
    let inactive = store
        .redeem_invite("CHM-010101-ALL-1-ABCDEF", &addr(3), 5)
        .await
        .expect_err("inactive");
    assert_eq!(inactive, RedeemError::Rejected(InviteError::Inactive));
}

#[tokio::test]
async fn released_use_can_be_redeemed_again() {
    let store = InMemoryRecordStore::new();
    store
        .insert_invite(invite("CHM-010101-ALL-1-00000A", 1))
        .await
        .expect("insert");
    let err = store
        .release_invite_use("CHM-010101-ALL-1-00000A")
        .await
        .expect_err("nothing to release");
    assert_eq!(err.code, StoreErrorCode::Conflict);

    store
        .redeem_invite("CHM-010101-ALL-1-00000A", &addr(2), 5)
        .await
        .expect("redeem");
    let released = store
        .release_invite_use("chm-010101-all-1-00000a")
        .await
        .expect("release");
    assert_eq!(released.current_uses, 0);
    let again = store
        .redeem_invite("CHM-010101-ALL-1-00000A", &addr(3), 6)
        .await
        .expect("slot is free again");
    assert_eq!(again.current_uses, 1);
}

#[tokio::test]
async fn conditional_update_rejects_stale_expectation() {
    let store = InMemoryRecordStore::new();
    let record = chama("c1", "Alpha");
    store.insert_chama(record.clone()).await.expect("insert");

    let mut waiting = record.clone();
    waiting.status = ChamaStatus::Waiting;
    store
        .update_chama(waiting.clone(), ChamaStatus::Recruiting)
        .await
        .expect("first writer wins");

    let mut cancelled = record;
    cancelled.status = ChamaStatus::Cancelled;
    let err = store
        .update_chama(cancelled, ChamaStatus::Recruiting)
        .await
        .expect_err("second writer loses");
    assert_eq!(err.code, StoreErrorCode::Conflict);
    assert_eq!(
        store.get_chama(&waiting.id).await.expect("get").status,
        ChamaStatus::Waiting
    );
}

#[tokio::test]
async fn member_inserts_respect_capacity_and_duplicates() {
    let store = InMemoryRecordStore::new();
    let record = chama("c1", "Alpha");
    store.insert_chama(record.clone()).await.expect("insert");
    let row = |n: u8| Member::joined(record.id.clone(), addr(n), "m", false, u64::from(n));

    assert_eq!(store.insert_member(row(1), 2).await.expect("first"), 1);
    assert_eq!(
        store.insert_member(row(1), 2).await.expect_err("dup").code,
        StoreErrorCode::AlreadyExists
    );
    assert_eq!(store.insert_member(row(2), 2).await.expect("second"), 2);
    assert_eq!(
        store.insert_member(row(3), 2).await.expect_err("full").code,
        StoreErrorCode::CapacityReached
    );

    store
        .remove_member(&record.id, &addr(2))
        .await
        .expect("remove");
    let members = store.list_members(&record.id).await.expect("list");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].address, addr(1));
}

#[tokio::test]
async fn listing_filters_and_pages() {
    let store = InMemoryRecordStore::new();
    for (id, name) in [("a1", "Alpha"), ("b2", "Beta"), ("c3", "Alpine"), ("d4", "Delta")] {
        store.insert_chama(chama(id, name)).await.expect("insert");
    }

    let first = store
        .list_chamas(&ChamaQuery {
            text: Some("alp".to_string()),
            limit: Some(1),
            ..Default::default()
        })
        .await
        .expect("page 1");
    assert_eq!(first.items.len(), 1);
    assert_eq!(first.items[0].name, "Alpha");
    let cursor = first.next_cursor.expect("cursor");

    let second = store
        .list_chamas(&ChamaQuery {
            text: Some("alp".to_string()),
            limit: Some(1),
            cursor: Some(cursor),
            ..Default::default()
        })
        .await
        .expect("page 2");
    assert_eq!(second.items[0].name, "Alpine");
    assert!(second.next_cursor.is_none());

    let by_creator = store
        .list_chamas(&ChamaQuery {
            member: Some(addr(1)),
            ..Default::default()
        })
        .await
        .expect("by member");
    assert_eq!(by_creator.items.len(), 4);
}

#[tokio::test]
async fn injected_failures_are_retryable() {
    let store = InMemoryRecordStore::new();
    store.fail_next(1);
    let err = store
        .get_chama(&ChamaId::new("x").expect("id"))
        .await
        .expect_err("injected");
    assert!(err.is_retryable());
    let err = store
        .get_chama(&ChamaId::new("x").expect("id"))
        .await
        .expect_err("missing");
    assert_eq!(err.code, StoreErrorCode::NotFound);
}
