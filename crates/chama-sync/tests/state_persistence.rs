// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use chama_model::{ChamaId, ChamaStatus, EvmAddress};
use chama_store::{InMemoryChain, InMemoryRecordStore};
use chama_sync::state::encode_versioned;
use chama_sync::{
    load_state, migrate_file, save_state, CachedStatus, ChamaService, ClientState, StateError,
    SyncConfig, CURRENT_SCHEMA_VERSION,
};
use serde_json::json;

fn sample_state() -> ClientState {
    let mut state = ClientState {
        viewer: Some(
            EvmAddress::new("0x00000000000000000000000000000000000000ab").expect("address"),
        ),
        last_viewed_chama: Some(ChamaId::new("c1").expect("id")),
        pending_invite: Some("CHM-0000AB-ALL-1-000000".to_string()),
        ..ClientState::default()
    };
    state.cached_status.insert(
        ChamaId::new("c1").expect("id"),
        CachedStatus {
            status: ChamaStatus::Registered,
            on_chain: true,
            fetched_at: 42,
            stale: false,
        },
    );
    state
}

#[test]
fn saved_state_loads_back_and_leaves_no_temp_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("state.json");
    save_state(&path, &sample_state()).expect("save");
    assert_eq!(load_state(&path).expect("load"), sample_state());

    let leftovers: Vec<_> = std::fs::read_dir(path.parent().expect("parent"))
        .expect("read dir")
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn missing_file_is_a_fresh_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert_eq!(
        load_state(&dir.path().join("absent.json")).expect("load"),
        ClientState::default()
    );
}

#[test]
fn v1_file_is_migrated_in_place() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let v1 = json!({"cached_status": {"c1": "waiting"}, "pending_invite": null});
    std::fs::write(&path, encode_versioned(1, &v1).expect("encode")).expect("write");

    let report = migrate_file(&path).expect("migrate");
    assert_eq!(report.from_version, 1);
    assert_eq!(report.to_version, CURRENT_SCHEMA_VERSION);
    assert!(report.migrated());

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("json");
    assert_eq!(raw["schema_version"], json!(CURRENT_SCHEMA_VERSION));
    let state = load_state(&path).expect("load");
    let cached = state
        .cached_status
        .get(&ChamaId::new("c1").expect("id"))
        .expect("entry");
    assert_eq!(cached.status, ChamaStatus::Waiting);
    assert!(!cached.on_chain);

    let again = migrate_file(&path).expect("second run");
    assert!(!again.migrated());
}

#[test]
fn corrupt_file_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"{not json").expect("write");
    assert!(matches!(load_state(&path), Err(StateError::Corrupt(_))));
}

#[tokio::test]
async fn service_persists_and_reopens_client_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = SyncConfig {
        state_path: dir.path().join("state.json"),
        ..SyncConfig::default()
    };
    let store = Arc::new(InMemoryRecordStore::new());
    let chain = Arc::new(InMemoryChain::new());

    let service = ChamaService::new(Arc::clone(&store), Arc::clone(&chain), config.clone());
    service
        .set_viewer(Some(
            EvmAddress::new("0x00000000000000000000000000000000000000cd").expect("address"),
        ))
        .await;
    service
        .remember_pending_invite("chm-0000cd-all-1-abcdef")
        .await
        .expect("remember");
    service.persist().await.expect("persist");

    let reopened = ChamaService::open(store, chain, config).expect("open");
    let state = reopened.client_state().await;
    assert_eq!(
        state.pending_invite.as_deref(),
        Some("CHM-0000CD-ALL-1-ABCDEF")
    );
    assert!(state.viewer.is_some());
}
