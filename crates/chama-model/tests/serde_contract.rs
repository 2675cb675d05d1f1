// SPDX-License-Identifier: Apache-2.0

use chama_model::{Chama, ChamaStatus, Invite};

#[test]
fn chama_record_decodes_from_backend_json() {
    let raw = r#"{
        "id": "harvest-circle",
        "name": "Harvest Circle",
        "contribution_amount": 50000,
        "cycle_duration_secs": 604800,
        "max_members": 5,
        "status": "registered",
        "onchain_address": "0xAbCdEf0000000000000000000000000000000001",
        "creator": "0x1111111111111111111111111111111111111111",
        "created_at": 1700000000
    }"#;
    let chama: Chama = serde_json::from_str(raw).expect("decode chama");
    assert_eq!(chama.status, ChamaStatus::Registered);
    assert_eq!(chama.deposit_amount, 0);
    assert_eq!(
        chama.onchain_address.as_ref().map(|a| a.as_str()),
        Some("0xabcdef0000000000000000000000000000000001")
    );
    chama.validate().expect("valid record");
}

#[test]
fn invalid_ids_and_unknown_fields_are_rejected() {
    let bad_id = r#"{"id":"Bad Id","name":"x","contribution_amount":1,"cycle_duration_secs":1,
        "max_members":2,"status":"draft","creator":"0x1111111111111111111111111111111111111111",
        "created_at":0}"#;
    assert!(serde_json::from_str::<Chama>(bad_id).is_err());

    let extra = r#"{"code":"c","inviter":"0x1111111111111111111111111111111111111111",
        "created_at":0,"expires_at":1,"max_uses":1,"is_active":true,"surprise":1}"#;
    assert!(serde_json::from_str::<Invite>(extra).is_err());
}

#[test]
fn statuses_serialize_snake_case() {
    let encoded = serde_json::to_string(&ChamaStatus::Recruiting).expect("encode");
    assert_eq!(encoded, "\"recruiting\"");
}
