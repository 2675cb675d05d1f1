// SPDX-License-Identifier: Apache-2.0

//! Key-ordered JSON for checksums, CLI output and opaque page tokens.

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::errors::{Error, Result};

/// Rebuilds every object through a `BTreeMap` so keys come out sorted
/// regardless of how the value was assembled.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(key, inner)| (key, canonicalize(inner)))
                .collect();
            Value::Object(ordered.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        scalar => scalar,
    }
}

pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let tree = canonicalize(serde_json::to_value(value)?);
    Ok(serde_json::to_vec(&tree)?)
}

/// Lowercase hex SHA-256 of the canonical encoding.
pub fn checksum_hex<T: Serialize>(value: &T) -> Result<String> {
    let digest = Sha256::digest(canonical_json_bytes(value)?);
    Ok(digest.iter().map(|byte| format!("{byte:02x}")).collect())
}

pub fn encode_page_token<T: Serialize>(payload: &T) -> Result<String> {
    Ok(URL_SAFE_NO_PAD.encode(canonical_json_bytes(payload)?))
}

pub fn decode_page_token<T: DeserializeOwned>(token: &str) -> Result<T> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|e| Error::DecodeCursorBase64(e.to_string()))?;
    serde_json::from_slice(&raw).map_err(|e| Error::DecodeCursorJson(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chama_model::{ChamaId, ChamaStatus};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Resume {
        after: ChamaId,
        status: Option<ChamaStatus>,
    }

    #[test]
    fn cached_status_checksum_ignores_field_order() {
        let written = json!({
            "viewer": null,
            "cached_status": {"harvest-circle": {"status": "active", "stale": false}},
        });
        let reloaded = json!({
            "cached_status": {"harvest-circle": {"stale": false, "status": "active"}},
            "viewer": null,
        });
        assert_eq!(
            checksum_hex(&written).expect("checksum"),
            checksum_hex(&reloaded).expect("checksum")
        );
        let bytes = canonical_json_bytes(&reloaded).expect("bytes");
        let text = String::from_utf8(bytes).expect("utf8");
        assert!(text.starts_with(r#"{"cached_status":{"harvest-circle":{"stale":false"#));

        let demoted = json!({
            "cached_status": {"harvest-circle": {"stale": false, "status": "registered"}},
            "viewer": null,
        });
        assert_ne!(
            checksum_hex(&written).expect("checksum"),
            checksum_hex(&demoted).expect("checksum")
        );
    }

    #[test]
    fn page_token_carries_a_typed_resume_point() {
        let resume = Resume {
            after: ChamaId::new("harvest-circle").expect("id"),
            status: Some(ChamaStatus::Recruiting),
        };
        let token = encode_page_token(&resume).expect("encode");
        assert!(!token.contains('='));
        assert_eq!(decode_page_token::<Resume>(&token).expect("decode"), resume);

        assert!(matches!(
            decode_page_token::<Resume>("not base64!"),
            Err(Error::DecodeCursorBase64(_))
        ));
        let foreign = URL_SAFE_NO_PAD.encode(br#"{"offset":40}"#);
        assert!(matches!(
            decode_page_token::<Resume>(&foreign),
            Err(Error::DecodeCursorJson(_))
        ));
    }
}
