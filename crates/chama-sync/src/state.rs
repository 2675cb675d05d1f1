// SPDX-License-Identifier: Apache-2.0

//! Client state persisted between sessions.
//!
//! On disk the state is wrapped in `{schema_version, checksum, state}`. Older
//! versions are migrated forward on load; newer ones are refused.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

use chama_core::canonical::checksum_hex;
use chama_core::ErrorCode;
use chama_model::{ChamaId, ChamaStatus, EvmAddress};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CURRENT_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CachedStatus {
    pub status: ChamaStatus,
    pub on_chain: bool,
    pub fetched_at: u64,
    /// Last chain read failed; `status` is the last known value.
    #[serde(default)]
    pub stale: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientState {
    #[serde(default)]
    pub viewer: Option<EvmAddress>,
    #[serde(default)]
    pub last_viewed_chama: Option<ChamaId>,
    #[serde(default)]
    pub cached_status: BTreeMap<ChamaId, CachedStatus>,
    /// Invite opened before a wallet was connected.
    #[serde(default)]
    pub pending_invite: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StateEnvelope {
    schema_version: u32,
    checksum: String,
    state: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    Io { path: PathBuf, message: String },
    Corrupt(String),
    ChecksumMismatch { expected: String, actual: String },
    UnsupportedVersion(u32),
}

impl StateError {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } => ErrorCode::InternalError,
            Self::Corrupt(_) | Self::ChecksumMismatch { .. } | Self::UnsupportedVersion(_) => {
                ErrorCode::ValidationError
            }
        }
    }

    fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl Display for StateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "state file {}: {message}", path.display()),
            Self::Corrupt(message) => write!(f, "state file is corrupt: {message}"),
            Self::ChecksumMismatch { expected, actual } => {
                write!(f, "state checksum mismatch: expected {expected}, got {actual}")
            }
            Self::UnsupportedVersion(v) => write!(
                f,
                "state schema version {v} is not supported (current {CURRENT_SCHEMA_VERSION})"
            ),
        }
    }
}

impl std::error::Error for StateError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
}

impl MigrationReport {
    #[must_use]
    pub const fn migrated(&self) -> bool {
        self.from_version != self.to_version
    }
}

fn checksum_of(state: &Value) -> Result<String, StateError> {
    checksum_hex(state).map_err(|e| StateError::Corrupt(e.to_string()))
}

/// v1 kept a bare status string per chama.
fn migrate_v1_to_v2(mut state: Value) -> Result<Value, StateError> {
    let Some(object) = state.as_object_mut() else {
        return Err(StateError::Corrupt("v1 state must be an object".to_string()));
    };
    let Some(raw) = object.remove("cached_status") else {
        return Ok(state);
    };
    let Value::Object(entries) = raw else {
        return Err(StateError::Corrupt(
            "v1 cached_status must be an object".to_string(),
        ));
    };
    let mut upgraded = Map::new();
    for (id, value) in entries {
        let raw_status = value.as_str().ok_or_else(|| {
            StateError::Corrupt(format!("v1 cached status for {id} must be a string"))
        })?;
        let status =
            ChamaStatus::parse(raw_status).map_err(|e| StateError::Corrupt(e.to_string()))?;
        let cached = CachedStatus {
            status,
            on_chain: status.is_on_chain(),
            fetched_at: 0,
            stale: false,
        };
        let encoded =
            serde_json::to_value(cached).map_err(|e| StateError::Corrupt(e.to_string()))?;
        upgraded.insert(id, encoded);
    }
    object.insert("cached_status".to_string(), Value::Object(upgraded));
    Ok(state)
}

fn upgrade(version: u32, state: Value) -> Result<Value, StateError> {
    match version {
        1 => migrate_v1_to_v2(state),
        other => Err(StateError::UnsupportedVersion(other)),
    }
}

/// Verifies and migrates an envelope; returns the state and its source version.
pub fn decode_state(bytes: &[u8]) -> Result<(ClientState, u32), StateError> {
    let envelope: StateEnvelope =
        serde_json::from_slice(bytes).map_err(|e| StateError::Corrupt(e.to_string()))?;
    let actual = checksum_of(&envelope.state)?;
    if actual != envelope.checksum {
        return Err(StateError::ChecksumMismatch {
            expected: envelope.checksum,
            actual,
        });
    }
    let from = envelope.schema_version;
    if from == 0 || from > CURRENT_SCHEMA_VERSION {
        return Err(StateError::UnsupportedVersion(from));
    }
    let mut state = envelope.state;
    for version in from..CURRENT_SCHEMA_VERSION {
        state = upgrade(version, state)?;
    }
    let decoded =
        serde_json::from_value(state).map_err(|e| StateError::Corrupt(e.to_string()))?;
    Ok((decoded, from))
}

pub fn encode_state(state: &ClientState) -> Result<Vec<u8>, StateError> {
    encode_versioned(CURRENT_SCHEMA_VERSION, state)
}

pub fn encode_versioned<T: Serialize>(
    schema_version: u32,
    state: &T,
) -> Result<Vec<u8>, StateError> {
    let value = serde_json::to_value(state).map_err(|e| StateError::Corrupt(e.to_string()))?;
    let envelope = StateEnvelope {
        schema_version,
        checksum: checksum_of(&value)?,
        state: value,
    };
    serde_json::to_vec_pretty(&envelope).map_err(|e| StateError::Corrupt(e.to_string()))
}

/// Missing file yields the default state.
pub fn load_state(path: &Path) -> Result<ClientState, StateError> {
    match fs::read(path) {
        Ok(bytes) => decode_state(&bytes).map(|(state, _)| state),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ClientState::default()),
        Err(err) => Err(StateError::io(path, &err)),
    }
}

/// Writes next to `path` and renames into place.
pub fn save_state(path: &Path, state: &ClientState) -> Result<(), StateError> {
    let bytes = encode_state(state)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StateError::io(parent, &e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).map_err(|e| StateError::io(&tmp, &e))?;
    fs::rename(&tmp, path).map_err(|e| StateError::io(path, &e))
}

/// Rewrites an existing state file at the current schema version.
pub fn migrate_file(path: &Path) -> Result<MigrationReport, StateError> {
    let bytes = fs::read(path).map_err(|e| StateError::io(path, &e))?;
    let (state, from_version) = decode_state(&bytes)?;
    if from_version != CURRENT_SCHEMA_VERSION {
        save_state(path, &state)?;
        tracing::info!(
            path = %path.display(),
            from_version,
            to_version = CURRENT_SCHEMA_VERSION,
            "client state migrated"
        );
    }
    Ok(MigrationReport {
        from_version,
        to_version: CURRENT_SCHEMA_VERSION,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn v1_statuses_become_cached_entries() {
        let v1 = json!({
            "viewer": null,
            "cached_status": {"c1": "active", "c2": "recruiting"}
        });
        let bytes = encode_versioned(1, &v1).expect("encode v1");
        let (state, from) = decode_state(&bytes).expect("decode");
        assert_eq!(from, 1);
        let id = ChamaId::new("c1").expect("id");
        let cached = state.cached_status.get(&id).expect("c1");
        assert_eq!(cached.status, ChamaStatus::Active);
        assert!(cached.on_chain);
        let c2 = state
            .cached_status
            .get(&ChamaId::new("c2").expect("id"))
            .expect("c2");
        assert!(!c2.on_chain);
    }

    #[test]
    fn tampered_state_is_rejected() {
        let bytes = encode_state(&ClientState::default()).expect("encode");
        let mut envelope: Value = serde_json::from_slice(&bytes).expect("json");
        envelope["state"]["pending_invite"] = json!("CHM-000001-ALL-1-000000");
        let tampered = serde_json::to_vec(&envelope).expect("bytes");
        assert!(matches!(
            decode_state(&tampered),
            Err(StateError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn future_versions_are_refused() {
        let bytes = encode_versioned(CURRENT_SCHEMA_VERSION + 1, &ClientState::default())
            .expect("encode");
        assert_eq!(
            decode_state(&bytes),
            Err(StateError::UnsupportedVersion(CURRENT_SCHEMA_VERSION + 1))
        );
    }
}
