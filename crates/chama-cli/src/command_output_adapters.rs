// SPDX-License-Identifier: Apache-2.0

use crate::{CliError, OutputMode};
use chama_core::{canonical, ErrorCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

pub(crate) fn emit_ok(output_mode: OutputMode, payload: &Value) -> Result<(), CliError> {
    if output_mode.json {
        let bytes =
            canonical::canonical_json_bytes(payload).map_err(|e| CliError::internal(e.to_string()))?;
        let text = String::from_utf8(bytes).map_err(|e| CliError::internal(e.to_string()))?;
        println!("{text}");
    } else {
        println!(
            "{}",
            serde_json::to_string_pretty(payload).map_err(|e| CliError::internal(e.to_string()))?
        );
    }
    Ok(())
}

/// Reads a JSON input file; unreadable and ill-shaped files are validation failures.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, CliError> {
    let raw = std::fs::read(path).map_err(|e| {
        CliError::coded(
            ErrorCode::ValidationError,
            format!("failed to read {what} {}: {e}", path.display()),
        )
    })?;
    serde_json::from_slice(&raw).map_err(|e| {
        CliError::coded(ErrorCode::ValidationError, format!("invalid {what} JSON: {e}"))
            .with_detail("path", &path.display().to_string())
    })
}
