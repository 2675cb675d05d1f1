// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chama_core::{ReliabilityPolicy, DEFAULT_MAX_USES};
use chama_store::RetryPolicy;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Bound on a single chain read or balance check.
    pub rpc_timeout: Duration,
    pub receipt_timeout: Duration,
    pub retry: RetryPolicy,
    pub invite_max_uses: u32,
    pub state_path: PathBuf,
    pub log_json: bool,
    pub reliability: ReliabilityPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_millis(5_000),
            receipt_timeout: Duration::from_millis(120_000),
            retry: RetryPolicy::default(),
            invite_max_uses: DEFAULT_MAX_USES,
            state_path: PathBuf::from("chama-state.json"),
            log_json: false,
            reliability: ReliabilityPolicy::default(),
        }
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

fn env_duration_ms(name: &str, default: Duration) -> Duration {
    Duration::from_millis(env_u64(name, default.as_millis() as u64))
}

impl SyncConfig {
    /// Defaults overridden by `CHAMA_*` variables; unparsable values fall back.
    #[must_use]
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            rpc_timeout: env_duration_ms("CHAMA_RPC_TIMEOUT_MS", base.rpc_timeout),
            receipt_timeout: env_duration_ms("CHAMA_RECEIPT_TIMEOUT_MS", base.receipt_timeout),
            retry: RetryPolicy {
                max_attempts: u32::try_from(env_u64(
                    "CHAMA_RETRY_ATTEMPTS",
                    u64::from(base.retry.max_attempts),
                ))
                .unwrap_or(u32::MAX),
                base_backoff_ms: env_u64("CHAMA_RETRY_BACKOFF_MS", base.retry.base_backoff_ms),
            },
            invite_max_uses: u32::try_from(env_u64(
                "CHAMA_INVITE_MAX_USES",
                u64::from(base.invite_max_uses),
            ))
            .unwrap_or(u32::MAX),
            state_path: env::var("CHAMA_STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(base.state_path),
            log_json: env_bool("CHAMA_LOG_JSON", base.log_json),
            reliability: ReliabilityPolicy {
                decay: env_f64("CHAMA_RELIABILITY_DECAY", base.reliability.decay),
                late_credit: env_f64("CHAMA_RELIABILITY_LATE_CREDIT", base.reliability.late_credit),
            },
        }
    }
}

pub fn validate_startup_config_contract(cfg: &SyncConfig) -> Result<(), String> {
    if cfg.rpc_timeout.is_zero() || cfg.receipt_timeout.is_zero() {
        return Err("timeouts must be > 0".to_string());
    }
    if cfg.retry.max_attempts == 0 {
        return Err("retry attempts must be > 0".to_string());
    }
    if cfg.invite_max_uses == 0 {
        return Err("invite max uses must be > 0".to_string());
    }
    if cfg.state_path.as_os_str().is_empty() {
        return Err("state path must not be empty".to_string());
    }
    cfg.reliability.validate().map_err(|e| e.0)
}
