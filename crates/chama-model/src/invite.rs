// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{ChamaId, EvmAddress, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Invite {
    pub code: String,
    pub inviter: EvmAddress,
    #[serde(default)]
    pub chama_id: Option<ChamaId>,
    pub created_at: u64,
    pub expires_at: u64,
    pub max_uses: u32,
    #[serde(default)]
    pub current_uses: u32,
    pub is_active: bool,
}

impl Invite {
    #[must_use]
    pub const fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.current_uses >= self.max_uses
    }

    #[must_use]
    pub const fn remaining_uses(&self) -> u32 {
        self.max_uses.saturating_sub(self.current_uses)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.code.trim().is_empty() {
            return Err(ValidationError("invite code must not be empty".to_string()));
        }
        if self.max_uses == 0 {
            return Err(ValidationError("invite max_uses must be >= 1".to_string()));
        }
        if self.current_uses > self.max_uses {
            return Err(ValidationError(format!(
                "invite {} used {} times but allows {}",
                self.code, self.current_uses, self.max_uses
            )));
        }
        if self.expires_at <= self.created_at {
            return Err(ValidationError(
                "invite must expire after it was created".to_string(),
            ));
        }
        Ok(())
    }
}
