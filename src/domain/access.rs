use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trial or paid entitlement. Its presence permits account creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessGrant {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub is_trial: bool,
    pub granted_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trial_claimed_at: Option<DateTime<Utc>>,
    pub max_accounts: i32,
    pub max_channel_names: i32,
}

impl AccessGrant {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    /// Slots left before `max_accounts` is reached; never negative.
    pub fn remaining_accounts(&self, current: usize) -> usize {
        usize::try_from(self.max_accounts)
            .unwrap_or(0)
            .saturating_sub(current)
    }

    pub fn permits_new_account(&self, current: usize, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && self.remaining_accounts(current) > 0
    }
}
