use serde::{Deserialize, Serialize};

use super::Account;

/// Aggregated message counts, computed by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    #[serde(default)]
    pub today_count: i64,
    #[serde(default)]
    pub week_count: i64,
    #[serde(default)]
    pub total_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountTotals {
    #[serde(default)]
    pub total_messages: i64,
    #[serde(default)]
    pub active: i64,
}

/// Reply of the `get-stats` function.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsReport {
    #[serde(default)]
    pub stats: Option<StatsSnapshot>,
    #[serde(default)]
    pub accounts: Option<AccountTotals>,
}

impl StatsReport {
    /// All-time count; a zero or missing backend total falls back to the
    /// per-account counters.
    pub fn all_time(&self, accounts: &[Account]) -> i64 {
        match self.stats.as_ref().map(|s| s.total_count) {
            Some(total) if total != 0 => total,
            _ => accounts.iter().map(|a| a.messages_sent).sum(),
        }
    }

    pub fn today(&self) -> i64 {
        self.stats.as_ref().map(|s| s.today_count).unwrap_or(0)
    }

    pub fn week(&self) -> i64 {
        self.stats.as_ref().map(|s| s.week_count).unwrap_or(0)
    }

    pub fn total_messages(&self) -> i64 {
        self.accounts.as_ref().map(|a| a.total_messages).unwrap_or(0)
    }

    pub fn active_accounts(&self) -> i64 {
        self.accounts.as_ref().map(|a| a.active).unwrap_or(0)
    }
}
