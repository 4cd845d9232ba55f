use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageLogEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub channel_id: i64,
    pub message: String,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorLogEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub error_type: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

/// Recent send attempts and errors for one account, newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountActivity {
    pub messages: Vec<MessageLogEntry>,
    pub errors: Vec<ErrorLogEntry>,
}

impl AccountActivity {
    pub fn failed_sends(&self) -> usize {
        self.messages.iter().filter(|m| !m.success).count()
    }
}
