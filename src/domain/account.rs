use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// An automated messaging account as stored by the record store.
///
/// The credential itself is never read back into the client; rows carry it
/// but it is not part of this struct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub active: bool,
    pub token_valid: bool,
    #[serde(default)]
    pub channel_ids: Vec<i64>,
    pub interval: u32,
    pub message: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub dm_reply: Option<String>,
    #[serde(default)]
    pub last_sent: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub messages_sent: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
pub enum AccountStatus {
    Online,
    Paused,
    #[strum(serialize = "Invalid Token")]
    InvalidToken,
}

/// Guild/channel binding, present only when a guild id is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildChannel<'a> {
    pub guild_id: &'a str,
    pub channel_name: Option<&'a str>,
}

impl Account {
    pub fn status(&self) -> AccountStatus {
        match (self.active, self.token_valid) {
            (_, false) => AccountStatus::InvalidToken,
            (true, true) => AccountStatus::Online,
            (false, true) => AccountStatus::Paused,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status() == AccountStatus::Online
    }

    /// An invalid token can never send, whatever `active` says.
    pub fn can_send(&self) -> bool {
        self.token_valid
    }

    pub fn channel_count(&self) -> usize {
        self.channel_ids.len()
    }

    pub fn guild_channel(&self) -> Option<GuildChannel<'_>> {
        self.guild_id
            .as_deref()
            .filter(|g| !g.is_empty())
            .map(|guild_id| GuildChannel {
                guild_id,
                channel_name: self.channel_name.as_deref(),
            })
    }

    pub fn dm_reply_enabled(&self) -> bool {
        self.dm_reply.as_deref().is_some_and(|r| !r.trim().is_empty())
    }
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(0))
}
