use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{format_count, format_relative};
use crate::domain::{Account, AccountActivity, AccountStatus};

pub const DEFAULT_AVATAR_URL: &str = "https://cdn.discordapp.com/embed/avatars/0.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCardView {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: String,
    pub status: AccountStatus,
    pub status_label: String,
    pub channels: usize,
    pub interval_label: String,
    /// "#channel" when the account is bound to a guild channel.
    pub server_label: Option<String>,
    pub dm_reply_enabled: bool,
    pub messages_sent_label: String,
    pub message_preview: String,
    pub last_sent_label: String,
    pub toggle_label: &'static str,
    pub toggle_enabled: bool,
}

impl AccountCardView {
    pub fn build(account: &Account, now: DateTime<Utc>) -> Self {
        let status = account.status();
        Self {
            id: account.id,
            username: account.username.clone(),
            avatar_url: account
                .avatar_url
                .clone()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string()),
            status,
            status_label: status.to_string(),
            channels: account.channel_count(),
            interval_label: format!("{}s", account.interval),
            server_label: account
                .guild_channel()
                .map(|binding| format!("#{}", binding.channel_name.unwrap_or_default())),
            dm_reply_enabled: account.dm_reply_enabled(),
            messages_sent_label: format_count(account.messages_sent),
            message_preview: account.message.clone(),
            last_sent_label: format_relative(account.last_sent, now),
            toggle_label: if account.active { "Pause" } else { "Start" },
            toggle_enabled: account.can_send(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendAttemptView {
    pub channel_id: i64,
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
    pub time_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorView {
    pub error_type: String,
    pub details: String,
    pub time_label: String,
}

/// Account details dialog: the card plus full message and recent activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDetailsView {
    pub card: AccountCardView,
    pub message: String,
    /// `None` while the activity query has not produced a value yet.
    pub recent_messages: Option<Vec<SendAttemptView>>,
    pub failed_sends: Option<usize>,
    pub errors: Option<Vec<ErrorView>>,
}

impl AccountDetailsView {
    pub fn build(account: &Account, activity: Option<&AccountActivity>, now: DateTime<Utc>) -> Self {
        let recent_messages = activity.map(|a| {
            a.messages
                .iter()
                .map(|m| SendAttemptView {
                    channel_id: m.channel_id,
                    success: m.success,
                    message: m.message.clone(),
                    error: m.error.clone(),
                    time_label: format_relative(Some(m.created_at), now),
                })
                .collect()
        });

        let errors = activity.map(|a| {
            a.errors
                .iter()
                .map(|e| ErrorView {
                    error_type: e.error_type.clone(),
                    details: e.details.clone(),
                    time_label: format_relative(Some(e.created_at), now),
                })
                .collect()
        });

        Self {
            card: AccountCardView::build(account, now),
            message: account.message.clone(),
            recent_messages,
            failed_sends: activity.map(AccountActivity::failed_sends),
            errors,
        }
    }
}
