use serde::Serialize;
use std::fmt;
use validator::{Validate, ValidationErrors};

use super::PlatformIdentity;

pub const MIN_INTERVAL_SECS: u32 = 30;
pub const DEFAULT_INTERVAL: &str = "60";

/// Raw add-account form fields, exactly as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDraft {
    pub token: String,
    pub message: String,
    /// Comma separated channel ids.
    pub channels: String,
    pub interval: String,
    pub guild_id: String,
    pub channel_name: String,
    pub dm_reply: String,
}

impl Default for AccountDraft {
    fn default() -> Self {
        Self {
            token: String::new(),
            message: String::new(),
            channels: String::new(),
            interval: DEFAULT_INTERVAL.to_string(),
            guild_id: String::new(),
            channel_name: String::new(),
            dm_reply: String::new(),
        }
    }
}

/// First failing form field, reported at the originating control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

impl FieldViolation {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Parsed account settings; identity fields are added after verification.
#[derive(Clone, Serialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountSettings {
    #[validate(length(min = 1, message = "Token is required"))]
    pub user_token: String,
    #[validate(length(min = 1, max = 2000, message = "Message must be 1-2000 characters"))]
    pub message: String,
    #[validate(length(min = 1, message = "At least one channel is required"))]
    pub channel_ids: Vec<i64>,
    #[validate(range(min = 30, message = "Interval must be at least 30 seconds"))]
    pub interval: u32,
    pub guild_id: Option<String>,
    pub channel_name: Option<String>,
    #[validate(length(max = 2000, message = "DM reply too long"))]
    pub dm_reply: Option<String>,
}

impl fmt::Debug for AccountSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSettings")
            .field("user_token", &"<redacted>")
            .field("message", &self.message)
            .field("channel_ids", &self.channel_ids)
            .field("interval", &self.interval)
            .field("guild_id", &self.guild_id)
            .field("channel_name", &self.channel_name)
            .field("dm_reply", &self.dm_reply)
            .finish()
    }
}

/// `accountData` payload of the create command.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    #[serde(flatten)]
    pub settings: AccountSettings,
    pub username: String,
    pub avatar_url: String,
}

impl AccountSettings {
    pub fn with_identity(self, identity: &PlatformIdentity) -> NewAccount {
        NewAccount {
            settings: self,
            username: identity.username.clone(),
            avatar_url: identity.avatar_url.clone(),
        }
    }
}

// Reporting order for field problems, mirrored to form control names.
const FIELD_ORDER: [(&str, &str); 5] = [
    ("user_token", "token"),
    ("message", "message"),
    ("channel_ids", "channels"),
    ("interval", "interval"),
    ("dm_reply", "dm_reply"),
];

impl AccountDraft {
    pub fn parse_channel_ids(&self) -> Result<Vec<i64>, FieldViolation> {
        self.channels
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| match id.parse::<i64>() {
                Ok(parsed) if parsed > 0 => Ok(parsed),
                _ => Err(FieldViolation::new(
                    "channels",
                    format!("Invalid channel id: {}", id),
                )),
            })
            .collect()
    }

    /// Parse and validate every field. Nothing here touches the network.
    /// Parse failures and rule violations are reported in form order.
    pub fn validate(&self) -> Result<AccountSettings, FieldViolation> {
        let channel_ids = self.parse_channel_ids();
        let interval = self.interval.trim().parse::<u32>().map_err(|_| {
            FieldViolation::new("interval", "Interval must be a whole number of seconds")
        });

        let parse_failures: Vec<FieldViolation> = [channel_ids.as_ref().err(), interval.as_ref().err()]
            .into_iter()
            .flatten()
            .cloned()
            .collect();

        // An unparsable field is reported by its parse failure, so the
        // validator sees a value it accepts.
        let settings = AccountSettings {
            user_token: self.token.trim().to_string(),
            message: self.message.clone(),
            channel_ids: channel_ids.unwrap_or_default(),
            interval: interval.unwrap_or(MIN_INTERVAL_SECS),
            guild_id: non_empty(&self.guild_id),
            channel_name: non_empty(&self.channel_name),
            dm_reply: non_empty(&self.dm_reply),
        };

        match settings.validate() {
            Ok(()) if parse_failures.is_empty() => Ok(settings),
            result => Err(first_violation(result.err().as_ref(), &parse_failures)),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn first_violation(errors: Option<&ValidationErrors>, parse_failures: &[FieldViolation]) -> FieldViolation {
    let field_errors = errors.map(ValidationErrors::field_errors).unwrap_or_default();
    FIELD_ORDER
        .iter()
        .find_map(|(name, control)| {
            if let Some(failure) = parse_failures.iter().find(|f| f.field == *control) {
                return Some(failure.clone());
            }
            field_errors.get(name).and_then(|list| list.first()).map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                FieldViolation::new(*control, message)
            })
        })
        .or_else(|| parse_failures.first().cloned())
        .unwrap_or_else(|| {
            FieldViolation::new("form", errors.map(|e| e.to_string()).unwrap_or_default())
        })
}
