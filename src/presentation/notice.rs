use crate::application::{DispatchError, TrialClaim};

pub const CLAIM_TRIAL_PROMPT: &str = "Please claim your 24-hour trial first!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Non-blocking notification shown after a command settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            description: description.into(),
        }
    }

    /// Error notice for a failed command. Messages that look like a missing
    /// entitlement become the trial prompt.
    pub fn from_error(err: &DispatchError) -> Self {
        let description = if err.suggests_missing_access() {
            CLAIM_TRIAL_PROMPT.to_string()
        } else {
            err.to_string()
        };
        Self::error("Error", description)
    }

    pub fn account_created() -> Self {
        Self::success("Success", "Account added successfully!")
    }

    pub fn account_toggled() -> Self {
        Self::success("Success", "Account status updated!")
    }

    pub fn account_removed() -> Self {
        Self::success("Success", "Account deleted successfully!")
    }

    pub fn trial_claimed(claim: &TrialClaim) -> Self {
        match claim {
            TrialClaim::Granted { message } => Self::success(
                "Trial Activated!",
                message
                    .clone()
                    .unwrap_or_else(|| "Your 24-hour trial has started.".to_string()),
            ),
            TrialClaim::AlreadyGranted { message } => Self::success("Trial Active", message.clone()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}
