use crate::application::{AccountForm, QueryCache, QueryKey};
use crate::domain::FieldViolation;
use crate::infrastructure::{BackendError, CommandGateway, CommandReply, ManageAccountsRequest, RecordStore};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// Local field check failed; nothing was sent.
    #[error("{message}")]
    Validation { field: &'static str, message: String },
    /// A required prior step is missing; nothing was sent.
    #[error("{0}")]
    Precondition(String),
    #[error("{message}")]
    Remote { message: String },
    #[error("Network error: {0}")]
    Network(String),
}

impl From<FieldViolation> for DispatchError {
    fn from(violation: FieldViolation) -> Self {
        DispatchError::Validation {
            field: violation.field,
            message: violation.message,
        }
    }
}

impl From<BackendError> for DispatchError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::RequestFailed(message) => DispatchError::Network(message),
            other => DispatchError::Remote {
                message: other.to_string(),
            },
        }
    }
}

impl DispatchError {
    /// Raised before any request was made.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            DispatchError::Validation { .. } | DispatchError::Precondition(_)
        )
    }

    /// Whether a remote message looks like a missing entitlement.
    ///
    /// Plain substring match on free text from the backend. Treat as a hint
    /// for the prompt shown to the user, not as a classification.
    pub fn suggests_missing_access(&self) -> bool {
        match self {
            DispatchError::Remote { message } => {
                let lower = message.to_lowercase();
                lower.contains("trial") || lower.contains("access")
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrialClaim {
    Granted { message: Option<String> },
    /// The backend reported an existing grant. Reported, not an error.
    AlreadyGranted { message: String },
}

/// Issues commands and invalidates the affected query keys on success.
///
/// Cached records are never edited locally; the next read refetches them.
pub struct CommandDispatcher<G, S>
where
    G: CommandGateway,
    S: RecordStore + 'static,
{
    gateway: Arc<G>,
    cache: QueryCache<S>,
    request_timeout: Duration,
}

impl<G, S> CommandDispatcher<G, S>
where
    G: CommandGateway,
    S: RecordStore + 'static,
{
    pub fn new(gateway: Arc<G>, cache: QueryCache<S>, request_timeout: Duration) -> Self {
        Self {
            gateway,
            cache,
            request_timeout,
        }
    }

    pub fn cache(&self) -> &QueryCache<S> {
        &self.cache
    }

    async fn call<F>(&self, action: &'static str, request: F) -> Result<CommandReply, DispatchError>
    where
        F: Future<Output = Result<CommandReply, BackendError>>,
    {
        match timeout(self.request_timeout, request).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => {
                if e.is_transport() {
                    warn!(action, error = %e, "Command could not reach the backend");
                } else {
                    warn!(action, error = %e, "Command rejected by the backend");
                }
                Err(e.into())
            }
            Err(_) => {
                warn!(action, timeout = ?self.request_timeout, "Command timed out");
                Err(DispatchError::Remote {
                    message: format!("{} timed out after {:?}", action, self.request_timeout),
                })
            }
        }
    }

    /// Create an account from the form. Local checks run first and fail
    /// without a request; on success the form is reset.
    pub async fn create_account(&self, form: &mut AccountForm) -> Result<CommandReply, DispatchError> {
        let account = form.submission()?;
        let username = account.username.clone();

        let request = ManageAccountsRequest::Create {
            account_data: account,
        };
        let reply = self
            .call(request.action(), self.gateway.manage_accounts(&request))
            .await?;

        info!(username = %username, "Account created");
        self.cache.invalidate(&QueryKey::Accounts);
        form.reset();
        Ok(reply)
    }

    pub async fn toggle_account(&self, account_id: Uuid) -> Result<CommandReply, DispatchError> {
        let request = ManageAccountsRequest::Toggle { account_id };
        let reply = self
            .call(request.action(), self.gateway.manage_accounts(&request))
            .await?;

        info!(account_id = %account_id, "Account toggled");
        self.cache.invalidate(&QueryKey::Accounts);
        Ok(reply)
    }

    pub async fn remove_account(&self, account_id: Uuid) -> Result<CommandReply, DispatchError> {
        let request = ManageAccountsRequest::Delete { account_id };
        let reply = self
            .call(request.action(), self.gateway.manage_accounts(&request))
            .await?;

        info!(account_id = %account_id, "Account removed");
        self.cache.invalidate(&QueryKey::Accounts);
        self.cache.remove(&QueryKey::Activity(account_id));
        Ok(reply)
    }

    pub async fn claim_trial(&self) -> Result<TrialClaim, DispatchError> {
        let claim = match self.call("claim-trial", self.gateway.claim_trial()).await {
            Ok(reply) => {
                info!("Trial claimed");
                TrialClaim::Granted {
                    message: reply.message,
                }
            }
            // Advisory match, same caveat as `suggests_missing_access`.
            Err(DispatchError::Remote { message }) if message.to_lowercase().contains("already") => {
                info!(message = %message, "Trial already granted");
                TrialClaim::AlreadyGranted { message }
            }
            Err(e) => return Err(e),
        };

        self.cache.invalidate(&QueryKey::Accounts);
        self.cache.invalidate(&QueryKey::Access);
        Ok(claim)
    }
}
