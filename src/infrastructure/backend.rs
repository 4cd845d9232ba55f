use crate::domain::{AccessGrant, Account, AccountActivity, ErrorLogEntry, MessageLogEntry, NewAccount, StatsReport};
use crate::infrastructure::AppConfig;
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("{message}")]
    Remote { status: u16, message: String },
    #[error("Rate limited, please retry")]
    RateLimited,
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BackendError {
    /// Transport-level failure, as opposed to an answer from the backend.
    pub fn is_transport(&self) -> bool {
        matches!(self, BackendError::RequestFailed(_))
    }
}

/// Read side of the managed backend. Every method is a query the cache can
/// refetch at will.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Accounts of the signed-in user, newest first.
    #[must_use]
    async fn list_accounts(&self) -> Result<Vec<Account>, BackendError>;
    #[must_use]
    async fn fetch_stats(&self) -> Result<StatsReport, BackendError>;
    #[must_use]
    async fn fetch_access_grant(&self) -> Result<Option<AccessGrant>, BackendError>;
    #[must_use]
    async fn list_account_activity(&self, account_id: Uuid) -> Result<AccountActivity, BackendError>;
}

/// Write side: the opaque command functions.
#[async_trait]
pub trait CommandGateway: Send + Sync {
    #[must_use]
    async fn manage_accounts(&self, request: &ManageAccountsRequest) -> Result<CommandReply, BackendError>;
    #[must_use]
    async fn claim_trial(&self) -> Result<CommandReply, BackendError>;
}

/// Body of the `manage-accounts` function.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ManageAccountsRequest {
    Create {
        #[serde(rename = "accountData")]
        account_data: NewAccount,
    },
    Toggle {
        #[serde(rename = "accountId")]
        account_id: Uuid,
    },
    Delete {
        #[serde(rename = "accountId")]
        account_id: Uuid,
    },
}

impl ManageAccountsRequest {
    pub fn action(&self) -> &'static str {
        match self {
            ManageAccountsRequest::Create { .. } => "create",
            ManageAccountsRequest::Toggle { .. } => "toggle",
            ManageAccountsRequest::Delete { .. } => "delete",
        }
    }
}

/// Successful function reply. Only the human readable message is interpreted.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CommandReply {
    #[serde(default)]
    pub message: Option<String>,
}

impl CommandReply {
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

/// Extract a readable message from an error response body.
pub fn remote_error_message(status: u16, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body).ok().and_then(|v| {
        v.get("error")
            .and_then(|e| e.as_str().map(str::to_string).or_else(|| {
                e.get("message").and_then(|m| m.as_str()).map(str::to_string)
            }))
            .or_else(|| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
    });

    match from_json {
        Some(message) if !message.trim().is_empty() => message,
        _ if !body.trim().is_empty() && !body.trim_start().starts_with('{') => body.trim().to_string(),
        _ => format!("Request failed with status {}", status),
    }
}

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Check if status code is retryable (500, 502, 503)
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 500 | 502 | 503)
}

/// HTTP client for the managed backend: PostgREST tables under `/rest/v1`
/// and edge functions under `/functions/v1`.
pub struct SupabaseBackend {
    client: Client,
    base_url: String,
    activity_limit: u32,
}

impl SupabaseBackend {
    pub fn new(config: &AppConfig) -> Result<Self, BackendError> {
        let mut headers = header::HeaderMap::new();
        let api_key = header::HeaderValue::from_str(&config.backend_api_key)
            .map_err(|e| BackendError::InvalidConfig(format!("Invalid API key format: {}", e)))?;
        let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", config.session_token))
            .map_err(|e| BackendError::InvalidConfig(format!("Invalid session token format: {}", e)))?;
        headers.insert("apikey", api_key);
        headers.insert(header::AUTHORIZATION, auth_value);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| BackendError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            activity_limit: config.activity_limit.max(1),
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn function_url(&self, function: &str) -> String {
        format!("{}/functions/v1/{}", self.base_url, function)
    }

    /// Queries are retried on transport errors and 500/502/503. Commands are
    /// not idempotent and get exactly one attempt.
    async fn send<F>(&self, mut request_builder: F, retry: bool) -> Result<Response, BackendError>
    where
        F: FnMut() -> RequestBuilder,
    {
        let attempts = if retry { MAX_RETRIES } else { 1 };
        let mut last_error: Option<String> = None;

        for attempt in 0..attempts {
            match request_builder().send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if status == 429 {
                        return Err(BackendError::RateLimited);
                    }

                    if is_retryable_status(status) && attempt < attempts - 1 {
                        let backoff = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                        warn!(status, attempt, backoff_ms = backoff, "Backend returned retryable status");
                        sleep(Duration::from_millis(backoff)).await;
                        continue;
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    if attempt < attempts - 1 {
                        let backoff = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                        warn!(error = %e, attempt, backoff_ms = backoff, "Backend request failed, retrying");
                        sleep(Duration::from_millis(backoff)).await;
                    }
                }
            }
        }

        Err(BackendError::RequestFailed(
            last_error.unwrap_or_else(|| "Max retries exceeded".to_string()),
        ))
    }

    async fn read_json(resp: Response) -> Result<serde_json::Value, BackendError> {
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Remote {
                status,
                message: remote_error_message(status, &body),
            });
        }

        let text = resp
            .text()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, BackendError> {
        let url = self.rest_url(table);
        debug!(table, "Selecting rows");
        let resp = self
            .send(|| self.client.get(&url).query(query), true)
            .await?;
        let body = Self::read_json(resp).await?;
        serde_json::from_value(body).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    async fn invoke<B: Serialize + Sync>(
        &self,
        function: &str,
        body: &B,
        retry: bool,
    ) -> Result<serde_json::Value, BackendError> {
        let url = self.function_url(function);
        debug!(function, "Invoking backend function");
        let resp = self
            .send(|| self.client.post(&url).json(body), retry)
            .await?;
        Self::read_json(resp).await
    }
}

#[async_trait]
impl RecordStore for SupabaseBackend {
    async fn list_accounts(&self) -> Result<Vec<Account>, BackendError> {
        self.select(
            "accounts",
            &[
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn fetch_stats(&self) -> Result<StatsReport, BackendError> {
        let body = self.invoke("get-stats", &serde_json::json!({}), true).await?;
        serde_json::from_value(body).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    async fn fetch_access_grant(&self) -> Result<Option<AccessGrant>, BackendError> {
        let grants: Vec<AccessGrant> = self
            .select(
                "access_management",
                &[("select", "*".to_string()), ("limit", "1".to_string())],
            )
            .await?;
        Ok(grants.into_iter().next())
    }

    async fn list_account_activity(&self, account_id: Uuid) -> Result<AccountActivity, BackendError> {
        let filter = [
            ("select", "*".to_string()),
            ("account_id", format!("eq.{}", account_id)),
            ("order", "created_at.desc".to_string()),
            ("limit", self.activity_limit.to_string()),
        ];

        let (messages, errors) = tokio::try_join!(
            self.select::<MessageLogEntry>("message_logs", &filter),
            self.select::<ErrorLogEntry>("error_logs", &filter),
        )?;

        Ok(AccountActivity { messages, errors })
    }
}

#[async_trait]
impl CommandGateway for SupabaseBackend {
    async fn manage_accounts(&self, request: &ManageAccountsRequest) -> Result<CommandReply, BackendError> {
        let body = self.invoke("manage-accounts", request, false).await?;
        Ok(CommandReply::from_value(body))
    }

    async fn claim_trial(&self) -> Result<CommandReply, BackendError> {
        let body = self.invoke("claim-trial", &serde_json::json!({}), false).await?;
        Ok(CommandReply::from_value(body))
    }
}
