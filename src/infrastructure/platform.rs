use crate::domain::{PlatformIdentity, PlatformUserResponse};
use crate::infrastructure::AppConfig;
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::TokenFingerprint;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerificationError {
    #[error("Token rejected by the platform")]
    Rejected,
    #[error("Verification request failed: {0}")]
    RequestFailed(String),
    #[error("Verification timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Confirms a credential against the platform's "current user" endpoint.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify_credential(&self, token: &str) -> Result<PlatformIdentity, VerificationError>;
}

pub struct PlatformClient {
    client: Client,
    api_url: String,
    cdn_url: String,
}

impl PlatformClient {
    pub fn new(config: &AppConfig) -> Result<Self, VerificationError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| VerificationError::RequestFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.platform_api_url.trim_end_matches('/').to_string(),
            cdn_url: config.platform_cdn_url.clone(),
        })
    }
}

#[async_trait]
impl CredentialVerifier for PlatformClient {
    async fn verify_credential(&self, token: &str) -> Result<PlatformIdentity, VerificationError> {
        let fingerprint = TokenFingerprint::of(token);
        // The platform expects the raw token, without a scheme prefix.
        let auth = header::HeaderValue::from_str(token.trim()).map_err(|_| VerificationError::Rejected)?;

        let resp = self
            .client
            .get(format!("{}/users/@me", self.api_url))
            .header(header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| VerificationError::RequestFailed(e.to_string()))?;

        match resp.status() {
            status if status.is_success() => {
                let user: PlatformUserResponse = resp
                    .json()
                    .await
                    .map_err(|e| VerificationError::InvalidResponse(e.to_string()))?;
                debug!(token = %fingerprint, user_id = %user.id, "Token verified");
                Ok(PlatformIdentity::from_user_response(user, &self.cdn_url))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(token = %fingerprint, "Token rejected by platform");
                Err(VerificationError::Rejected)
            }
            status => {
                warn!(token = %fingerprint, status = status.as_u16(), "Unexpected verification status");
                Err(VerificationError::RequestFailed(format!(
                    "Unexpected status {}",
                    status.as_u16()
                )))
            }
        }
    }
}
