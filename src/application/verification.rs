use crate::domain::PlatformIdentity;
use crate::infrastructure::{CredentialVerifier, TokenFingerprint, VerificationError};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub enum VerificationState {
    #[default]
    Unverified,
    Verifying,
    Verified(PlatformIdentity),
    Rejected(VerificationError),
}

/// Handle for one verification attempt. Only the most recent ticket may
/// complete; older ones are dropped on arrival.
#[derive(Debug)]
pub struct VerificationTicket {
    sequence: u64,
    token: String,
    fingerprint: TokenFingerprint,
}

impl VerificationTicket {
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Verification state of the token in one add-account form session.
///
/// A verified result is bound to the fingerprint of the token that was
/// checked, so editing the token afterwards loses the verification.
#[derive(Debug, Default)]
pub struct TokenVerification {
    state: VerificationState,
    fingerprint: Option<TokenFingerprint>,
    sequence: u64,
}

impl TokenVerification {
    pub fn state(&self) -> &VerificationState {
        &self.state
    }

    pub fn is_verifying(&self) -> bool {
        self.state == VerificationState::Verifying
    }

    /// Start an attempt. A blank token resets to `Unverified` and yields no
    /// ticket, so nothing is sent.
    pub fn begin(&mut self, token: &str) -> Option<VerificationTicket> {
        self.sequence += 1;
        let token = token.trim();
        if token.is_empty() {
            self.state = VerificationState::Unverified;
            self.fingerprint = None;
            return None;
        }

        let fingerprint = TokenFingerprint::of(token);
        self.state = VerificationState::Verifying;
        self.fingerprint = Some(fingerprint.clone());
        Some(VerificationTicket {
            sequence: self.sequence,
            token: token.to_string(),
            fingerprint,
        })
    }

    /// Apply the result of `ticket`. Returns false when a newer attempt or a
    /// reset superseded it.
    pub fn complete(
        &mut self,
        ticket: VerificationTicket,
        result: Result<PlatformIdentity, VerificationError>,
    ) -> bool {
        if ticket.sequence != self.sequence {
            debug!(token = %ticket.fingerprint, "Dropping superseded verification result");
            return false;
        }

        self.state = match result {
            Ok(identity) => {
                info!(token = %ticket.fingerprint, username = %identity.username, "Token verified");
                VerificationState::Verified(identity)
            }
            Err(e) => {
                warn!(token = %ticket.fingerprint, error = %e, "Token verification failed");
                VerificationState::Rejected(e)
            }
        };
        true
    }

    pub fn reset(&mut self) {
        self.sequence += 1;
        self.state = VerificationState::Unverified;
        self.fingerprint = None;
    }

    /// Identity for `token`, only if this exact token was verified.
    pub fn identity_for(&self, token: &str) -> Option<&PlatformIdentity> {
        match (&self.state, &self.fingerprint) {
            (VerificationState::Verified(identity), Some(fp)) if fp.matches(token) => Some(identity),
            _ => None,
        }
    }

    pub async fn verify<V>(&mut self, verifier: &V, token: &str, limit: Duration) -> &VerificationState
    where
        V: CredentialVerifier + ?Sized,
    {
        if let Some(ticket) = self.begin(token) {
            let result = match timeout(limit, verifier.verify_credential(ticket.token())).await {
                Ok(result) => result,
                Err(_) => Err(VerificationError::TimedOut(limit)),
            };
            self.complete(ticket, result);
        }
        &self.state
    }
}
