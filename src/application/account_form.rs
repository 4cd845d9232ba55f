use crate::application::{DispatchError, TokenVerification, VerificationState};
use crate::domain::{AccountDraft, NewAccount};
use crate::infrastructure::CredentialVerifier;
use std::time::Duration;

/// Ephemeral state of the add-account dialog: field values, the token
/// verification, and whether the security warning was acknowledged.
#[derive(Debug, Default)]
pub struct AccountForm {
    draft: AccountDraft,
    verification: TokenVerification,
    warning_acknowledged: bool,
}

impl AccountForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &AccountDraft {
        &self.draft
    }

    /// Free access to the fields. Editing the token here is safe: the
    /// verification only applies to the exact token that was checked.
    pub fn draft_mut(&mut self) -> &mut AccountDraft {
        &mut self.draft
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        let token = token.into();
        if token.trim() != self.draft.token.trim() {
            self.verification.reset();
        }
        self.draft.token = token;
    }

    pub fn verification(&self) -> &TokenVerification {
        &self.verification
    }

    pub fn verification_mut(&mut self) -> &mut TokenVerification {
        &mut self.verification
    }

    pub fn warning_acknowledged(&self) -> bool {
        self.warning_acknowledged
    }

    pub fn acknowledge_warning(&mut self) {
        self.warning_acknowledged = true;
    }

    /// Closing the dialog re-arms the warning but keeps typed values.
    pub fn cancel(&mut self) {
        self.warning_acknowledged = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub async fn verify_token<V>(&mut self, verifier: &V, limit: Duration) -> &VerificationState
    where
        V: CredentialVerifier + ?Sized,
    {
        let token = self.draft.token.clone();
        self.verification.verify(verifier, &token, limit).await
    }

    /// Build the create payload. Fails locally, before any request, when the
    /// warning is unacknowledged, a field is invalid, or the token in the
    /// form was not verified.
    pub fn submission(&self) -> Result<NewAccount, DispatchError> {
        if !self.warning_acknowledged {
            return Err(DispatchError::Precondition(
                "Acknowledge the security warning first".to_string(),
            ));
        }

        let settings = self.draft.validate()?;
        let identity = self
            .verification
            .identity_for(&settings.user_token)
            .ok_or_else(|| DispatchError::Precondition("Please validate your token first".to_string()))?;

        Ok(settings.with_identity(identity))
    }

    pub fn can_submit(&self) -> bool {
        self.submission().is_ok()
    }
}
