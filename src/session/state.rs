use crate::application::{
    AccountForm, CommandDispatcher, QueryCache, QueryError, QueryKey, QueryResult, VerificationState,
};
use crate::infrastructure::{
    AppConfig, CommandGateway, CredentialVerifier, PlatformClient, RecordStore, SupabaseBackend,
};
use crate::presentation::{AccountDetailsView, DashboardSnapshot, DashboardUiState, DashboardView, Notice};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub type HttpSession = DashboardSession<SupabaseBackend, SupabaseBackend, PlatformClient>;

/// One signed-in dashboard: the shared cache, the command dispatcher over
/// it, and the credential verifier used by the add-account form.
pub struct DashboardSession<S, G, V>
where
    S: RecordStore + 'static,
    G: CommandGateway,
    V: CredentialVerifier,
{
    cache: QueryCache<S>,
    dispatcher: CommandDispatcher<G, S>,
    verifier: Arc<V>,
    request_timeout: Duration,
}

impl<S, G, V> DashboardSession<S, G, V>
where
    S: RecordStore + 'static,
    G: CommandGateway,
    V: CredentialVerifier,
{
    pub fn new(store: Arc<S>, gateway: Arc<G>, verifier: Arc<V>, request_timeout: Duration) -> Self {
        let cache = QueryCache::new(store, request_timeout);
        let dispatcher = CommandDispatcher::new(gateway, cache.clone(), request_timeout);
        Self {
            cache,
            dispatcher,
            verifier,
            request_timeout,
        }
    }

    pub fn cache(&self) -> &QueryCache<S> {
        &self.cache
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<G, S> {
        &self.dispatcher
    }

    pub async fn verify_token<'a>(&self, form: &'a mut AccountForm) -> &'a VerificationState {
        form.verify_token(self.verifier.as_ref(), self.request_timeout)
            .await
    }

    /// Submit the add-account form and report the outcome as a notice.
    pub async fn create_account(&self, form: &mut AccountForm) -> Notice {
        match self.dispatcher.create_account(form).await {
            Ok(_) => Notice::account_created(),
            Err(e) => Notice::from_error(&e),
        }
    }

    pub async fn toggle_account(&self, account_id: Uuid) -> Notice {
        match self.dispatcher.toggle_account(account_id).await {
            Ok(_) => Notice::account_toggled(),
            Err(e) => Notice::from_error(&e),
        }
    }

    pub async fn remove_account(&self, account_id: Uuid) -> Notice {
        match self.dispatcher.remove_account(account_id).await {
            Ok(_) => Notice::account_removed(),
            Err(e) => Notice::from_error(&e),
        }
    }

    pub async fn claim_trial(&self) -> Notice {
        match self.dispatcher.claim_trial().await {
            Ok(claim) => Notice::trial_claimed(&claim),
            Err(e) => Notice::from_error(&e),
        }
    }

    /// Current cache contents for the dashboard. Reading may start
    /// background refetches for stale keys.
    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            accounts: self
                .cache
                .read(&QueryKey::Accounts)
                .and_then(QueryResult::into_accounts),
            stats: self.cache.read(&QueryKey::Stats).and_then(QueryResult::into_stats),
            access: self.cache.read(&QueryKey::Access).and_then(QueryResult::into_access),
        }
    }

    pub fn dashboard(&self, ui: &DashboardUiState, now: DateTime<Utc>) -> DashboardView {
        DashboardView::build(&self.snapshot(), ui, now)
    }

    /// Wait for fresh accounts, stats and access. On failure the cache keeps
    /// the previous value of the failed key.
    pub async fn refresh(&self) -> Result<DashboardSnapshot, QueryError> {
        let (accounts, stats, access) = tokio::join!(
            self.cache.fetch(&QueryKey::Accounts),
            self.cache.fetch(&QueryKey::Stats),
            self.cache.fetch(&QueryKey::Access),
        );
        Ok(DashboardSnapshot {
            accounts: accounts?.into_accounts(),
            stats: stats?.into_stats(),
            access: access?.into_access(),
        })
    }

    /// Details for an account in the cached list; `None` if it is not there.
    pub fn account_details(&self, account_id: Uuid, now: DateTime<Utc>) -> Option<AccountDetailsView> {
        let accounts = self
            .cache
            .get(&QueryKey::Accounts)
            .and_then(QueryResult::into_accounts)?;
        let account = accounts.iter().find(|a| a.id == account_id)?;
        let activity = self
            .cache
            .read(&QueryKey::Activity(account_id))
            .and_then(QueryResult::into_activity);
        Some(AccountDetailsView::build(account, activity.as_ref(), now))
    }
}

/// Build an HTTP-backed session from config.
pub fn build_session(config: &AppConfig) -> anyhow::Result<HttpSession> {
    let backend = Arc::new(SupabaseBackend::new(config).context("init backend client")?);
    let verifier = Arc::new(PlatformClient::new(config).context("init platform client")?);
    Ok(DashboardSession::new(
        backend.clone(),
        backend,
        verifier,
        config.request_timeout(),
    ))
}

pub fn build_session_from_env() -> anyhow::Result<HttpSession> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().context("load config")?;
    build_session(&config)
}
