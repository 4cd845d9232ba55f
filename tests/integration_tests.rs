//! Integration tests for relay-deck
//! Covers cache refetch behaviour, command dispatch, token verification gating
//! and the dashboard views built on top of a live session.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use mockall::mock;
use relay_deck::{
    application::{AccountForm, DispatchError, QueryError, QueryKey, QueryResult, TrialClaim, VerificationState},
    domain::{
        AccessGrant, Account, AccountActivity, AccountStatus, MessageLogEntry, PlatformIdentity, StatsReport,
    },
    infrastructure::{
        BackendError, CommandGateway, CommandReply, CredentialVerifier, ManageAccountsRequest, RecordStore,
        VerificationError,
    },
    presentation::{DashboardUiState, Notice, CLAIM_TRIAL_PROMPT},
    session::DashboardSession,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

// ============================================================================
// Mock Backend for Testing
// ============================================================================

/// In-memory backend implementing both the record store and the command
/// gateway. Queries snapshot state when they start, then wait out a delay,
/// like a server answering with the state it saw on arrival.
#[derive(Clone, Default)]
struct MockBackend {
    accounts: Arc<Mutex<Vec<Account>>>,
    grant: Arc<Mutex<Option<AccessGrant>>>,
    activity: Arc<Mutex<AccountActivity>>,
    account_fetches: Arc<AtomicUsize>,
    accounts_in_flight: Arc<AtomicUsize>,
    peak_account_fetches: Arc<AtomicUsize>,
    fetch_delays: Arc<Mutex<VecDeque<Duration>>>,
    commands: Arc<Mutex<Vec<&'static str>>>,
    command_delay: Arc<Mutex<Option<Duration>>>,
    command_failure: Arc<Mutex<Option<BackendError>>>,
    query_failure: Arc<Mutex<Option<BackendError>>>,
    trial_reply: Arc<Mutex<Option<Result<CommandReply, BackendError>>>>,
}

const DEFAULT_FETCH_DELAY: Duration = Duration::from_millis(20);

impl MockBackend {
    fn with_accounts(accounts: Vec<Account>) -> Self {
        let backend = Self::default();
        *backend.accounts.lock().unwrap() = accounts;
        backend
    }

    fn account_fetches(&self) -> usize {
        self.account_fetches.load(Ordering::SeqCst)
    }

    /// Most account fetches that were ever running at the same time.
    fn peak_account_fetches(&self) -> usize {
        self.peak_account_fetches.load(Ordering::SeqCst)
    }

    fn commands(&self) -> Vec<&'static str> {
        self.commands.lock().unwrap().clone()
    }

    fn queue_fetch_delay(&self, delay: Duration) {
        self.fetch_delays.lock().unwrap().push_back(delay);
    }

    fn fail_commands(&self, err: BackendError) {
        *self.command_failure.lock().unwrap() = Some(err);
    }

    fn fail_queries(&self, err: BackendError) {
        *self.query_failure.lock().unwrap() = Some(err);
    }

    fn query_result<T>(&self, value: T) -> Result<T, BackendError> {
        match self.query_failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }

    fn next_delay(&self) -> Duration {
        self.fetch_delays
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(DEFAULT_FETCH_DELAY)
    }
}

#[async_trait]
impl RecordStore for MockBackend {
    async fn list_accounts(&self) -> Result<Vec<Account>, BackendError> {
        self.account_fetches.fetch_add(1, Ordering::SeqCst);
        let running = self.accounts_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_account_fetches.fetch_max(running, Ordering::SeqCst);

        let snapshot = self.accounts.lock().unwrap().clone();
        let delay = self.next_delay();
        tokio::time::sleep(delay).await;
        self.accounts_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.query_result(snapshot)
    }

    async fn fetch_stats(&self) -> Result<StatsReport, BackendError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.query_result(StatsReport::default())
    }

    async fn fetch_access_grant(&self) -> Result<Option<AccessGrant>, BackendError> {
        let grant = self.grant.lock().unwrap().clone();
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.query_result(grant)
    }

    async fn list_account_activity(&self, _account_id: Uuid) -> Result<AccountActivity, BackendError> {
        let activity = self.activity.lock().unwrap().clone();
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.query_result(activity)
    }
}

#[async_trait]
impl CommandGateway for MockBackend {
    async fn manage_accounts(&self, request: &ManageAccountsRequest) -> Result<CommandReply, BackendError> {
        self.commands.lock().unwrap().push(request.action());

        let delay = *self.command_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.command_failure.lock().unwrap().clone() {
            return Err(err);
        }

        let mut accounts = self.accounts.lock().unwrap();
        match request {
            ManageAccountsRequest::Create { account_data } => {
                let settings = &account_data.settings;
                accounts.insert(
                    0,
                    Account {
                        id: Uuid::new_v4(),
                        username: account_data.username.clone(),
                        avatar_url: Some(account_data.avatar_url.clone()),
                        active: true,
                        token_valid: true,
                        channel_ids: settings.channel_ids.clone(),
                        interval: settings.interval,
                        message: settings.message.clone(),
                        guild_id: settings.guild_id.clone(),
                        channel_name: settings.channel_name.clone(),
                        dm_reply: settings.dm_reply.clone(),
                        last_sent: None,
                        messages_sent: 0,
                        created_at: Utc::now(),
                    },
                );
            }
            ManageAccountsRequest::Toggle { account_id } => {
                if let Some(account) = accounts.iter_mut().find(|a| a.id == *account_id) {
                    account.active = !account.active;
                }
            }
            ManageAccountsRequest::Delete { account_id } => {
                accounts.retain(|a| a.id != *account_id);
            }
        }

        Ok(CommandReply {
            message: Some("ok".to_string()),
        })
    }

    async fn claim_trial(&self) -> Result<CommandReply, BackendError> {
        self.commands.lock().unwrap().push("claim-trial");
        self.trial_reply
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(CommandReply::default()))
    }
}

mock! {
    pub Verifier {}

    #[async_trait]
    impl CredentialVerifier for Verifier {
        async fn verify_credential(&self, token: &str) -> Result<PlatformIdentity, VerificationError>;
    }
}

type TestSession = DashboardSession<MockBackend, MockBackend, MockVerifier>;

// ============================================================================
// Helper Functions
// ============================================================================

const TEST_TOKEN: &str = "MTA1.test.token";

fn create_test_account(active: bool, token_valid: bool) -> Account {
    Account {
        id: Uuid::new_v4(),
        username: "relay#0042".to_string(),
        avatar_url: None,
        active,
        token_valid,
        channel_ids: vec![123456789, 987654321],
        interval: 60,
        message: "Hello from the relay".to_string(),
        guild_id: None,
        channel_name: None,
        dm_reply: None,
        last_sent: None,
        messages_sent: 0,
        created_at: Utc::now(),
    }
}

fn create_test_grant() -> AccessGrant {
    let now = Utc::now();
    AccessGrant {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        is_trial: true,
        granted_at: now,
        expires_at: Some(now + ChronoDuration::hours(24)),
        trial_claimed_at: Some(now),
        max_accounts: 3,
        max_channel_names: 1,
    }
}

fn test_identity() -> PlatformIdentity {
    PlatformIdentity {
        user_id: "42".to_string(),
        username: "relay#0042".to_string(),
        avatar_url: "https://cdn.discordapp.com/embed/avatars/2.png".to_string(),
    }
}

fn accepting_verifier() -> MockVerifier {
    let mut verifier = MockVerifier::new();
    verifier
        .expect_verify_credential()
        .returning(|_| Ok(test_identity()));
    verifier
}

fn rejecting_verifier() -> MockVerifier {
    let mut verifier = MockVerifier::new();
    verifier
        .expect_verify_credential()
        .returning(|_| Err(VerificationError::Rejected));
    verifier
}

fn create_session(backend: &MockBackend, verifier: MockVerifier) -> TestSession {
    create_session_with_timeout(backend, verifier, Duration::from_secs(5))
}

fn create_session_with_timeout(backend: &MockBackend, verifier: MockVerifier, timeout: Duration) -> TestSession {
    let backend = Arc::new(backend.clone());
    DashboardSession::new(backend.clone(), backend, Arc::new(verifier), timeout)
}

fn filled_form() -> AccountForm {
    let mut form = AccountForm::new();
    form.acknowledge_warning();
    form.set_token(TEST_TOKEN);
    let draft = form.draft_mut();
    draft.message = "Daily update".to_string();
    draft.channels = "123456789, 987654321".to_string();
    draft.interval = "60".to_string();
    form
}

async fn cached_accounts(session: &TestSession) -> Vec<Account> {
    session
        .cache()
        .fetch(&QueryKey::Accounts)
        .await
        .expect("Failed to fetch accounts")
        .into_accounts()
        .expect("Accounts key holds accounts")
}

// ============================================================================
// Test Cases
// ============================================================================

#[test]
fn test_account_status_labels() {
    assert_eq!(create_test_account(true, true).status(), AccountStatus::Online);
    assert_eq!(create_test_account(false, true).status(), AccountStatus::Paused);
    assert_eq!(create_test_account(true, false).status(), AccountStatus::InvalidToken);
    assert_eq!(create_test_account(false, false).status(), AccountStatus::InvalidToken);
    assert_eq!(AccountStatus::InvalidToken.to_string(), "Invalid Token");
}

#[tokio::test]
async fn test_validation_errors_make_no_calls() {
    let backend = MockBackend::default();
    let session = create_session(&backend, accepting_verifier());

    let cases = [
        ("interval", "29"),
        ("message", ""),
        ("channels", ""),
    ];

    for (field, value) in cases {
        let mut form = filled_form();
        session.verify_token(&mut form).await;
        match field {
            "interval" => form.draft_mut().interval = value.to_string(),
            "message" => form.draft_mut().message = value.to_string(),
            _ => form.draft_mut().channels = value.to_string(),
        }

        let err = assert_err!(session.dispatcher().create_account(&mut form).await);
        match &err {
            DispatchError::Validation { field: reported, .. } => assert_eq!(*reported, field),
            other => panic!("Expected validation error for {}, got {:?}", field, other),
        }
        assert!(err.is_local());
    }

    let mut form = filled_form();
    session.verify_token(&mut form).await;
    form.draft_mut().message = "x".repeat(2001);
    assert!(matches!(
        session.dispatcher().create_account(&mut form).await,
        Err(DispatchError::Validation { field: "message", .. })
    ));

    assert!(backend.commands().is_empty());
}

#[tokio::test]
async fn test_unverified_token_is_a_precondition_error() {
    let backend = MockBackend::default();
    let session = create_session(&backend, accepting_verifier());

    let mut form = filled_form();
    let err = assert_err!(session.dispatcher().create_account(&mut form).await);
    assert!(matches!(err, DispatchError::Precondition(_)));

    // Verified, then edited: the new token was never checked.
    session.verify_token(&mut form).await;
    form.draft_mut().token = "MTA1.other.token".to_string();
    let err = assert_err!(session.dispatcher().create_account(&mut form).await);
    assert!(matches!(err, DispatchError::Precondition(_)));

    assert!(backend.commands().is_empty());
}

#[tokio::test]
async fn test_rejected_token_blocks_creation() {
    let backend = MockBackend::default();
    let session = create_session(&backend, rejecting_verifier());

    let mut form = filled_form();
    let state = session.verify_token(&mut form).await;
    assert_eq!(state, &VerificationState::Rejected(VerificationError::Rejected));

    let err = assert_err!(session.dispatcher().create_account(&mut form).await);
    assert!(matches!(err, DispatchError::Precondition(_)));
    assert!(backend.commands().is_empty());
}

#[tokio::test]
async fn test_verifier_called_once_per_verification() {
    let backend = MockBackend::default();
    let mut verifier = MockVerifier::new();
    verifier
        .expect_verify_credential()
        .times(1)
        .returning(|_| Ok(test_identity()));
    let session = create_session(&backend, verifier);

    let mut form = AccountForm::new();
    // Blank tokens are never sent.
    session.verify_token(&mut form).await;
    assert_eq!(form.verification().state(), &VerificationState::Unverified);

    form.set_token(TEST_TOKEN);
    let state = session.verify_token(&mut form).await;
    assert_eq!(state, &VerificationState::Verified(test_identity()));
}

#[tokio::test]
async fn test_create_account_invalidates_and_resets_form() {
    let backend = MockBackend::default();
    let session = create_session(&backend, accepting_verifier());
    assert!(cached_accounts(&session).await.is_empty());

    let mut form = filled_form();
    session.verify_token(&mut form).await;
    assert_ok!(session.dispatcher().create_account(&mut form).await);

    assert_eq!(backend.commands(), vec!["create"]);
    assert!(session.cache().is_stale(&QueryKey::Accounts));
    assert!(!form.warning_acknowledged());
    assert!(form.draft().token.is_empty());

    let accounts = cached_accounts(&session).await;
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].username, "relay#0042");
    assert_eq!(accounts[0].channel_ids, vec![123456789, 987654321]);
}

#[tokio::test]
async fn test_single_refetch_after_mutation() {
    let account = create_test_account(true, true);
    let account_id = account.id;
    let backend = MockBackend::with_accounts(vec![account]);
    let session = create_session(&backend, accepting_verifier());

    cached_accounts(&session).await;
    assert_eq!(backend.account_fetches(), 1);

    assert_ok!(session.dispatcher().toggle_account(account_id).await);
    assert!(session.cache().is_stale(&QueryKey::Accounts));

    let cache = session.cache();
    let (first, second, stale) = tokio::join!(
        cache.fetch(&QueryKey::Accounts),
        cache.fetch(&QueryKey::Accounts),
        async { cache.read(&QueryKey::Accounts) },
    );

    assert_eq!(backend.account_fetches(), 2);
    let first = first.expect("first fetch").into_accounts().unwrap();
    let second = second.expect("second fetch").into_accounts().unwrap();
    assert_eq!(first, second);
    assert!(!first[0].active);

    // The stale read returned the previous value immediately.
    let stale = stale.and_then(QueryResult::into_accounts).unwrap();
    assert!(stale[0].active);

    // Fresh now: reads do not refetch.
    cache.read(&QueryKey::Accounts);
    cached_accounts(&session).await;
    assert_eq!(backend.account_fetches(), 2);
}

/// Two waiting readers and one stale read after a command: one request.
async fn assert_single_refetch(session: &TestSession, backend: &MockBackend) {
    let before = backend.account_fetches();
    let cache = session.cache();
    let (first, second, stale) = tokio::join!(
        cache.fetch(&QueryKey::Accounts),
        cache.fetch(&QueryKey::Accounts),
        async { cache.read(&QueryKey::Accounts) },
    );
    assert_ok!(first);
    assert_ok!(second);
    assert!(stale.is_some());
    assert_eq!(backend.account_fetches(), before + 1);
}

#[tokio::test]
async fn test_each_command_refetches_once() {
    let backend = MockBackend::default();
    *backend.grant.lock().unwrap() = Some(create_test_grant());
    let session = create_session(&backend, accepting_verifier());
    cached_accounts(&session).await;

    let mut form = filled_form();
    session.verify_token(&mut form).await;
    let notice = session.create_account(&mut form).await;
    assert_eq!(notice, Notice::account_created());
    assert_single_refetch(&session, &backend).await;

    let account_id = cached_accounts(&session).await[0].id;
    let notice = session.toggle_account(account_id).await;
    assert_eq!(notice, Notice::account_toggled());
    assert_single_refetch(&session, &backend).await;

    let notice = session.claim_trial().await;
    assert_eq!(notice.title, "Trial Activated!");
    assert!(!notice.is_error());
    assert!(session.cache().is_stale(&QueryKey::Access));
    assert_single_refetch(&session, &backend).await;

    let notice = session.remove_account(account_id).await;
    assert_eq!(notice, Notice::account_removed());
    assert_single_refetch(&session, &backend).await;
    assert!(cached_accounts(&session).await.is_empty());

    assert_eq!(backend.commands(), vec!["create", "toggle", "claim-trial", "delete"]);
    assert_eq!(backend.peak_account_fetches(), 1);
}

#[tokio::test]
async fn test_failed_command_reports_error_notice() {
    let backend = MockBackend::with_accounts(vec![create_test_account(true, true)]);
    let session = create_session(&backend, accepting_verifier());
    let account_id = cached_accounts(&session).await[0].id;

    backend.fail_commands(BackendError::RequestFailed("connection reset".to_string()));
    let notice = session.toggle_account(account_id).await;
    assert!(notice.is_error());
    assert!(notice.description.contains("connection reset"));

    // Local validation failures surface the same way, without a request.
    let mut form = filled_form();
    session.verify_token(&mut form).await;
    form.draft_mut().interval = "5".to_string();
    assert!(session.create_account(&mut form).await.is_error());
    assert_eq!(backend.commands(), vec!["toggle"]);
}

#[tokio::test]
async fn test_rapid_toggles_end_with_last_server_state() {
    let account = create_test_account(true, true);
    let account_id = account.id;
    let backend = MockBackend::with_accounts(vec![account]);
    let session = create_session(&backend, accepting_verifier());
    cached_accounts(&session).await;

    let dispatcher = session.dispatcher();
    let (a, b) = tokio::join!(
        dispatcher.toggle_account(account_id),
        dispatcher.toggle_account(account_id)
    );
    assert_ok!(a);
    assert_ok!(b);
    assert_eq!(backend.commands(), vec!["toggle", "toggle"]);

    let accounts = cached_accounts(&session).await;
    assert!(accounts[0].active);
}

#[tokio::test]
async fn test_superseded_fetch_reloads_in_place() {
    let account = create_test_account(true, true);
    let account_id = account.id;
    let backend = MockBackend::with_accounts(vec![account]);
    let session = create_session(&backend, accepting_verifier());
    cached_accounts(&session).await;

    // First toggle, then a slow refetch that sees the paused account.
    assert_ok!(session.dispatcher().toggle_account(account_id).await);
    backend.queue_fetch_delay(Duration::from_millis(80));
    session.cache().read(&QueryKey::Accounts);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(session.cache().is_fetching(&QueryKey::Accounts));

    // Second toggle while it runs: readers join the running fetch, which
    // throws its result away and loads again.
    assert_ok!(session.dispatcher().toggle_account(account_id).await);
    backend.queue_fetch_delay(Duration::from_millis(5));
    session.cache().read(&QueryKey::Accounts);
    assert_eq!(backend.account_fetches(), 2);

    let accounts = cached_accounts(&session).await;
    assert!(accounts[0].active);
    assert_eq!(backend.account_fetches(), 3);
    assert_eq!(backend.peak_account_fetches(), 1);
    assert!(!session.cache().is_fetching(&QueryKey::Accounts));
}

#[tokio::test]
async fn test_invalidations_during_fetch_keep_one_request_on_the_wire() {
    let backend = MockBackend::with_accounts(vec![create_test_account(true, true)]);
    let session = create_session(&backend, accepting_verifier());
    let cache = session.cache();
    cached_accounts(&session).await;

    for _ in 0..4 {
        backend.queue_fetch_delay(Duration::from_millis(100));
    }
    cache.invalidate(&QueryKey::Accounts);
    cache.read(&QueryKey::Accounts);
    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.invalidate(&QueryKey::Accounts);
        assert!(cache.read(&QueryKey::Accounts).is_some());
    }

    assert_ok!(cache.fetch(&QueryKey::Accounts).await);
    assert_eq!(backend.peak_account_fetches(), 1);
    // Initial load, the interrupted one, then a single reload.
    assert_eq!(backend.account_fetches(), 3);
    assert!(!cache.is_stale(&QueryKey::Accounts));
}

#[tokio::test]
async fn test_remote_error_leaves_cache_intact() {
    let account = create_test_account(true, true);
    let account_id = account.id;
    let backend = MockBackend::with_accounts(vec![account]);
    let session = create_session(&backend, accepting_verifier());
    let before = cached_accounts(&session).await;

    backend.fail_commands(BackendError::Remote {
        status: 403,
        message: "No active access for this user".to_string(),
    });
    let err = assert_err!(session.dispatcher().toggle_account(account_id).await);
    assert!(matches!(err, DispatchError::Remote { .. }));
    assert!(err.suggests_missing_access());
    assert_eq!(Notice::from_error(&err).description, CLAIM_TRIAL_PROMPT);

    assert!(!session.cache().is_stale(&QueryKey::Accounts));
    assert_eq!(
        session
            .cache()
            .get(&QueryKey::Accounts)
            .and_then(QueryResult::into_accounts),
        Some(before)
    );
}

#[tokio::test]
async fn test_transport_failure_is_a_network_error() {
    let account = create_test_account(true, true);
    let account_id = account.id;
    let backend = MockBackend::with_accounts(vec![account]);
    let session = create_session(&backend, accepting_verifier());

    backend.fail_commands(BackendError::RequestFailed("connection reset".to_string()));
    let err = assert_err!(session.dispatcher().remove_account(account_id).await);
    assert_eq!(err, DispatchError::Network("connection reset".to_string()));
    assert!(!err.is_local());
}

#[tokio::test]
async fn test_command_timeout_is_remote_error() {
    let account = create_test_account(true, true);
    let account_id = account.id;
    let backend = MockBackend::with_accounts(vec![account]);
    *backend.command_delay.lock().unwrap() = Some(Duration::from_millis(200));
    let session = create_session_with_timeout(&backend, accepting_verifier(), Duration::from_millis(50));

    match session.dispatcher().toggle_account(account_id).await {
        Err(DispatchError::Remote { message }) => assert!(message.contains("timed out")),
        other => panic!("Expected remote timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_refetch_keeps_previous_value() {
    let backend = MockBackend::with_accounts(vec![create_test_account(true, true)]);
    let session = create_session(&backend, accepting_verifier());
    let before = cached_accounts(&session).await;

    session.cache().invalidate(&QueryKey::Accounts);
    backend.fail_queries(BackendError::Remote {
        status: 500,
        message: "boom".to_string(),
    });

    let err = assert_err!(session.cache().fetch(&QueryKey::Accounts).await);
    assert!(matches!(err, QueryError::Backend(BackendError::Remote { status: 500, .. })));
    assert!(session.cache().last_error(&QueryKey::Accounts).is_some());
    assert_eq!(
        session
            .cache()
            .get(&QueryKey::Accounts)
            .and_then(QueryResult::into_accounts),
        Some(before)
    );
}

#[tokio::test]
async fn test_claim_trial_invalidates_access() {
    let backend = MockBackend::default();
    let session = create_session(&backend, accepting_verifier());

    let snapshot = assert_ok!(session.refresh().await);
    assert_eq!(snapshot.access, Some(None));
    assert!(session.dashboard(&DashboardUiState::default(), Utc::now()).show_trial_banner);

    *backend.grant.lock().unwrap() = Some(create_test_grant());
    let claim = assert_ok!(session.dispatcher().claim_trial().await);
    assert_eq!(claim, TrialClaim::Granted { message: None });
    assert!(session.cache().is_stale(&QueryKey::Access));

    assert_ok!(session.refresh().await);
    let view = session.dashboard(&DashboardUiState::default(), Utc::now());
    assert!(!view.show_trial_banner);
    assert!(view.can_add_account);
}

#[tokio::test]
async fn test_claim_trial_already_granted() {
    let backend = MockBackend::default();
    *backend.trial_reply.lock().unwrap() = Some(Err(BackendError::Remote {
        status: 400,
        message: "Trial already claimed".to_string(),
    }));
    let session = create_session(&backend, accepting_verifier());

    let claim = assert_ok!(session.dispatcher().claim_trial().await);
    assert_eq!(
        claim,
        TrialClaim::AlreadyGranted {
            message: "Trial already claimed".to_string()
        }
    );
    assert_eq!(backend.commands(), vec!["claim-trial"]);
}

#[tokio::test]
async fn test_remove_account_drops_activity() {
    let account = create_test_account(true, true);
    let account_id = account.id;
    let backend = MockBackend::with_accounts(vec![account]);
    *backend.activity.lock().unwrap() = AccountActivity {
        messages: vec![MessageLogEntry {
            id: Uuid::new_v4(),
            account_id,
            channel_id: 123456789,
            message: "Hello from the relay".to_string(),
            success: true,
            error: None,
            message_id: Some(1),
            created_at: Utc::now() - ChronoDuration::minutes(5),
        }],
        errors: vec![],
    };
    let session = create_session(&backend, accepting_verifier());
    cached_accounts(&session).await;

    let activity_key = QueryKey::Activity(account_id);
    assert_ok!(session.cache().fetch(&activity_key).await);
    let details = session
        .account_details(account_id, Utc::now())
        .expect("account is cached");
    assert_eq!(details.recent_messages.unwrap()[0].time_label, "5m ago");

    assert_ok!(session.dispatcher().remove_account(account_id).await);
    assert!(session.cache().get(&activity_key).is_none());
    assert!(cached_accounts(&session).await.is_empty());
    assert!(session.account_details(account_id, Utc::now()).is_none());
}

#[tokio::test]
async fn test_dashboard_relative_times() {
    let now = Utc::now();
    let mut recent = create_test_account(true, true);
    recent.last_sent = Some(now - ChronoDuration::seconds(90));
    let mut older = create_test_account(true, true);
    older.last_sent = Some(now - ChronoDuration::minutes(45));
    let mut oldest = create_test_account(false, true);
    oldest.last_sent = Some(now - ChronoDuration::hours(26));
    let never = create_test_account(false, false);

    let backend = MockBackend::with_accounts(vec![recent, older, oldest, never]);
    *backend.grant.lock().unwrap() = Some(create_test_grant());
    let session = create_session(&backend, accepting_verifier());

    // Nothing loaded yet; the read starts the fetches.
    assert!(session.dashboard(&DashboardUiState::default(), now).loading);
    assert_ok!(session.refresh().await);

    let view = session.dashboard(&DashboardUiState::default(), now);
    let labels: Vec<_> = view.cards.iter().map(|c| c.last_sent_label.as_str()).collect();
    assert_eq!(labels, vec!["1m ago", "45m ago", "1d ago", "Never"]);
    assert_eq!(view.active_now, 2);
    assert_eq!(view.total_accounts, 4);
    assert!(!view.can_add_account);
    assert!(!view.cards[3].toggle_enabled);
}

#[test]
fn test_dashboard_outside_runtime_reports_loading() {
    let backend = MockBackend::with_accounts(vec![create_test_account(true, true)]);
    let session = create_session(&backend, accepting_verifier());

    let view = session.dashboard(&DashboardUiState::default(), Utc::now());
    assert!(view.loading);
    assert!(!session.cache().is_fetching(&QueryKey::Accounts));
    assert_eq!(backend.account_fetches(), 0);
}
