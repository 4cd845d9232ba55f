use crate::domain::{AccessGrant, Account, AccountActivity, StatsReport};
use crate::infrastructure::{BackendError, RecordStore};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifier under which a remote result is cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Accounts,
    Stats,
    Access,
    Activity(Uuid),
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Accounts => f.write_str("accounts"),
            QueryKey::Stats => f.write_str("stats"),
            QueryKey::Access => f.write_str("access"),
            QueryKey::Activity(id) => write!(f, "activity:{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Accounts(Vec<Account>),
    Stats(StatsReport),
    /// `None` means the user has no grant, which is different from "not loaded".
    Access(Option<AccessGrant>),
    Activity(AccountActivity),
}

impl QueryResult {
    pub fn into_accounts(self) -> Option<Vec<Account>> {
        match self {
            QueryResult::Accounts(accounts) => Some(accounts),
            _ => None,
        }
    }

    pub fn into_stats(self) -> Option<StatsReport> {
        match self {
            QueryResult::Stats(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn into_access(self) -> Option<Option<AccessGrant>> {
        match self {
            QueryResult::Access(grant) => Some(grant),
            _ => None,
        }
    }

    pub fn into_activity(self) -> Option<AccountActivity> {
        match self {
            QueryResult::Activity(activity) => Some(activity),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Query timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Query was abandoned before completing")]
    Abandoned,
}

/// After a failed load, `read` waits this long before trying again.
/// `fetch` and `invalidate` are not affected.
pub const FAILED_READ_COOLDOWN: Duration = Duration::from_secs(5);

type Outcome = Result<QueryResult, QueryError>;

struct CacheEntry {
    value: Option<QueryResult>,
    stale: bool,
    generation: u64,
    /// Outcome of the one load running for this key.
    in_flight: Option<watch::Receiver<Option<Outcome>>>,
    last_error: Option<QueryError>,
    failed_at: Option<Instant>,
    updated_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    fn new(generation: u64) -> Self {
        Self {
            value: None,
            stale: false,
            generation,
            in_flight: None,
            last_error: None,
            failed_at: None,
            updated_at: None,
        }
    }

    fn needs_fetch(&self) -> bool {
        self.value.is_none() || self.stale
    }

    fn cooling_down(&self) -> bool {
        self.failed_at
            .is_some_and(|at| at.elapsed() < FAILED_READ_COOLDOWN)
    }
}

/// What the load task does after a load returns.
enum Settled {
    Done(Outcome),
    /// The key moved to a newer generation and still wants data.
    Reload(u64),
}

struct CacheInner<S> {
    store: Arc<S>,
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
    generations: AtomicU64,
    request_timeout: Duration,
    updates: broadcast::Sender<QueryKey>,
}

/// Stale-while-revalidate cache over a [`RecordStore`].
///
/// Each key has at most one fetch in flight; concurrent readers share it.
/// `set` and `invalidate` move the key to a new generation. A fetch that
/// started under an older generation finishes but never writes its result;
/// after an invalidation it loads again in the same task. The map lock is
/// never held across an await.
pub struct QueryCache<S: RecordStore + 'static> {
    inner: Arc<CacheInner<S>>,
}

impl<S: RecordStore + 'static> Clone for QueryCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RecordStore + 'static> CacheInner<S> {
    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn entry<'a>(
        &self,
        entries: &'a mut HashMap<QueryKey, CacheEntry>,
        key: &QueryKey,
    ) -> &'a mut CacheEntry {
        entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(self.next_generation()))
    }

    fn notify(&self, key: &QueryKey) {
        // No subscribers is fine.
        let _ = self.updates.send(key.clone());
    }

    async fn load(&self, key: &QueryKey) -> Outcome {
        let store = &self.store;
        let request = async {
            match key {
                QueryKey::Accounts => store.list_accounts().await.map(QueryResult::Accounts),
                QueryKey::Stats => store.fetch_stats().await.map(QueryResult::Stats),
                QueryKey::Access => store.fetch_access_grant().await.map(QueryResult::Access),
                QueryKey::Activity(id) => store
                    .list_account_activity(*id)
                    .await
                    .map(QueryResult::Activity),
            }
        };

        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result.map_err(QueryError::from),
            Err(_) => Err(QueryError::TimedOut(self.request_timeout)),
        }
    }

    /// Apply a finished load. A load from an older generation never writes;
    /// if the key is still stale the same task loads again, otherwise the
    /// waiters get the value that superseded it.
    fn settle(&self, key: &QueryKey, generation: u64, outcome: Outcome) -> Settled {
        let applied = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(key) else {
                debug!(key = %key, "Entry removed while fetching, dropping result");
                return Settled::Done(Err(QueryError::Abandoned));
            };

            if entry.generation != generation {
                debug!(
                    key = %key,
                    fetched = generation,
                    current = entry.generation,
                    "Discarding result of superseded fetch"
                );
                if entry.stale {
                    return Settled::Reload(entry.generation);
                }
                entry.in_flight = None;
                let current = entry.value.clone().ok_or(QueryError::Abandoned);
                if current.is_err() {
                    // Removed while fetching.
                    entries.remove(key);
                }
                return Settled::Done(current);
            }

            entry.in_flight = None;
            match &outcome {
                Ok(value) => {
                    entry.value = Some(value.clone());
                    entry.stale = false;
                    entry.last_error = None;
                    entry.failed_at = None;
                    entry.updated_at = Some(Utc::now());
                    true
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Refetch failed, keeping previous value");
                    entry.last_error = Some(e.clone());
                    entry.failed_at = Some(Instant::now());
                    false
                }
            }
        };

        if applied {
            self.notify(key);
        }
        Settled::Done(outcome)
    }
}

impl<S: RecordStore + 'static> QueryCache<S> {
    pub fn new(store: Arc<S>, request_timeout: Duration) -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(CacheInner {
                store,
                entries: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
                request_timeout,
                updates,
            }),
        }
    }

    /// Last known value, without triggering anything.
    pub fn get(&self, key: &QueryKey) -> Option<QueryResult> {
        self.inner.entries().get(key).and_then(|e| e.value.clone())
    }

    pub fn set(&self, key: QueryKey, value: QueryResult) {
        {
            let mut entries = self.inner.entries();
            let generation = self.inner.next_generation();
            let entry = self.inner.entry(&mut entries, &key);
            entry.generation = generation;
            entry.value = Some(value);
            entry.stale = false;
            entry.last_error = None;
            entry.failed_at = None;
            entry.updated_at = Some(Utc::now());
        }
        self.inner.notify(&key);
    }

    /// Mark `key` stale so the next read refetches it. A fetch already in
    /// flight keeps running; its result is discarded and it loads again once
    /// it returns, so one request per key is on the wire at a time.
    pub fn invalidate(&self, key: &QueryKey) {
        {
            let mut entries = self.inner.entries();
            let Some(entry) = entries.get_mut(key) else {
                return;
            };
            entry.stale = true;
            entry.failed_at = None;
            entry.generation = self.inner.next_generation();
            if entry.in_flight.is_some() {
                debug!(key = %key, "Invalidated while fetching, will reload");
            }
        }
        debug!(key = %key, "Invalidated");
        self.inner.notify(key);
    }

    /// Forget `key`. A fetch in flight finishes without writing and the
    /// entry goes away with it.
    pub fn remove(&self, key: &QueryKey) {
        let mut entries = self.inner.entries();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if entry.in_flight.is_some() {
            let generation = self.inner.next_generation();
            *entry = CacheEntry {
                in_flight: entry.in_flight.take(),
                ..CacheEntry::new(generation)
            };
        } else {
            entries.remove(key);
        }
        debug!(key = %key, "Removed");
    }

    /// Absent keys count as stale.
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.inner
            .entries()
            .get(key)
            .map_or(true, CacheEntry::needs_fetch)
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.inner
            .entries()
            .get(key)
            .is_some_and(|e| e.in_flight.is_some())
    }

    pub fn last_error(&self, key: &QueryKey) -> Option<QueryError> {
        self.inner
            .entries()
            .get(key)
            .and_then(|e| e.last_error.clone())
    }

    pub fn updated_at(&self, key: &QueryKey) -> Option<DateTime<Utc>> {
        self.inner.entries().get(key).and_then(|e| e.updated_at)
    }

    /// Keys whose value changed or that were invalidated.
    pub fn subscribe(&self) -> broadcast::Receiver<QueryKey> {
        self.inner.updates.subscribe()
    }

    /// Current value, possibly stale, returned immediately. Starts a
    /// background refetch when the entry is stale or absent, no fetch is
    /// running and the last load did not fail moments ago. Outside a tokio
    /// runtime nothing is started.
    pub fn read(&self, key: &QueryKey) -> Option<QueryResult> {
        let mut entries = self.inner.entries();
        let entry = self.inner.entry(&mut entries, key);
        let value = entry.value.clone();
        if entry.needs_fetch() && entry.in_flight.is_none() && !entry.cooling_down() {
            match Handle::try_current() {
                Ok(runtime) => {
                    self.start_fetch(&runtime, key.clone(), entry);
                }
                Err(_) => warn!(key = %key, "No tokio runtime, skipping background refetch"),
            }
        }
        value
    }

    /// Fresh value, joining the in-flight fetch for `key` if there is one.
    pub async fn fetch(&self, key: &QueryKey) -> Result<QueryResult, QueryError> {
        let mut outcome = {
            let mut entries = self.inner.entries();
            let entry = self.inner.entry(&mut entries, key);
            if !entry.needs_fetch() {
                if let Some(value) = &entry.value {
                    return Ok(value.clone());
                }
            }
            match entry.in_flight.clone() {
                Some(shared) => shared,
                None => {
                    let runtime = Handle::try_current().map_err(|_| QueryError::Abandoned)?;
                    self.start_fetch(&runtime, key.clone(), entry)
                }
            }
        };

        let settled = outcome
            .wait_for(Option::is_some)
            .await
            .map(|o| (*o).clone())
            .map_err(|_| QueryError::Abandoned)?;
        settled.unwrap_or(Err(QueryError::Abandoned))
    }

    fn start_fetch(
        &self,
        runtime: &Handle,
        key: QueryKey,
        entry: &mut CacheEntry,
    ) -> watch::Receiver<Option<Outcome>> {
        let (tx, rx) = watch::channel(None);
        let mut generation = entry.generation;
        entry.in_flight = Some(rx.clone());

        debug!(key = %key, generation, "Starting fetch");
        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            let outcome = loop {
                let loaded = inner.load(&key).await;
                match inner.settle(&key, generation, loaded) {
                    Settled::Done(outcome) => break outcome,
                    Settled::Reload(current) => {
                        debug!(key = %key, generation = current, "Reloading for newer generation");
                        generation = current;
                    }
                }
            };
            let _ = tx.send(Some(outcome));
        });

        rx
    }
}
