use chrono::{DateTime, Utc};

use super::{format_count, AccountCardView};
use crate::domain::{AccessGrant, Account, StatsReport};

/// Ephemeral dashboard toggles owned by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardUiState {
    pub show_stats: bool,
    pub add_dialog_open: bool,
    pub trial_banner_dismissed: bool,
}

/// Cache contents the dashboard is built from. `None` means not loaded yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSnapshot {
    pub accounts: Option<Vec<Account>>,
    pub stats: Option<StatsReport>,
    /// Outer `None` is "not loaded"; inner `None` is "no grant".
    pub access: Option<Option<AccessGrant>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsPanelView {
    pub today_label: String,
    pub week_label: String,
    pub all_time_label: String,
}

impl StatsPanelView {
    pub fn build(stats: Option<&StatsReport>, accounts: &[Account]) -> Self {
        let default = StatsReport::default();
        let stats = stats.unwrap_or(&default);
        Self {
            today_label: format_count(stats.today()),
            week_label: format_count(stats.week()),
            all_time_label: format_count(stats.all_time(accounts)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub loading: bool,
    pub total_accounts: usize,
    pub active_now: usize,
    pub total_messages_label: String,
    pub cards: Vec<AccountCardView>,
    pub stats_panel: Option<StatsPanelView>,
    pub show_trial_banner: bool,
    pub show_empty_state: bool,
    pub can_add_account: bool,
    pub add_dialog_open: bool,
}

impl DashboardView {
    pub fn build(snapshot: &DashboardSnapshot, ui: &DashboardUiState, now: DateTime<Utc>) -> Self {
        let loading = snapshot.accounts.is_none();
        let accounts = snapshot.accounts.as_deref().unwrap_or(&[]);

        // Header totals come from `get-stats` when it reports them.
        let (active_now, total_messages) = match &snapshot.stats {
            Some(stats) if stats.accounts.is_some() => (
                usize::try_from(stats.active_accounts()).unwrap_or(0),
                stats.total_messages(),
            ),
            _ => (
                accounts.iter().filter(|a| a.is_online()).count(),
                accounts.iter().map(|a| a.messages_sent).sum(),
            ),
        };

        let grant = snapshot.access.as_ref().and_then(Option::as_ref);
        let show_trial_banner =
            matches!(snapshot.access, Some(None)) && !ui.trial_banner_dismissed;
        let can_add_account = grant.is_some_and(|g| g.permits_new_account(accounts.len(), now));

        Self {
            loading,
            total_accounts: accounts.len(),
            active_now,
            total_messages_label: format_count(total_messages),
            cards: accounts
                .iter()
                .map(|account| AccountCardView::build(account, now))
                .collect(),
            stats_panel: ui
                .show_stats
                .then(|| StatsPanelView::build(snapshot.stats.as_ref(), accounts)),
            show_trial_banner,
            show_empty_state: !loading && accounts.is_empty(),
            can_add_account,
            add_dialog_open: ui.add_dialog_open && can_add_account,
        }
    }
}
