use poolctl_core::client_key::{ClientKey, IssuedClientKey};
use poolctl_core::config::{ConfigDraft, ConfigGroup, ConfigSnapshot};
use poolctl_core::key::{AdminKey, UpstreamKey};
use poolctl_core::models::ModelCatalog;
use poolctl_core::proxy_pool::ProxyPoolStatus;
use poolctl_core::user::AdminUser;
use poolctl_core::{CurrentUser, LogEntry, LogFilter, LogPager, LogTab};

use crate::bootstrap::BootstrapReport;

/// A server-backed list or object. `Failed` holds the error shown in place
/// of the data, which is dropped on failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Remote<T> {
    #[default]
    Idle,
    Ready(T),
    Failed(String),
}

impl<T> Remote<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Remote::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Remote::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Remote::Idle)
    }
}

/// The two log caches and the client-side view over them.
///
/// Unlike the other lists, a failed log fetch keeps the cache and only sets
/// the error of its tab.
#[derive(Debug, Clone, Default)]
pub struct LogState {
    pub(crate) tab: LogTab,
    pub(crate) mine: Option<Vec<LogEntry>>,
    pub(crate) all: Option<Vec<LogEntry>>,
    pub(crate) mine_error: Option<String>,
    pub(crate) all_error: Option<String>,
    pub(crate) filter: LogFilter,
    pub(crate) pager: LogPager,
}

impl LogState {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            pager: LogPager::with_page_size(page_size),
            ..Default::default()
        }
    }

    pub fn tab(&self) -> LogTab {
        self.tab
    }

    pub fn cache(&self, tab: LogTab) -> Option<&[LogEntry]> {
        match tab {
            LogTab::Mine => self.mine.as_deref(),
            LogTab::All => self.all.as_deref(),
        }
    }

    pub fn error(&self, tab: LogTab) -> Option<&str> {
        match tab {
            LogTab::Mine => self.mine_error.as_deref(),
            LogTab::All => self.all_error.as_deref(),
        }
    }

    pub fn filter(&self) -> &LogFilter {
        &self.filter
    }

    pub fn pager(&self) -> LogPager {
        self.pager
    }

    /// Entries of the active tab that pass the filter.
    pub fn filtered(&self) -> Vec<&LogEntry> {
        self.cache(self.tab)
            .map(|logs| poolctl_core::log::filter_logs(logs, &self.filter))
            .unwrap_or_default()
    }

    pub(crate) fn store(&mut self, tab: LogTab, result: Result<Vec<LogEntry>, String>) {
        let (cache, error) = match tab {
            LogTab::Mine => (&mut self.mine, &mut self.mine_error),
            LogTab::All => (&mut self.all, &mut self.all_error),
        };
        match result {
            Ok(logs) => {
                *cache = Some(logs);
                *error = None;
            }
            Err(e) => *error = Some(e),
        }
    }

    pub(crate) fn clamp_page(&mut self) {
        let total = self.filtered().len();
        self.pager.clamp(total);
    }
}

/// Everything the console knows for one session.
#[derive(Debug, Clone, Default)]
pub struct ConsoleState {
    pub(crate) token: Option<String>,
    pub(crate) user: Option<CurrentUser>,
    pub(crate) config: Remote<ConfigSnapshot>,
    pub(crate) common_draft: Option<ConfigDraft>,
    pub(crate) proxy_draft: Option<ConfigDraft>,
    pub(crate) keys: Remote<Vec<UpstreamKey>>,
    pub(crate) admin_users: Remote<Vec<AdminUser>>,
    pub(crate) admin_keys: Remote<Vec<AdminKey>>,
    pub(crate) models: Remote<ModelCatalog>,
    pub(crate) client_keys: Remote<Vec<ClientKey>>,
    pub(crate) issued_client_key: Option<IssuedClientKey>,
    pub(crate) logs: LogState,
    pub(crate) proxy_pool: Remote<ProxyPoolStatus>,
    pub(crate) last_report: Option<BootstrapReport>,
}

impl ConsoleState {
    pub fn new(page_size: usize) -> Self {
        Self {
            logs: LogState::with_page_size(page_size),
            ..Default::default()
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&CurrentUser> {
        self.user.as_ref()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_admin())
    }

    pub fn config(&self) -> &Remote<ConfigSnapshot> {
        &self.config
    }

    pub fn draft(&self, group: ConfigGroup) -> Option<&ConfigDraft> {
        match group {
            ConfigGroup::Common => self.common_draft.as_ref(),
            ConfigGroup::ProxyPool => self.proxy_draft.as_ref(),
            ConfigGroup::Immediate => None,
        }
    }

    pub fn keys(&self) -> &Remote<Vec<UpstreamKey>> {
        &self.keys
    }

    pub fn admin_users(&self) -> &Remote<Vec<AdminUser>> {
        &self.admin_users
    }

    pub fn admin_keys(&self) -> &Remote<Vec<AdminKey>> {
        &self.admin_keys
    }

    pub fn models(&self) -> &Remote<ModelCatalog> {
        &self.models
    }

    pub fn client_keys(&self) -> &Remote<Vec<ClientKey>> {
        &self.client_keys
    }

    pub fn issued_client_key(&self) -> Option<&IssuedClientKey> {
        self.issued_client_key.as_ref()
    }

    pub fn logs(&self) -> &LogState {
        &self.logs
    }

    pub fn proxy_pool(&self) -> &Remote<ProxyPoolStatus> {
        &self.proxy_pool
    }

    pub fn last_report(&self) -> Option<&BootstrapReport> {
        self.last_report.as_ref()
    }

    /// Replace the snapshot and reseed both drafts from it.
    pub(crate) fn set_config(&mut self, config: Result<ConfigSnapshot, String>) {
        match config {
            Ok(snapshot) => {
                self.common_draft =
                    Some(ConfigDraft::from_snapshot(ConfigGroup::Common, &snapshot));
                self.proxy_draft =
                    Some(ConfigDraft::from_snapshot(ConfigGroup::ProxyPool, &snapshot));
                self.config = Remote::Ready(snapshot);
            }
            Err(e) => {
                self.common_draft = None;
                self.proxy_draft = None;
                self.config = Remote::Failed(e);
            }
        }
    }

    pub(crate) fn draft_mut(&mut self, group: ConfigGroup) -> Option<&mut ConfigDraft> {
        match group {
            ConfigGroup::Common => self.common_draft.as_mut(),
            ConfigGroup::ProxyPool => self.proxy_draft.as_mut(),
            ConfigGroup::Immediate => None,
        }
    }

    /// Drop every cached entity. The log page size is a preference and
    /// survives.
    pub(crate) fn reset(&mut self) {
        let page_size = self.logs.pager.page_size();
        *self = Self::new(page_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_log_fetch_keeps_cache() {
        let mut logs = LogState::default();
        logs.store(LogTab::Mine, Ok(vec![LogEntry::default()]));
        logs.store(LogTab::Mine, Err("boom".into()));
        assert_eq!(logs.cache(LogTab::Mine).map(<[_]>::len), Some(1));
        assert_eq!(logs.error(LogTab::Mine), Some("boom"));

        logs.store(LogTab::Mine, Ok(vec![]));
        assert_eq!(logs.error(LogTab::Mine), None);
        assert!(logs.cache(LogTab::All).is_none());
    }

    #[test]
    fn failed_config_fetch_drops_drafts() {
        let mut state = ConsoleState::new(20);
        state.set_config(Ok(ConfigSnapshot::default()));
        assert!(state.draft(ConfigGroup::Common).is_some());
        assert!(state.draft(ConfigGroup::Immediate).is_none());

        state.set_config(Err("Admin only".into()));
        assert_eq!(state.config().error(), Some("Admin only"));
        assert!(state.draft(ConfigGroup::ProxyPool).is_none());
    }

    #[test]
    fn reset_keeps_page_size() {
        let mut state = ConsoleState::new(100);
        state.token = Some("tok".into());
        state.keys = Remote::Ready(vec![]);
        state.reset();
        assert_eq!(state.token(), None);
        assert!(state.keys().is_idle());
        assert_eq!(state.logs().pager().page_size(), 100);
    }
}
