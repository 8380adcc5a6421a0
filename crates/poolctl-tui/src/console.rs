//! The console controller: owns the session state and is the only thing
//! that mutates it.
//!
//! Every handler sends its request, waits for the answer, and then
//! re-fetches whatever list it touched. Nothing is updated optimistically.

use poolctl_core::auth::{LoginRequest, RegisterForm};
use poolctl_core::client_key::{CreateClientKey, IssuedClientKey};
use poolctl_core::config::{ConfigGroup, ConfigUpdate, ConfigValue, QuotaMode};
use poolctl_core::key::CreateKey;
use poolctl_core::user::{parse_manual_rpm, quota_label, UpdateUser};
use poolctl_core::{ConfigKey, CoreError, LogFilter, LogTab};
use poolctl_service::{BlockingHttpService, ServiceError};
use tracing::{info, warn};

use crate::bootstrap::{run_pipeline, BootstrapReport, BootstrapStep, StepRunner};
use crate::error::ConsoleError;
use crate::state::{ConsoleState, Remote};
use crate::token_store::TokenStore;

pub struct Console {
    service: BlockingHttpService,
    store: Box<dyn TokenStore>,
    state: ConsoleState,
}

/// Store a fetch result. A failure drops the previous data.
fn settle<T>(slot: &mut Remote<T>, result: Result<T, ServiceError>) -> Result<(), ConsoleError> {
    match result {
        Ok(value) => {
            *slot = Remote::Ready(value);
            Ok(())
        }
        Err(e) => {
            *slot = Remote::Failed(e.to_string());
            Err(e.into())
        }
    }
}

fn config_not_loaded() -> ConsoleError {
    CoreError::InvalidInput("config not loaded".into()).into()
}

impl Console {
    /// Build a console around `service`, picking up a token left in `store`
    /// by a previous run. Nothing is fetched until `start`.
    pub fn new(
        mut service: BlockingHttpService,
        store: Box<dyn TokenStore>,
        page_size: usize,
    ) -> Self {
        let token = store.load();
        service.set_token(token.clone());
        let mut state = ConsoleState::new(page_size);
        state.token = token;
        Self {
            service,
            store,
            state,
        }
    }

    pub fn state(&self) -> &ConsoleState {
        &self.state
    }

    pub fn base_url(&self) -> &str {
        self.service.base_url()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.state.is_admin()
    }

    /// Bootstrap with the stored token, if there is one.
    pub fn start(&mut self) -> Option<BootstrapReport> {
        self.state.token.as_ref()?;
        Some(self.bootstrap())
    }

    /// Run the full load pipeline. An identity failure ends the session.
    pub fn bootstrap(&mut self) -> BootstrapReport {
        let report = run_pipeline(self);
        if report.aborted {
            self.logout();
        } else {
            self.state.last_report = Some(report.clone());
        }
        report
    }

    // -- session --

    pub fn login(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<BootstrapReport, ConsoleError> {
        let token = self.service.login(&LoginRequest {
            username: username.trim().to_string(),
            password: password.to_string(),
        })?;
        self.keep_token(token.access_token);
        info!("logged in as {}", username.trim());
        Ok(self.bootstrap())
    }

    /// Register an account. The caller still has to log in afterwards.
    pub fn register(&mut self, form: RegisterForm) -> Result<String, ConsoleError> {
        let request = form.into_request()?;
        let ack = self.service.register(&request)?;
        info!("registered account {}", request.username);
        Ok(format!("{}, please log in", ack.message))
    }

    pub fn logout(&mut self) {
        if let Err(e) = self.store.clear() {
            warn!("failed to clear stored token: {e}");
        }
        self.service.set_token(None);
        self.state.reset();
        info!("logged out");
    }

    /// Re-check the session. Any failure is taken as an expired token.
    pub fn who_am_i(&mut self) -> Result<(), ConsoleError> {
        let result = self.fetch_identity();
        if result.is_err() {
            self.logout();
        }
        result
    }

    fn keep_token(&mut self, token: String) {
        if let Err(e) = self.store.save(&token) {
            warn!("failed to persist token: {e}");
        }
        self.service.set_token(Some(token.clone()));
        self.state.token = Some(token);
    }

    fn fetch_identity(&mut self) -> Result<(), ConsoleError> {
        if self.state.token.is_none() {
            return Err(ConsoleError::NotLoggedIn);
        }
        let user = self.service.me()?;
        if !user.is_admin() && self.state.logs.tab == LogTab::All {
            self.state.logs.tab = LogTab::Mine;
        }
        self.state.user = Some(user);
        Ok(())
    }

    fn require_admin(&self) -> Result<(), ConsoleError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ConsoleError::AdminOnly)
        }
    }

    // -- config --

    pub fn refresh_config(&mut self) -> Result<(), ConsoleError> {
        self.require_admin()?;
        match self.service.get_config() {
            Ok(snapshot) => {
                self.state.set_config(Ok(snapshot));
                Ok(())
            }
            Err(e) => {
                self.state.set_config(Err(e.to_string()));
                Err(e.into())
            }
        }
    }

    pub fn multi_node_enabled(&self) -> bool {
        self.state
            .config
            .ready()
            .is_some_and(|c| c.multi_node_enabled)
    }

    /// Whether `key` can be edited right now.
    pub fn is_editable(&self, key: ConfigKey) -> bool {
        !key.is_leader_setting() || self.multi_node_enabled()
    }

    /// Send one immediate setting and re-fetch the config. Returns the
    /// status line to show.
    pub fn set_immediate(
        &mut self,
        key: ConfigKey,
        value: ConfigValue,
    ) -> Result<String, ConsoleError> {
        self.require_admin()?;
        if key.group() != ConfigGroup::Immediate {
            return Err(CoreError::InvalidInput(format!(
                "{key} is saved with the {} group",
                key.group().display_name()
            ))
            .into());
        }
        if !self.is_editable(key) {
            return Err(ConsoleError::LeaderSettingsDisabled);
        }
        self.service
            .set_config_value(&ConfigUpdate::new(key, &value))?;
        info!("config {key} set to {}", value.to_wire());
        self.refresh_config()?;
        Ok(if key.is_leader_setting() {
            format!("{} saved (may require node restart)", key.label())
        } else {
            format!("{} saved", key.label())
        })
    }

    pub fn set_immediate_input(
        &mut self,
        key: ConfigKey,
        raw: &str,
    ) -> Result<String, ConsoleError> {
        let value = key.parse_input(raw)?;
        self.set_immediate(key, value)
    }

    pub fn toggle_quota_mode(&mut self) -> Result<QuotaMode, ConsoleError> {
        let next = self
            .state
            .config
            .ready()
            .map(|c| c.quota_mode().toggled())
            .ok_or_else(config_not_loaded)?;
        self.set_immediate(
            ConfigKey::AutoQuotaEnabled,
            ConfigValue::Bool(next == QuotaMode::Auto),
        )?;
        Ok(next)
    }

    /// Change one field of a batched group's draft. Nothing is sent.
    pub fn edit_draft(&mut self, key: ConfigKey, raw: &str) -> Result<(), ConsoleError> {
        self.require_admin()?;
        let value = key.parse_input(raw)?;
        let draft = self
            .state
            .draft_mut(key.group())
            .ok_or_else(config_not_loaded)?;
        draft.set(key, value)?;
        Ok(())
    }

    /// Throw away unsaved edits of both groups.
    pub fn discard_drafts(&mut self) {
        if let Remote::Ready(snapshot) = self.state.config.clone() {
            self.state.set_config(Ok(snapshot));
        }
    }

    /// Save a batched group key by key, in order. The first failure stops
    /// the run; keys sent before it stay applied.
    pub fn save_group(&mut self, group: ConfigGroup) -> Result<Vec<String>, ConsoleError> {
        self.require_admin()?;
        let updates = self
            .state
            .draft(group)
            .ok_or_else(config_not_loaded)?
            .updates();

        let mut applied = Vec::new();
        for update in updates {
            if let Err(e) = self.service.set_config_value(&update) {
                warn!(
                    "saving {} stopped at {}: {e}",
                    group.display_name(),
                    update.key
                );
                return Err(ConsoleError::SaveAborted {
                    applied,
                    key: update.key,
                    message: e.to_string(),
                });
            }
            applied.push(update.key);
        }
        info!("saved {} {} settings", applied.len(), group.display_name());
        self.after_group_save(group)?;
        Ok(applied)
    }

    /// Save a batched group as one form post.
    pub fn post_group_form(&mut self, group: ConfigGroup) -> Result<Vec<String>, ConsoleError> {
        self.require_admin()?;
        let form = self
            .state
            .draft(group)
            .ok_or_else(config_not_loaded)?
            .form();
        let applied = self.service.post_config_form(&form)?;
        info!("posted {} {} settings", applied.updated.len(), group.display_name());
        self.after_group_save(group)?;
        Ok(applied.updated)
    }

    fn after_group_save(&mut self, group: ConfigGroup) -> Result<(), ConsoleError> {
        self.refresh_config()?;
        if group == ConfigGroup::ProxyPool {
            self.refresh_proxy_pool()?;
        }
        Ok(())
    }

    pub fn trigger_health_check(&mut self) -> Result<String, ConsoleError> {
        self.require_admin()?;
        let summary = self.service.trigger_health_check()?;
        self.refresh_admin_keys()?;
        Ok(format!("checked {} keys", summary.checked))
    }

    // -- upstream keys --

    pub fn refresh_keys(&mut self) -> Result<(), ConsoleError> {
        settle(&mut self.state.keys, self.service.list_keys())
    }

    pub fn add_key(&mut self, raw: &str, verify_now: bool) -> Result<String, ConsoleError> {
        let input = CreateKey::new(raw, verify_now)?;
        let created = self.service.create_key(&input)?;
        info!("added key #{} ({})", created.id, created.status);
        self.refresh_keys()?;
        Ok(format!("key #{} added ({})", created.id, created.status))
    }

    pub fn delete_key(&mut self, id: i64) -> Result<(), ConsoleError> {
        self.service.delete_key(id)?;
        info!("deleted key #{id}");
        self.refresh_keys()
    }

    // -- admin --

    pub fn refresh_admin_users(&mut self) -> Result<(), ConsoleError> {
        self.require_admin()?;
        settle(&mut self.state.admin_users, self.service.list_admin_users())
    }

    pub fn refresh_admin_keys(&mut self) -> Result<(), ConsoleError> {
        self.require_admin()?;
        settle(&mut self.state.admin_keys, self.service.list_admin_keys())
    }

    /// Users, then keys. Both are attempted; the first error is returned.
    pub fn refresh_admin(&mut self) -> Result<(), ConsoleError> {
        let users = self.refresh_admin_users();
        let keys = self.refresh_admin_keys();
        users.and(keys)
    }

    /// Blank or `auto` resets the user to automatic quota.
    pub fn set_user_quota(&mut self, id: i64, raw: &str) -> Result<String, ConsoleError> {
        self.require_admin()?;
        let manual_rpm = parse_manual_rpm(raw)?;
        let updated = self
            .service
            .update_admin_user(id, &UpdateUser::quota(manual_rpm))?;
        info!("user #{id} quota set to {}", quota_label(updated.manual_rpm));
        self.refresh_admin_users()?;
        Ok(format!("quota set to {}", quota_label(updated.manual_rpm)))
    }

    pub fn toggle_user_active(&mut self, id: i64) -> Result<bool, ConsoleError> {
        self.require_admin()?;
        let active = self
            .state
            .admin_users
            .ready()
            .and_then(|users| users.iter().find(|u| u.id == id))
            .map(|u| u.is_active)
            .ok_or_else(|| CoreError::InvalidInput(format!("unknown user #{id}")))?;
        let updated = self
            .service
            .update_admin_user(id, &UpdateUser::active(!active))?;
        info!("user #{id} active: {}", updated.is_active);
        self.refresh_admin_users()?;
        Ok(updated.is_active)
    }

    pub fn toggle_admin_key(&mut self, id: i64) -> Result<bool, ConsoleError> {
        self.require_admin()?;
        let toggled = self.service.toggle_admin_key(id)?;
        info!("key #{id} enabled: {}", toggled.is_enabled);
        self.refresh_admin_keys()?;
        Ok(toggled.is_enabled)
    }

    pub fn refresh_proxy_pool(&mut self) -> Result<(), ConsoleError> {
        self.require_admin()?;
        settle(&mut self.state.proxy_pool, self.service.proxy_pool_status())
    }

    // -- models and client keys --

    pub fn refresh_models(&mut self) -> Result<(), ConsoleError> {
        settle(&mut self.state.models, self.service.list_models())
    }

    /// Also forgets the last issued plaintext key.
    pub fn refresh_client_keys(&mut self) -> Result<(), ConsoleError> {
        self.state.issued_client_key = None;
        settle(&mut self.state.client_keys, self.service.list_client_keys())
    }

    pub fn create_client_key(
        &mut self,
        name: &str,
        rotate: bool,
    ) -> Result<IssuedClientKey, ConsoleError> {
        let issued = self
            .service
            .create_client_key(&CreateClientKey::new(name, rotate))?;
        info!("issued client key #{} (rotate: {rotate})", issued.id);
        let refreshed = self.refresh_client_keys();
        self.state.issued_client_key = Some(issued.clone());
        refreshed?;
        Ok(issued)
    }

    pub fn set_client_key_active(&mut self, id: i64, active: bool) -> Result<(), ConsoleError> {
        self.service.update_client_key(id, active)?;
        info!("client key #{id} active: {active}");
        self.refresh_client_keys()
    }

    pub fn delete_client_key(&mut self, id: i64) -> Result<(), ConsoleError> {
        self.service.delete_client_key(id)?;
        info!("deleted client key #{id}");
        self.refresh_client_keys()
    }

    pub fn dismiss_issued_key(&mut self) {
        self.state.issued_client_key = None;
    }

    // -- logs --

    /// Switch the log tab. Non-admins asking for all logs get their own.
    /// A tab whose cache was never loaded is fetched now.
    pub fn set_log_tab(&mut self, tab: LogTab) -> Result<LogTab, ConsoleError> {
        let tab = if tab == LogTab::All && !self.is_admin() {
            LogTab::Mine
        } else {
            tab
        };
        self.state.logs.tab = tab;
        self.state.logs.pager.reset();
        if self.state.logs.cache(tab).is_none() {
            self.fetch_logs(tab)?;
        }
        Ok(tab)
    }

    pub fn refresh_logs(&mut self) -> Result<(), ConsoleError> {
        self.fetch_logs(self.state.logs.tab)
    }

    fn fetch_logs(&mut self, tab: LogTab) -> Result<(), ConsoleError> {
        let result = match tab {
            LogTab::Mine => self.service.list_my_logs(),
            LogTab::All => {
                self.require_admin()?;
                self.service.list_all_logs()
            }
        };
        let outcome = match result {
            Ok(logs) => {
                self.state.logs.store(tab, Ok(logs));
                Ok(())
            }
            Err(e) => {
                let label = match tab {
                    LogTab::Mine => "my",
                    LogTab::All => "all",
                };
                self.state
                    .logs
                    .store(tab, Err(format!("failed to load {label} logs")));
                Err(e.into())
            }
        };
        self.state.logs.clamp_page();
        outcome
    }

    pub fn apply_log_filter(
        &mut self,
        from: &str,
        to: &str,
        query: &str,
    ) -> Result<(), ConsoleError> {
        self.state.logs.filter = LogFilter::parse(from, to, query)?;
        self.state.logs.pager.reset();
        Ok(())
    }

    pub fn clear_log_filter(&mut self) {
        self.state.logs.filter = LogFilter::default();
        self.state.logs.pager.reset();
    }

    pub fn next_log_page(&mut self) {
        self.state.logs.pager.next();
        self.state.logs.clamp_page();
    }

    pub fn prev_log_page(&mut self) {
        self.state.logs.pager.prev();
    }

    pub fn set_log_page_size(&mut self, size: usize) {
        self.state.logs.pager.set_page_size(size);
    }

    pub fn cycle_log_page_size(&mut self) -> usize {
        self.state.logs.pager.cycle_page_size();
        self.state.logs.pager.page_size()
    }
}

impl StepRunner for Console {
    fn is_admin(&self) -> bool {
        self.state.is_admin()
    }

    fn run_step(&mut self, step: BootstrapStep) -> Result<(), ConsoleError> {
        match step {
            BootstrapStep::Identity => self.fetch_identity(),
            BootstrapStep::Config => self.refresh_config(),
            BootstrapStep::Keys => self.refresh_keys(),
            BootstrapStep::AdminUsers => self.refresh_admin_users(),
            BootstrapStep::AdminKeys => self.refresh_admin_keys(),
            BootstrapStep::Models => self.refresh_models(),
            BootstrapStep::ClientKeys => self.refresh_client_keys(),
            BootstrapStep::MyLogs => self.fetch_logs(LogTab::Mine),
            BootstrapStep::AllLogs => self.fetch_logs(LogTab::All),
            BootstrapStep::ProxyPool => self.refresh_proxy_pool(),
        }
    }
}
