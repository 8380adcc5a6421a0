use crossterm::event::{KeyCode, KeyEvent};
use poolctl_core::auth::RegisterForm;
use poolctl_core::config::{ConfigGroup, ConfigValue, ValueKind};
use poolctl_core::ConfigKey;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::bootstrap::BootstrapReport;
use crate::components::data_table::{tone_style, DataTable};
use crate::console::Console;
use crate::error::ConsoleError;
use crate::state::Remote;
use crate::view::{self, TableView};

/// Top-level screens, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Dashboard,
    Keys,
    ClientKeys,
    Logs,
    Config,
    Admin,
    ProxyPool,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Dashboard,
        Section::Keys,
        Section::ClientKeys,
        Section::Logs,
        Section::Config,
        Section::Admin,
        Section::ProxyPool,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Section::Dashboard => "Dashboard",
            Section::Keys => "Keys",
            Section::ClientKeys => "Client keys",
            Section::Logs => "Logs",
            Section::Config => "Config",
            Section::Admin => "Admin",
            Section::ProxyPool => "Proxy pool",
        }
    }

    pub fn admin_only(&self) -> bool {
        matches!(self, Section::Config | Section::Admin | Section::ProxyPool)
    }

    fn from_digit(c: char) -> Option<Section> {
        let index = c.to_digit(10)? as usize;
        Self::ALL.get(index.checked_sub(1)?).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminPane {
    Users,
    Keys,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterField {
    Username,
    Email,
    Password,
    Confirm,
}

impl RegisterField {
    fn next(self) -> Self {
        match self {
            RegisterField::Username => RegisterField::Email,
            RegisterField::Email => RegisterField::Password,
            RegisterField::Password => RegisterField::Confirm,
            RegisterField::Confirm => RegisterField::Username,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    From,
    To,
    Query,
}

impl FilterField {
    fn next(self) -> Self {
        match self {
            FilterField::From => FilterField::To,
            FilterField::To => FilterField::Query,
            FilterField::Query => FilterField::From,
        }
    }
}

/// Row actions that need a yes/no first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    DeleteKey(i64),
    DisableClientKey(i64),
    DeleteClientKey(i64),
}

impl Confirm {
    fn prompt(&self) -> String {
        match self {
            Confirm::DeleteKey(id) => format!("Delete key #{id}?"),
            Confirm::DisableClientKey(id) => format!("Disable client key #{id}?"),
            Confirm::DeleteClientKey(id) => format!("Delete client key #{id}?"),
        }
    }
}

/// Raw text of the log filter inputs, kept so the form reopens filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterInput {
    pub from: String,
    pub to: String,
    pub query: String,
}

/// What the app is currently doing
#[derive(Debug, Clone)]
pub enum Mode {
    /// Login gate
    Login {
        username: String,
        password: String,
        field: LoginField,
    },
    /// Account registration form
    Register {
        form: RegisterForm,
        field: RegisterField,
    },
    /// Section navigation
    Normal,
    /// Pasting a new upstream key
    AddKey { input: String, verify_now: bool },
    /// Issuing a client key
    NewClientKey { name: String, rotate: bool },
    /// Editing a user's manual RPM
    EditQuota {
        user_id: i64,
        username: String,
        input: String,
    },
    /// Editing one config value
    EditConfig { key: ConfigKey, input: String },
    /// Editing the log filter
    LogFilter {
        input: FilterInput,
        field: FilterField,
    },
    /// Yes/no before a destructive row action
    Confirm { action: Confirm },
}

impl Mode {
    fn login() -> Self {
        Mode::Login {
            username: String::new(),
            password: String::new(),
            field: LoginField::Username,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    keys: DataTable,
    client_keys: DataTable,
    logs: DataTable,
    config: DataTable,
    admin_users: DataTable,
    admin_keys: DataTable,
    proxy_pool: DataTable,
}

pub struct App {
    console: Console,
    mode: Mode,
    section: Section,
    admin_pane: AdminPane,
    tables: Tables,
    filter_input: FilterInput,
    status_message: Option<String>,
}

impl App {
    /// Wrap `console` and run the start-up pipeline if a token was stored.
    pub fn new(mut console: Console) -> Self {
        let report = console.start();
        let mut app = Self {
            console,
            mode: Mode::login(),
            section: Section::Dashboard,
            admin_pane: AdminPane::Users,
            tables: Tables::default(),
            filter_input: FilterInput::default(),
            status_message: None,
        };
        if let Some(report) = report {
            app.after_bootstrap(report);
        }
        app.sync_tables();
        app
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn admin_pane(&self) -> AdminPane {
        self.admin_pane
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn is_input_mode(&self) -> bool {
        matches!(
            self.mode,
            Mode::Login { .. }
                | Mode::Register { .. }
                | Mode::AddKey { .. }
                | Mode::NewClientKey { .. }
                | Mode::EditQuota { .. }
                | Mode::EditConfig { .. }
                | Mode::LogFilter { .. }
        )
    }

    fn after_bootstrap(&mut self, report: BootstrapReport) {
        self.status_message = Some(report.summary());
        if self.console.is_logged_in() {
            self.mode = Mode::Normal;
            self.show_section(self.section);
        } else {
            self.mode = Mode::login();
        }
    }

    /// Surface an error. A 401 means the session is gone.
    fn fail(&mut self, e: ConsoleError) {
        if e.status() == Some(401) {
            self.console.logout();
            self.mode = Mode::login();
            self.status_message = Some(format!("Session expired: {e}"));
        } else {
            self.status_message = Some(format!("Error: {e}"));
        }
    }

    fn report(&mut self, result: Result<String, ConsoleError>) {
        match result {
            Ok(msg) => self.status_message = Some(msg),
            Err(e) => self.fail(e),
        }
    }

    fn show_section(&mut self, section: Section) {
        if section.admin_only() && !self.console.is_admin() {
            self.section = Section::Dashboard;
            self.status_message = Some(format!("{} is admin only", section.title()));
            return;
        }
        self.section = section;
    }

    fn visible_sections(&self) -> Vec<Section> {
        Section::ALL
            .into_iter()
            .filter(|s| !s.admin_only() || self.console.is_admin())
            .collect()
    }

    fn cycle_section(&mut self, forward: bool) {
        let visible = self.visible_sections();
        let current = visible
            .iter()
            .position(|s| *s == self.section)
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % visible.len()
        } else {
            (current + visible.len() - 1) % visible.len()
        };
        self.section = visible[next];
    }

    fn config_rows(&self) -> Vec<view::ConfigRow> {
        let state = self.console.state();
        match state.config().ready() {
            Some(snapshot) => view::config_rows(
                snapshot,
                state.draft(ConfigGroup::Common),
                state.draft(ConfigGroup::ProxyPool),
            ),
            None => Vec::new(),
        }
    }

    /// The table the selection keys act on in the current section.
    fn active_table(&mut self) -> Option<(&mut DataTable, usize)> {
        let state = self.console.state();
        let len = match self.section {
            Section::Dashboard => return None,
            Section::Keys => view::keys_table(state.keys()).rows.len(),
            Section::ClientKeys => view::client_keys_table(state.client_keys()).rows.len(),
            Section::Logs => view::logs_view(state.logs()).table.rows.len(),
            Section::Config => self.config_rows().len(),
            Section::Admin => match self.admin_pane {
                AdminPane::Users => view::admin_users_table(state.admin_users()).rows.len(),
                AdminPane::Keys => view::admin_keys_table(state.admin_keys()).rows.len(),
            },
            Section::ProxyPool => view::proxy_pool_table(state.proxy_pool()).0.rows.len(),
        };
        let table = match self.section {
            Section::Dashboard => return None,
            Section::Keys => &mut self.tables.keys,
            Section::ClientKeys => &mut self.tables.client_keys,
            Section::Logs => &mut self.tables.logs,
            Section::Config => &mut self.tables.config,
            Section::Admin => match self.admin_pane {
                AdminPane::Users => &mut self.tables.admin_users,
                AdminPane::Keys => &mut self.tables.admin_keys,
            },
            Section::ProxyPool => &mut self.tables.proxy_pool,
        };
        Some((table, len))
    }

    fn sync_tables(&mut self) {
        let state = self.console.state();
        let lens = [
            view::keys_table(state.keys()).rows.len(),
            view::client_keys_table(state.client_keys()).rows.len(),
            view::logs_view(state.logs()).table.rows.len(),
            self.config_rows().len(),
            view::admin_users_table(state.admin_users()).rows.len(),
            view::admin_keys_table(state.admin_keys()).rows.len(),
            view::proxy_pool_table(state.proxy_pool()).0.rows.len(),
        ];
        let tables = [
            &mut self.tables.keys,
            &mut self.tables.client_keys,
            &mut self.tables.logs,
            &mut self.tables.config,
            &mut self.tables.admin_users,
            &mut self.tables.admin_keys,
            &mut self.tables.proxy_pool,
        ];
        for (table, len) in tables.into_iter().zip(lens) {
            table.sync(len);
        }
    }

    fn selected_row_id(&self, table: &TableView, selection: &DataTable) -> Option<i64> {
        selection.selected().and_then(|i| table.row_id(i))
    }

    fn selected_config_key(&self) -> Option<ConfigKey> {
        let index = self.tables.config.selected()?;
        self.config_rows().get(index).map(|r| r.key)
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        self.status_message = None;

        match &self.mode.clone() {
            Mode::Login {
                username,
                password,
                field,
            } => self.handle_login(key, username.clone(), password.clone(), *field),
            Mode::Register { form, field } => self.handle_register(key, form.clone(), *field),
            Mode::Normal => self.handle_normal(key),
            Mode::AddKey { input, verify_now } => {
                self.handle_add_key(key, input.clone(), *verify_now)
            }
            Mode::NewClientKey { name, rotate } => {
                self.handle_new_client_key(key, name.clone(), *rotate)
            }
            Mode::EditQuota {
                user_id,
                username,
                input,
            } => self.handle_edit_quota(key, *user_id, username.clone(), input.clone()),
            Mode::EditConfig { key: config_key, input } => {
                self.handle_edit_config(key, *config_key, input.clone())
            }
            Mode::LogFilter { input, field } => {
                self.handle_log_filter(key, input.clone(), *field)
            }
            Mode::Confirm { action } => self.handle_confirm(key, *action),
        }

        self.sync_tables();
    }

    fn handle_login(
        &mut self,
        key: KeyEvent,
        mut username: String,
        mut password: String,
        field: LoginField,
    ) {
        match key.code {
            KeyCode::Tab | KeyCode::BackTab => {
                let field = match field {
                    LoginField::Username => LoginField::Password,
                    LoginField::Password => LoginField::Username,
                };
                self.mode = Mode::Login {
                    username,
                    password,
                    field,
                };
            }
            KeyCode::F(2) => {
                self.mode = Mode::Register {
                    form: RegisterForm {
                        username,
                        ..Default::default()
                    },
                    field: RegisterField::Username,
                };
            }
            KeyCode::Enter if field == LoginField::Username => {
                self.mode = Mode::Login {
                    username,
                    password,
                    field: LoginField::Password,
                };
            }
            KeyCode::Enter => match self.console.login(&username, &password) {
                Ok(report) => self.after_bootstrap(report),
                Err(e) => {
                    self.status_message = Some(format!("Login failed: {e}"));
                    self.mode = Mode::Login {
                        username,
                        password: String::new(),
                        field: LoginField::Password,
                    };
                }
            },
            KeyCode::Backspace => {
                match field {
                    LoginField::Username => username.pop(),
                    LoginField::Password => password.pop(),
                };
                self.mode = Mode::Login {
                    username,
                    password,
                    field,
                };
            }
            KeyCode::Char(c) => {
                match field {
                    LoginField::Username => username.push(c),
                    LoginField::Password => password.push(c),
                }
                self.mode = Mode::Login {
                    username,
                    password,
                    field,
                };
            }
            _ => {}
        }
    }

    fn handle_register(&mut self, key: KeyEvent, mut form: RegisterForm, field: RegisterField) {
        match key.code {
            KeyCode::Esc => self.mode = Mode::login(),
            KeyCode::Tab => {
                self.mode = Mode::Register {
                    form,
                    field: field.next(),
                }
            }
            KeyCode::Enter if field != RegisterField::Confirm => {
                self.mode = Mode::Register {
                    form,
                    field: field.next(),
                }
            }
            KeyCode::Enter => {
                let username = form.username.clone();
                match self.console.register(form.clone()) {
                    Ok(msg) => {
                        self.status_message = Some(msg);
                        self.mode = Mode::Login {
                            username,
                            password: String::new(),
                            field: LoginField::Password,
                        };
                    }
                    Err(e) => {
                        self.status_message = Some(format!("Error: {e}"));
                        self.mode = Mode::Register { form, field };
                    }
                }
            }
            KeyCode::Backspace => {
                register_field(&mut form, field).pop();
                self.mode = Mode::Register { form, field };
            }
            KeyCode::Char(c) => {
                register_field(&mut form, field).push(c);
                self.mode = Mode::Register { form, field };
            }
            _ => {}
        }
    }

    fn handle_normal(&mut self, key: KeyEvent) {
        if let Some((table, len)) = self.active_table() {
            if table.handle_key(key, len) {
                return;
            }
        }

        match key.code {
            KeyCode::Char(c @ '1'..='7') => {
                if let Some(section) = Section::from_digit(c) {
                    self.show_section(section);
                }
            }
            KeyCode::Tab => self.cycle_section(true),
            KeyCode::BackTab => self.cycle_section(false),
            KeyCode::Char('R') => {
                let report = self.console.bootstrap();
                self.after_bootstrap(report);
            }
            KeyCode::Char('r') => self.refresh_section(),
            KeyCode::Char('L') => {
                self.console.logout();
                self.mode = Mode::login();
                self.section = Section::Dashboard;
                self.filter_input = FilterInput::default();
                self.status_message = Some("Logged out".into());
            }
            _ => match self.section {
                Section::Dashboard => {}
                Section::Keys => self.handle_keys_section(key),
                Section::ClientKeys => self.handle_client_keys_section(key),
                Section::Logs => self.handle_logs_section(key),
                Section::Config => self.handle_config_section(key),
                Section::Admin => self.handle_admin_section(key),
                Section::ProxyPool => {}
            },
        }
    }

    fn refresh_section(&mut self) {
        let result = match self.section {
            Section::Dashboard => self
                .console
                .who_am_i()
                .and_then(|_| self.console.refresh_keys())
                .and_then(|_| self.console.refresh_models()),
            Section::Keys => self.console.refresh_keys(),
            Section::ClientKeys => self.console.refresh_client_keys(),
            Section::Logs => self.console.refresh_logs(),
            Section::Config => self.console.refresh_config(),
            Section::Admin => self.console.refresh_admin(),
            Section::ProxyPool => self.console.refresh_proxy_pool(),
        };
        if !self.console.is_logged_in() {
            self.mode = Mode::login();
        }
        self.report(result.map(|_| "Refreshed".to_string()));
    }

    fn handle_keys_section(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('a') => {
                self.mode = Mode::AddKey {
                    input: String::new(),
                    verify_now: true,
                }
            }
            KeyCode::Char('d') => {
                let table = view::keys_table(self.console.state().keys());
                if let Some(id) = self.selected_row_id(&table, &self.tables.keys) {
                    self.mode = Mode::Confirm {
                        action: Confirm::DeleteKey(id),
                    };
                }
            }
            _ => {}
        }
    }

    fn handle_client_keys_section(&mut self, key: KeyEvent) {
        let selected = self
            .tables
            .client_keys
            .selected()
            .and_then(|i| self.console.state().client_keys().ready()?.get(i))
            .map(|k| (k.id, k.is_active));
        match key.code {
            KeyCode::Char('n') => {
                self.mode = Mode::NewClientKey {
                    name: String::new(),
                    rotate: false,
                }
            }
            KeyCode::Char('t') => match selected {
                Some((id, true)) => {
                    self.mode = Mode::Confirm {
                        action: Confirm::DisableClientKey(id),
                    }
                }
                Some((id, false)) => {
                    let result = self.console.set_client_key_active(id, true);
                    self.report(result.map(|_| format!("Client key #{id} enabled")));
                }
                None => {}
            },
            KeyCode::Char('d') => {
                if let Some((id, _)) = selected {
                    self.mode = Mode::Confirm {
                        action: Confirm::DeleteClientKey(id),
                    };
                }
            }
            KeyCode::Char('x') => self.console.dismiss_issued_key(),
            _ => {}
        }
    }

    fn handle_logs_section(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('t') => {
                let next = self.console.state().logs().tab().toggled();
                match self.console.set_log_tab(next) {
                    Ok(tab) if tab != next => {
                        self.status_message = Some(format!("{} is admin only", next.display_name()))
                    }
                    Ok(_) => {}
                    Err(e) => self.fail(e),
                }
            }
            KeyCode::Char('f') => {
                self.mode = Mode::LogFilter {
                    input: self.filter_input.clone(),
                    field: FilterField::From,
                }
            }
            KeyCode::Char('c') => {
                self.filter_input = FilterInput::default();
                self.console.clear_log_filter();
                self.status_message = Some("Filter cleared".into());
            }
            KeyCode::Char('n') | KeyCode::Right => self.console.next_log_page(),
            KeyCode::Char('p') | KeyCode::Left => self.console.prev_log_page(),
            KeyCode::Char('z') => {
                let size = self.console.cycle_log_page_size();
                self.status_message = Some(format!("{size} per page"));
            }
            _ => {}
        }
    }

    fn handle_config_section(&mut self, key: KeyEvent) {
        let selected = self.selected_config_key();
        match key.code {
            KeyCode::Enter | KeyCode::Char('e') => {
                if let Some(config_key) = selected {
                    self.edit_config(config_key);
                }
            }
            KeyCode::Char('m') => {
                let result = self.console.toggle_quota_mode();
                self.report(result.map(|mode| format!("Quota mode: {}", mode.as_str())));
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                let Some(group) = selected.map(|k| k.group()).filter(|g| g.is_batched()) else {
                    self.status_message = Some("Switches are saved as you change them".into());
                    return;
                };
                let result = if key.code == KeyCode::Char('s') {
                    self.console.save_group(group)
                } else {
                    self.console.post_group_form(group)
                };
                self.report(
                    result.map(|applied| {
                        format!("{}: saved {} settings", group.display_name(), applied.len())
                    }),
                );
            }
            KeyCode::Char('u') => {
                self.console.discard_drafts();
                self.status_message = Some("Unsaved changes discarded".into());
            }
            _ => {}
        }
    }

    /// Booleans flip in place; everything else opens the input bar.
    fn edit_config(&mut self, key: ConfigKey) {
        if !self.console.is_editable(key) {
            self.status_message = Some(ConsoleError::LeaderSettingsDisabled.to_string());
            return;
        }
        let state = self.console.state();
        let Some(snapshot) = state.config().ready() else {
            return;
        };
        let current = match state.draft(key.group()) {
            Some(draft) => draft.get(key).cloned(),
            None => key.current(snapshot),
        };

        if key == ConfigKey::AutoQuotaEnabled {
            let result = self.console.toggle_quota_mode();
            self.report(result.map(|mode| format!("Quota mode: {}", mode.as_str())));
            return;
        }
        if key.kind() == ValueKind::Bool {
            let flipped = !current.and_then(|v| v.as_bool()).unwrap_or(false);
            let result = if key.group() == ConfigGroup::Immediate {
                self.console.set_immediate(key, ConfigValue::Bool(flipped))
            } else {
                self.console
                    .edit_draft(key, if flipped { "on" } else { "off" })
                    .map(|_| format!("{} (unsaved)", key.label()))
            };
            self.report(result);
            return;
        }

        let input = match current {
            Some(ConfigValue::Text(s)) => s,
            Some(v) => v.to_wire(),
            None => String::new(),
        };
        self.mode = Mode::EditConfig { key, input };
    }

    fn handle_admin_section(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('h') | KeyCode::Char('l') => {
                self.admin_pane = match self.admin_pane {
                    AdminPane::Users => AdminPane::Keys,
                    AdminPane::Keys => AdminPane::Users,
                };
            }
            KeyCode::Char('H') => {
                let result = self.console.trigger_health_check();
                self.report(result);
            }
            KeyCode::Char('e') if self.admin_pane == AdminPane::Users => {
                let user = self
                    .tables
                    .admin_users
                    .selected()
                    .and_then(|i| self.console.state().admin_users().ready()?.get(i).cloned());
                if let Some(user) = user {
                    self.mode = Mode::EditQuota {
                        user_id: user.id,
                        username: user.username,
                        input: user.manual_rpm.map(|n| n.to_string()).unwrap_or_default(),
                    };
                }
            }
            KeyCode::Char('t') => match self.admin_pane {
                AdminPane::Users => {
                    let table = view::admin_users_table(self.console.state().admin_users());
                    if let Some(id) = self.selected_row_id(&table, &self.tables.admin_users) {
                        let result = self.console.toggle_user_active(id);
                        self.report(result.map(|active| {
                            format!("User #{id} {}", if active { "enabled" } else { "disabled" })
                        }));
                    }
                }
                AdminPane::Keys => {
                    let table = view::admin_keys_table(self.console.state().admin_keys());
                    if let Some(id) = self.selected_row_id(&table, &self.tables.admin_keys) {
                        let result = self.console.toggle_admin_key(id);
                        self.report(result.map(|enabled| {
                            format!("Key #{id} {}", if enabled { "enabled" } else { "disabled" })
                        }));
                    }
                }
            },
            _ => {}
        }
    }

    fn handle_add_key(&mut self, key: KeyEvent, mut input: String, verify_now: bool) {
        match key.code {
            KeyCode::Enter => {
                let result = self.console.add_key(&input, verify_now);
                self.mode = Mode::Normal;
                self.report(result);
            }
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Tab => {
                self.mode = Mode::AddKey {
                    input,
                    verify_now: !verify_now,
                }
            }
            KeyCode::Backspace => {
                input.pop();
                self.mode = Mode::AddKey { input, verify_now };
            }
            KeyCode::Char(c) => {
                input.push(c);
                self.mode = Mode::AddKey { input, verify_now };
            }
            _ => {}
        }
    }

    fn handle_new_client_key(&mut self, key: KeyEvent, mut name: String, rotate: bool) {
        match key.code {
            KeyCode::Enter => {
                let result = self.console.create_client_key(&name, rotate);
                self.mode = Mode::Normal;
                self.report(result.map(|k| format!("Issued client key #{}", k.id)));
            }
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Tab => {
                self.mode = Mode::NewClientKey {
                    name,
                    rotate: !rotate,
                }
            }
            KeyCode::Backspace => {
                name.pop();
                self.mode = Mode::NewClientKey { name, rotate };
            }
            KeyCode::Char(c) => {
                name.push(c);
                self.mode = Mode::NewClientKey { name, rotate };
            }
            _ => {}
        }
    }

    fn handle_edit_quota(
        &mut self,
        key: KeyEvent,
        user_id: i64,
        username: String,
        mut input: String,
    ) {
        match key.code {
            KeyCode::Enter => {
                let result = self.console.set_user_quota(user_id, &input);
                self.mode = Mode::Normal;
                self.report(result.map(|msg| format!("{username}: {msg}")));
            }
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Backspace => {
                input.pop();
                self.mode = Mode::EditQuota {
                    user_id,
                    username,
                    input,
                };
            }
            KeyCode::Char(c) => {
                input.push(c);
                self.mode = Mode::EditQuota {
                    user_id,
                    username,
                    input,
                };
            }
            _ => {}
        }
    }

    fn handle_edit_config(&mut self, key: KeyEvent, config_key: ConfigKey, mut input: String) {
        match key.code {
            KeyCode::Enter => {
                let result = if config_key.group() == ConfigGroup::Immediate {
                    self.console.set_immediate_input(config_key, &input)
                } else {
                    self.console
                        .edit_draft(config_key, &input)
                        .map(|_| format!("{} (unsaved)", config_key.label()))
                };
                self.mode = Mode::Normal;
                self.report(result);
            }
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Backspace => {
                input.pop();
                self.mode = Mode::EditConfig {
                    key: config_key,
                    input,
                };
            }
            KeyCode::Char(c) => {
                input.push(c);
                self.mode = Mode::EditConfig {
                    key: config_key,
                    input,
                };
            }
            _ => {}
        }
    }

    fn handle_log_filter(&mut self, key: KeyEvent, mut input: FilterInput, field: FilterField) {
        match key.code {
            KeyCode::Tab => {
                self.mode = Mode::LogFilter {
                    input,
                    field: field.next(),
                }
            }
            KeyCode::Enter => {
                match self
                    .console
                    .apply_log_filter(&input.from, &input.to, &input.query)
                {
                    Ok(()) => {
                        self.filter_input = input;
                        self.mode = Mode::Normal;
                    }
                    Err(e) => {
                        self.status_message = Some(format!("Error: {e}"));
                        self.mode = Mode::LogFilter { input, field };
                    }
                }
            }
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Backspace => {
                filter_field(&mut input, field).pop();
                self.mode = Mode::LogFilter { input, field };
            }
            KeyCode::Char(c) => {
                filter_field(&mut input, field).push(c);
                self.mode = Mode::LogFilter { input, field };
            }
            _ => {}
        }
    }

    fn handle_confirm(&mut self, key: KeyEvent, action: Confirm) {
        self.mode = Mode::Normal;
        if !matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
            return;
        }
        let result = match action {
            Confirm::DeleteKey(id) => self
                .console
                .delete_key(id)
                .map(|_| format!("Deleted key #{id}")),
            Confirm::DisableClientKey(id) => self
                .console
                .set_client_key_active(id, false)
                .map(|_| format!("Client key #{id} disabled")),
            Confirm::DeleteClientKey(id) => self
                .console
                .delete_client_key(id)
                .map(|_| format!("Deleted client key #{id}")),
        };
        self.report(result);
    }

    // -- rendering --

    pub fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        self.render_title_bar(frame, layout[0]);
        if self.console.is_logged_in() {
            self.render_body(frame, layout[1]);
        }
        self.render_status_bar(frame, layout[2]);

        // Overlays
        match &self.mode {
            Mode::Normal => {}
            Mode::Login {
                username,
                password,
                field,
            } => self.render_login(frame, username, password, *field, area),
            Mode::Register { form, field } => self.render_register(frame, form, *field, area),
            Mode::AddKey { input, verify_now } => {
                let masked = "*".repeat(input.chars().count());
                let label = format!(" Upstream key (verify now: {}) ", on_off(*verify_now));
                self.render_input_bar(frame, &label, &masked, area)
            }
            Mode::NewClientKey { name, rotate } => {
                let label = format!(" Client key name (rotate: {}) ", on_off(*rotate));
                self.render_input_bar(frame, &label, name, area)
            }
            Mode::EditQuota {
                username, input, ..
            } => {
                let label = format!(" Manual RPM for {username} (blank = auto) ");
                self.render_input_bar(frame, &label, input, area)
            }
            Mode::EditConfig { key, input } => {
                self.render_input_bar(frame, &format!(" {} ", key.label()), input, area)
            }
            Mode::LogFilter { input, field } => self.render_log_filter(frame, input, *field, area),
            Mode::Confirm { action } => self.render_confirm(frame, *action, area),
        }
    }

    fn render_title_bar(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::styled(
            " poolctl ",
            Style::default().bold().fg(Color::Cyan),
        )];
        if let Some(user) = self.console.state().user() {
            spans.push(Span::raw("| "));
            spans.push(Span::styled(
                user.username.clone(),
                Style::default().fg(Color::Yellow),
            ));
            spans.push(Span::styled(
                format!(" ({})", user.role),
                Style::default().fg(Color::DarkGray),
            ));
        }
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            self.console.base_url().to_string(),
            Style::default().fg(Color::DarkGray),
        ));
        frame.render_widget(Line::from(spans), area);
    }

    fn render_body(&self, frame: &mut Frame, area: Rect) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(0)])
            .split(area);

        let tabs: Vec<Span> = self
            .visible_sections()
            .into_iter()
            .enumerate()
            .flat_map(|(i, s)| {
                let style = if s == self.section {
                    Style::default().fg(Color::Black).bg(Color::Cyan).bold()
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                let number = Section::ALL.iter().position(|x| *x == s).unwrap_or(i) + 1;
                vec![Span::styled(format!(" {number} {} ", s.title()), style), Span::raw(" ")]
            })
            .collect();
        frame.render_widget(Line::from(tabs), layout[0]);

        let body = layout[1];
        let state = self.console.state();
        match self.section {
            Section::Dashboard => self.render_dashboard(frame, body),
            Section::Keys => self.tables.keys.render(
                frame,
                body,
                "Upstream keys",
                &view::keys_table(state.keys()),
                true,
            ),
            Section::ClientKeys => self.render_client_keys(frame, body),
            Section::Logs => self.render_logs(frame, body),
            Section::Config => self.render_config(frame, body),
            Section::Admin => {
                let cols = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                    .split(body);
                self.tables.admin_users.render(
                    frame,
                    cols[0],
                    "Users",
                    &view::admin_users_table(state.admin_users()),
                    self.admin_pane == AdminPane::Users,
                );
                self.tables.admin_keys.render(
                    frame,
                    cols[1],
                    "Key pool",
                    &view::admin_keys_table(state.admin_keys()),
                    self.admin_pane == AdminPane::Keys,
                );
            }
            Section::ProxyPool => {
                let (table, summary) = view::proxy_pool_table(state.proxy_pool());
                let rows = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Length(1), Constraint::Min(0)])
                    .split(body);
                frame.render_widget(
                    Line::from(Span::styled(
                        format!(" {summary}"),
                        Style::default().fg(Color::Magenta),
                    )),
                    rows[0],
                );
                self.tables
                    .proxy_pool
                    .render(frame, rows[1], "Proxies", &table, true);
            }
        }
    }

    fn render_dashboard(&self, frame: &mut Frame, area: Rect) {
        let state = self.console.state();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(8), Constraint::Min(0)])
            .split(area);

        let config = state.config().ready();
        let stats: Vec<Line> = view::dashboard_stats(state.user(), config)
            .into_iter()
            .map(|(label, value)| {
                Line::from(vec![
                    Span::styled(format!("{label:>12}: "), Style::default().fg(Color::DarkGray)),
                    Span::raw(value),
                ])
            })
            .collect();
        let block = Block::default()
            .title(" Account ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        frame.render_widget(Paragraph::new(stats).block(block), rows[0]);

        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[1]);

        let preview = view::key_preview(state.keys());
        let mut lines: Vec<Line> = preview
            .lines
            .iter()
            .map(|c| Line::from(Span::styled(c.text.clone(), tone_style(c.tone))))
            .collect();
        lines.push(Line::from(Span::styled(
            preview.summary,
            Style::default().fg(Color::DarkGray),
        )));
        let block = Block::default()
            .title(" My keys ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        frame.render_widget(Paragraph::new(lines).block(block), cols[0]);

        DataTable::default().render(
            frame,
            cols[1],
            "Models",
            &view::models_table(state.models()),
            false,
        );
    }

    fn render_client_keys(&self, frame: &mut Frame, area: Rect) {
        let state = self.console.state();
        let table = view::client_keys_table(state.client_keys());
        let Some(issued) = state.issued_client_key() else {
            self.tables
                .client_keys
                .render(frame, area, "Client keys", &table, true);
            return;
        };

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0)])
            .split(area);
        let block = Block::default()
            .title(" New client key (shown once, x to dismiss) ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green));
        let text = vec![
            Line::from(Span::styled(
                issued.api_key.clone(),
                Style::default().fg(Color::Green).bold(),
            )),
            Line::from(Span::styled(
                issued.api_key_masked.clone(),
                Style::default().fg(Color::DarkGray),
            )),
        ];
        frame.render_widget(Paragraph::new(text).block(block), rows[0]);
        self.tables
            .client_keys
            .render(frame, rows[1], "Client keys", &table, true);
    }

    fn render_logs(&self, frame: &mut Frame, area: Rect) {
        let logs = self.console.state().logs();
        let logs_view = view::logs_view(logs);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(0)])
            .split(area);

        let mut spans = vec![
            Span::styled(
                format!(" {} ", logs.tab().display_name()),
                Style::default().fg(Color::Cyan).bold(),
            ),
            Span::raw(format!("| {} ", logs_view.count_hint)),
            Span::styled(
                format!("| page {} ", logs_view.page_info),
                Style::default().fg(Color::Yellow),
            ),
            Span::styled(
                format!("| {} per page", logs.pager().page_size()),
                Style::default().fg(Color::DarkGray),
            ),
        ];
        if !logs.filter().is_empty() {
            spans.push(Span::styled(
                format!(" | filter: {}", describe_filter(&self.filter_input)),
                Style::default().fg(Color::Magenta),
            ));
        }
        frame.render_widget(Line::from(spans), rows[0]);

        let title = logs.tab().display_name();
        self.tables
            .logs
            .render(frame, rows[1], title, &logs_view.table, true);
    }

    fn render_config(&self, frame: &mut Frame, area: Rect) {
        match self.console.state().config() {
            Remote::Ready(_) => {
                let rows = self.config_rows();
                self.tables
                    .config
                    .render(frame, area, "Settings", &view::config_table(&rows), true);
            }
            Remote::Failed(e) => {
                let paragraph = Paragraph::new(format!("failed to load config: {e}"))
                    .style(Style::default().fg(Color::Red))
                    .block(Block::default().title(" Settings ").borders(Borders::ALL));
                frame.render_widget(paragraph, area);
            }
            Remote::Idle => {
                let paragraph = Paragraph::new("not loaded, press r")
                    .style(Style::default().fg(Color::DarkGray))
                    .block(Block::default().title(" Settings ").borders(Borders::ALL));
                frame.render_widget(paragraph, area);
            }
        }
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        if let Some(ref msg) = self.status_message {
            let color = if msg.starts_with("Error") || msg.contains("failed") {
                Color::Red
            } else {
                Color::Green
            };
            let line = Line::from(Span::styled(format!(" {msg}"), Style::default().fg(color)));
            frame.render_widget(line, area);
            return;
        }

        let hints = match &self.mode {
            Mode::Login { .. } => vec![
                ("Tab", "field"),
                ("Enter", "login"),
                ("F2", "register"),
                ("Ctrl+C", "quit"),
            ],
            Mode::Register { .. } => vec![("Tab", "field"), ("Enter", "next/submit"), ("Esc", "back")],
            Mode::Normal => {
                let mut hints = vec![("q", "quit"), ("1-7/Tab", "section"), ("j/k", "select")];
                hints.extend(match self.section {
                    Section::Dashboard => vec![],
                    Section::Keys => vec![("a", "add"), ("d", "del")],
                    Section::ClientKeys => vec![("n", "new"), ("t", "toggle"), ("d", "del")],
                    Section::Logs => vec![
                        ("t", "tab"),
                        ("f", "filter"),
                        ("c", "clear"),
                        ("n/p", "page"),
                        ("z", "page size"),
                    ],
                    Section::Config => vec![
                        ("Enter", "edit"),
                        ("m", "quota mode"),
                        ("s", "save group"),
                        ("S", "save as form"),
                        ("u", "discard"),
                    ],
                    Section::Admin => vec![
                        ("h/l", "pane"),
                        ("e", "quota"),
                        ("t", "toggle"),
                        ("H", "health check"),
                    ],
                    Section::ProxyPool => vec![],
                });
                hints.extend([("r", "refresh"), ("R", "reload all"), ("L", "logout")]);
                hints
            }
            Mode::AddKey { .. } | Mode::NewClientKey { .. } => {
                vec![("Enter", "submit"), ("Tab", "toggle option"), ("Esc", "cancel")]
            }
            Mode::EditQuota { .. } | Mode::EditConfig { .. } => {
                vec![("Enter", "save"), ("Esc", "cancel")]
            }
            Mode::LogFilter { .. } => vec![("Tab", "field"), ("Enter", "apply"), ("Esc", "cancel")],
            Mode::Confirm { .. } => vec![("y", "confirm"), ("any", "cancel")],
        };

        let spans: Vec<Span> = hints
            .into_iter()
            .flat_map(|(key, desc)| {
                vec![
                    Span::styled(
                        format!(" {key}"),
                        Style::default().fg(Color::Yellow).bold(),
                    ),
                    Span::raw(format!(" {desc} ")),
                ]
            })
            .collect();

        frame.render_widget(Line::from(spans), area);
    }

    fn render_input_bar(&self, frame: &mut Frame, label: &str, input: &str, area: Rect) {
        let input_area = Rect {
            x: area.x,
            y: area.y + area.height.saturating_sub(4),
            width: area.width,
            height: 3,
        };
        frame.render_widget(Clear, input_area);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(label);
        let paragraph = Paragraph::new(input).block(block);
        frame.render_widget(paragraph, input_area);
    }

    fn render_form(
        &self,
        frame: &mut Frame,
        title: &str,
        fields: &[(&str, String, bool)],
        area: Rect,
    ) {
        let popup = centered_rect(50, 40, area);
        frame.render_widget(Clear, popup);

        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let mut lines = Vec::new();
        for (label, value, focused) in fields {
            let style = if *focused {
                Style::default().fg(Color::Cyan).bold()
            } else {
                Style::default()
            };
            lines.push(Line::from(vec![
                Span::styled(format!("{label:>10}: "), style),
                Span::raw(value.clone()),
            ]));
            lines.push(Line::from(""));
        }
        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn render_login(
        &self,
        frame: &mut Frame,
        username: &str,
        password: &str,
        field: LoginField,
        area: Rect,
    ) {
        self.render_form(
            frame,
            " Log in ",
            &[
                ("Username", username.to_string(), field == LoginField::Username),
                (
                    "Password",
                    "*".repeat(password.chars().count()),
                    field == LoginField::Password,
                ),
            ],
            area,
        );
    }

    fn render_register(
        &self,
        frame: &mut Frame,
        form: &RegisterForm,
        field: RegisterField,
        area: Rect,
    ) {
        self.render_form(
            frame,
            " Register ",
            &[
                ("Username", form.username.clone(), field == RegisterField::Username),
                ("Email", form.email.clone(), field == RegisterField::Email),
                (
                    "Password",
                    "*".repeat(form.password.chars().count()),
                    field == RegisterField::Password,
                ),
                (
                    "Confirm",
                    "*".repeat(form.confirm_password.chars().count()),
                    field == RegisterField::Confirm,
                ),
            ],
            area,
        );
    }

    fn render_log_filter(
        &self,
        frame: &mut Frame,
        input: &FilterInput,
        field: FilterField,
        area: Rect,
    ) {
        self.render_form(
            frame,
            " Filter logs (dates: YYYY-MM-DD [HH:MM]) ",
            &[
                ("From", input.from.clone(), field == FilterField::From),
                ("To", input.to.clone(), field == FilterField::To),
                ("Search", input.query.clone(), field == FilterField::Query),
            ],
            area,
        );
    }

    fn render_confirm(&self, frame: &mut Frame, action: Confirm, area: Rect) {
        let popup = centered_rect(50, 20, area);
        frame.render_widget(Clear, popup);

        let block = Block::default()
            .title(" Confirm ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red));

        let text = format!("{}\n\n(y)es / (any key) cancel", action.prompt());
        let paragraph = Paragraph::new(text)
            .block(block)
            .wrap(Wrap { trim: false })
            .alignment(Alignment::Center);
        frame.render_widget(paragraph, popup);
    }
}

fn register_field(form: &mut RegisterForm, field: RegisterField) -> &mut String {
    match field {
        RegisterField::Username => &mut form.username,
        RegisterField::Email => &mut form.email,
        RegisterField::Password => &mut form.password,
        RegisterField::Confirm => &mut form.confirm_password,
    }
}

fn filter_field(input: &mut FilterInput, field: FilterField) -> &mut String {
    match field {
        FilterField::From => &mut input.from,
        FilterField::To => &mut input.to,
        FilterField::Query => &mut input.query,
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

fn describe_filter(input: &FilterInput) -> String {
    let mut parts = Vec::new();
    if !input.from.trim().is_empty() {
        parts.push(format!("from {}", input.from.trim()));
    }
    if !input.to.trim().is_empty() {
        parts.push(format!("to {}", input.to.trim()));
    }
    if !input.query.trim().is_empty() {
        parts.push(format!("\"{}\"", input.query.trim()));
    }
    parts.join(" ")
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
