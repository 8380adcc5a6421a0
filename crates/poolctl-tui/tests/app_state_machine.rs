//! State machine tests for the TUI App.
//!
//! Each test spawns a mock backend on a separate thread (to avoid nested tokio runtime panics),
//! builds a Console and an App around it, and simulates key events to test mode transitions.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use poolctl_core::LogTab;
use poolctl_mock_server::test_helpers::{spawn_test_server_thread, TestServer};
use poolctl_service::BlockingHttpService;
use poolctl_tui::app::{AdminPane, App, Mode, Section};
use poolctl_tui::token_store::MemoryTokenStore;
use poolctl_tui::Console;
use ratatui::backend::TestBackend;
use ratatui::Terminal;

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn char_key(c: char) -> KeyEvent {
    key(KeyCode::Char(c))
}

fn type_str(app: &mut App, s: &str) {
    for c in s.chars() {
        app.handle_key(char_key(c));
    }
}

fn make_app(server: &TestServer) -> App {
    let svc = BlockingHttpService::new(&server.base_url).unwrap();
    App::new(Console::new(svc, Box::new(MemoryTokenStore::default()), 50))
}

fn login(app: &mut App, username: &str, password: &str) {
    type_str(app, username);
    app.handle_key(key(KeyCode::Tab));
    type_str(app, password);
    app.handle_key(key(KeyCode::Enter));
}

fn logged_in(server: &TestServer, username: &str, password: &str) -> App {
    let mut app = make_app(server);
    login(&mut app, username, password);
    assert!(matches!(app.mode(), Mode::Normal));
    app
}

/// Draw one frame, so rendering of the current mode is exercised.
fn draw(app: &App) -> String {
    let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
    terminal.draw(|frame| app.render(frame)).unwrap();
    let buffer = terminal.backend().buffer().clone();
    buffer
        .content()
        .iter()
        .map(|cell| cell.symbol())
        .collect::<String>()
}

// ---- Login gate ----

#[test]
fn app_starts_at_login_without_token() {
    let server = spawn_test_server_thread();
    let app = make_app(&server);
    assert!(matches!(app.mode(), Mode::Login { .. }));
    assert!(app.is_input_mode());
    assert!(draw(&app).contains("Log in"));
}

#[test]
fn login_enters_normal_mode() {
    let server = spawn_test_server_thread();
    let app = logged_in(&server, "admin", "admin-pass");
    assert_eq!(app.section(), Section::Dashboard);
    assert_eq!(app.status_message(), Some("loaded"));
    assert!(!app.is_input_mode());
    assert!(draw(&app).contains("admin"));
}

#[test]
fn failed_login_stays_at_gate() {
    let server = spawn_test_server_thread();
    let mut app = make_app(&server);
    login(&mut app, "admin", "nope");
    match app.mode() {
        Mode::Login {
            username, password, ..
        } => {
            assert_eq!(username, "admin");
            assert!(password.is_empty());
        }
        other => panic!("expected login mode, got {other:?}"),
    }
    assert!(app
        .status_message()
        .is_some_and(|m| m.starts_with("Login failed")));
}

#[test]
fn enter_on_username_moves_to_password() {
    let server = spawn_test_server_thread();
    let mut app = make_app(&server);
    type_str(&mut app, "alice");
    app.handle_key(key(KeyCode::Enter));
    type_str(&mut app, "alice-pass");
    app.handle_key(key(KeyCode::Backspace));
    app.handle_key(char_key('s'));
    app.handle_key(key(KeyCode::Enter));
    assert!(matches!(app.mode(), Mode::Normal));
}

#[test]
fn register_flow_returns_to_login() {
    let server = spawn_test_server_thread();
    let mut app = make_app(&server);
    app.handle_key(key(KeyCode::F(2)));
    assert!(matches!(app.mode(), Mode::Register { .. }));

    type_str(&mut app, "carol");
    app.handle_key(key(KeyCode::Enter));
    app.handle_key(key(KeyCode::Enter)); // no email
    type_str(&mut app, "long-enough");
    app.handle_key(key(KeyCode::Enter));
    type_str(&mut app, "long-enough");
    app.handle_key(key(KeyCode::Enter));

    match app.mode() {
        Mode::Login { username, .. } => assert_eq!(username, "carol"),
        other => panic!("expected login mode, got {other:?}"),
    }
    assert_eq!(app.status_message(), Some("registered, please log in"));
}

#[test]
fn register_mismatch_keeps_form() {
    let server = spawn_test_server_thread();
    let mut app = make_app(&server);
    app.handle_key(key(KeyCode::F(2)));
    type_str(&mut app, "carol");
    app.handle_key(key(KeyCode::Tab));
    app.handle_key(key(KeyCode::Tab));
    type_str(&mut app, "long-enough");
    app.handle_key(key(KeyCode::Tab));
    type_str(&mut app, "other");
    app.handle_key(key(KeyCode::Enter));

    assert!(matches!(app.mode(), Mode::Register { .. }));
    assert!(app
        .status_message()
        .is_some_and(|m| m.contains("passwords do not match")));

    app.handle_key(key(KeyCode::Esc));
    assert!(matches!(app.mode(), Mode::Login { .. }));
}

// ---- Navigation ----

#[test]
fn number_keys_select_sections() {
    let server = spawn_test_server_thread();
    let mut app = logged_in(&server, "admin", "admin-pass");
    app.handle_key(char_key('4'));
    assert_eq!(app.section(), Section::Logs);
    app.handle_key(char_key('7'));
    assert_eq!(app.section(), Section::ProxyPool);
    assert!(draw(&app).contains("Proxy pool"));
    app.handle_key(key(KeyCode::Tab));
    assert_eq!(app.section(), Section::Dashboard);
    app.handle_key(key(KeyCode::BackTab));
    assert_eq!(app.section(), Section::ProxyPool);
}

#[test]
fn admin_sections_are_hidden_from_users() {
    let server = spawn_test_server_thread();
    let mut app = logged_in(&server, "alice", "alice-pass");
    app.handle_key(char_key('5'));
    assert_eq!(app.section(), Section::Dashboard);
    assert_eq!(app.status_message(), Some("Config is admin only"));

    // Tab skips the admin sections
    app.handle_key(char_key('4'));
    app.handle_key(key(KeyCode::Tab));
    assert_eq!(app.section(), Section::Dashboard);
}

#[test]
fn logout_returns_to_gate() {
    let server = spawn_test_server_thread();
    let mut app = logged_in(&server, "admin", "admin-pass");
    app.handle_key(char_key('L'));
    assert!(matches!(app.mode(), Mode::Login { .. }));
    assert!(!app.console().is_logged_in());
}

#[test]
fn expired_session_goes_back_to_login() {
    let server = spawn_test_server_thread();
    let mut app = logged_in(&server, "alice", "alice-pass");
    server.backend().revoke_tokens();
    app.handle_key(char_key('2'));
    app.handle_key(char_key('r'));
    assert!(matches!(app.mode(), Mode::Login { .. }));
    assert!(app
        .status_message()
        .is_some_and(|m| m.starts_with("Session expired")));
}

// ---- Keys ----

#[test]
fn add_key_flow() {
    let server = spawn_test_server_thread();
    let mut app = logged_in(&server, "alice", "alice-pass");
    app.handle_key(char_key('2'));
    app.handle_key(char_key('a'));
    assert!(matches!(
        app.mode(),
        Mode::AddKey {
            verify_now: true,
            ..
        }
    ));
    app.handle_key(key(KeyCode::Tab));
    assert!(matches!(
        app.mode(),
        Mode::AddKey {
            verify_now: false,
            ..
        }
    ));
    type_str(&mut app, "pst-secret");
    assert!(!draw(&app).contains("pst-secret"));
    app.handle_key(key(KeyCode::Enter));

    assert!(matches!(app.mode(), Mode::Normal));
    assert!(app.status_message().is_some_and(|m| m.contains("pending")));
    assert_eq!(
        app.console().state().keys().ready().map(Vec::len),
        Some(1)
    );
}

#[test]
fn delete_key_needs_confirmation() {
    let server = spawn_test_server_thread();
    let mut app = logged_in(&server, "alice", "alice-pass");
    app.handle_key(char_key('2'));
    app.handle_key(char_key('a'));
    type_str(&mut app, "pst-one");
    app.handle_key(key(KeyCode::Enter));

    app.handle_key(char_key('d'));
    assert!(matches!(app.mode(), Mode::Confirm { .. }));
    assert!(draw(&app).contains("(y)es"));
    app.handle_key(char_key('n'));
    assert!(matches!(app.mode(), Mode::Normal));
    assert_eq!(
        app.console().state().keys().ready().map(Vec::len),
        Some(1)
    );

    app.handle_key(char_key('d'));
    app.handle_key(char_key('y'));
    assert_eq!(
        app.console().state().keys().ready().map(Vec::len),
        Some(0)
    );
}

#[test]
fn esc_cancels_input() {
    let server = spawn_test_server_thread();
    let mut app = logged_in(&server, "alice", "alice-pass");
    app.handle_key(char_key('2'));
    app.handle_key(char_key('a'));
    type_str(&mut app, "pst-x");
    app.handle_key(key(KeyCode::Esc));
    assert!(matches!(app.mode(), Mode::Normal));
    assert_eq!(
        app.console().state().keys().ready().map(Vec::len),
        Some(0)
    );
}

// ---- Client keys ----

#[test]
fn new_client_key_shows_plaintext_once() {
    let server = spawn_test_server_thread();
    let mut app = logged_in(&server, "alice", "alice-pass");
    app.handle_key(char_key('3'));
    app.handle_key(char_key('n'));
    type_str(&mut app, "ci");
    app.handle_key(key(KeyCode::Enter));

    let issued = app
        .console()
        .state()
        .issued_client_key()
        .cloned()
        .unwrap();
    assert!(draw(&app).contains(&issued.api_key));

    app.handle_key(char_key('x'));
    assert!(app.console().state().issued_client_key().is_none());
    assert!(!draw(&app).contains(&issued.api_key));
}

#[test]
fn disabling_client_key_asks_first() {
    let server = spawn_test_server_thread();
    let mut app = logged_in(&server, "alice", "alice-pass");
    app.handle_key(char_key('3'));
    app.handle_key(char_key('n'));
    app.handle_key(key(KeyCode::Enter));

    app.handle_key(char_key('t'));
    assert!(matches!(app.mode(), Mode::Confirm { .. }));
    app.handle_key(char_key('y'));
    let keys = app.console().state().client_keys().ready().unwrap();
    assert!(!keys[0].is_active);

    // Enabling goes straight through
    app.handle_key(char_key('t'));
    assert!(matches!(app.mode(), Mode::Normal));
    let keys = app.console().state().client_keys().ready().unwrap();
    assert!(keys[0].is_active);
}

// ---- Logs ----

#[test]
fn log_filter_and_paging_keys() {
    let server = spawn_test_server_thread();
    let entries = (0..30)
        .map(|i| poolctl_core::LogEntry {
            created_at: Some(format!("2024-05-{:02}T08:00:00", 1 + i % 28)),
            action: Some(if i % 2 == 0 { "generate-image" } else { "upscale" }.into()),
            status_code: Some(200),
            ..Default::default()
        })
        .collect();
    server.backend().seed_logs("alice", entries);

    let mut app = logged_in(&server, "alice", "alice-pass");
    app.handle_key(char_key('4'));
    assert_eq!(app.console().state().logs().filtered().len(), 30);

    app.handle_key(char_key('z'));
    assert_eq!(app.status_message(), Some("100 per page"));
    app.handle_key(char_key('z'));
    app.handle_key(char_key('z'));
    assert_eq!(app.status_message(), Some("20 per page"));
    app.handle_key(char_key('n'));
    assert_eq!(app.console().state().logs().pager().page(), 2);
    app.handle_key(char_key('n'));
    assert_eq!(app.console().state().logs().pager().page(), 2);

    app.handle_key(char_key('f'));
    assert!(matches!(app.mode(), Mode::LogFilter { .. }));
    app.handle_key(key(KeyCode::Tab));
    app.handle_key(key(KeyCode::Tab));
    type_str(&mut app, "upscale");
    app.handle_key(key(KeyCode::Enter));
    assert!(matches!(app.mode(), Mode::Normal));
    assert_eq!(app.console().state().logs().filtered().len(), 15);
    assert_eq!(app.console().state().logs().pager().page(), 1);
    assert!(draw(&app).contains("filter"));

    app.handle_key(char_key('c'));
    assert_eq!(app.console().state().logs().filtered().len(), 30);
}

#[test]
fn bad_filter_date_keeps_form_open() {
    let server = spawn_test_server_thread();
    let mut app = logged_in(&server, "alice", "alice-pass");
    app.handle_key(char_key('4'));
    app.handle_key(char_key('f'));
    type_str(&mut app, "yesterday");
    app.handle_key(key(KeyCode::Enter));
    assert!(matches!(app.mode(), Mode::LogFilter { .. }));
    assert!(app.status_message().is_some_and(|m| m.starts_with("Error")));
}

#[test]
fn log_tab_switch_is_admin_only() {
    let server = spawn_test_server_thread();
    let mut app = logged_in(&server, "alice", "alice-pass");
    app.handle_key(char_key('4'));
    app.handle_key(char_key('t'));
    assert_eq!(app.console().state().logs().tab(), LogTab::Mine);
    assert_eq!(app.status_message(), Some("All logs is admin only"));

    let mut admin = logged_in(&server, "admin", "admin-pass");
    admin.handle_key(char_key('4'));
    admin.handle_key(char_key('t'));
    assert_eq!(admin.console().state().logs().tab(), LogTab::All);
}

// ---- Config ----

#[test]
fn config_toggle_and_edit() {
    let server = spawn_test_server_thread();
    let mut app = logged_in(&server, "admin", "admin-pass");
    app.handle_key(char_key('5'));

    // First row is the quota mode switch
    app.handle_key(key(KeyCode::Enter));
    assert_eq!(app.status_message(), Some("Quota mode: manual"));
    assert!(!server.backend().config().auto_quota_enabled);

    // Leader settings are locked while multi-node is off
    app.handle_key(char_key('j'));
    app.handle_key(char_key('j'));
    app.handle_key(char_key('j'));
    app.handle_key(key(KeyCode::Enter));
    assert!(matches!(app.mode(), Mode::Normal));
    assert!(app.status_message().is_some());

    // Base RPM opens the input bar and lands in the draft
    app.handle_key(char_key('g'));
    for _ in 0..7 {
        app.handle_key(char_key('j'));
    }
    app.handle_key(key(KeyCode::Enter));
    match app.mode() {
        Mode::EditConfig { input, .. } => assert_eq!(input, "0"),
        other => panic!("expected config edit, got {other:?}"),
    }
    app.handle_key(key(KeyCode::Backspace));
    type_str(&mut app, "12");
    app.handle_key(key(KeyCode::Enter));
    assert!(app
        .status_message()
        .is_some_and(|m| m.ends_with("(unsaved)")));
    assert_eq!(server.backend().config().base_rpm, 0);

    app.handle_key(char_key('s'));
    assert_eq!(server.backend().config().base_rpm, 12);
    assert!(app
        .status_message()
        .is_some_and(|m| m.starts_with("Common: saved")));
}

#[test]
fn config_invalid_input_reports_error() {
    let server = spawn_test_server_thread();
    let mut app = logged_in(&server, "admin", "admin-pass");
    app.handle_key(char_key('5'));
    app.handle_key(char_key('g'));
    for _ in 0..7 {
        app.handle_key(char_key('j'));
    }
    app.handle_key(key(KeyCode::Enter));
    type_str(&mut app, "x");
    app.handle_key(key(KeyCode::Enter));
    assert!(matches!(app.mode(), Mode::Normal));
    assert!(app.status_message().is_some_and(|m| m.starts_with("Error")));
}

// ---- Admin ----

#[test]
fn admin_quota_edit_and_pane_switch() {
    let server = spawn_test_server_thread();
    let mut app = logged_in(&server, "admin", "admin-pass");
    app.handle_key(char_key('6'));
    assert_eq!(app.admin_pane(), AdminPane::Users);

    // Second row is alice
    app.handle_key(char_key('j'));
    app.handle_key(char_key('e'));
    match app.mode() {
        Mode::EditQuota { username, input, .. } => {
            assert_eq!(username, "alice");
            assert!(input.is_empty());
        }
        other => panic!("expected quota edit, got {other:?}"),
    }
    type_str(&mut app, "40");
    app.handle_key(key(KeyCode::Enter));
    assert_eq!(app.status_message(), Some("alice: quota set to 40"));
    let alice = server.backend().user_id("alice").unwrap();
    assert_eq!(server.backend().user(alice).unwrap().manual_rpm, Some(40));

    app.handle_key(char_key('l'));
    assert_eq!(app.admin_pane(), AdminPane::Keys);
    app.handle_key(char_key('H'));
    assert!(app
        .status_message()
        .is_some_and(|m| m.starts_with("checked")));
}
