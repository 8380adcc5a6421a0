//! Pure projections from console state to table view models.
//!
//! Nothing here touches the terminal. The ratatui components only map a
//! `Tone` to a colour and lay the cells out.

use poolctl_core::client_key::ClientKey;
use poolctl_core::config::{ConfigDraft, ConfigGroup, ConfigValue, QuotaMode};
use poolctl_core::key::{tier_label, AdminKey, UpstreamKey};
use poolctl_core::log::parse_timestamp;
use poolctl_core::models::ModelCatalog;
use poolctl_core::proxy_pool::ProxyPoolStatus;
use poolctl_core::user::{quota_label, AdminUser};
use poolctl_core::{ConfigKey, ConfigSnapshot, CurrentUser, LogEntry, LogTab};

use crate::state::{LogState, Remote};

const KEY_PREVIEW_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Ok,
    Warn,
    Bad,
    Muted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub tone: Tone,
}

impl Cell {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::toned(text, Tone::Plain)
    }

    pub fn toned(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

/// One table row. `id` is the server id the row actions operate on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub id: Option<i64>,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableView {
    pub header: Vec<&'static str>,
    pub rows: Vec<RowView>,
    /// Shown instead of the rows when there are none.
    pub empty: String,
}

impl TableView {
    fn new(header: Vec<&'static str>) -> Self {
        Self {
            header,
            rows: Vec::new(),
            empty: "no data".into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_id(&self, index: usize) -> Option<i64> {
        self.rows.get(index).and_then(|r| r.id)
    }

    fn from_remote<T>(
        header: Vec<&'static str>,
        remote: &Remote<Vec<T>>,
        empty: &str,
        row: impl Fn(&T) -> RowView,
    ) -> Self {
        let mut table = Self::new(header);
        match remote {
            Remote::Idle => table.empty = "not loaded".into(),
            Remote::Failed(e) => table.empty = e.clone(),
            Remote::Ready(items) => {
                table.rows = items.iter().map(row).collect();
                table.empty = empty.into();
            }
        }
        table
    }
}

/// `YYYY-MM-DD HH:MM:SS`, the raw text when it does not parse, `-` when absent.
pub fn format_timestamp(raw: Option<&str>) -> String {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => "-".into(),
        Some(s) => parse_timestamp(s)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| s.to_string()),
    }
}

fn or_dash(value: Option<&str>) -> String {
    match value {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => "-".into(),
    }
}

fn key_status_tone(status: &str) -> Tone {
    match status {
        "active" => Tone::Ok,
        "pending" => Tone::Muted,
        "cooldown" => Tone::Warn,
        _ => Tone::Bad,
    }
}

fn active_cell(active: bool) -> Cell {
    if active {
        Cell::toned("active", Tone::Ok)
    } else {
        Cell::toned("disabled", Tone::Muted)
    }
}

/// Label of the action that flips `enabled`.
fn toggle_label(enabled: bool) -> &'static str {
    if enabled {
        "disable"
    } else {
        "enable"
    }
}

pub fn keys_table(keys: &Remote<Vec<UpstreamKey>>) -> TableView {
    TableView::from_remote(
        vec!["ID", "STATUS", "TIER", "CHECKED"],
        keys,
        "no keys yet, press a to add one",
        |k| RowView {
            id: Some(k.id),
            cells: vec![
                Cell::plain(k.id.to_string()),
                Cell::toned(k.status.clone(), key_status_tone(&k.status)),
                Cell::plain(tier_label(k.tier)),
                Cell::toned(format_timestamp(k.last_checked_at.as_deref()), Tone::Muted),
            ],
        },
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPreview {
    pub lines: Vec<Cell>,
    pub summary: String,
}

/// First few keys for the dashboard, plus a count.
pub fn key_preview(keys: &Remote<Vec<UpstreamKey>>) -> KeyPreview {
    match keys {
        Remote::Ready(keys) => KeyPreview {
            lines: keys
                .iter()
                .take(KEY_PREVIEW_LEN)
                .map(|k| {
                    Cell::toned(
                        format!("#{} {} (tier {})", k.id, k.status, tier_label(k.tier)),
                        key_status_tone(&k.status),
                    )
                })
                .collect(),
            summary: format!("{} keys", keys.len()),
        },
        Remote::Failed(e) => KeyPreview {
            lines: Vec::new(),
            summary: e.clone(),
        },
        Remote::Idle => KeyPreview {
            lines: Vec::new(),
            summary: "0 keys".into(),
        },
    }
}

pub fn admin_users_table(users: &Remote<Vec<AdminUser>>) -> TableView {
    TableView::from_remote(
        vec!["USER", "ROLE", "QUOTA", "STATE", "ACTION"],
        users,
        "no users",
        |u| RowView {
            id: Some(u.id),
            cells: vec![
                Cell::plain(u.username.clone()),
                Cell::plain(u.role.as_str()),
                Cell::plain(quota_label(u.manual_rpm)),
                active_cell(u.is_active),
                Cell::toned(toggle_label(u.is_active), Tone::Muted),
            ],
        },
    )
}

pub fn admin_keys_table(keys: &Remote<Vec<AdminKey>>) -> TableView {
    TableView::from_remote(
        vec!["ID", "OWNER", "STATUS", "TIER", "ACTION"],
        keys,
        "no keys in the pool",
        |k| RowView {
            id: Some(k.id),
            cells: vec![
                Cell::plain(k.id.to_string()),
                Cell::plain(k.owner_label()),
                Cell::toned(
                    k.status.clone(),
                    if k.is_enabled {
                        key_status_tone(&k.status)
                    } else {
                        Tone::Muted
                    },
                ),
                Cell::plain(tier_label(k.tier)),
                Cell::toned(toggle_label(k.is_enabled), Tone::Muted),
            ],
        },
    )
}

pub fn client_keys_table(keys: &Remote<Vec<ClientKey>>) -> TableView {
    TableView::from_remote(
        vec!["PREFIX", "NAME", "STATE", "CREATED", "LAST USED"],
        keys,
        "no client keys, press n to issue one",
        |k| RowView {
            id: Some(k.id),
            cells: vec![
                Cell::plain(format!("{}...", k.prefix)),
                Cell::plain(or_dash(k.name.as_deref())),
                active_cell(k.is_active),
                Cell::plain(format_timestamp(k.created_at.as_deref())),
                Cell::toned(format_timestamp(k.last_used_at.as_deref()), Tone::Muted),
            ],
        },
    )
}

/// Proxy table plus a one-line pool summary.
pub fn proxy_pool_table(pool: &Remote<ProxyPoolStatus>) -> (TableView, String) {
    let mut table = TableView::new(vec!["PROXY", "STATE", "COOLDOWN", "FAILS", "LAST ERROR"]);
    let summary = match pool {
        Remote::Idle => {
            table.empty = "not loaded".into();
            String::new()
        }
        Remote::Failed(e) => {
            table.empty = e.clone();
            String::new()
        }
        Remote::Ready(status) => {
            table.empty = "no proxies configured".into();
            table.rows = status
                .items
                .iter()
                .map(|p| RowView {
                    id: None,
                    cells: vec![
                        Cell::plain(p.proxy.clone()),
                        if p.is_available {
                            Cell::toned("available", Tone::Ok)
                        } else {
                            Cell::toned("cooldown", Tone::Warn)
                        },
                        Cell::plain(if p.cooldown_seconds > 0 {
                            format!("{}s", p.cooldown_seconds)
                        } else {
                            "-".into()
                        }),
                        Cell::toned(
                            p.fail_streak.to_string(),
                            if p.fail_streak > 0 { Tone::Warn } else { Tone::Plain },
                        ),
                        Cell::toned(or_dash(p.last_error.as_deref()), Tone::Muted),
                    ],
                })
                .collect();
            format!(
                "{} | mode {} | strategy {}",
                if status.enabled { "enabled" } else { "disabled" },
                or_dash(Some(status.mode.as_str())),
                or_dash(Some(status.strategy.as_str())),
            )
        }
    };
    (table, summary)
}

pub fn models_table(models: &Remote<ModelCatalog>) -> TableView {
    let mut table = TableView::new(vec!["MODEL"]);
    match models {
        Remote::Idle => table.empty = "not loaded".into(),
        Remote::Failed(e) => table.empty = e.clone(),
        Remote::Ready(catalog) => {
            table.empty = "no models".into();
            table.rows = catalog
                .models
                .iter()
                .map(|m| RowView {
                    id: None,
                    cells: vec![Cell::plain(m.clone())],
                })
                .collect();
        }
    }
    table
}

/// Label/value pairs of the dashboard header.
pub fn dashboard_stats(
    user: Option<&CurrentUser>,
    config: Option<&ConfigSnapshot>,
) -> Vec<(&'static str, String)> {
    let flag = |v: Option<bool>| match v {
        Some(true) => "on".to_string(),
        Some(false) => "off".to_string(),
        None => "-".to_string(),
    };
    let number = |v: Option<i64>| v.map_or_else(|| "-".to_string(), |n| n.to_string());
    vec![
        ("user", or_dash(user.map(|u| u.username.as_str()))),
        ("role", or_dash(user.map(|u| u.role.as_str()))),
        ("manual rpm", user.map_or_else(|| "-".into(), |u| quota_label(u.manual_rpm))),
        ("auto quota", flag(config.map(|c| c.auto_quota_enabled))),
        ("base rpm", number(config.map(|c| c.base_rpm))),
        ("per-key rpm", number(config.map(|c| c.per_key_rpm))),
    ]
}

// ---- logs ----

pub fn latency_label(latency_ms: Option<f64>) -> String {
    match latency_ms {
        Some(ms) if ms > 0.0 => format!("{}ms", ms.round() as i64),
        _ => "-".into(),
    }
}

pub fn status_code_tone(code: Option<i64>) -> Tone {
    match code.unwrap_or(0) {
        c if c >= 500 => Tone::Bad,
        c if c >= 400 => Tone::Warn,
        _ => Tone::Ok,
    }
}

pub fn status_tone(status: Option<&str>) -> Tone {
    match status {
        Some("success") => Tone::Ok,
        Some("failed") => Tone::Warn,
        _ => Tone::Muted,
    }
}

fn log_row(entry: &LogEntry, tab: LogTab) -> RowView {
    let time = Cell::toned(format_timestamp(entry.created_at.as_deref()), Tone::Muted);
    let status = Cell::toned(
        or_dash(entry.status.as_deref()),
        status_tone(entry.status.as_deref()),
    );
    let code = Cell::toned(
        entry.status_code.map_or_else(|| "-".into(), |c| c.to_string()),
        status_code_tone(entry.status_code),
    );
    let action = Cell::plain(or_dash(entry.action.as_deref()));
    let latency = Cell::plain(latency_label(entry.latency_ms));
    let reason = Cell::toned(or_dash(entry.reject_reason.as_deref()), Tone::Muted);
    let cells = match tab {
        LogTab::Mine => vec![time, status, code, action, latency, reason],
        LogTab::All => vec![
            time,
            Cell::plain(or_dash(entry.username.as_deref())),
            status,
            code,
            action,
            latency,
            Cell::toned(or_dash(entry.ip_address.as_deref()), Tone::Muted),
            reason,
        ],
    };
    RowView {
        id: entry.id,
        cells,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogsView {
    pub table: TableView,
    pub count_hint: String,
    pub page_info: String,
    pub has_prev: bool,
    pub has_next: bool,
}

pub fn logs_view(logs: &LogState) -> LogsView {
    let tab = logs.tab();
    let header = match tab {
        LogTab::Mine => vec!["TIME", "STATUS", "CODE", "ACTION", "LATENCY", "REASON"],
        LogTab::All => vec![
            "TIME", "USER", "STATUS", "CODE", "ACTION", "LATENCY", "IP", "REASON",
        ],
    };
    let mut table = TableView::new(header);

    if let Some(error) = logs.error(tab) {
        table.empty = error.to_string();
        return LogsView {
            table,
            count_hint: error.to_string(),
            page_info: "-".into(),
            has_prev: false,
            has_next: false,
        };
    }

    let loaded = logs.cache(tab).map_or(0, <[_]>::len);
    let filtered = logs.filtered();
    let mut pager = logs.pager();
    let page = pager.paginate(&filtered);

    table.rows = page.items.iter().map(|e| log_row(e, tab)).collect();
    table.empty = if loaded == 0 {
        "no logs".into()
    } else {
        "no logs match the filter".into()
    };

    LogsView {
        count_hint: format!("{}: {} entries (loaded {loaded})", tab.as_str(), page.total),
        page_info: page.info(),
        has_prev: page.has_prev(),
        has_next: page.has_next(),
        table,
    }
}

// ---- config ----

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRow {
    pub key: ConfigKey,
    pub label: &'static str,
    pub value: String,
    /// Leader settings while multi-node mode is off.
    pub disabled: bool,
}

fn display_value(
    key: ConfigKey,
    value: Option<&ConfigValue>,
    snapshot: &ConfigSnapshot,
) -> String {
    match (key, value) {
        (ConfigKey::AutoQuotaEnabled, Some(ConfigValue::Bool(b))) => {
            QuotaMode::from_enabled(*b).as_str().to_string()
        }
        (ConfigKey::UpstreamProxies, Some(ConfigValue::Text(raw))) if !raw.is_empty() => {
            raw.clone()
        }
        (ConfigKey::UpstreamProxies, _) => {
            if snapshot.upstream_proxies_configured {
                "(configured)".into()
            } else {
                "(not configured)".into()
            }
        }
        (_, Some(v)) => v.to_string(),
        (_, None) => "-".into(),
    }
}

/// Every editable key, grouped. Batched groups show their draft values.
pub fn config_rows(
    snapshot: &ConfigSnapshot,
    common: Option<&ConfigDraft>,
    proxy: Option<&ConfigDraft>,
) -> Vec<ConfigRow> {
    ConfigKey::ALL
        .iter()
        .map(|&key| {
            let draft = match key.group() {
                ConfigGroup::Immediate => None,
                ConfigGroup::Common => common,
                ConfigGroup::ProxyPool => proxy,
            };
            let value = match draft.and_then(|d| d.get(key)) {
                Some(v) => Some(v.clone()),
                None => key.current(snapshot),
            };
            ConfigRow {
                key,
                label: key.label(),
                value: display_value(key, value.as_ref(), snapshot),
                disabled: key.is_leader_setting() && !snapshot.multi_node_enabled,
            }
        })
        .collect()
}

pub fn config_table(rows: &[ConfigRow]) -> TableView {
    let mut table = TableView::new(vec!["GROUP", "SETTING", "VALUE"]);
    table.rows = rows
        .iter()
        .map(|r| {
            let tone = if r.disabled { Tone::Muted } else { Tone::Plain };
            RowView {
                id: None,
                cells: vec![
                    Cell::toned(r.key.group().display_name(), Tone::Muted),
                    Cell::toned(r.label, tone),
                    Cell::toned(r.value.clone(), tone),
                ],
            }
        })
        .collect();
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolctl_core::LogFilter;

    fn key(id: i64, status: &str) -> UpstreamKey {
        UpstreamKey {
            id,
            status: status.into(),
            tier: Some(3),
            is_enabled: true,
            fail_streak: 0,
            last_checked_at: None,
            created_at: None,
        }
    }

    fn log(created_at: &str, code: i64) -> LogEntry {
        LogEntry {
            created_at: Some(created_at.into()),
            username: Some("alice".into()),
            status: Some(if code < 400 { "success" } else { "failed" }.into()),
            status_code: Some(code),
            latency_ms: Some(812.6),
            ..Default::default()
        }
    }

    #[test]
    fn timestamp_formatting() {
        assert_eq!(format_timestamp(None), "-");
        assert_eq!(format_timestamp(Some("")), "-");
        assert_eq!(
            format_timestamp(Some("2024-05-01T10:15:00.123")),
            "2024-05-01 10:15:00"
        );
        assert_eq!(format_timestamp(Some("yesterday")), "yesterday");
    }

    #[test]
    fn latency_and_tones() {
        assert_eq!(latency_label(Some(812.6)), "813ms");
        assert_eq!(latency_label(Some(0.0)), "-");
        assert_eq!(latency_label(None), "-");
        assert_eq!(status_code_tone(Some(502)), Tone::Bad);
        assert_eq!(status_code_tone(Some(429)), Tone::Warn);
        assert_eq!(status_code_tone(None), Tone::Ok);
        assert_eq!(status_tone(Some("success")), Tone::Ok);
        assert_eq!(status_tone(Some("failed")), Tone::Warn);
        assert_eq!(status_tone(Some("queued")), Tone::Muted);
    }

    #[test]
    fn key_preview_shows_first_four() {
        let keys = Remote::Ready((1..=6).map(|i| key(i, "active")).collect());
        let preview = key_preview(&keys);
        assert_eq!(preview.lines.len(), 4);
        assert_eq!(preview.summary, "6 keys");
        assert_eq!(key_preview(&Remote::Idle).summary, "0 keys");
    }

    #[test]
    fn failed_fetch_shows_error_as_empty_state() {
        let table = keys_table(&Remote::Failed("Invalid token".into()));
        assert!(table.is_empty());
        assert_eq!(table.empty, "Invalid token");
    }

    #[test]
    fn admin_key_owner_falls_back_to_uid() {
        let keys = Remote::Ready(vec![AdminKey {
            id: 7,
            user_id: 42,
            username: None,
            status: "active".into(),
            tier: None,
            is_enabled: false,
            fail_streak: 0,
            cooldown_until: None,
            last_checked_at: None,
        }]);
        let table = admin_keys_table(&keys);
        assert_eq!(table.rows[0].cells[1].text, "UID:42");
        assert_eq!(table.rows[0].cells[4].text, "enable");
        assert_eq!(table.row_id(0), Some(7));
    }

    #[test]
    fn dashboard_stats_without_config() {
        let user = CurrentUser {
            id: Some(2),
            username: "alice".into(),
            email: None,
            role: Default::default(),
            manual_rpm: None,
            is_active: true,
        };
        let stats = dashboard_stats(Some(&user), None);
        assert_eq!(stats[0], ("user", "alice".to_string()));
        assert_eq!(stats[2], ("manual rpm", "auto".to_string()));
        assert_eq!(stats[3], ("auto quota", "-".to_string()));
    }

    #[test]
    fn logs_view_pages_filtered_entries() {
        let entries: Vec<LogEntry> = (0..45)
            .map(|i| log(&format!("2024-05-{:02}T08:00:00", 1 + i % 28), 200))
            .collect();
        let mut logs = LogState::with_page_size(20);
        logs.store(LogTab::Mine, Ok(entries));

        let view = logs_view(&logs);
        assert_eq!(view.count_hint, "mine: 45 entries (loaded 45)");
        assert_eq!(view.page_info, "1/3");
        assert_eq!(view.table.rows.len(), 20);
        assert!(!view.has_prev && view.has_next);
        assert_eq!(view.table.rows[0].cells[4].text, "813ms");

        logs.filter = LogFilter::parse("2024-05-01", "2024-05-02", "").unwrap();
        let view = logs_view(&logs);
        assert_eq!(view.count_hint, "mine: 4 entries (loaded 45)");
        assert_eq!(view.page_info, "1/1");
    }

    #[test]
    fn logs_view_clamps_stale_page() {
        let mut logs = LogState::with_page_size(20);
        logs.store(LogTab::Mine, Ok(vec![log("2024-05-01T08:00:00", 500)]));
        for _ in 0..5 {
            logs.pager.next();
        }
        let view = logs_view(&logs);
        assert_eq!(view.page_info, "1/1");
        assert_eq!(view.table.rows[0].cells[2].tone, Tone::Bad);
    }

    #[test]
    fn logs_view_error_replaces_table() {
        let mut logs = LogState::default();
        logs.store(LogTab::Mine, Err("failed to load my logs".into()));
        let view = logs_view(&logs);
        assert_eq!(view.count_hint, "failed to load my logs");
        assert!(view.table.is_empty());
    }

    #[test]
    fn log_status_and_code_keep_their_own_tones() {
        let mut logs = LogState::default();
        let mut entry = log("2024-05-01T08:00:00", 502);
        entry.status = Some("success".into());
        let queued = LogEntry {
            status: Some("queued".into()),
            ..Default::default()
        };
        logs.store(LogTab::Mine, Ok(vec![entry, queued]));

        let view = logs_view(&logs);
        assert_eq!(view.table.header[1..3], ["STATUS", "CODE"]);
        let cells = &view.table.rows[0].cells;
        assert_eq!((cells[1].text.as_str(), cells[1].tone), ("success", Tone::Ok));
        assert_eq!((cells[2].text.as_str(), cells[2].tone), ("502", Tone::Bad));
        let cells = &view.table.rows[1].cells;
        assert_eq!((cells[1].text.as_str(), cells[1].tone), ("queued", Tone::Muted));
        assert_eq!((cells[2].text.as_str(), cells[2].tone), ("-", Tone::Ok));
    }

    #[test]
    fn all_logs_have_user_and_ip_columns() {
        let mut logs = LogState::default();
        logs.tab = LogTab::All;
        logs.store(LogTab::All, Ok(vec![log("2024-05-01T08:00:00", 200)]));
        let view = logs_view(&logs);
        assert_eq!(view.table.header.len(), 8);
        assert_eq!(view.table.rows[0].cells[1].text, "alice");
        assert_eq!(view.table.rows[0].cells[6].text, "-");
    }

    #[test]
    fn config_rows_reflect_drafts_and_leader_lock() {
        let snapshot = ConfigSnapshot::default();
        let mut common = ConfigDraft::from_snapshot(ConfigGroup::Common, &snapshot);
        common.set(ConfigKey::BaseRpm, ConfigValue::Int(9)).unwrap();
        let rows = config_rows(&snapshot, Some(&common), None);
        assert_eq!(rows.len(), ConfigKey::ALL.len());

        let base = rows.iter().find(|r| r.key == ConfigKey::BaseRpm).unwrap();
        assert_eq!(base.value, "9");
        let leader = rows
            .iter()
            .find(|r| r.key == ConfigKey::HealthCheckLeaderOnly)
            .unwrap();
        assert!(leader.disabled);
        let proxies = rows
            .iter()
            .find(|r| r.key == ConfigKey::UpstreamProxies)
            .unwrap();
        assert_eq!(proxies.value, "(not configured)");
    }
}
