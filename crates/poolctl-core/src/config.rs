use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CoreError;

pub const DEFAULT_LEADER_NODE_ID: &str = "node-1";
pub const DEFAULT_KEEPALIVE_URL: &str = "https://api.novelai.net/";
pub const PROXY_MODES: &[&str] = &["direct", "proxy_pool"];

/// Settings as returned by `GET /admin/config`. Fields missing from the
/// response keep the backend's own defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSnapshot {
    pub node_id: String,
    pub multi_node_enabled: bool,

    pub auto_quota_enabled: bool,
    pub base_rpm: i64,
    pub per_key_rpm: i64,
    pub max_rpm: i64,
    pub base_rpm_contributor_only: bool,
    pub manual_global_rpm: i64,

    pub key_cooldown_seconds: i64,
    pub dynamic_cooldown_enabled: bool,
    pub cooldown_max_seconds: i64,
    pub cooldown_409_base_seconds: i64,
    pub cooldown_429_base_seconds: i64,
    pub cooldown_5xx_base_seconds: i64,
    pub cooldown_402_base_seconds: i64,

    pub opus_max_pixels: i64,
    pub opus_max_steps: i64,
    pub opus_max_samples: i64,
    pub allow_registration: bool,
    pub require_opus_tier: bool,

    pub health_check_enabled: bool,
    pub health_check_interval_seconds: i64,
    pub health_check_fail_threshold: i64,
    pub health_check_leader_only: bool,
    pub health_check_leader_node_id: String,
    pub log_request_ip: bool,

    pub upstream_proxy_mode: String,
    pub upstream_proxy_strategy: String,
    pub upstream_proxy_sticky_salt: String,
    pub upstream_proxy_cooldown_seconds: i64,
    pub upstream_proxy_max_cooldown_seconds: i64,
    pub upstream_proxy_failure_threshold: i64,
    pub upstream_proxy_fail_streak_cap: i64,
    pub upstream_proxy_handle_429: bool,
    pub upstream_proxy_handle_5xx: bool,
    pub upstream_proxy_handle_network_errors: bool,
    pub upstream_proxy_cooldown_429_seconds: i64,
    pub upstream_proxy_cooldown_5xx_seconds: i64,
    pub upstream_proxy_cooldown_error_seconds: i64,
    pub upstream_proxy_keepalive_enabled: bool,
    pub upstream_proxy_keepalive_interval_seconds: i64,
    pub upstream_proxy_keepalive_url: String,
    pub upstream_proxy_keepalive_timeout_seconds: i64,
    pub upstream_proxy_keepalive_leader_only: bool,
    pub upstream_proxy_keepalive_leader_node_id: String,
    /// The proxy list itself is never echoed back.
    pub upstream_proxies_configured: bool,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            node_id: DEFAULT_LEADER_NODE_ID.into(),
            multi_node_enabled: false,
            auto_quota_enabled: true,
            base_rpm: 0,
            per_key_rpm: 10,
            max_rpm: 120,
            base_rpm_contributor_only: true,
            manual_global_rpm: 0,
            key_cooldown_seconds: 3,
            dynamic_cooldown_enabled: true,
            cooldown_max_seconds: 300,
            cooldown_409_base_seconds: 3,
            cooldown_429_base_seconds: 8,
            cooldown_5xx_base_seconds: 15,
            cooldown_402_base_seconds: 60,
            opus_max_pixels: 1_048_576,
            opus_max_steps: 28,
            opus_max_samples: 1,
            allow_registration: true,
            require_opus_tier: true,
            health_check_enabled: true,
            health_check_interval_seconds: 300,
            health_check_fail_threshold: 3,
            health_check_leader_only: false,
            health_check_leader_node_id: DEFAULT_LEADER_NODE_ID.into(),
            log_request_ip: false,
            upstream_proxy_mode: "direct".into(),
            upstream_proxy_strategy: "sticky".into(),
            upstream_proxy_sticky_salt: String::new(),
            upstream_proxy_cooldown_seconds: 10,
            upstream_proxy_max_cooldown_seconds: 120,
            upstream_proxy_failure_threshold: 1,
            upstream_proxy_fail_streak_cap: 6,
            upstream_proxy_handle_429: true,
            upstream_proxy_handle_5xx: true,
            upstream_proxy_handle_network_errors: true,
            upstream_proxy_cooldown_429_seconds: 10,
            upstream_proxy_cooldown_5xx_seconds: 15,
            upstream_proxy_cooldown_error_seconds: 10,
            upstream_proxy_keepalive_enabled: false,
            upstream_proxy_keepalive_interval_seconds: 300,
            upstream_proxy_keepalive_url: DEFAULT_KEEPALIVE_URL.into(),
            upstream_proxy_keepalive_timeout_seconds: 8,
            upstream_proxy_keepalive_leader_only: false,
            upstream_proxy_keepalive_leader_node_id: DEFAULT_LEADER_NODE_ID.into(),
            upstream_proxies_configured: false,
        }
    }
}

impl ConfigSnapshot {
    pub fn quota_mode(&self) -> QuotaMode {
        QuotaMode::from_enabled(self.auto_quota_enabled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Text,
}

/// How a key is edited in the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigGroup {
    /// Each change is written on its own, then the snapshot is re-fetched.
    Immediate,
    /// Edited as a draft and written as one sequence of updates.
    Common,
    /// Same as `Common`, for the upstream proxy pool.
    ProxyPool,
}

impl ConfigGroup {
    pub fn keys(&self) -> Vec<ConfigKey> {
        ConfigKey::ALL
            .iter()
            .copied()
            .filter(|k| k.group() == *self)
            .collect()
    }

    pub fn is_batched(&self) -> bool {
        !matches!(self, ConfigGroup::Immediate)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ConfigGroup::Immediate => "Switches",
            ConfigGroup::Common => "Common",
            ConfigGroup::ProxyPool => "Proxy pool",
        }
    }
}

/// Settings the console can change through `POST /admin/config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    AutoQuotaEnabled,
    AllowRegistration,
    LogRequestIp,
    HealthCheckLeaderOnly,
    HealthCheckLeaderNodeId,
    KeepaliveLeaderOnly,
    KeepaliveLeaderNodeId,

    BaseRpm,
    PerKeyRpm,
    MaxRpm,
    KeyCooldownSeconds,
    ManualGlobalRpm,
    BaseRpmContributorOnly,

    ProxyMode,
    ProxyCooldownSeconds,
    ProxyMaxCooldownSeconds,
    ProxyStickySalt,
    ProxyFailureThreshold,
    ProxyFailStreakCap,
    ProxyHandle429,
    ProxyHandle5xx,
    ProxyHandleNetworkErrors,
    ProxyCooldown429Seconds,
    ProxyCooldown5xxSeconds,
    ProxyCooldownErrorSeconds,
    KeepaliveEnabled,
    KeepaliveIntervalSeconds,
    KeepaliveUrl,
    UpstreamProxies,
}

impl ConfigKey {
    /// Every key, in the order the batched saves write them.
    pub const ALL: &[ConfigKey] = &[
        ConfigKey::AutoQuotaEnabled,
        ConfigKey::AllowRegistration,
        ConfigKey::LogRequestIp,
        ConfigKey::HealthCheckLeaderOnly,
        ConfigKey::HealthCheckLeaderNodeId,
        ConfigKey::KeepaliveLeaderOnly,
        ConfigKey::KeepaliveLeaderNodeId,
        ConfigKey::BaseRpm,
        ConfigKey::PerKeyRpm,
        ConfigKey::MaxRpm,
        ConfigKey::KeyCooldownSeconds,
        ConfigKey::ManualGlobalRpm,
        ConfigKey::BaseRpmContributorOnly,
        ConfigKey::ProxyMode,
        ConfigKey::ProxyCooldownSeconds,
        ConfigKey::ProxyMaxCooldownSeconds,
        ConfigKey::ProxyStickySalt,
        ConfigKey::ProxyFailureThreshold,
        ConfigKey::ProxyFailStreakCap,
        ConfigKey::ProxyHandle429,
        ConfigKey::ProxyHandle5xx,
        ConfigKey::ProxyHandleNetworkErrors,
        ConfigKey::ProxyCooldown429Seconds,
        ConfigKey::ProxyCooldown5xxSeconds,
        ConfigKey::ProxyCooldownErrorSeconds,
        ConfigKey::KeepaliveEnabled,
        ConfigKey::KeepaliveIntervalSeconds,
        ConfigKey::KeepaliveUrl,
        ConfigKey::UpstreamProxies,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::AutoQuotaEnabled => "auto_quota_enabled",
            ConfigKey::AllowRegistration => "allow_registration",
            ConfigKey::LogRequestIp => "log_request_ip",
            ConfigKey::HealthCheckLeaderOnly => "health_check_leader_only",
            ConfigKey::HealthCheckLeaderNodeId => "health_check_leader_node_id",
            ConfigKey::KeepaliveLeaderOnly => "upstream_proxy_keepalive_leader_only",
            ConfigKey::KeepaliveLeaderNodeId => "upstream_proxy_keepalive_leader_node_id",
            ConfigKey::BaseRpm => "base_rpm",
            ConfigKey::PerKeyRpm => "per_key_rpm",
            ConfigKey::MaxRpm => "max_rpm",
            ConfigKey::KeyCooldownSeconds => "key_cooldown_seconds",
            ConfigKey::ManualGlobalRpm => "manual_global_rpm",
            ConfigKey::BaseRpmContributorOnly => "base_rpm_contributor_only",
            ConfigKey::ProxyMode => "upstream_proxy_mode",
            ConfigKey::ProxyCooldownSeconds => "upstream_proxy_cooldown_seconds",
            ConfigKey::ProxyMaxCooldownSeconds => "upstream_proxy_max_cooldown_seconds",
            ConfigKey::ProxyStickySalt => "upstream_proxy_sticky_salt",
            ConfigKey::ProxyFailureThreshold => "upstream_proxy_failure_threshold",
            ConfigKey::ProxyFailStreakCap => "upstream_proxy_fail_streak_cap",
            ConfigKey::ProxyHandle429 => "upstream_proxy_handle_429",
            ConfigKey::ProxyHandle5xx => "upstream_proxy_handle_5xx",
            ConfigKey::ProxyHandleNetworkErrors => "upstream_proxy_handle_network_errors",
            ConfigKey::ProxyCooldown429Seconds => "upstream_proxy_cooldown_429_seconds",
            ConfigKey::ProxyCooldown5xxSeconds => "upstream_proxy_cooldown_5xx_seconds",
            ConfigKey::ProxyCooldownErrorSeconds => "upstream_proxy_cooldown_error_seconds",
            ConfigKey::KeepaliveEnabled => "upstream_proxy_keepalive_enabled",
            ConfigKey::KeepaliveIntervalSeconds => "upstream_proxy_keepalive_interval_seconds",
            ConfigKey::KeepaliveUrl => "upstream_proxy_keepalive_url",
            ConfigKey::UpstreamProxies => "upstream_proxies",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        ConfigKey::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfigKey::AutoQuotaEnabled => "Quota mode",
            ConfigKey::AllowRegistration => "Allow registration",
            ConfigKey::LogRequestIp => "Log request IP",
            ConfigKey::HealthCheckLeaderOnly => "Health check on leader only",
            ConfigKey::HealthCheckLeaderNodeId => "Health check leader node",
            ConfigKey::KeepaliveLeaderOnly => "Proxy keepalive on leader only",
            ConfigKey::KeepaliveLeaderNodeId => "Proxy keepalive leader node",
            ConfigKey::BaseRpm => "Base RPM",
            ConfigKey::PerKeyRpm => "RPM per contributed key",
            ConfigKey::MaxRpm => "Max RPM",
            ConfigKey::KeyCooldownSeconds => "Key cooldown (s)",
            ConfigKey::ManualGlobalRpm => "Manual global RPM",
            ConfigKey::BaseRpmContributorOnly => "Base RPM for contributors only",
            ConfigKey::ProxyMode => "Proxy mode",
            ConfigKey::ProxyCooldownSeconds => "Cooldown (s)",
            ConfigKey::ProxyMaxCooldownSeconds => "Max cooldown (s)",
            ConfigKey::ProxyStickySalt => "Sticky salt",
            ConfigKey::ProxyFailureThreshold => "Failure threshold",
            ConfigKey::ProxyFailStreakCap => "Fail streak cap",
            ConfigKey::ProxyHandle429 => "Cool down on 429",
            ConfigKey::ProxyHandle5xx => "Cool down on 5xx",
            ConfigKey::ProxyHandleNetworkErrors => "Cool down on network errors",
            ConfigKey::ProxyCooldown429Seconds => "429 cooldown (s)",
            ConfigKey::ProxyCooldown5xxSeconds => "5xx cooldown (s)",
            ConfigKey::ProxyCooldownErrorSeconds => "Network error cooldown (s)",
            ConfigKey::KeepaliveEnabled => "Keepalive check",
            ConfigKey::KeepaliveIntervalSeconds => "Keepalive interval (s)",
            ConfigKey::KeepaliveUrl => "Keepalive URL",
            ConfigKey::UpstreamProxies => "Proxy list",
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigKey::AutoQuotaEnabled
            | ConfigKey::AllowRegistration
            | ConfigKey::LogRequestIp
            | ConfigKey::HealthCheckLeaderOnly
            | ConfigKey::KeepaliveLeaderOnly
            | ConfigKey::BaseRpmContributorOnly
            | ConfigKey::ProxyHandle429
            | ConfigKey::ProxyHandle5xx
            | ConfigKey::ProxyHandleNetworkErrors
            | ConfigKey::KeepaliveEnabled => ValueKind::Bool,
            ConfigKey::HealthCheckLeaderNodeId
            | ConfigKey::KeepaliveLeaderNodeId
            | ConfigKey::ProxyMode
            | ConfigKey::ProxyStickySalt
            | ConfigKey::KeepaliveUrl
            | ConfigKey::UpstreamProxies => ValueKind::Text,
            _ => ValueKind::Int,
        }
    }

    pub fn group(&self) -> ConfigGroup {
        match self {
            ConfigKey::AutoQuotaEnabled
            | ConfigKey::AllowRegistration
            | ConfigKey::LogRequestIp
            | ConfigKey::HealthCheckLeaderOnly
            | ConfigKey::HealthCheckLeaderNodeId
            | ConfigKey::KeepaliveLeaderOnly
            | ConfigKey::KeepaliveLeaderNodeId => ConfigGroup::Immediate,
            ConfigKey::BaseRpm
            | ConfigKey::PerKeyRpm
            | ConfigKey::MaxRpm
            | ConfigKey::KeyCooldownSeconds
            | ConfigKey::ManualGlobalRpm
            | ConfigKey::BaseRpmContributorOnly => ConfigGroup::Common,
            _ => ConfigGroup::ProxyPool,
        }
    }

    /// Leader-election settings only mean something with multi-node mode on.
    pub fn is_leader_setting(&self) -> bool {
        matches!(
            self,
            ConfigKey::HealthCheckLeaderOnly
                | ConfigKey::HealthCheckLeaderNodeId
                | ConfigKey::KeepaliveLeaderOnly
                | ConfigKey::KeepaliveLeaderNodeId
        )
    }

    /// Value substituted when the input is left blank.
    pub fn fallback(&self) -> ConfigValue {
        match self {
            ConfigKey::HealthCheckLeaderNodeId | ConfigKey::KeepaliveLeaderNodeId => {
                ConfigValue::Text(DEFAULT_LEADER_NODE_ID.into())
            }
            ConfigKey::ProxyMode => ConfigValue::Text("direct".into()),
            ConfigKey::KeepaliveUrl => ConfigValue::Text(DEFAULT_KEEPALIVE_URL.into()),
            ConfigKey::ProxyStickySalt | ConfigKey::UpstreamProxies => {
                ConfigValue::Text(String::new())
            }
            ConfigKey::ProxyCooldownSeconds => ConfigValue::Int(10),
            ConfigKey::ProxyMaxCooldownSeconds => ConfigValue::Int(120),
            ConfigKey::ProxyFailureThreshold => ConfigValue::Int(1),
            ConfigKey::ProxyFailStreakCap => ConfigValue::Int(6),
            ConfigKey::ProxyCooldown429Seconds => ConfigValue::Int(10),
            ConfigKey::ProxyCooldown5xxSeconds => ConfigValue::Int(15),
            ConfigKey::ProxyCooldownErrorSeconds => ConfigValue::Int(10),
            ConfigKey::KeepaliveIntervalSeconds => ConfigValue::Int(300),
            _ => match self.kind() {
                ValueKind::Bool => ConfigValue::Bool(false),
                ValueKind::Int => ConfigValue::Int(0),
                ValueKind::Text => ConfigValue::Text(String::new()),
            },
        }
    }

    /// Current value in a snapshot. `None` for the write-only proxy list.
    pub fn current(&self, c: &ConfigSnapshot) -> Option<ConfigValue> {
        let value = match self {
            ConfigKey::AutoQuotaEnabled => ConfigValue::Bool(c.auto_quota_enabled),
            ConfigKey::AllowRegistration => ConfigValue::Bool(c.allow_registration),
            ConfigKey::LogRequestIp => ConfigValue::Bool(c.log_request_ip),
            ConfigKey::HealthCheckLeaderOnly => ConfigValue::Bool(c.health_check_leader_only),
            ConfigKey::HealthCheckLeaderNodeId => {
                ConfigValue::Text(c.health_check_leader_node_id.clone())
            }
            ConfigKey::KeepaliveLeaderOnly => {
                ConfigValue::Bool(c.upstream_proxy_keepalive_leader_only)
            }
            ConfigKey::KeepaliveLeaderNodeId => {
                ConfigValue::Text(c.upstream_proxy_keepalive_leader_node_id.clone())
            }
            ConfigKey::BaseRpm => ConfigValue::Int(c.base_rpm),
            ConfigKey::PerKeyRpm => ConfigValue::Int(c.per_key_rpm),
            ConfigKey::MaxRpm => ConfigValue::Int(c.max_rpm),
            ConfigKey::KeyCooldownSeconds => ConfigValue::Int(c.key_cooldown_seconds),
            ConfigKey::ManualGlobalRpm => ConfigValue::Int(c.manual_global_rpm),
            ConfigKey::BaseRpmContributorOnly => ConfigValue::Bool(c.base_rpm_contributor_only),
            ConfigKey::ProxyMode => ConfigValue::Text(c.upstream_proxy_mode.clone()),
            ConfigKey::ProxyCooldownSeconds => ConfigValue::Int(c.upstream_proxy_cooldown_seconds),
            ConfigKey::ProxyMaxCooldownSeconds => {
                ConfigValue::Int(c.upstream_proxy_max_cooldown_seconds)
            }
            ConfigKey::ProxyStickySalt => ConfigValue::Text(c.upstream_proxy_sticky_salt.clone()),
            ConfigKey::ProxyFailureThreshold => {
                ConfigValue::Int(c.upstream_proxy_failure_threshold)
            }
            ConfigKey::ProxyFailStreakCap => ConfigValue::Int(c.upstream_proxy_fail_streak_cap),
            ConfigKey::ProxyHandle429 => ConfigValue::Bool(c.upstream_proxy_handle_429),
            ConfigKey::ProxyHandle5xx => ConfigValue::Bool(c.upstream_proxy_handle_5xx),
            ConfigKey::ProxyHandleNetworkErrors => {
                ConfigValue::Bool(c.upstream_proxy_handle_network_errors)
            }
            ConfigKey::ProxyCooldown429Seconds => {
                ConfigValue::Int(c.upstream_proxy_cooldown_429_seconds)
            }
            ConfigKey::ProxyCooldown5xxSeconds => {
                ConfigValue::Int(c.upstream_proxy_cooldown_5xx_seconds)
            }
            ConfigKey::ProxyCooldownErrorSeconds => {
                ConfigValue::Int(c.upstream_proxy_cooldown_error_seconds)
            }
            ConfigKey::KeepaliveEnabled => ConfigValue::Bool(c.upstream_proxy_keepalive_enabled),
            ConfigKey::KeepaliveIntervalSeconds => {
                ConfigValue::Int(c.upstream_proxy_keepalive_interval_seconds)
            }
            ConfigKey::KeepaliveUrl => ConfigValue::Text(c.upstream_proxy_keepalive_url.clone()),
            ConfigKey::UpstreamProxies => return None,
        };
        Some(value)
    }

    /// Parse raw console input into a typed value for this key.
    pub fn parse_input(&self, raw: &str) -> Result<ConfigValue, CoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(self.fallback());
        }
        match self.kind() {
            ValueKind::Bool => parse_bool(trimmed).map(ConfigValue::Bool).ok_or_else(|| {
                CoreError::InvalidInput(format!("{}: expected on/off, got {trimmed:?}", self))
            }),
            ValueKind::Int => match trimmed.parse::<i64>() {
                Ok(n) if n >= 0 => Ok(ConfigValue::Int(n)),
                _ => Err(CoreError::InvalidInput(format!(
                    "{}: expected a non-negative integer, got {trimmed:?}",
                    self
                ))),
            },
            ValueKind::Text => match self {
                ConfigKey::ProxyMode if !PROXY_MODES.contains(&trimmed) => {
                    Err(CoreError::InvalidInput(format!(
                        "{}: expected one of {}, got {trimmed:?}",
                        self,
                        PROXY_MODES.join(", ")
                    )))
                }
                ConfigKey::UpstreamProxies => Ok(ConfigValue::Text(normalize_proxy_list(raw))),
                _ => Ok(ConfigValue::Text(trimmed.to_string())),
            },
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl ConfigValue {
    /// String form sent to the backend, which stores every value as text.
    pub fn to_wire(&self) -> String {
        match self {
            ConfigValue::Bool(b) => b.to_string(),
            ConfigValue::Int(n) => n.to_string(),
            ConfigValue::Text(s) => s.clone(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(true) => f.write_str("on"),
            ConfigValue::Bool(false) => f.write_str("off"),
            ConfigValue::Int(n) => write!(f, "{n}"),
            ConfigValue::Text(s) if s.is_empty() => f.write_str("-"),
            ConfigValue::Text(s) => f.write_str(s),
        }
    }
}

/// Body of the single-setting `POST /admin/config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub key: String,
    pub value: String,
}

impl ConfigUpdate {
    pub fn new(key: ConfigKey, value: &ConfigValue) -> Self {
        Self {
            key: key.as_str().to_string(),
            value: value.to_wire(),
        }
    }
}

/// Several settings in one `POST /admin/config`, key to string value.
pub type ConfigForm = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFormApplied {
    #[serde(default)]
    pub updated: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaMode {
    Auto,
    Manual,
}

impl QuotaMode {
    pub fn from_enabled(auto_quota_enabled: bool) -> Self {
        if auto_quota_enabled {
            QuotaMode::Auto
        } else {
            QuotaMode::Manual
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaMode::Auto => "auto",
            QuotaMode::Manual => "manual",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            QuotaMode::Auto => QuotaMode::Manual,
            QuotaMode::Manual => QuotaMode::Auto,
        }
    }

    pub fn update(&self) -> ConfigUpdate {
        ConfigUpdate::new(
            ConfigKey::AutoQuotaEnabled,
            &ConfigValue::Bool(matches!(self, QuotaMode::Auto)),
        )
    }
}

/// Edited copy of one batched group, seeded from the last snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDraft {
    group: ConfigGroup,
    values: Vec<(ConfigKey, ConfigValue)>,
}

impl ConfigDraft {
    pub fn from_snapshot(group: ConfigGroup, snapshot: &ConfigSnapshot) -> Self {
        let values = group
            .keys()
            .into_iter()
            .map(|k| {
                let v = k.current(snapshot).unwrap_or_else(|| k.fallback());
                (k, v)
            })
            .collect();
        Self { group, values }
    }

    pub fn group(&self) -> ConfigGroup {
        self.group
    }

    pub fn values(&self) -> &[(ConfigKey, ConfigValue)] {
        &self.values
    }

    pub fn get(&self, key: ConfigKey) -> Option<&ConfigValue> {
        self.values.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn set(&mut self, key: ConfigKey, value: ConfigValue) -> Result<(), CoreError> {
        let slot = self
            .values
            .iter_mut()
            .find(|(k, _)| *k == key)
            .ok_or_else(|| CoreError::UnknownConfigKey(key.as_str().to_string()))?;
        slot.1 = value;
        Ok(())
    }

    /// Updates to send, in order. An empty proxy list is not sent, so a blank
    /// field never wipes the configured proxies.
    pub fn updates(&self) -> Vec<ConfigUpdate> {
        self.values
            .iter()
            .filter_map(|(k, v)| match (k, v) {
                (ConfigKey::UpstreamProxies, ConfigValue::Text(raw)) => {
                    let normalized = normalize_proxy_list(raw);
                    (!normalized.is_empty())
                        .then(|| ConfigUpdate::new(*k, &ConfigValue::Text(normalized)))
                }
                _ => Some(ConfigUpdate::new(*k, v)),
            })
            .collect()
    }

    /// Same updates as one form body.
    pub fn form(&self) -> ConfigForm {
        self.updates()
            .into_iter()
            .map(|u| (u.key, u.value))
            .collect()
    }
}

/// Split a pasted proxy list on newlines and commas, drop blanks, join with `,`.
pub fn normalize_proxy_list(raw: &str) -> String {
    raw.split(['\n', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}
