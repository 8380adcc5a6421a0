use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use poolctl_core::client_key::ClientKey;
use poolctl_core::config::ConfigSnapshot;
use poolctl_core::key::{AdminKey, UpstreamKey};
use poolctl_core::log::LogEntry;
use poolctl_core::proxy_pool::{ProxyPoolStatus, ProxyState};
use poolctl_core::user::{AdminUser, CurrentUser};
use poolctl_core::Role;
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::{self, sha256_hex};

/// Settings the real backend refuses to change at runtime.
pub const FORBIDDEN_CONFIG_KEYS: &[&str] = &[
    "secret_key",
    "encryption_key",
    "admin_password",
    "admin_username",
    "database_url",
    "node_id",
    "multi_node_enabled",
    "system_config_refresh_enabled",
    "system_config_refresh_interval_seconds",
    "jwt_algorithm",
    "access_token_expire_minutes",
    "cors_allow_origins",
    "cors_allow_credentials",
    "trust_proxy_headers",
];

const MY_LOGS_LIMIT: usize = 50;
const ALL_LOGS_LIMIT: usize = 200;
const MIN_PASSWORD_LEN: usize = 8;

/// Error response in the backend's `{"detail": ...}` shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub detail: String,
}

impl Rejection {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, detail)
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub manual_rpm: Option<i64>,
    pub is_active: bool,
    pub created_at: String,
}

impl UserRecord {
    pub fn to_current(&self) -> CurrentUser {
        CurrentUser {
            id: None,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            manual_rpm: self.manual_rpm,
            is_active: self.is_active,
        }
    }

    pub fn to_admin(&self) -> AdminUser {
        AdminUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            is_active: self.is_active,
            manual_rpm: self.manual_rpm,
            created_at: Some(self.created_at.clone()),
        }
    }
}

pub struct KeyRecord {
    pub id: i64,
    pub user_id: i64,
    pub key_hash: String,
    pub status: String,
    pub tier: Option<i64>,
    pub is_enabled: bool,
    pub fail_streak: i64,
    pub cooldown_until: Option<String>,
    pub last_checked_at: Option<String>,
    pub created_at: String,
}

pub struct ClientKeyRecord {
    pub id: i64,
    pub user_id: i64,
    pub key_hash: String,
    pub prefix: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

pub struct LogRecord {
    pub user_id: i64,
    pub entry: LogEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
}

/// In-memory stand-in for the proxy backend.
#[derive(Default)]
pub struct MockBackend {
    users: Vec<UserRecord>,
    tokens: HashMap<String, i64>,
    config: ConfigSnapshot,
    extra_config: BTreeMap<String, String>,
    proxies_raw: String,
    proxies: Vec<ProxyState>,
    keys: Vec<KeyRecord>,
    client_keys: Vec<ClientKeyRecord>,
    logs: Vec<LogRecord>,
    models: Vec<String>,
    failing_config_keys: HashSet<String>,
    next_id: i64,
}

pub fn now_iso() -> String {
    chrono::Utc::now()
        .naive_utc()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend with an `admin` (password `admin-pass`), a regular `alice`
    /// (password `alice-pass`) and a model catalogue.
    pub fn seeded() -> Self {
        let mut backend = Self::new();
        backend.add_user("admin", "admin-pass", Role::Admin);
        backend.add_user("alice", "alice-pass", Role::User);
        backend.models = vec![
            "nai-diffusion-4-5-full".into(),
            "nai-diffusion-4-5-curated".into(),
            "nai-diffusion-3".into(),
        ];
        backend
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_user(&mut self, username: &str, password: &str, role: Role) -> i64 {
        let id = self.next_id();
        self.users.push(UserRecord {
            id,
            username: username.to_string(),
            email: None,
            password_hash: sha256_hex(password),
            role,
            manual_rpm: None,
            is_active: true,
            created_at: now_iso(),
        });
        id
    }

    pub fn user_id(&self, username: &str) -> Option<i64> {
        self.users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.id)
    }

    pub fn user_for_token(&self, token: &str) -> Option<&UserRecord> {
        let id = self.tokens.get(token)?;
        self.users.iter().find(|u| u.id == *id)
    }

    pub fn user(&self, id: i64) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Invalidate every issued session token.
    pub fn revoke_tokens(&mut self) {
        self.tokens.clear();
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<String, Rejection> {
        let hash = sha256_hex(password);
        let id = self
            .users
            .iter()
            .find(|u| u.username == username && u.password_hash == hash)
            .map(|u| u.id)
            .ok_or_else(|| Rejection::unauthorized("Invalid credentials"))?;
        let token = auth::generate_access_token();
        self.tokens.insert(token.clone(), id);
        Ok(token)
    }

    pub fn register(
        &mut self,
        username: &str,
        password: &str,
        confirm_password: Option<&str>,
        email: Option<&str>,
    ) -> Result<(), Rejection> {
        if !self.config.allow_registration {
            return Err(Rejection::forbidden("Registration disabled"));
        }
        if confirm_password.is_some_and(|c| c != password) {
            return Err(Rejection::bad_request("Passwords do not match"));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(Rejection::bad_request("Password too short"));
        }
        if self.user_id(username).is_some() {
            return Err(Rejection::conflict("Username exists"));
        }
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        if let Some(email) = email {
            if self.users.iter().any(|u| u.email.as_deref() == Some(email)) {
                return Err(Rejection::conflict("Email exists"));
            }
        }
        let id = self.add_user(username, password, Role::User);
        if let Some(user) = self.users.iter_mut().find(|u| u.id == id) {
            user.email = email.map(String::from);
        }
        Ok(())
    }

    pub fn update_user(
        &mut self,
        id: i64,
        manual_rpm: Option<Option<i64>>,
        is_active: Option<bool>,
    ) -> Result<&UserRecord, Rejection> {
        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| Rejection::not_found("User not found"))?;
        if let Some(rpm) = manual_rpm {
            user.manual_rpm = rpm;
        }
        if let Some(active) = is_active {
            user.is_active = active;
        }
        Ok(user)
    }

    pub fn admin_users(&self) -> Vec<AdminUser> {
        self.users.iter().map(UserRecord::to_admin).collect()
    }

    // -- Config --

    pub fn config(&self) -> &ConfigSnapshot {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigSnapshot {
        &mut self.config
    }

    /// Make every later write of `key` fail with a 500.
    pub fn fail_config_key(&mut self, key: &str) {
        self.failing_config_keys.insert(key.to_string());
    }

    /// Stored value of a setting, in its string form.
    pub fn config_value(&self, key: &str) -> Option<String> {
        if key == "upstream_proxies" {
            return Some(self.proxies_raw.clone());
        }
        if let Some(v) = self.extra_config.get(key) {
            return Some(v.clone());
        }
        let doc = serde_json::to_value(&self.config).ok()?;
        match doc.get(key)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn check_config(&self, key: &str, value: &str) -> Result<(), Rejection> {
        if key.is_empty() || FORBIDDEN_CONFIG_KEYS.contains(&key) {
            return Err(Rejection::bad_request(
                "This config key is not allowed via API",
            ));
        }
        if self.failing_config_keys.contains(key) {
            return Err(Rejection::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to persist {key}"),
            ));
        }
        let doc = serde_json::to_value(&self.config).unwrap_or(Value::Null);
        if let Some(Value::Number(_)) = doc.get(key) {
            value
                .trim()
                .parse::<i64>()
                .map_err(|_| Rejection::bad_request(format!("Invalid value for {key}")))?;
        }
        Ok(())
    }

    /// Store one setting, casting the string by the current value's type.
    pub fn set_config(&mut self, key: &str, value: &str) -> Result<(), Rejection> {
        let key = key.trim();
        self.check_config(key, value)?;
        if key == "upstream_proxies" {
            self.set_proxies(value);
            return Ok(());
        }
        let mut doc = serde_json::to_value(&self.config)
            .map_err(|e| Rejection::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        let Some(map) = doc.as_object_mut() else {
            return Err(Rejection::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "config is not an object",
            ));
        };
        let cast = match map.get(key) {
            Some(Value::Bool(_)) => Value::Bool(truthy(value)),
            Some(Value::Number(_)) => json!(value.trim().parse::<i64>().unwrap_or_default()),
            Some(_) => Value::String(value.to_string()),
            None => {
                self.extra_config.insert(key.to_string(), value.to_string());
                return Ok(());
            }
        };
        map.insert(key.to_string(), cast);
        self.config = serde_json::from_value(doc)
            .map_err(|e| Rejection::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        Ok(())
    }

    /// Validate the whole form first so a bad entry leaves nothing applied.
    pub fn set_config_form(
        &mut self,
        form: &BTreeMap<String, String>,
    ) -> Result<Vec<String>, Rejection> {
        for (key, value) in form {
            self.check_config(key.trim(), value)?;
        }
        let mut updated = Vec::with_capacity(form.len());
        for (key, value) in form {
            self.set_config(key, value)?;
            updated.push(key.trim().to_string());
        }
        Ok(updated)
    }

    fn set_proxies(&mut self, raw: &str) {
        self.proxies_raw = raw.to_string();
        self.proxies = raw
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|proxy| ProxyState {
                proxy: proxy.to_string(),
                is_available: true,
                cooldown_seconds: 0,
                fail_streak: 0,
                last_error: None,
            })
            .collect();
        self.config.upstream_proxies_configured = !self.proxies.is_empty();
    }

    /// Put a proxy into cooldown after a failure.
    pub fn cool_down_proxy(&mut self, proxy: &str, seconds: i64, error: &str) {
        if let Some(p) = self.proxies.iter_mut().find(|p| p.proxy == proxy) {
            p.is_available = false;
            p.cooldown_seconds = seconds;
            p.fail_streak += 1;
            p.last_error = Some(error.to_string());
        }
    }

    pub fn proxy_pool(&self) -> ProxyPoolStatus {
        ProxyPoolStatus {
            enabled: self.config.upstream_proxy_mode == "proxy_pool" && !self.proxies.is_empty(),
            mode: self.config.upstream_proxy_mode.clone(),
            strategy: self.config.upstream_proxy_strategy.clone(),
            items: self.proxies.clone(),
        }
    }

    // -- Upstream keys --

    pub fn add_key(
        &mut self,
        user_id: i64,
        raw: &str,
        verify_now: bool,
    ) -> Result<(i64, String), Rejection> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Rejection::bad_request("Empty key"));
        }
        let key_hash = sha256_hex(raw);
        if self.keys.iter().any(|k| k.key_hash == key_hash) {
            return Err(Rejection::conflict("Key already exists"));
        }
        let id = self.next_id();
        let (status, tier, checked) = if verify_now {
            ("active", Some(3), Some(now_iso()))
        } else {
            ("pending", None, None)
        };
        self.keys.push(KeyRecord {
            id,
            user_id,
            key_hash,
            status: status.to_string(),
            tier,
            is_enabled: true,
            fail_streak: 0,
            cooldown_until: None,
            last_checked_at: checked,
            created_at: now_iso(),
        });
        Ok((id, status.to_string()))
    }

    pub fn keys_of(&self, user_id: i64) -> Vec<UpstreamKey> {
        self.keys
            .iter()
            .filter(|k| k.user_id == user_id)
            .map(|k| UpstreamKey {
                id: k.id,
                status: k.status.clone(),
                tier: k.tier,
                is_enabled: k.is_enabled,
                fail_streak: k.fail_streak,
                last_checked_at: k.last_checked_at.clone(),
                created_at: Some(k.created_at.clone()),
            })
            .collect()
    }

    pub fn delete_key(&mut self, user_id: i64, id: i64) -> Result<(), Rejection> {
        let before = self.keys.len();
        self.keys.retain(|k| !(k.id == id && k.user_id == user_id));
        if self.keys.len() == before {
            return Err(Rejection::not_found("Key not found"));
        }
        Ok(())
    }

    pub fn admin_keys(&self) -> Vec<AdminKey> {
        self.keys
            .iter()
            .map(|k| AdminKey {
                id: k.id,
                user_id: k.user_id,
                username: self.user(k.user_id).map(|u| u.username.clone()),
                status: k.status.clone(),
                tier: k.tier,
                is_enabled: k.is_enabled,
                fail_streak: k.fail_streak,
                cooldown_until: k.cooldown_until.clone(),
                last_checked_at: k.last_checked_at.clone(),
            })
            .collect()
    }

    pub fn toggle_key(&mut self, id: i64) -> Result<bool, Rejection> {
        let key = self
            .keys
            .iter_mut()
            .find(|k| k.id == id)
            .ok_or_else(|| Rejection::not_found("Key not found"))?;
        key.is_enabled = !key.is_enabled;
        Ok(key.is_enabled)
    }

    /// Mark every key as checked; returns how many were checked.
    pub fn health_check(&mut self) -> i64 {
        let now = now_iso();
        for key in &mut self.keys {
            key.last_checked_at = Some(now.clone());
        }
        self.keys.len() as i64
    }

    // -- Client keys --

    /// Issue a client key. `rotate` deactivates the user's existing keys.
    pub fn issue_client_key(
        &mut self,
        user_id: i64,
        name: Option<&str>,
        rotate: bool,
    ) -> (i64, String) {
        if rotate {
            for key in self.client_keys.iter_mut().filter(|k| k.user_id == user_id) {
                key.is_active = false;
            }
        }
        let raw = auth::generate_client_key();
        let id = self.next_id();
        self.client_keys.push(ClientKeyRecord {
            id,
            user_id,
            key_hash: sha256_hex(&raw),
            prefix: auth::client_key_prefix(&raw),
            name: name.unwrap_or("default").to_string(),
            is_active: true,
            created_at: now_iso(),
            last_used_at: None,
        });
        (id, raw)
    }

    /// Newest first.
    pub fn client_keys_of(&self, user_id: i64) -> Vec<ClientKey> {
        self.client_keys
            .iter()
            .rev()
            .filter(|k| k.user_id == user_id)
            .map(|k| ClientKey {
                id: k.id,
                prefix: k.prefix.clone(),
                name: Some(k.name.clone()),
                is_active: k.is_active,
                created_at: Some(k.created_at.clone()),
                last_used_at: k.last_used_at.clone(),
            })
            .collect()
    }

    pub fn set_client_key_active(
        &mut self,
        user_id: i64,
        id: i64,
        is_active: bool,
    ) -> Result<(), Rejection> {
        let key = self
            .client_keys
            .iter_mut()
            .find(|k| k.id == id && k.user_id == user_id)
            .ok_or_else(|| Rejection::not_found("Key not found"))?;
        key.is_active = is_active;
        Ok(())
    }

    pub fn delete_client_key(&mut self, user_id: i64, id: i64) -> Result<(), Rejection> {
        let before = self.client_keys.len();
        self.client_keys.retain(|k| !(k.id == id && k.user_id == user_id));
        if self.client_keys.len() == before {
            return Err(Rejection::not_found("Key not found"));
        }
        Ok(())
    }

    // -- Logs --

    /// Append log rows for `username`, newest first. Unknown users are ignored.
    pub fn seed_logs(&mut self, username: &str, entries: Vec<LogEntry>) {
        let Some(user_id) = self.user_id(username) else {
            return;
        };
        for mut entry in entries {
            if entry.id.is_none() {
                entry.id = Some(self.next_id());
            }
            self.logs.push(LogRecord { user_id, entry });
        }
    }

    pub fn logs_of(&self, user_id: i64) -> Vec<LogEntry> {
        self.logs
            .iter()
            .filter(|r| r.user_id == user_id)
            .take(MY_LOGS_LIMIT)
            .map(|r| LogEntry {
                username: None,
                ip_address: None,
                ..r.entry.clone()
            })
            .collect()
    }

    pub fn all_logs(&self) -> Vec<LogEntry> {
        let include_ip = self.config.log_request_ip;
        self.logs
            .iter()
            .take(ALL_LOGS_LIMIT)
            .map(|r| LogEntry {
                username: self.user(r.user_id).map(|u| u.username.clone()),
                ip_address: if include_ip {
                    r.entry.ip_address.clone()
                } else {
                    None
                },
                width: None,
                height: None,
                steps: None,
                samples: None,
                ..r.entry.clone()
            })
            .collect()
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }
}

pub struct InnerAppState {
    pub backend: Mutex<MockBackend>,
    pub requests: Mutex<Vec<RecordedRequest>>,
}

pub type AppState = Arc<InnerAppState>;

pub fn new_state(backend: MockBackend) -> AppState {
    Arc::new(InnerAppState {
        backend: Mutex::new(backend),
        requests: Mutex::new(Vec::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_settings_accept_backend_truthy_words() {
        let mut b = MockBackend::seeded();
        b.set_config("log_request_ip", "on").unwrap();
        assert!(b.config().log_request_ip);
        b.set_config("log_request_ip", "nope").unwrap();
        assert!(!b.config().log_request_ip);
    }

    #[test]
    fn forbidden_keys_are_rejected() {
        let mut b = MockBackend::seeded();
        let err = b.set_config("node_id", "node-9").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.detail, "This config key is not allowed via API");
    }

    #[test]
    fn int_settings_reject_garbage() {
        let mut b = MockBackend::seeded();
        assert!(b.set_config("max_rpm", "fast").is_err());
        assert_eq!(b.config().max_rpm, 120);
    }

    #[test]
    fn proxy_list_marks_configured() {
        let mut b = MockBackend::seeded();
        b.set_config("upstream_proxies", "http://a:1,http://b:2").unwrap();
        assert!(b.config().upstream_proxies_configured);
        assert_eq!(b.proxy_pool().items.len(), 2);
        assert!(!b.proxy_pool().enabled);
        b.set_config("upstream_proxy_mode", "proxy_pool").unwrap();
        assert!(b.proxy_pool().enabled);
    }

    #[test]
    fn form_with_bad_entry_applies_nothing() {
        let mut b = MockBackend::seeded();
        let form = BTreeMap::from([
            ("base_rpm".to_string(), "7".to_string()),
            ("secret_key".to_string(), "x".to_string()),
        ]);
        assert!(b.set_config_form(&form).is_err());
        assert_eq!(b.config().base_rpm, 0);
    }

    #[test]
    fn rotate_deactivates_existing_client_keys() {
        let mut b = MockBackend::seeded();
        let uid = b.user_id("alice").unwrap();
        let (first, _) = b.issue_client_key(uid, None, false);
        let (second, raw) = b.issue_client_key(uid, Some("ci"), true);
        assert!(raw.starts_with("np-"));
        let keys = b.client_keys_of(uid);
        assert_eq!(keys[0].id, second);
        assert!(keys[0].is_active);
        assert_eq!(keys[1].id, first);
        assert!(!keys[1].is_active);
        assert_eq!(keys[1].name.as_deref(), Some("default"));
    }

    #[test]
    fn registration_rules() {
        let mut b = MockBackend::seeded();
        assert_eq!(
            b.register("bob", "short", None, None).unwrap_err().detail,
            "Password too short"
        );
        assert_eq!(
            b.register("alice", "long-enough", None, None).unwrap_err().status,
            StatusCode::CONFLICT
        );
        b.register("bob", "long-enough", Some("long-enough"), Some("bob@example.com"))
            .unwrap();
        b.config_mut().allow_registration = false;
        assert_eq!(
            b.register("carol", "long-enough", None, None).unwrap_err().status,
            StatusCode::FORBIDDEN
        );
    }
}
