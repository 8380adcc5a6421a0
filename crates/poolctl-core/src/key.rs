use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Upstream credential owned by the current user (`GET /keys`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamKey {
    pub id: i64,
    pub status: String,
    #[serde(default)]
    pub tier: Option<i64>,
    #[serde(default = "enabled_default")]
    pub is_enabled: bool,
    #[serde(default)]
    pub fail_streak: i64,
    #[serde(default)]
    pub last_checked_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Row of `GET /admin/keys`: every upstream key in the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminKey {
    pub id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    pub status: String,
    #[serde(default)]
    pub tier: Option<i64>,
    #[serde(default = "enabled_default")]
    pub is_enabled: bool,
    #[serde(default)]
    pub fail_streak: i64,
    #[serde(default)]
    pub cooldown_until: Option<String>,
    #[serde(default)]
    pub last_checked_at: Option<String>,
}

impl AdminKey {
    /// Owner column: username when the backend joined it, else the raw uid.
    pub fn owner_label(&self) -> String {
        match &self.username {
            Some(name) => name.clone(),
            None => format!("UID:{}", self.user_id),
        }
    }
}

fn enabled_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateKey {
    pub api_key: String,
    pub verify_now: bool,
}

impl CreateKey {
    pub fn new(raw: &str, verify_now: bool) -> Result<Self, CoreError> {
        let api_key = raw.trim();
        if api_key.is_empty() {
            return Err(CoreError::InvalidInput("key is empty".into()));
        }
        Ok(Self {
            api_key: api_key.to_string(),
            verify_now,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedKey {
    pub id: i64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyToggled {
    pub id: i64,
    pub is_enabled: bool,
}

/// Result of `POST /admin/health-check`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthCheckSummary {
    pub checked: i64,
}

pub fn tier_label(tier: Option<i64>) -> String {
    tier.map(|t| t.to_string()).unwrap_or_else(|| "-".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_label_falls_back_to_uid() {
        let key: AdminKey =
            serde_json::from_str(r#"{"id":4,"user_id":9,"status":"active"}"#).unwrap();
        assert_eq!(key.owner_label(), "UID:9");
        assert!(key.is_enabled);
    }

    #[test]
    fn create_key_trims_and_rejects_empty() {
        assert_eq!(CreateKey::new("  pst-abc ", true).unwrap().api_key, "pst-abc");
        assert!(CreateKey::new("   ", false).is_err());
    }

    #[test]
    fn tier_label_placeholder() {
        assert_eq!(tier_label(None), "-");
        assert_eq!(tier_label(Some(3)), "3");
    }
}
