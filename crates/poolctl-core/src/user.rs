use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    #[serde(other)]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// Identity returned by `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub manual_rpm: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Row of `GET /admin/users`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub manual_rpm: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Body of `PATCH /admin/users/{id}`. Only the fields that are `Some` are sent;
/// `manual_rpm: Some(None)` sends an explicit `null` (back to automatic quota).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_rpm: Option<Option<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl UpdateUser {
    pub fn quota(manual_rpm: Option<i64>) -> Self {
        Self {
            manual_rpm: Some(manual_rpm),
            ..Default::default()
        }
    }

    pub fn active(is_active: bool) -> Self {
        Self {
            is_active: Some(is_active),
            ..Default::default()
        }
    }
}

/// Response of `PATCH /admin/users/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatedUser {
    pub id: i64,
    #[serde(default)]
    pub manual_rpm: Option<i64>,
    pub is_active: bool,
}

/// Label shown for a per-user quota: the manual RPM, or `auto`.
pub fn quota_label(manual_rpm: Option<i64>) -> String {
    match manual_rpm {
        Some(rpm) => rpm.to_string(),
        None => "auto".into(),
    }
}

/// Parse the quota input of the admin user table. Blank means automatic quota.
pub fn parse_manual_rpm(input: &str) -> Result<Option<i64>, CoreError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
        return Ok(None);
    }
    match trimmed.parse::<i64>() {
        Ok(rpm) if rpm >= 0 => Ok(Some(rpm)),
        _ => Err(CoreError::InvalidInput(format!(
            "quota must be a non-negative number, got {trimmed:?}"
        ))),
    }
}
