use serde::{Deserialize, Serialize};

/// Key issued by the backend to its own consumers (`GET /client-keys`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientKey {
    pub id: i64,
    pub prefix: String,
    #[serde(default)]
    pub name: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_used_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateClientKey {
    pub name: Option<String>,
    /// Deactivate every existing key of the user before issuing the new one.
    pub rotate: bool,
}

impl CreateClientKey {
    pub fn new(name: &str, rotate: bool) -> Self {
        let name = name.trim();
        Self {
            name: (!name.is_empty()).then(|| name.to_string()),
            rotate,
        }
    }
}

/// Response of `POST /client-keys`. `api_key` is the only time the plaintext
/// key is ever visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedClientKey {
    pub api_key: String,
    #[serde(default)]
    pub api_key_masked: String,
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateClientKey {
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientKeyStatus {
    pub id: i64,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_name_is_sent_as_null() {
        let body = serde_json::to_value(CreateClientKey::new("  ", true)).unwrap();
        assert_eq!(body, serde_json::json!({ "name": null, "rotate": true }));
    }

    #[test]
    fn name_is_trimmed() {
        assert_eq!(
            CreateClientKey::new(" ci bot ", false).name.as_deref(),
            Some("ci bot")
        );
    }
}
