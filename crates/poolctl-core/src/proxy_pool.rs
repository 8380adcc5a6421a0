use serde::{Deserialize, Serialize};

/// Response of `GET /admin/proxy-pool`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyPoolStatus {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub items: Vec<ProxyState>,
}

/// Health of one upstream proxy. `proxy` arrives already masked by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyState {
    #[serde(default)]
    pub proxy: String,
    #[serde(default)]
    pub is_available: bool,
    #[serde(default)]
    pub cooldown_seconds: i64,
    #[serde(default)]
    pub fail_streak: i64,
    #[serde(default)]
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_items_decode_as_empty() {
        let status: ProxyPoolStatus =
            serde_json::from_str(r#"{"enabled":false,"mode":"direct"}"#).unwrap();
        assert!(status.items.is_empty());
        assert_eq!(status.mode, "direct");
    }
}
