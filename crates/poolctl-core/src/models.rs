use serde::{Deserialize, Serialize};

/// Response of `GET /v1/novelai/models`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCatalog {
    #[serde(default)]
    pub models: Vec<String>,
}
