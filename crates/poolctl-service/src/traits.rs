use async_trait::async_trait;
use poolctl_core::auth::{LoginRequest, MessageResponse, RegisterRequest, TokenResponse};
use poolctl_core::client_key::{ClientKey, ClientKeyStatus, CreateClientKey, IssuedClientKey};
use poolctl_core::config::{ConfigForm, ConfigFormApplied, ConfigSnapshot, ConfigUpdate};
use poolctl_core::key::{
    AdminKey, CreateKey, CreatedKey, HealthCheckSummary, KeyToggled, UpstreamKey,
};
use poolctl_core::log::LogEntry;
use poolctl_core::models::ModelCatalog;
use poolctl_core::proxy_pool::ProxyPoolStatus;
use poolctl_core::user::{AdminUser, CurrentUser, UpdateUser, UpdatedUser};
use thiserror::Error;

/// Every failed call, whatever the cause, surfaces as one human-readable
/// message. `status` is `None` for transport and decode failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("{message}")]
    RequestFailed {
        status: Option<u16>,
        message: String,
    },
}

impl ServiceError {
    pub fn transport(message: impl Into<String>) -> Self {
        ServiceError::RequestFailed {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::RequestFailed { status, .. } => *status,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ServiceError::RequestFailed { message, .. } => message,
        }
    }
}

/// The backend's REST surface as consumed by the console.
///
/// `HttpService` is the only implementation; the console drives it through
/// `BlockingHttpService`. Calls are authenticated with the bearer token the
/// service currently holds.
#[async_trait]
pub trait AdminApi: Send + Sync {
    // -- Session --
    async fn login(&self, input: &LoginRequest) -> Result<TokenResponse, ServiceError>;
    async fn register(&self, input: &RegisterRequest) -> Result<MessageResponse, ServiceError>;
    async fn me(&self) -> Result<CurrentUser, ServiceError>;

    // -- Config --
    async fn get_config(&self) -> Result<ConfigSnapshot, ServiceError>;
    async fn set_config_value(&self, update: &ConfigUpdate) -> Result<ConfigUpdate, ServiceError>;
    async fn post_config_form(&self, form: &ConfigForm) -> Result<ConfigFormApplied, ServiceError>;

    // -- Upstream keys --
    async fn list_keys(&self) -> Result<Vec<UpstreamKey>, ServiceError>;
    async fn create_key(&self, input: &CreateKey) -> Result<CreatedKey, ServiceError>;
    async fn delete_key(&self, id: i64) -> Result<(), ServiceError>;

    // -- Admin --
    async fn list_admin_users(&self) -> Result<Vec<AdminUser>, ServiceError>;
    async fn update_admin_user(
        &self,
        id: i64,
        update: &UpdateUser,
    ) -> Result<UpdatedUser, ServiceError>;
    async fn list_admin_keys(&self) -> Result<Vec<AdminKey>, ServiceError>;
    async fn toggle_admin_key(&self, id: i64) -> Result<KeyToggled, ServiceError>;
    async fn trigger_health_check(&self) -> Result<HealthCheckSummary, ServiceError>;
    async fn proxy_pool_status(&self) -> Result<ProxyPoolStatus, ServiceError>;

    // -- Models --
    async fn list_models(&self) -> Result<ModelCatalog, ServiceError>;

    // -- Client keys --
    async fn list_client_keys(&self) -> Result<Vec<ClientKey>, ServiceError>;
    async fn create_client_key(
        &self,
        input: &CreateClientKey,
    ) -> Result<IssuedClientKey, ServiceError>;
    async fn update_client_key(
        &self,
        id: i64,
        is_active: bool,
    ) -> Result<ClientKeyStatus, ServiceError>;
    async fn delete_client_key(&self, id: i64) -> Result<(), ServiceError>;

    // -- Logs --
    async fn list_my_logs(&self) -> Result<Vec<LogEntry>, ServiceError>;
    async fn list_all_logs(&self) -> Result<Vec<LogEntry>, ServiceError>;
}
