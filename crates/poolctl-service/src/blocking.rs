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
use tokio::runtime::Runtime;

use crate::{AdminApi, HttpService, ServiceError};

/// Blocking wrapper around the async `HttpService`.
///
/// Creates an internal tokio runtime and uses `block_on()` for each call.
/// Designed for sync callers like the TUI.
pub struct BlockingHttpService {
    inner: HttpService,
    rt: Runtime,
}

impl BlockingHttpService {
    pub fn new(base_url: &str) -> std::io::Result<Self> {
        Ok(Self {
            inner: HttpService::new(base_url),
            rt: Runtime::new()?,
        })
    }

    pub fn base_url(&self) -> &str {
        self.inner.base_url()
    }

    pub fn token(&self) -> Option<&str> {
        self.inner.token()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.inner.set_token(token);
    }

    // -- Trait method delegates --

    pub fn login(&self, input: &LoginRequest) -> Result<TokenResponse, ServiceError> {
        self.rt.block_on(self.inner.login(input))
    }

    pub fn register(&self, input: &RegisterRequest) -> Result<MessageResponse, ServiceError> {
        self.rt.block_on(self.inner.register(input))
    }

    pub fn me(&self) -> Result<CurrentUser, ServiceError> {
        self.rt.block_on(self.inner.me())
    }

    pub fn get_config(&self) -> Result<ConfigSnapshot, ServiceError> {
        self.rt.block_on(self.inner.get_config())
    }

    pub fn set_config_value(&self, update: &ConfigUpdate) -> Result<ConfigUpdate, ServiceError> {
        self.rt.block_on(self.inner.set_config_value(update))
    }

    pub fn post_config_form(&self, form: &ConfigForm) -> Result<ConfigFormApplied, ServiceError> {
        self.rt.block_on(self.inner.post_config_form(form))
    }

    pub fn list_keys(&self) -> Result<Vec<UpstreamKey>, ServiceError> {
        self.rt.block_on(self.inner.list_keys())
    }

    pub fn create_key(&self, input: &CreateKey) -> Result<CreatedKey, ServiceError> {
        self.rt.block_on(self.inner.create_key(input))
    }

    pub fn delete_key(&self, id: i64) -> Result<(), ServiceError> {
        self.rt.block_on(self.inner.delete_key(id))
    }

    pub fn list_admin_users(&self) -> Result<Vec<AdminUser>, ServiceError> {
        self.rt.block_on(self.inner.list_admin_users())
    }

    pub fn update_admin_user(
        &self,
        id: i64,
        update: &UpdateUser,
    ) -> Result<UpdatedUser, ServiceError> {
        self.rt.block_on(self.inner.update_admin_user(id, update))
    }

    pub fn list_admin_keys(&self) -> Result<Vec<AdminKey>, ServiceError> {
        self.rt.block_on(self.inner.list_admin_keys())
    }

    pub fn toggle_admin_key(&self, id: i64) -> Result<KeyToggled, ServiceError> {
        self.rt.block_on(self.inner.toggle_admin_key(id))
    }

    pub fn trigger_health_check(&self) -> Result<HealthCheckSummary, ServiceError> {
        self.rt.block_on(self.inner.trigger_health_check())
    }

    pub fn proxy_pool_status(&self) -> Result<ProxyPoolStatus, ServiceError> {
        self.rt.block_on(self.inner.proxy_pool_status())
    }

    pub fn list_models(&self) -> Result<ModelCatalog, ServiceError> {
        self.rt.block_on(self.inner.list_models())
    }

    pub fn list_client_keys(&self) -> Result<Vec<ClientKey>, ServiceError> {
        self.rt.block_on(self.inner.list_client_keys())
    }

    pub fn create_client_key(
        &self,
        input: &CreateClientKey,
    ) -> Result<IssuedClientKey, ServiceError> {
        self.rt.block_on(self.inner.create_client_key(input))
    }

    pub fn update_client_key(
        &self,
        id: i64,
        is_active: bool,
    ) -> Result<ClientKeyStatus, ServiceError> {
        self.rt.block_on(self.inner.update_client_key(id, is_active))
    }

    pub fn delete_client_key(&self, id: i64) -> Result<(), ServiceError> {
        self.rt.block_on(self.inner.delete_client_key(id))
    }

    pub fn list_my_logs(&self) -> Result<Vec<LogEntry>, ServiceError> {
        self.rt.block_on(self.inner.list_my_logs())
    }

    pub fn list_all_logs(&self) -> Result<Vec<LogEntry>, ServiceError> {
        self.rt.block_on(self.inner.list_all_logs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Spawn a test server on a background thread (since BlockingHttpService
    /// creates its own tokio runtime and cannot be nested inside another).
    /// Returns the base_url. The server stays alive indefinitely via
    /// `std::future::pending()`.
    fn spawn_blocking_server() -> String {
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let server = poolctl_mock_server::test_helpers::spawn_test_server().await;
                tx.send(server.base_url.clone()).unwrap();
                std::future::pending::<()>().await;
            });
        });
        rx.recv().unwrap()
    }

    fn logged_in(url: &str, username: &str, password: &str) -> BlockingHttpService {
        let mut svc = BlockingHttpService::new(url).unwrap();
        let token = svc
            .login(&LoginRequest {
                username: username.into(),
                password: password.into(),
            })
            .unwrap();
        svc.set_token(Some(token.access_token));
        svc
    }

    #[test]
    fn blocking_login_and_me() {
        let url = spawn_blocking_server();
        let svc = logged_in(&url, "admin", "admin-pass");
        let me = svc.me().unwrap();
        assert_eq!(me.username, "admin");
        assert!(me.is_admin());
    }

    #[test]
    fn blocking_me_without_token_is_unauthorized() {
        let url = spawn_blocking_server();
        let svc = BlockingHttpService::new(&url).unwrap();
        let err = svc.me().unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn blocking_key_create_list_delete() {
        let url = spawn_blocking_server();
        let svc = logged_in(&url, "alice", "alice-pass");

        let created = svc
            .create_key(&CreateKey::new("pst-blocking", false).unwrap())
            .unwrap();
        let keys = svc.list_keys().unwrap();
        assert!(keys.iter().any(|k| k.id == created.id));

        svc.delete_key(created.id).unwrap();
        let keys = svc.list_keys().unwrap();
        assert!(keys.iter().all(|k| k.id != created.id));
    }

    #[test]
    fn blocking_config_update_is_visible_on_refetch() {
        let url = spawn_blocking_server();
        let svc = logged_in(&url, "admin", "admin-pass");

        svc.set_config_value(&ConfigUpdate {
            key: "max_rpm".into(),
            value: "77".into(),
        })
        .unwrap();
        assert_eq!(svc.get_config().unwrap().max_rpm, 77);
    }

    #[test]
    fn blocking_connection_failure_has_no_status() {
        let svc = BlockingHttpService::new("http://127.0.0.1:1").unwrap();
        let err = svc.list_keys().unwrap_err();
        assert_eq!(err.status(), None);
        assert!(err.message().starts_with("connection failed"));
    }
}
