use async_trait::async_trait;
use poolctl_core::auth::{LoginRequest, MessageResponse, RegisterRequest, TokenResponse};
use poolctl_core::client_key::{
    ClientKey, ClientKeyStatus, CreateClientKey, IssuedClientKey, UpdateClientKey,
};
use poolctl_core::config::{ConfigForm, ConfigFormApplied, ConfigSnapshot, ConfigUpdate};
use poolctl_core::key::{
    AdminKey, CreateKey, CreatedKey, HealthCheckSummary, KeyToggled, UpstreamKey,
};
use poolctl_core::log::LogEntry;
use poolctl_core::models::ModelCatalog;
use poolctl_core::proxy_pool::ProxyPoolStatus;
use poolctl_core::user::{AdminUser, CurrentUser, UpdateUser, UpdatedUser};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use crate::{AdminApi, ServiceError};

/// Async HTTP client implementation of `AdminApi`.
/// Connects to a running backend.
pub struct HttpService {
    base_url: String,
    client: Client,
    token: Option<String>,
}

impl HttpService {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            client: Client::new(),
            token: None,
        }
    }

    pub fn with_token(base_url: &str, token: String) -> Self {
        let mut svc = Self::new(base_url);
        svc.token = Some(token);
        svc
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<Response, ServiceError> {
        debug!(method, path, "request");
        self.with_auth(builder).send().await.map_err(|e| {
            warn!(method, path, error = %e, "request did not complete");
            ServiceError::transport(format!("connection failed: {e}"))
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let builder = self.client.get(format!("{}{path}", self.base_url));
        let resp = self.send("GET", path, builder).await?;
        handle_response(path, resp).await
    }

    async fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let builder = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body);
        let resp = self.send("POST", path, builder).await?;
        handle_response(path, resp).await
    }

    /// POST without a body, for action endpoints.
    async fn post_empty<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let builder = self.client.post(format!("{}{path}", self.base_url));
        let resp = self.send("POST", path, builder).await?;
        handle_response(path, resp).await
    }

    async fn patch_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let builder = self
            .client
            .patch(format!("{}{path}", self.base_url))
            .json(body);
        let resp = self.send("PATCH", path, builder).await?;
        handle_response(path, resp).await
    }

    async fn delete_req(&self, path: &str) -> Result<(), ServiceError> {
        let builder = self.client.delete(format!("{}{path}", self.base_url));
        let resp = self.send("DELETE", path, builder).await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(parse_error_with_status(path, status, resp).await)
        }
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    path: &str,
    resp: Response,
) -> Result<T, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        resp.json::<T>().await.map_err(|e| {
            warn!(path, error = %e, "response did not decode");
            ServiceError::transport(format!("json decode: {e}"))
        })
    } else {
        Err(parse_error_with_status(path, status, resp).await)
    }
}

async fn parse_error_with_status(path: &str, status: StatusCode, resp: Response) -> ServiceError {
    let body = resp.text().await.unwrap_or_default();
    let message = error_message(status, &body);
    warn!(path, status = status.as_u16(), %message, "request failed");
    ServiceError::RequestFailed {
        status: Some(status.as_u16()),
        message,
    }
}

/// Message for a failed response: the `detail` string of a JSON body, else
/// the JSON itself, else the raw text.
fn error_message(status: StatusCode, body: &str) -> String {
    if body.trim().is_empty() {
        return format!("request failed ({})", status.as_u16());
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match value.get("detail") {
            Some(serde_json::Value::String(detail)) if !detail.is_empty() => detail.clone(),
            _ => value.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

#[async_trait]
impl AdminApi for HttpService {
    async fn login(&self, input: &LoginRequest) -> Result<TokenResponse, ServiceError> {
        self.post_json("/auth/login", input).await
    }

    async fn register(&self, input: &RegisterRequest) -> Result<MessageResponse, ServiceError> {
        self.post_json("/auth/register", input).await
    }

    async fn me(&self) -> Result<CurrentUser, ServiceError> {
        self.get_json("/auth/me").await
    }

    async fn get_config(&self) -> Result<ConfigSnapshot, ServiceError> {
        self.get_json("/admin/config").await
    }

    async fn set_config_value(&self, update: &ConfigUpdate) -> Result<ConfigUpdate, ServiceError> {
        self.post_json("/admin/config", update).await
    }

    async fn post_config_form(&self, form: &ConfigForm) -> Result<ConfigFormApplied, ServiceError> {
        self.post_json("/admin/config", form).await
    }

    async fn list_keys(&self) -> Result<Vec<UpstreamKey>, ServiceError> {
        self.get_json("/keys").await
    }

    async fn create_key(&self, input: &CreateKey) -> Result<CreatedKey, ServiceError> {
        self.post_json("/keys", input).await
    }

    async fn delete_key(&self, id: i64) -> Result<(), ServiceError> {
        self.delete_req(&format!("/keys/{id}")).await
    }

    async fn list_admin_users(&self) -> Result<Vec<AdminUser>, ServiceError> {
        self.get_json("/admin/users").await
    }

    async fn update_admin_user(
        &self,
        id: i64,
        update: &UpdateUser,
    ) -> Result<UpdatedUser, ServiceError> {
        self.patch_json(&format!("/admin/users/{id}"), update).await
    }

    async fn list_admin_keys(&self) -> Result<Vec<AdminKey>, ServiceError> {
        self.get_json("/admin/keys").await
    }

    async fn toggle_admin_key(&self, id: i64) -> Result<KeyToggled, ServiceError> {
        self.post_empty(&format!("/admin/keys/{id}/toggle")).await
    }

    async fn trigger_health_check(&self) -> Result<HealthCheckSummary, ServiceError> {
        self.post_empty("/admin/health-check").await
    }

    async fn proxy_pool_status(&self) -> Result<ProxyPoolStatus, ServiceError> {
        self.get_json("/admin/proxy-pool").await
    }

    async fn list_models(&self) -> Result<ModelCatalog, ServiceError> {
        self.get_json("/v1/novelai/models").await
    }

    async fn list_client_keys(&self) -> Result<Vec<ClientKey>, ServiceError> {
        self.get_json("/client-keys").await
    }

    async fn create_client_key(
        &self,
        input: &CreateClientKey,
    ) -> Result<IssuedClientKey, ServiceError> {
        self.post_json("/client-keys", input).await
    }

    async fn update_client_key(
        &self,
        id: i64,
        is_active: bool,
    ) -> Result<ClientKeyStatus, ServiceError> {
        self.patch_json(&format!("/client-keys/{id}"), &UpdateClientKey { is_active })
            .await
    }

    async fn delete_client_key(&self, id: i64) -> Result<(), ServiceError> {
        self.delete_req(&format!("/client-keys/{id}")).await
    }

    async fn list_my_logs(&self) -> Result<Vec<LogEntry>, ServiceError> {
        self.get_json("/logs").await
    }

    async fn list_all_logs(&self) -> Result<Vec<LogEntry>, ServiceError> {
        self.get_json("/admin/logs").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_string_is_the_message() {
        let msg = error_message(StatusCode::CONFLICT, r#"{"detail":"Key already exists"}"#);
        assert_eq!(msg, "Key already exists");
    }

    #[test]
    fn json_without_detail_is_kept_as_text() {
        let msg = error_message(StatusCode::BAD_REQUEST, r#"{"error":"nope"}"#);
        assert_eq!(msg, r#"{"error":"nope"}"#);
    }

    #[test]
    fn structured_detail_falls_back_to_json() {
        let msg = error_message(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail":[{"loc":["body","key"]}]}"#,
        );
        assert!(msg.starts_with(r#"{"detail":[{"#));
    }

    #[test]
    fn plain_text_body_is_returned_raw() {
        let msg = error_message(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(msg, "upstream down");
    }

    #[test]
    fn empty_body_names_the_status() {
        let msg = error_message(StatusCode::INTERNAL_SERVER_ERROR, "  ");
        assert_eq!(msg, "request failed (500)");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let svc = HttpService::with_token("http://localhost:8000/", "t".into());
        assert_eq!(svc.base_url(), "http://localhost:8000");
        assert_eq!(svc.token(), Some("t"));
    }
}
