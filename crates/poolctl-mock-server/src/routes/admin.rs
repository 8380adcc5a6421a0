use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::auth::Caller;
use crate::state::{AppState, Rejection};

/// `manual_rpm: null` resets the user to automatic quota, so an explicit
/// null has to be told apart from a missing field.
#[derive(Debug, Default, Deserialize)]
struct UserPatch {
    #[serde(default, deserialize_with = "present")]
    manual_rpm: Option<Option<i64>>,
    #[serde(default)]
    is_active: Option<bool>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}", patch(update_user))
        .route("/admin/keys", get(list_keys))
        .route("/admin/keys/{id}/toggle", post(toggle_key))
        .route("/admin/health-check", post(health_check))
        .route("/admin/proxy-pool", get(proxy_pool))
}

async fn list_users(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Value>, Rejection> {
    caller.require_admin()?;
    Ok(Json(json!(state.backend.lock().unwrap().admin_users())))
}

async fn update_user(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
    Json(input): Json<UserPatch>,
) -> Result<Json<Value>, Rejection> {
    caller.require_admin()?;
    let mut backend = state.backend.lock().unwrap();
    let user = backend.update_user(id, input.manual_rpm, input.is_active)?;
    Ok(Json(json!({
        "id": user.id,
        "manual_rpm": user.manual_rpm,
        "is_active": user.is_active,
    })))
}

async fn list_keys(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Value>, Rejection> {
    caller.require_admin()?;
    Ok(Json(json!(state.backend.lock().unwrap().admin_keys())))
}

async fn toggle_key(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, Rejection> {
    caller.require_admin()?;
    let is_enabled = state.backend.lock().unwrap().toggle_key(id)?;
    Ok(Json(json!({ "id": id, "is_enabled": is_enabled })))
}

async fn health_check(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Value>, Rejection> {
    caller.require_admin()?;
    let checked = state.backend.lock().unwrap().health_check();
    Ok(Json(json!({ "checked": checked })))
}

async fn proxy_pool(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Value>, Rejection> {
    caller.require_admin()?;
    Ok(Json(json!(state.backend.lock().unwrap().proxy_pool())))
}
