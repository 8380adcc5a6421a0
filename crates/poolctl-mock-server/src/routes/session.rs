use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use poolctl_core::auth::LoginRequest;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Caller;
use crate::state::{AppState, Rejection};

#[derive(Debug, Deserialize)]
struct RegisterBody {
    username: String,
    password: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    confirm_password: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(me))
}

async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<Value>, Rejection> {
    let token = state
        .backend
        .lock()
        .unwrap()
        .login(&input.username, &input.password)?;
    Ok(Json(json!({ "access_token": token, "token_type": "bearer" })))
}

async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterBody>,
) -> Result<Json<Value>, Rejection> {
    state.backend.lock().unwrap().register(
        &input.username,
        &input.password,
        input.confirm_password.as_deref(),
        input.email.as_deref(),
    )?;
    Ok(Json(json!({ "message": "registered" })))
}

async fn me(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Value>, Rejection> {
    let backend = state.backend.lock().unwrap();
    let user = backend
        .user(caller.id)
        .ok_or_else(|| Rejection::unauthorized("Invalid token"))?;
    Ok(Json(json!(user.to_current())))
}
