use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Extension, Json, Router,
};
use poolctl_core::key::CreateKey;
use serde_json::{json, Value};

use crate::auth::Caller;
use crate::state::{AppState, Rejection};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/keys", get(list_keys).post(create_key))
        .route("/keys/{id}", delete(delete_key))
        .route("/v1/novelai/models", get(list_models))
}

async fn list_keys(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Json<Value> {
    Json(json!(state.backend.lock().unwrap().keys_of(caller.id)))
}

async fn create_key(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(input): Json<CreateKey>,
) -> Result<Json<Value>, Rejection> {
    let (id, status) = state
        .backend
        .lock()
        .unwrap()
        .add_key(caller.id, &input.api_key, input.verify_now)?;
    Ok(Json(json!({ "id": id, "status": status })))
}

async fn delete_key(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, Rejection> {
    state.backend.lock().unwrap().delete_key(caller.id, id)?;
    Ok(Json(json!({ "message": "deleted" })))
}

async fn list_models(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "models": state.backend.lock().unwrap().models() }))
}
