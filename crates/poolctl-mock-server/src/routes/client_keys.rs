use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Extension, Json, Router,
};
use poolctl_core::client_key::{CreateClientKey, UpdateClientKey};
use serde_json::{json, Value};

use crate::auth::{mask_api_key, Caller};
use crate::state::{AppState, Rejection};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/client-keys", get(list_keys).post(create_key))
        .route("/client-keys/{id}", patch(update_key).delete(delete_key))
}

async fn list_keys(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Json<Value> {
    Json(json!(state.backend.lock().unwrap().client_keys_of(caller.id)))
}

async fn create_key(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(input): Json<CreateClientKey>,
) -> Json<Value> {
    let (id, raw) = state.backend.lock().unwrap().issue_client_key(
        caller.id,
        input.name.as_deref(),
        input.rotate,
    );
    Json(json!({
        "api_key": raw,
        "api_key_masked": mask_api_key(&raw),
        "id": id,
    }))
}

async fn update_key(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateClientKey>,
) -> Result<Json<Value>, Rejection> {
    state
        .backend
        .lock()
        .unwrap()
        .set_client_key_active(caller.id, id, input.is_active)?;
    Ok(Json(json!({ "id": id, "is_active": input.is_active })))
}

async fn delete_key(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, Rejection> {
    state
        .backend
        .lock()
        .unwrap()
        .delete_client_key(caller.id, id)?;
    Ok(Json(json!({ "message": "deleted" })))
}
