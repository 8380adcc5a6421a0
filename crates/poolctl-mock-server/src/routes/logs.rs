use axum::{extract::State, routing::get, Extension, Json, Router};
use serde_json::{json, Value};

use crate::auth::Caller;
use crate::state::{AppState, Rejection};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/logs", get(my_logs))
        .route("/admin/logs", get(all_logs))
}

async fn my_logs(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Json<Value> {
    Json(json!(state.backend.lock().unwrap().logs_of(caller.id)))
}

async fn all_logs(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Value>, Rejection> {
    caller.require_admin()?;
    Ok(Json(json!(state.backend.lock().unwrap().all_logs())))
}
