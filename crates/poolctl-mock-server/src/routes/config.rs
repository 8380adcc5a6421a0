use std::collections::BTreeMap;

use axum::{extract::State, routing::get, Extension, Json, Router};
use serde_json::{json, Value};

use crate::auth::Caller;
use crate::state::{AppState, Rejection};

pub fn routes() -> Router<AppState> {
    Router::new().route("/admin/config", get(get_config).post(update_config))
}

async fn get_config(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Value>, Rejection> {
    caller.require_admin()?;
    let backend = state.backend.lock().unwrap();
    Ok(Json(json!(backend.config())))
}

/// Accepts either a single `{key, value}` update or a map of key to value.
async fn update_config(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Rejection> {
    caller.require_admin()?;
    let mut backend = state.backend.lock().unwrap();

    if let (Some(key), Some(value)) = (body.get("key"), body.get("value")) {
        let key = key.as_str().unwrap_or_default();
        let value = as_config_string(value);
        backend.set_config(key, &value)?;
        return Ok(Json(json!({ "key": key, "value": value })));
    }

    let Some(map) = body.as_object() else {
        return Err(Rejection::bad_request("Expected a JSON object"));
    };
    let form: BTreeMap<String, String> = map
        .iter()
        .map(|(k, v)| (k.clone(), as_config_string(v)))
        .collect();
    let updated = backend.set_config_form(&form)?;
    Ok(Json(json!({ "updated": updated })))
}

fn as_config_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
