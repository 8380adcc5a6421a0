pub mod admin;
pub mod client_keys;
pub mod config;
pub mod keys;
pub mod logs;
pub mod session;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    Router,
};

use crate::auth::auth_middleware;
use crate::state::{AppState, RecordedRequest};

pub fn build_router(state: AppState) -> Router {
    let public = Router::new().merge(session::routes());

    let protected = Router::new()
        .merge(session::protected_routes())
        .merge(config::routes())
        .merge(keys::routes())
        .merge(admin::routes())
        .merge(client_keys::routes())
        .merge(logs::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public
        .merge(protected)
        .layer(middleware::from_fn_with_state(state.clone(), record_requests))
        .with_state(state)
}

/// Keep a log of every request so tests can assert on call order.
async fn record_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    tracing::debug!(method = %request.method(), path = request.uri().path(), "mock request");
    state.requests.lock().unwrap().push(RecordedRequest {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
    });
    next.run(request).await
}
