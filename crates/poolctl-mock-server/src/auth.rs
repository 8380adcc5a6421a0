use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use poolctl_core::Role;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::state::{AppState, Rejection};

const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Authenticated user, inserted into request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl Caller {
    pub fn require_admin(&self) -> Result<(), Rejection> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(Rejection::forbidden("Admin only"))
        }
    }
}

/// SHA-256 hash a raw secret, returning the hex-encoded digest.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn random_base62(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE62[rng.gen_range(0..BASE62.len())] as char)
        .collect()
}

/// Opaque session token handed out by `/auth/login`.
pub fn generate_access_token() -> String {
    format!("tok_{}", random_base62(40))
}

/// Client key: `np-` + 43 chars of base62.
pub fn generate_client_key() -> String {
    format!("np-{}", random_base62(43))
}

/// `np-` plus the first four characters of the secret part.
pub fn client_key_prefix(raw: &str) -> String {
    match raw.split_once('-') {
        Some((head, rest)) => format!("{head}-{}", rest.chars().take(4).collect::<String>()),
        None => raw.chars().take(7).collect(),
    }
}

pub fn mask_api_key(raw: &str) -> String {
    if raw.len() <= 10 {
        return "***".into();
    }
    format!("{}...{}", &raw[..6], &raw[raw.len() - 4..])
}

/// Axum middleware that resolves the bearer token to a user.
///
/// Missing or unknown tokens get 401, disabled users 403.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    let Some(token) = token else {
        return Rejection::unauthorized("Missing token").into_response();
    };

    let caller = {
        let backend = state.backend.lock().unwrap();
        backend.user_for_token(&token).map(|u| {
            (
                u.is_active,
                Caller {
                    id: u.id,
                    username: u.username.clone(),
                    role: u.role,
                },
            )
        })
    };

    match caller {
        None => Rejection::unauthorized("Invalid token").into_response(),
        Some((false, _)) => Rejection::forbidden("User disabled").into_response(),
        Some((true, caller)) => {
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
    }
}
