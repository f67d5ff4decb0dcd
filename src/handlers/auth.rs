//! Bearer token check at the HTTP boundary.
//!
//! Tokens are issued elsewhere and look like `<user_id>.<signature>`, where the
//! signature is base64 HMAC-SHA1 of the user id keyed with `AUTH_SECRET`.

use axum::http::HeaderMap;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Role, User};
use crate::state::AppState;

type HmacSha1 = Hmac<Sha1>;

pub fn sign_identity(secret: &str, user_id: &str) -> String {
    let Ok(mut mac) = HmacSha1::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(user_id.as_bytes());
    let signature = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());
    format!("{user_id}.{signature}")
}

/// User id carried by a well-signed token.
fn verify_token(secret: &str, token: &str) -> Option<String> {
    let (user_id, signature) = token.rsplit_once('.')?;
    if user_id.is_empty() {
        return None;
    }
    let signature = base64::engine::general_purpose::STANDARD
        .decode(signature)
        .ok()?;

    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(user_id.as_bytes());
    mac.verify_slice(&signature).ok()?;

    Some(user_id.to_string())
}

pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    let user_id = verify_token(&state.config.auth_secret, token).ok_or_else(|| {
        tracing::warn!("rejected bearer token with bad signature");
        AppError::Unauthorized("Invalid token".to_string())
    })?;

    state
        .db
        .call(move |conn| Ok(queries::get_user(conn, &user_id)?))
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))
}

pub fn require_role(user: &User, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "This action is not allowed for role {}",
            user.role.as_str()
        )))
    }
}

/// Authenticates and checks the role in one step.
pub async fn authorize(state: &AppState, headers: &HeaderMap, allowed: &[Role]) -> Result<User, AppError> {
    let user = authenticate(state, headers).await?;
    require_role(&user, allowed)?;
    Ok(user)
}
