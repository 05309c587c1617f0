use axum::{
    extract::{FromRef, State},
    http::{header, HeaderMap, HeaderValue},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    error::{map_unique, ApiError, ApiResult},
    state::AppState,
};

use super::{
    claims::JwtKeys,
    dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
    extractors::AuthUser,
    password::{hash_password, verify_password},
    repo::User,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn auth_cookie(token: &str, max_age_secs: u64) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(&format!(
        "access_token={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    ))
    .map_err(|e| ApiError::Internal(anyhow::Error::new(e)))
}

fn signed_response(keys: &JwtKeys, user: User) -> ApiResult<(HeaderMap, Json<AuthResponse>)> {
    let access_token = keys.sign_access(user.id).map_err(ApiError::Internal)?;
    let refresh_token = keys.sign_refresh(user.id).map_err(ApiError::Internal)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        auth_cookie(&access_token, keys.access_ttl.as_secs())?,
    );

    Ok((
        headers,
        Json(AuthResponse {
            access_token,
            refresh_token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> ApiResult<(HeaderMap, Json<AuthResponse>)> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::validation("Invalid email"));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }

    let hash = hash_password(&payload.password).map_err(ApiError::Internal)?;

    // The unique index is the source of truth for duplicates; no pre-check.
    let user = User::create_local(
        &state.db,
        &payload.email,
        &hash,
        payload.display_name.as_deref(),
    )
    .await
    .map_err(|e| map_unique(e, "Email already registered"))?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    signed_response(&JwtKeys::from_ref(&state), user)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> ApiResult<(HeaderMap, Json<AuthResponse>)> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::validation("Invalid email"));
    }

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::Auth("Invalid credentials".into())
        })?;

    let Some(hash) = user.password_hash.as_deref() else {
        warn!(user_id = %user.id, "password login attempted on federated account");
        return Err(ApiError::Auth("Invalid credentials".into()));
    };

    if !verify_password(&payload.password, hash).map_err(ApiError::Internal)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Auth("Invalid credentials".into()));
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    signed_response(&JwtKeys::from_ref(&state), user)
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<(HeaderMap, Json<AuthResponse>)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| ApiError::Auth("Invalid refresh token".into()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Auth("User not found".into()))?;

    signed_response(&keys, user)
}

/// Tokens are stateless; logout just clears the auth cookie.
#[instrument]
pub async fn logout() -> ApiResult<(HeaderMap, Json<serde_json::Value>)> {
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, auth_cookie("", 0)?);
    Ok((headers, Json(serde_json::json!({ "success": true }))))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<PublicUser>> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::Auth("User not found".into()))?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("hunter@example.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two@at@signs.com"));
        assert!(!is_valid_email("spaces in@example.com"));
    }

    #[test]
    fn auth_cookie_is_http_only() {
        let value = auth_cookie("tok", 300).unwrap();
        let s = value.to_str().unwrap();
        assert!(s.starts_with("access_token=tok;"));
        assert!(s.contains("HttpOnly"));
        assert!(s.contains("Max-Age=300"));
    }
}
