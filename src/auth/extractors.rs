use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use super::claims::{JwtKeys, TokenKind};
use crate::error::ApiError;

/// Extracts and validates the caller's JWT, returning the user ID.
///
/// The credential is read from `Authorization: Bearer <token>` or, failing
/// that, from the `access_token` cookie.
pub struct AuthUser(pub Uuid);

/// Same as [`AuthUser`] but tolerates anonymous callers.
pub struct OptionalAuthUser(pub Option<Uuid>);

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

fn cookie_token(parts: &Parts) -> Option<String> {
    let cookies = parts.headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == "access_token" && !value.is_empty()).then(|| value.to_string())
    })
}

fn resolve_user<S>(parts: &Parts, state: &S) -> Result<Uuid, ApiError>
where
    JwtKeys: FromRef<S>,
{
    let token = bearer_token(parts)
        .or_else(|| cookie_token(parts))
        .ok_or_else(|| ApiError::Auth("Missing credentials".into()))?;

    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify(&token).map_err(|_| {
        warn!("invalid or expired token");
        ApiError::Auth("Invalid or expired token".into())
    })?;

    if claims.kind != TokenKind::Access {
        return Err(ApiError::Auth("Access token required".into()));
    }

    Ok(claims.sub)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        resolve_user(parts, state).map(AuthUser)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuthUser(resolve_user(parts, state).ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header_name: header::HeaderName, value: &str) -> Parts {
        let req = Request::builder()
            .header(header_name, value)
            .body(())
            .unwrap();
        req.into_parts().0
    }

    #[test]
    fn bearer_header_wins() {
        let parts = parts_with(header::AUTHORIZATION, "Bearer abc.def.ghi");
        assert_eq!(bearer_token(&parts).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn cookie_is_parsed_among_others() {
        let parts = parts_with(
            header::COOKIE,
            "theme=dark; access_token=tok-123; lang=en",
        );
        assert_eq!(cookie_token(&parts).as_deref(), Some("tok-123"));
    }

    #[test]
    fn empty_cookie_value_is_ignored() {
        let parts = parts_with(header::COOKIE, "access_token=");
        assert_eq!(cookie_token(&parts), None);
    }
}
