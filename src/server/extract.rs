//! Request extractors for the caller identity and request parameters.

use crate::db::User;
use crate::error::AppError;
use crate::server::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use axum_extra::extract::CookieJar;

/// Name of the cookie carrying the access token.
pub const TOKEN_COOKIE: &str = "token";

/// Token from `Authorization: Bearer` or, failing that, the `token` cookie.
fn extract_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(&parts.headers)
        .get(TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// Path parameters. Values that fail to parse are rejected as JSON errors.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParam<T>(pub T);

/// Query string parameters, rejected the same way as [`PathParam`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct QueryParam<T>(pub T);

/// Authenticated caller. Rejects the request when the token is missing or bad.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts).ok_or(AppError::Unauthenticated)?;
        state.auth.authenticate(&token).map(AuthUser)
    }
}

/// Caller identity when a valid token is present; anonymous otherwise.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = extract_token(parts).and_then(|token| match state.auth.authenticate(&token) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid credential");
                None
            }
        });
        Ok(MaybeUser(user))
    }
}
