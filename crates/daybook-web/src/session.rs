use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use daybook_core::auth::Session;
use daybook_core::error::DaybookError;

use crate::error::{ApiError, AppError};
use crate::AppState;

pub const SESSION_COOKIE: &str = "daybook_session";

/// Bearer token from `Authorization`, else the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(token: &str, max_age_secs: i64) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    ))
    .ok()
}

pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("daybook_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

async fn resolve(parts: &Parts, state: &AppState) -> Result<Session, DaybookError> {
    let token = session_token(&parts.headers)
        .ok_or_else(|| DaybookError::Unauthorized("not signed in".into()))?;
    state.identity.current_session(&token).await
}

/// Signed-in user for JSON endpoints; rejects with 401.
pub struct CurrentUser(pub Session);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match resolve(parts, state).await {
            Ok(session) => Ok(Self(session)),
            Err(DaybookError::Unauthorized(msg)) => Err(ApiError::unauthorized(msg)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Signed-in user for pages; redirects to `/login` when there is none.
pub struct PageUser(pub Session);

impl FromRequestParts<Arc<AppState>> for PageUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match resolve(parts, state).await {
            Ok(session) => Ok(Self(session)),
            Err(DaybookError::Unauthorized(_)) => Err(Redirect::to("/login").into_response()),
            Err(e) => Err(AppError::from(e).into_response()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_from_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "theme=dark; daybook_session=tok; other=1".parse().unwrap(),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("tok"));
    }

    #[test]
    fn missing_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "daybook_session=".parse().unwrap());
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn cookie_shape() {
        let cookie = session_cookie("tok", 60).unwrap();
        let text = cookie.to_str().unwrap();
        assert!(text.starts_with("daybook_session=tok;"));
        assert!(text.contains("HttpOnly"));
        assert!(text.contains("Max-Age=60"));
    }
}
