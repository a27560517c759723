mod activities;
mod api;
mod dashboard;
mod login;
mod profile;
mod reports;
mod work_memos;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Redirect};
use axum::routing::get;
use axum::Router;
use chrono::{Local, NaiveDate, NaiveTime};
use daybook_core::error::{DaybookError, Result};
use daybook_core::model::parse_time_of_day;
use daybook_core::range::{parse_date, DateRange, RangeSelector};
use serde::Deserialize;

use crate::error::AppError;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .merge(dashboard::routes())
        .merge(activities::routes())
        .merge(work_memos::routes())
        .merge(reports::routes())
        .merge(profile::routes())
        .merge(login::routes())
        .merge(api::routes())
        .fallback(not_found)
}

async fn health(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "storage": state.storage.backend_name(),
    }))
}

async fn not_found() -> AppError {
    AppError::NotFound
}

pub(crate) fn is_htmx(headers: &HeaderMap) -> bool {
    headers.get("hx-request").is_some()
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Blank form fields arrive as empty strings.
pub(crate) fn parse_opt_date(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_date(s).map(Some),
    }
}

/// `?start=&end=` as sent by the range picker.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RangeParams {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl RangeParams {
    pub fn selector(&self) -> Result<RangeSelector> {
        Ok(RangeSelector::new(
            parse_opt_date(self.start.as_deref())?,
            parse_opt_date(self.end.as_deref())?,
        ))
    }

    /// The requested range, `default` when nothing was picked.
    pub fn resolve(&self, default: DateRange) -> Result<DateRange> {
        self.selector()?.resolve(default)
    }
}

/// Comma separated tags from a text input.
pub(crate) fn split_tags(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// `?toast=` message shown once after a redirect.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Flash {
    pub toast: Option<String>,
}

pub(crate) fn with_toast(path: &str, message: &str) -> String {
    let encoded = serde_urlencoded::to_string(&[("toast", message)]).unwrap_or_default();
    if path.contains('?') {
        format!("{path}&{encoded}")
    } else {
        format!("{path}?{encoded}")
    }
}

/// Blank time inputs mean "not set".
pub(crate) fn parse_opt_time(raw: &str) -> Result<Option<NaiveTime>> {
    if raw.trim().is_empty() {
        Ok(None)
    } else {
        parse_time_of_day(raw).map(Some)
    }
}

/// Message shown to the user, without the error kind prefix.
pub(crate) fn user_message(err: &DaybookError) -> String {
    match err {
        DaybookError::InvalidInput(msg)
        | DaybookError::Conflict(msg)
        | DaybookError::NotFound(msg) => msg.clone(),
        other => other.to_string(),
    }
}

/// Redirect a form post to `back` with a toast, whether it worked or not,
/// so the user stays on the page. Only a lost session leaves the flow.
pub(crate) fn form_outcome<T>(
    result: Result<T>,
    back: &str,
    success: &str,
) -> std::result::Result<Redirect, AppError> {
    match result {
        Ok(_) => Ok(Redirect::to(&with_toast(back, success))),
        Err(e @ DaybookError::Unauthorized(_)) => Err(e.into()),
        Err(e) => {
            if is_input_error(&e) {
                tracing::debug!(error = %e, "form rejected");
            } else {
                tracing::warn!(error = %e, "form submission failed");
            }
            Ok(Redirect::to(&with_toast(back, &user_message(&e))))
        }
    }
}

fn is_input_error(err: &DaybookError) -> bool {
    matches!(
        err,
        DaybookError::InvalidInput(_) | DaybookError::Conflict(_) | DaybookError::NotFound(_)
    )
}

/// Data a page was about to show. A failed read still renders the page,
/// around `T::default()`, with the failure as its toast. htmx requests get
/// the error response instead, which leaves the current content in place.
pub(crate) fn page_data<T: Default>(
    result: Result<T>,
    headers: &HeaderMap,
    toast: &mut Option<String>,
) -> std::result::Result<T, AppError> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if is_htmx(headers) => Err(e.into()),
        Err(e @ DaybookError::Unauthorized(_)) => Err(e.into()),
        Err(e) if is_input_error(&e) => Err(e.into()),
        Err(e) => {
            tracing::warn!(error = %e, "page read failed");
            *toast = Some(format!("Could not load data: {}", user_message(&e)));
            Ok(T::default())
        }
    }
}

/// JSON embedded in a `<script>` block.
pub(crate) fn script_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/")
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use daybook_core::auth::Identity;
    use daybook_core::config::DaybookConfig;
    use daybook_core::objects::{LocalObjectStore, ObjectStore};
    use daybook_core::stats::CategoryPalette;
    use daybook_core::storage::{RemoteStorage, SqliteStorage, Storage};
    use http_body_util::BodyExt;

    use crate::AppState;

    fn build_state(storage: Storage) -> Arc<AppState> {
        let config = DaybookConfig::default_config();
        let upload_dir =
            std::env::temp_dir().join(format!("daybook-web-test-{}", uuid::Uuid::now_v7()));
        Arc::new(AppState {
            storage,
            identity: Identity::Local(daybook_core::auth::LocalIdentity::new(config.auth.clone())),
            objects: ObjectStore::Local(LocalObjectStore::new(upload_dir, None)),
            palette: CategoryPalette::default(),
            config,
            llm: None,
        })
    }

    pub fn test_app_state() -> Arc<AppState> {
        build_state(Storage::Sqlite(SqliteStorage::open_in_memory().unwrap()))
    }

    /// State whose store cannot be reached.
    pub fn unreachable_app_state() -> Arc<AppState> {
        build_state(Storage::Remote(
            RemoteStorage::new("http://127.0.0.1:1", "test-key").unwrap(),
        ))
    }

    pub fn test_router(state: Arc<AppState>) -> axum::Router {
        crate::routes::router().with_state(state)
    }

    /// Sign in as the default local user and return a session token.
    pub async fn sign_in(state: &AppState) -> String {
        state
            .identity
            .sign_in("me@localhost", "")
            .await
            .unwrap()
            .access_token
    }

    pub fn authed(builder: axum::http::request::Builder, token: &str) -> axum::http::request::Builder {
        builder.header("authorization", format!("Bearer {token}"))
    }

    pub fn json_request(method: &str, uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
        authed(Request::builder().method(method).uri(uri), token)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn get_request(uri: &str, token: &str) -> Request<Body> {
        authed(Request::builder().uri(uri), token)
            .body(Body::empty())
            .unwrap()
    }

    pub async fn body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Every `href` in `html`, with entity escapes decoded.
    pub fn hrefs(html: &str) -> Vec<String> {
        html.split("href=\"")
            .skip(1)
            .filter_map(|rest| rest.split_once('"'))
            .map(|(href, _)| {
                href.replace("&#38;", "&")
                    .replace("&amp;", "&")
                    .replace("&#39;", "'")
                    .replace("&quot;", "\"")
            })
            .collect()
    }

    pub async fn body_text(body: Body) -> String {
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}
