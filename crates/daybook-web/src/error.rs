use askama::Template;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use daybook_core::error::DaybookError;

fn status_for(err: &DaybookError) -> StatusCode {
    match err {
        DaybookError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        DaybookError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        DaybookError::NotFound(_) => StatusCode::NOT_FOUND,
        DaybookError::Conflict(_) => StatusCode::CONFLICT,
        e if e.is_upstream() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `HX-Trigger` payload that raises an error toast in the page.
/// Non-ASCII characters are `\u` escaped so the value is a legal header.
pub fn toast_header(message: &str, level: &str) -> Option<HeaderValue> {
    let json = serde_json::json!({ "showToast": { "message": message, "level": level } }).to_string();
    let mut ascii = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && !c.is_ascii_control() {
            ascii.push(c);
        } else {
            let mut buf = [0u16; 2];
            for unit in c.encode_utf16(&mut buf) {
                ascii.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    HeaderValue::from_str(&ascii).ok()
}

/// Headers every error response carries: a toast, and for htmx callers an
/// instruction not to swap the error over the current content.
fn error_headers(message: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(value) = toast_header(message, "error") {
        headers.insert("hx-trigger", value);
    }
    headers.insert("hx-reswap", HeaderValue::from_static("none"));
    headers
}

fn log_error(status: StatusCode, message: &str) {
    if status.is_server_error() {
        tracing::error!(%status, "{message}");
    } else {
        tracing::debug!(%status, "{message}");
    }
}

/// Error page inside the regular layout, so navigation and the toast stay.
#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    toast: Option<String>,
    code: u16,
    message: String,
}

/// Error rendered as an HTML page.
#[derive(Debug)]
pub enum AppError {
    Core(DaybookError),
    Template(askama::Error),
    NotFound,
}

impl From<DaybookError> for AppError {
    fn from(err: DaybookError) -> Self {
        AppError::Core(err)
    }
}

impl From<askama::Error> for AppError {
    fn from(err: askama::Error) -> Self {
        AppError::Template(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Core(DaybookError::Unauthorized(_)) => {
                return Redirect::to("/login").into_response();
            }
            AppError::Core(e) => (status_for(e), e.to_string()),
            AppError::Template(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Template error: {e}"),
            ),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Page not found".to_string()),
        };
        log_error(status, &message);

        let page = ErrorTemplate {
            toast: Some(message.clone()),
            code: status.as_u16(),
            message: message.clone(),
        };
        let body = page.render().unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to render error page");
            format!("<h1>{}</h1><p>{}</p>", status.as_u16(), html_escape(&message))
        });
        (status, error_headers(&message), Html(body)).into_response()
    }
}

/// JSON API error: `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.into(),
        }
    }
}

impl From<DaybookError> for ApiError {
    fn from(err: DaybookError) -> Self {
        Self {
            status: status_for(&err),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log_error(self.status, &self.message);
        let body = serde_json::json!({ "error": self.message });
        (self.status, error_headers(&self.message), Json(body)).into_response()
    }
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_for(&DaybookError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&DaybookError::Conflict("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&DaybookError::Storage("error sending request".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&DaybookError::Storage("disk full".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn toast_header_escapes_non_ascii() {
        let value = toast_header("日付 exists\n", "error").unwrap();
        let text = value.to_str().unwrap();
        assert!(text.contains("showToast"));
        assert!(text.contains("\\u65e5"));
        assert!(!text.contains('\n'));
    }

    #[test]
    fn api_error_carries_toast_and_reswap() {
        let resp = ApiError::from(DaybookError::Conflict("dup".into())).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(resp.headers().get("hx-reswap").unwrap(), "none");
        assert!(resp
            .headers()
            .get("hx-trigger")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("dup"));
    }

    #[test]
    fn unauthorized_page_redirects_to_login() {
        let resp = AppError::from(DaybookError::Unauthorized("x".into())).into_response();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get("location").unwrap(), "/login");
    }

    #[test]
    fn error_page_keeps_layout() {
        let resp = AppError::NotFound.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(resp.headers().get("hx-trigger").is_some());
    }
}
