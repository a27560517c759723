use std::sync::Arc;

use askama::Template;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use daybook_core::error::DaybookError;
use serde::Deserialize;

use super::api::session_max_age;
use crate::error::AppError;
use crate::session::{clear_session_cookie, session_cookie, session_token};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout).post(logout))
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    toast: Option<String>,
    email: String,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    email: String,
    #[serde(default)]
    password: String,
}

async fn login_page() -> Result<Html<String>, AppError> {
    let tmpl = LoginTemplate {
        toast: None,
        email: String::new(),
        error: None,
    };
    Ok(Html(tmpl.render()?))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match state.identity.sign_in(&form.email, &form.password).await {
        Ok(session) => {
            let mut headers = HeaderMap::new();
            if let Some(cookie) =
                session_cookie(&session.access_token, session_max_age(&state, &session))
            {
                headers.insert(header::SET_COOKIE, cookie);
            }
            Ok((headers, Redirect::to("/")).into_response())
        }
        Err(DaybookError::Unauthorized(msg)) => {
            let tmpl = LoginTemplate {
                toast: None,
                email: form.email,
                error: Some(msg),
            };
            Ok((StatusCode::UNAUTHORIZED, Html(tmpl.render()?)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        if let Err(e) = state.identity.sign_out(&token).await {
            tracing::warn!(error = %e, "sign out failed");
        }
    }
    let mut resp_headers = HeaderMap::new();
    resp_headers.insert(header::SET_COOKIE, clear_session_cookie());
    (resp_headers, Redirect::to("/login")).into_response()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn login_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn login_page_renders() {
        let app = test_router(test_app_state());
        let req = Request::builder().uri("/login").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp.into_body()).await;
        assert!(html.contains(r#"name="email""#));
    }

    #[tokio::test]
    async fn form_login_sets_cookie_and_opens_dashboard() {
        let app = test_router(test_app_state());
        let resp = app
            .clone()
            .oneshot(login_request("email=ME%40localhost&password="))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get("location").unwrap(), "/");
        let cookie = resp
            .headers()
            .get("set-cookie")
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();

        let req = Request::builder()
            .uri("/")
            .header("cookie", cookie.clone())
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let req = Request::builder()
            .uri("/logout")
            .header("cookie", cookie.clone())
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.headers().get("location").unwrap(), "/login");

        let req = Request::builder()
            .uri("/")
            .header("cookie", cookie)
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn wrong_email_rerenders_form() {
        let app = test_router(test_app_state());
        let resp = app
            .oneshot(login_request("email=intruder%40example.com&password=x"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let html = body_text(resp.into_body()).await;
        assert!(html.contains("intruder@example.com"));
    }
}
