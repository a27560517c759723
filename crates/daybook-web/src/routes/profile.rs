use std::sync::Arc;

use askama::Template;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, Redirect};
use axum::routing::get;
use axum::{Form, Router};
use daybook_core::model::{validate_profile_input, Profile, UpdateProfileInput};
use daybook_core::storage::StorageBackend;
use serde::Deserialize;

use super::{form_outcome, page_data, Flash};
use crate::error::AppError;
use crate::session::PageUser;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/profile", get(profile_page).post(update_profile))
}

#[derive(Template)]
#[template(path = "profile.html")]
struct ProfileTemplate {
    toast: Option<String>,
    email: String,
    full_name: String,
    avatar_url: Option<String>,
    max_upload_mb: usize,
}

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    full_name: String,
}

async fn profile_page(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    headers: HeaderMap,
    Query(flash): Query<Flash>,
) -> Result<Html<String>, AppError> {
    let mut toast = flash.toast;
    let profile = page_data(
        state.storage.get_profile(&session.user_id).await.map(Some),
        &headers,
        &mut toast,
    )?
    .unwrap_or_else(|| Profile::empty(&session.user_id));
    let tmpl = ProfileTemplate {
        toast,
        email: session.email,
        full_name: profile.full_name.unwrap_or_default(),
        avatar_url: profile.avatar_url,
        max_upload_mb: state.config.avatars.max_bytes.div_ceil(1024 * 1024),
    };
    Ok(Html(tmpl.render()?))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    Form(form): Form<ProfileForm>,
) -> Result<Redirect, AppError> {
    let input = UpdateProfileInput {
        full_name: Some(form.full_name),
        avatar_url: None,
    };
    let result = match validate_profile_input(&input) {
        Ok(()) => state.storage.update_profile(&session.user_id, &input).await,
        Err(e) => Err(e),
    };
    form_outcome(result, "/profile", "Profile updated")
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn name_update_shows_on_page() {
        let state = test_app_state();
        let token = sign_in(&state).await;
        let app = test_router(state);

        let req = authed(Request::builder().method("POST").uri("/profile"), &token)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("full_name=Grace+Hopper"))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);

        let resp = app.oneshot(get_request("/profile", &token)).await.unwrap();
        let html = body_text(resp.into_body()).await;
        assert!(html.contains("Grace Hopper"));
        assert!(html.contains("me@localhost"));
    }
}
