use std::sync::Arc;

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use daybook_core::model::*;
use daybook_core::range::{parse_date, DateRange};
use daybook_core::report;
use daybook_core::storage::StorageBackend;
use serde::Deserialize;
use uuid::Uuid;

use super::api::{default_range, text_generator};
use super::{form_outcome, page_data, Flash};
use crate::error::AppError;
use crate::session::PageUser;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reports", get(list_page).post(save_report))
        .route("/reports/generate", post(generate_draft))
        .route("/reports/{id}", get(show_report))
}

struct ReportEntry {
    id: Uuid,
    period: String,
    preview: String,
    created: String,
}

#[derive(Template)]
#[template(path = "reports/list.html")]
struct ReportListTemplate {
    toast: Option<String>,
    reports: Vec<ReportEntry>,
    start: String,
    end: String,
    generation_enabled: bool,
}

#[derive(Template)]
#[template(path = "reports/draft.html")]
struct DraftTemplate {
    toast: Option<String>,
    period: String,
    start: String,
    end: String,
    content: String,
}

#[derive(Template)]
#[template(path = "reports/detail.html")]
struct ReportDetailTemplate {
    toast: Option<String>,
    period: String,
    created: String,
    content: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateForm {
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveForm {
    start_date: String,
    end_date: String,
    content: String,
}

fn period(start: chrono::NaiveDate, end: chrono::NaiveDate) -> String {
    format!("{start} ~ {end}")
}

async fn list_page(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    headers: HeaderMap,
    Query(flash): Query<Flash>,
) -> Result<Html<String>, AppError> {
    let mut toast = flash.toast;
    let reports = page_data(
        state.storage.list_reports(&session.user_id).await,
        &headers,
        &mut toast,
    )?;
    let range = default_range(&state);
    let tmpl = ReportListTemplate {
        toast,
        reports: reports
            .iter()
            .map(|r| ReportEntry {
                id: r.id,
                period: period(r.start_date, r.end_date),
                preview: r.preview().to_string(),
                created: r.created_at.format("%Y-%m-%d %H:%M").to_string(),
            })
            .collect(),
        start: range.start().to_string(),
        end: range.end().to_string(),
        generation_enabled: state.llm.is_some(),
    };
    Ok(Html(tmpl.render()?))
}

/// Generate a draft and show it for review; nothing is stored until saved.
async fn generate_draft(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    Form(form): Form<GenerateForm>,
) -> Result<Response, AppError> {
    let result = async {
        let range = DateRange::new(parse_date(&form.start)?, parse_date(&form.end)?)?;
        let generator = text_generator(&state)?;
        report::generate_report(&state.storage, generator, &session.user_id, range).await
    }
    .await;

    let draft = match result {
        Ok(draft) => draft,
        Err(e) => return Ok(form_outcome::<()>(Err(e), "/reports", "")?.into_response()),
    };

    let tmpl = DraftTemplate {
        toast: None,
        period: period(draft.range.start(), draft.range.end()),
        start: draft.range.start().to_string(),
        end: draft.range.end().to_string(),
        content: draft.content,
    };
    Ok(Html(tmpl.render()?).into_response())
}

async fn save_report(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    Form(form): Form<SaveForm>,
) -> Result<Redirect, AppError> {
    let result = async {
        let input = ReportInput {
            start_date: parse_date(&form.start_date)?,
            end_date: parse_date(&form.end_date)?,
            content: form.content,
        };
        report::save_report(&state.storage, &session.user_id, input).await
    }
    .await;
    match result {
        Ok(saved) => form_outcome(Ok(()), &format!("/reports/{}", saved.id), "Report saved"),
        Err(e) => form_outcome::<()>(Err(e), "/reports", ""),
    }
}

async fn show_report(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    Path(id): Path<Uuid>,
    Query(flash): Query<Flash>,
) -> Result<Html<String>, AppError> {
    let report: WeeklyReport = state.storage.get_report(&session.user_id, id).await?;
    let tmpl = ReportDetailTemplate {
        toast: flash.toast,
        period: period(report.start_date, report.end_date),
        created: report.created_at.format("%Y-%m-%d %H:%M").to_string(),
        content: report.content,
    };
    Ok(Html(tmpl.render()?))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn form_post(uri: &str, token: &str, body: &str) -> Request<Body> {
        authed(Request::builder().method("POST").uri(uri), token)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn saved_report_redirects_to_detail() {
        let state = test_app_state();
        let token = sign_in(&state).await;
        let app = test_router(state);

        let resp = app
            .clone()
            .oneshot(form_post(
                "/reports",
                &token,
                "start_date=2024-05-01&end_date=2024-05-07&content=A+calm+week%0ALots+done",
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let location = resp
            .headers()
            .get("location")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(location.starts_with("/reports/"));

        let resp = app.clone().oneshot(get_request(&location, &token)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp.into_body()).await;
        assert!(html.contains("Lots done"));
        assert!(html.contains("2024-05-01 ~ 2024-05-07"));

        let resp = app.oneshot(get_request("/reports", &token)).await.unwrap();
        let html = body_text(resp.into_body()).await;
        assert!(html.contains("A calm week"));
        assert!(!html.contains("Lots done"));
    }

    #[tokio::test]
    async fn generate_without_llm_returns_with_toast() {
        let state = test_app_state();
        let token = sign_in(&state).await;
        let app = test_router(state);
        let resp = app
            .oneshot(form_post(
                "/reports/generate",
                &token,
                "start=2024-05-01&end=2024-05-07",
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let location = resp.headers().get("location").unwrap().to_str().unwrap();
        assert!(location.starts_with("/reports?toast="), "{location}");
        assert!(location.contains("not+configured"), "{location}");
    }

    #[tokio::test]
    async fn unreachable_store_still_lists_page() {
        let state = unreachable_app_state();
        let token = sign_in(&state).await;
        let app = test_router(state);
        let resp = app.oneshot(get_request("/reports", &token)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp.into_body()).await;
        assert!(html.contains("Could not load data"));
    }

    #[tokio::test]
    async fn unknown_report_is_not_found() {
        let state = test_app_state();
        let token = sign_in(&state).await;
        let app = test_router(state);
        let resp = app
            .oneshot(get_request(&format!("/reports/{}", uuid::Uuid::now_v7()), &token))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
