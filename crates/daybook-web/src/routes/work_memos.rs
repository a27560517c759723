use std::sync::Arc;

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, Redirect};
use axum::routing::{get, post};
use axum::{Form, Router};
use daybook_core::error::DaybookError;
use daybook_core::guard;
use daybook_core::model::*;
use daybook_core::range::{parse_date, DateRange};
use daybook_core::storage::StorageBackend;
use serde::Deserialize;
use uuid::Uuid;

use super::{form_outcome, page_data, parse_opt_date, today, Flash, RangeParams};
use crate::error::AppError;
use crate::session::PageUser;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/work-memos", get(list_page).post(create_memo))
        .route("/work-memos/{id}/edit", get(edit_form))
        .route("/work-memos/{id}/update", post(update_memo))
        .route("/work-memos/{id}/delete", post(delete_memo))
}

struct MemoFormValues {
    date: String,
    done_text: String,
    good_text: String,
    stuck_text: String,
    cause_text: String,
    improvement_text: String,
}

impl MemoFormValues {
    fn blank() -> Self {
        Self {
            date: today().to_string(),
            done_text: String::new(),
            good_text: String::new(),
            stuck_text: String::new(),
            cause_text: String::new(),
            improvement_text: String::new(),
        }
    }

    fn from_memo(memo: &WorkMemo) -> Self {
        Self {
            date: memo.date.to_string(),
            done_text: memo.done_text.clone(),
            good_text: memo.good_text.clone().unwrap_or_default(),
            stuck_text: memo.stuck_text.clone().unwrap_or_default(),
            cause_text: memo.cause_text.clone().unwrap_or_default(),
            improvement_text: memo.improvement_text.clone().unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "work_memos/list.html")]
struct MemoListTemplate {
    toast: Option<String>,
    start: String,
    end: String,
    memos: Vec<WorkMemo>,
    form: MemoFormValues,
}

#[derive(Template)]
#[template(path = "work_memos/edit.html")]
struct MemoEditTemplate {
    toast: Option<String>,
    id: Uuid,
    form: MemoFormValues,
}

#[derive(Debug, Deserialize)]
pub struct MemoForm {
    date: String,
    done_text: String,
    #[serde(default)]
    good_text: String,
    #[serde(default)]
    stuck_text: String,
    #[serde(default)]
    cause_text: String,
    #[serde(default)]
    improvement_text: String,
}

impl MemoForm {
    fn into_input(self) -> Result<WorkMemoInput, DaybookError> {
        Ok(WorkMemoInput {
            date: parse_date(&self.date)?,
            done_text: self.done_text,
            good_text: Some(self.good_text),
            stuck_text: Some(self.stuck_text),
            cause_text: Some(self.cause_text),
            improvement_text: Some(self.improvement_text),
        })
    }
}

async fn list_page(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    headers: HeaderMap,
    Query(params): Query<RangeParams>,
    Query(flash): Query<Flash>,
) -> Result<Html<String>, AppError> {
    let query = WorkMemoQuery {
        start: parse_opt_date(params.start.as_deref())?,
        end: parse_opt_date(params.end.as_deref())?,
    };
    if let (Some(start), Some(end)) = (query.start, query.end) {
        DateRange::new(start, end)?;
    }
    let mut toast = flash.toast;
    let memos = page_data(
        state.storage.list_work_memos(&session.user_id, &query).await,
        &headers,
        &mut toast,
    )?;

    let tmpl = MemoListTemplate {
        toast,
        start: params.start.unwrap_or_default(),
        end: params.end.unwrap_or_default(),
        memos,
        form: MemoFormValues::blank(),
    };
    Ok(Html(tmpl.render()?))
}

async fn create_memo(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    Form(form): Form<MemoForm>,
) -> Result<Redirect, AppError> {
    let result = match form.into_input() {
        Ok(input) => guard::create_work_memo(&state.storage, &session.user_id, input).await,
        Err(e) => Err(e),
    };
    form_outcome(result, "/work-memos", "Work memo saved")
}

async fn edit_form(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    Path(id): Path<Uuid>,
    Query(flash): Query<Flash>,
) -> Result<Html<String>, AppError> {
    let memo = state.storage.get_work_memo(&session.user_id, id).await?;
    let tmpl = MemoEditTemplate {
        toast: flash.toast,
        id,
        form: MemoFormValues::from_memo(&memo),
    };
    Ok(Html(tmpl.render()?))
}

async fn update_memo(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    Path(id): Path<Uuid>,
    Form(form): Form<MemoForm>,
) -> Result<Redirect, AppError> {
    let result = match form.into_input() {
        Ok(input) => guard::update_work_memo(&state.storage, &session.user_id, id, input).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(_) => form_outcome(Ok(()), "/work-memos", "Work memo updated"),
        Err(e) => form_outcome::<()>(Err(e), &format!("/work-memos/{id}/edit"), ""),
    }
}

async fn delete_memo(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    Path(id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let result = state.storage.delete_work_memo(&session.user_id, id).await;
    form_outcome(result, "/work-memos", "Work memo deleted")
}
