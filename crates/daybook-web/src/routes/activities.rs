use std::sync::Arc;

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, Redirect};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::NaiveDate;
use daybook_core::error::DaybookError;
use daybook_core::model::*;
use daybook_core::range::parse_date;
use daybook_core::stats::CategoryPalette;
use daybook_core::storage::StorageBackend;
use serde::Deserialize;
use uuid::Uuid;

use super::{form_outcome, page_data, parse_opt_date, parse_opt_time, split_tags, today, Flash};
use crate::error::AppError;
use crate::session::PageUser;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/activities", get(day_page).post(create_activity))
        .route("/activities/{id}/edit", get(edit_form))
        .route("/activities/{id}/update", post(update_activity))
        .route("/activities/{id}/delete", post(delete_activity))
        .route("/templates", post(create_template))
        .route("/templates/{id}/delete", post(delete_template))
}

// -- View types --

pub(crate) struct TagView {
    pub label: String,
    pub color: String,
}

pub(crate) struct ActivityView {
    pub id: Uuid,
    pub date: String,
    pub time_span: String,
    pub duration: String,
    pub content: String,
    pub tags: Vec<TagView>,
}

impl ActivityView {
    pub fn new(activity: &Activity, palette: &CategoryPalette) -> Self {
        let end = activity
            .end_time
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_default();
        Self {
            id: activity.id,
            date: activity.date.to_string(),
            time_span: format!("{} ~ {end}", activity.start_time.format("%H:%M")),
            duration: activity
                .duration_minutes()
                .map(format_minutes)
                .unwrap_or_default(),
            content: activity.content.clone(),
            tags: activity
                .tags
                .iter()
                .map(|t| TagView {
                    label: t.clone(),
                    color: palette.color_for(t).to_string(),
                })
                .collect(),
        }
    }
}

/// `90` -> `1h 30m`.
pub(crate) fn format_minutes(minutes: i64) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// Values shown in the activity form.
pub(crate) struct ActivityFormValues {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub content: String,
    pub tags: String,
}

impl ActivityFormValues {
    fn blank(date: NaiveDate) -> Self {
        Self {
            date: date.to_string(),
            start_time: String::new(),
            end_time: String::new(),
            content: String::new(),
            tags: String::new(),
        }
    }

    fn from_template(date: NaiveDate, template: &ActivityTemplate) -> Self {
        Self {
            content: template.content.clone(),
            tags: template.tags.join(", "),
            ..Self::blank(date)
        }
    }

    fn from_activity(activity: &Activity) -> Self {
        Self {
            date: activity.date.to_string(),
            start_time: activity.start_time.format("%H:%M").to_string(),
            end_time: activity
                .end_time
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_default(),
            content: activity.content.clone(),
            tags: activity.tags.join(", "),
        }
    }
}

#[derive(Template)]
#[template(path = "activities/day.html")]
struct DayTemplate {
    toast: Option<String>,
    date: String,
    prev_date: String,
    next_date: String,
    activities: Vec<ActivityView>,
    total: String,
    form: ActivityFormValues,
    templates: Vec<ActivityTemplate>,
    categories: Vec<String>,
}

#[derive(Template)]
#[template(path = "activities/edit.html")]
struct EditTemplate {
    toast: Option<String>,
    id: Uuid,
    form: ActivityFormValues,
    categories: Vec<String>,
}

// -- Form inputs --

#[derive(Debug, Default, Deserialize)]
pub struct DayParams {
    date: Option<String>,
    template: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityForm {
    date: String,
    start_time: String,
    #[serde(default)]
    end_time: String,
    content: String,
    #[serde(default)]
    tags: String,
}

impl ActivityForm {
    fn into_input(self) -> Result<ActivityInput, DaybookError> {
        let start_time = parse_opt_time(&self.start_time)?
            .ok_or_else(|| DaybookError::InvalidInput("start time is required".into()))?;
        Ok(ActivityInput {
            date: parse_date(self.date.trim())?,
            start_time,
            end_time: parse_opt_time(&self.end_time)?,
            content: self.content,
            tags: split_tags(&self.tags),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TemplateForm {
    template_name: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    tags: String,
    /// Day page to return to.
    #[serde(default)]
    date: String,
}

// -- Handlers --

fn day_path(date: Option<NaiveDate>) -> String {
    match date {
        Some(date) => format!("/activities?date={date}"),
        None => "/activities".to_string(),
    }
}

fn category_labels(state: &AppState) -> Vec<String> {
    state.palette.labels().into_iter().map(String::from).collect()
}

async fn day_page(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    headers: HeaderMap,
    Query(params): Query<DayParams>,
    Query(flash): Query<Flash>,
) -> Result<Html<String>, AppError> {
    let date = parse_opt_date(params.date.as_deref())?.unwrap_or_else(today);
    let mut toast = flash.toast;
    let activities = page_data(
        state
            .storage
            .list_activities(&session.user_id, &ActivityQuery::Day(date))
            .await,
        &headers,
        &mut toast,
    )?;
    let templates = page_data(
        state.storage.list_templates(&session.user_id).await,
        &headers,
        &mut toast,
    )?;

    let form = match params.template {
        Some(id) => match templates.iter().find(|t| t.id == id) {
            Some(template) => ActivityFormValues::from_template(date, template),
            None => ActivityFormValues::blank(date),
        },
        None => ActivityFormValues::blank(date),
    };

    let total: i64 = activities.iter().filter_map(Activity::duration_minutes).sum();
    let tmpl = DayTemplate {
        toast,
        date: date.to_string(),
        prev_date: date.pred_opt().unwrap_or(date).to_string(),
        next_date: date.succ_opt().unwrap_or(date).to_string(),
        activities: activities
            .iter()
            .map(|a| ActivityView::new(a, &state.palette))
            .collect(),
        total: format_minutes(total),
        form,
        templates,
        categories: category_labels(&state),
    };
    Ok(Html(tmpl.render()?))
}

async fn create_activity(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    Form(form): Form<ActivityForm>,
) -> Result<Redirect, AppError> {
    let input = form.into_input();
    let back = day_path(input.as_ref().ok().map(|i| i.date));
    let result = async {
        let input = input?;
        validate_activity_input(&input)?;
        let activity = Activity::new(&session.user_id, input);
        state.storage.save_activity(&activity).await?;
        Ok::<_, DaybookError>(activity)
    }
    .await;
    form_outcome(result, &back, "Activity saved")
}

async fn edit_form(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    Path(id): Path<Uuid>,
    Query(flash): Query<Flash>,
) -> Result<Html<String>, AppError> {
    let activity = state.storage.get_activity(&session.user_id, id).await?;
    let tmpl = EditTemplate {
        toast: flash.toast,
        id,
        form: ActivityFormValues::from_activity(&activity),
        categories: category_labels(&state),
    };
    Ok(Html(tmpl.render()?))
}

async fn update_activity(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    Path(id): Path<Uuid>,
    Form(form): Form<ActivityForm>,
) -> Result<Redirect, AppError> {
    let result = async {
        let input = form.into_input()?;
        validate_activity_input(&input)?;
        state
            .storage
            .update_activity(&session.user_id, id, &input)
            .await
    }
    .await;
    match result {
        Ok(updated) => form_outcome(Ok(()), &day_path(Some(updated.date)), "Activity updated"),
        Err(e) => form_outcome::<()>(Err(e), &format!("/activities/{id}/edit"), ""),
    }
}

async fn delete_activity(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    Path(id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let result = async {
        let activity = state.storage.get_activity(&session.user_id, id).await?;
        state.storage.delete_activity(&session.user_id, id).await?;
        Ok::<_, DaybookError>(activity.date)
    }
    .await;
    match result {
        Ok(date) => form_outcome(Ok(()), &day_path(Some(date)), "Activity deleted"),
        Err(e) => form_outcome::<()>(Err(e), "/activities", ""),
    }
}

async fn create_template(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    Form(form): Form<TemplateForm>,
) -> Result<Redirect, AppError> {
    let back = day_path(parse_opt_date(Some(form.date.as_str())).ok().flatten());
    let input = TemplateInput {
        template_name: form.template_name,
        content: form.content,
        tags: split_tags(&form.tags),
    };
    let result = async {
        validate_template_input(&input)?;
        let template = ActivityTemplate::new(&session.user_id, input);
        state.storage.save_template(&template).await?;
        Ok::<_, DaybookError>(())
    }
    .await;
    form_outcome(result, &back, "Template saved")
}

async fn delete_template(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    Path(id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let result = state.storage.delete_template(&session.user_id, id).await;
    form_outcome(result, "/activities", "Template deleted")
}
