use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use daybook_core::auth::Session;
use daybook_core::calendar::{self, CalendarMonth};
use daybook_core::error::DaybookError;
use daybook_core::guard;
use daybook_core::model::*;
use daybook_core::objects;
use daybook_core::range::DateRange;
use daybook_core::report;
use daybook_core::stats::{self, Aggregation, ChartSeries};
use daybook_core::storage::StorageBackend;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{is_htmx, parse_opt_date, today, RangeParams};
use crate::error::{toast_header, ApiError};
use crate::session::{clear_session_cookie, session_cookie, CurrentUser};
use crate::AppState;

/// Request bodies above this are refused before reaching the avatar handler,
/// which applies the configured per-file limit.
const MAX_UPLOAD_BODY: usize = 16 * 1024 * 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/activities", get(list_activities).post(create_activity))
        .route(
            "/api/v1/activities/{id}",
            get(get_activity).put(update_activity).delete(delete_activity),
        )
        .route("/api/v1/work-memos", get(list_work_memos).post(create_work_memo))
        .route(
            "/api/v1/work-memos/{id}",
            get(get_work_memo)
                .put(update_work_memo)
                .delete(delete_work_memo),
        )
        .route("/api/v1/templates", get(list_templates).post(create_template))
        .route("/api/v1/templates/{id}", delete(delete_template))
        .route("/api/v1/reports", get(list_reports).post(save_report))
        .route("/api/v1/reports/generate", post(generate_report))
        .route("/api/v1/reports/{id}", get(get_report))
        .route("/api/v1/stats", get(stats))
        .route("/api/v1/calendar", get(calendar_month))
        .route("/api/v1/profile", get(get_profile).put(update_profile))
        .route(
            "/api/v1/profile/avatar",
            put(upload_avatar).layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY)),
        )
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/session", get(current_session))
}

// -- Request/Response types --

#[derive(Debug, Default, Deserialize)]
pub struct ActivityListParams {
    pub date: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportListEntry {
    #[serde(flatten)]
    pub report: WeeklyReport,
    pub preview: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateReportRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub aggregation: Aggregation,
    pub category_chart: ChartSeries,
    pub daily_chart: ChartSeries,
}

#[derive(Debug, Default, Deserialize)]
pub struct CalendarParams {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvatarParams {
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Session as reported to clients; the token itself travels in the cookie.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub email: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&Session> for SessionResponse {
    fn from(s: &Session) -> Self {
        Self {
            user_id: s.user_id.clone(),
            email: s.email.clone(),
            expires_at: s.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub session: SessionResponse,
    pub access_token: String,
}

// -- Helpers --

/// Empty 200 for htmx callers (the row is removed client side), 204 otherwise.
fn deleted(headers: &HeaderMap, what: &str) -> Response {
    if is_htmx(headers) {
        let mut resp_headers = HeaderMap::new();
        if let Some(value) = toast_header(&format!("{what} deleted"), "success") {
            resp_headers.insert("hx-trigger", value);
        }
        return (StatusCode::OK, resp_headers, String::new()).into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

pub(crate) fn default_range(state: &AppState) -> DateRange {
    DateRange::last_n_days(today(), state.config.stats.default_range_days)
}

// -- Activities --

async fn list_activities(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Query(params): Query<ActivityListParams>,
) -> Result<Json<Vec<Activity>>, ApiError> {
    let query = match parse_opt_date(params.date.as_deref())? {
        Some(date) => ActivityQuery::Day(date),
        None => {
            let range = RangeParams {
                start: params.start,
                end: params.end,
            }
            .resolve(default_range(&state))?;
            ActivityQuery::Range(range)
        }
    };
    let activities = state
        .storage
        .list_activities(&session.user_id, &query)
        .await?;
    Ok(Json(activities))
}

async fn create_activity(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Json(input): Json<ActivityInput>,
) -> Result<(StatusCode, Json<Activity>), ApiError> {
    validate_activity_input(&input)?;
    let activity = Activity::new(&session.user_id, input);
    state.storage.save_activity(&activity).await?;
    tracing::debug!(id = %activity.id, "activity created");
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Activity>, ApiError> {
    Ok(Json(state.storage.get_activity(&session.user_id, id).await?))
}

async fn update_activity(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<ActivityInput>,
) -> Result<Json<Activity>, ApiError> {
    validate_activity_input(&input)?;
    let activity = state
        .storage
        .update_activity(&session.user_id, id, &input)
        .await?;
    Ok(Json(activity))
}

async fn delete_activity(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    state.storage.delete_activity(&session.user_id, id).await?;
    Ok(deleted(&headers, "Activity"))
}

// -- Work memos --

async fn list_work_memos(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<WorkMemo>>, ApiError> {
    let query = WorkMemoQuery {
        start: parse_opt_date(params.start.as_deref())?,
        end: parse_opt_date(params.end.as_deref())?,
    };
    if let (Some(start), Some(end)) = (query.start, query.end) {
        DateRange::new(start, end)?;
    }
    let memos = state
        .storage
        .list_work_memos(&session.user_id, &query)
        .await?;
    Ok(Json(memos))
}

async fn create_work_memo(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Json(input): Json<WorkMemoInput>,
) -> Result<(StatusCode, Json<WorkMemo>), ApiError> {
    let memo = guard::create_work_memo(&state.storage, &session.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(memo)))
}

async fn get_work_memo(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkMemo>, ApiError> {
    Ok(Json(state.storage.get_work_memo(&session.user_id, id).await?))
}

async fn update_work_memo(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<WorkMemoInput>,
) -> Result<Json<WorkMemo>, ApiError> {
    let memo = guard::update_work_memo(&state.storage, &session.user_id, id, input).await?;
    Ok(Json(memo))
}

async fn delete_work_memo(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    state.storage.delete_work_memo(&session.user_id, id).await?;
    Ok(deleted(&headers, "Work memo"))
}

// -- Templates --

async fn list_templates(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<Vec<ActivityTemplate>>, ApiError> {
    Ok(Json(state.storage.list_templates(&session.user_id).await?))
}

async fn create_template(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Json(input): Json<TemplateInput>,
) -> Result<(StatusCode, Json<ActivityTemplate>), ApiError> {
    validate_template_input(&input)?;
    let template = ActivityTemplate::new(&session.user_id, input);
    state.storage.save_template(&template).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

async fn delete_template(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    state.storage.delete_template(&session.user_id, id).await?;
    Ok(deleted(&headers, "Template"))
}

// -- Reports --

async fn list_reports(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<Vec<ReportListEntry>>, ApiError> {
    let reports = state.storage.list_reports(&session.user_id).await?;
    let entries = reports
        .into_iter()
        .map(|report| ReportListEntry {
            preview: report.preview().to_string(),
            report,
        })
        .collect();
    Ok(Json(entries))
}

async fn get_report(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<WeeklyReport>, ApiError> {
    Ok(Json(state.storage.get_report(&session.user_id, id).await?))
}

async fn save_report(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Json(input): Json<ReportInput>,
) -> Result<(StatusCode, Json<WeeklyReport>), ApiError> {
    let saved = report::save_report(&state.storage, &session.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub(crate) fn text_generator(state: &AppState) -> Result<&daybook_core::llm::LlmService, DaybookError> {
    state
        .llm
        .as_ref()
        .ok_or_else(|| DaybookError::Llm("text generation is not configured (set llm.enabled)".into()))
}

/// Returns an unsaved draft; clients POST it to `/api/v1/reports` to keep it.
async fn generate_report(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Json(req): Json<GenerateReportRequest>,
) -> Result<Json<report::ReportDraft>, ApiError> {
    let range = DateRange::new(req.start_date, req.end_date)?;
    let generator = text_generator(&state)?;
    let draft = report::generate_report(&state.storage, generator, &session.user_id, range).await?;
    Ok(Json(draft))
}

// -- Stats & calendar --

pub(crate) fn stats_range(state: &AppState, params: &StatsParams) -> Result<DateRange, DaybookError> {
    if let Some(days) = params.days {
        if params.start.is_none() && params.end.is_none() {
            return Ok(DateRange::last_n_days(today(), days));
        }
    }
    RangeParams {
        start: params.start.clone(),
        end: params.end.clone(),
    }
    .resolve(default_range(state))
}

pub(crate) async fn load_aggregation(
    state: &AppState,
    user_id: &str,
    range: DateRange,
) -> Result<(Vec<Activity>, Aggregation), DaybookError> {
    stats::check_range(range)?;
    let activities = state
        .storage
        .list_activities(user_id, &ActivityQuery::Range(range))
        .await?;
    let aggregation = stats::aggregate(&activities, range, &state.palette);
    Ok((activities, aggregation))
}

async fn stats(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Query(params): Query<StatsParams>,
) -> Result<Json<StatsResponse>, ApiError> {
    let range = stats_range(&state, &params)?;
    let (_, aggregation) = load_aggregation(&state, &session.user_id, range).await?;
    Ok(Json(StatsResponse {
        category_chart: aggregation.category_chart(),
        daily_chart: aggregation.daily_chart(),
        aggregation,
    }))
}

/// Year, month and selected day asked for, defaulting to today.
pub(crate) fn calendar_target(params: &CalendarParams) -> Result<(i32, u32, NaiveDate), DaybookError> {
    let now = today();
    let selected = parse_opt_date(params.day.as_deref())?;
    let year = params
        .year
        .or(selected.map(|d| d.year()))
        .unwrap_or(now.year());
    let month = params
        .month
        .or(selected.map(|d| d.month()))
        .unwrap_or(now.month());
    Ok((year, month, selected.unwrap_or(now)))
}

async fn load_calendar(
    state: &AppState,
    user_id: &str,
    params: &CalendarParams,
) -> Result<CalendarMonth, DaybookError> {
    let (year, month, selected) = calendar_target(params)?;
    calendar::load_month(&state.storage, user_id, year, month, selected, &state.palette).await
}

async fn calendar_month(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Query(params): Query<CalendarParams>,
) -> Result<Json<CalendarMonth>, ApiError> {
    Ok(Json(load_calendar(&state, &session.user_id, &params).await?))
}

// -- Profile --

async fn get_profile(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(state.storage.get_profile(&session.user_id).await?))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Json(input): Json<UpdateProfileInput>,
) -> Result<Json<Profile>, ApiError> {
    validate_profile_input(&input)?;
    Ok(Json(
        state
            .storage
            .update_profile(&session.user_id, &input)
            .await?,
    ))
}

async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
    Query(params): Query<AvatarParams>,
    body: axum::body::Bytes,
) -> Result<Json<Profile>, ApiError> {
    let profile = objects::upload_avatar(
        &state.objects,
        &state.storage,
        &session.user_id,
        &params.filename,
        &body,
        state.config.avatars.max_bytes,
    )
    .await?;
    Ok(Json(profile))
}

// -- Auth --

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let session = state.identity.sign_in(&req.email, &req.password).await?;
    let mut headers = HeaderMap::new();
    if let Some(cookie) = session_cookie(&session.access_token, session_max_age(&state, &session)) {
        headers.insert(header::SET_COOKIE, cookie);
    }
    let body = LoginResponse {
        session: SessionResponse::from(&session),
        access_token: session.access_token.clone(),
    };
    Ok((StatusCode::OK, headers, Json(body)).into_response())
}

pub(crate) fn session_max_age(state: &AppState, session: &Session) -> i64 {
    match session.expires_at {
        Some(t) => (t - Utc::now()).num_seconds().max(0),
        None => i64::try_from(state.config.auth.session_hours.saturating_mul(3600)).unwrap_or(i64::MAX),
    }
}

async fn logout(
    State(state): State<Arc<AppState>>,
    CurrentUser(session): CurrentUser,
) -> Result<Response, ApiError> {
    state.identity.sign_out(&session.access_token).await?;
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, clear_session_cookie());
    Ok((StatusCode::NO_CONTENT, headers).into_response())
}

async fn current_session(CurrentUser(session): CurrentUser) -> Json<SessionResponse> {
    Json(SessionResponse::from(&session))
}
