use std::sync::Arc;

use askama::Template;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use chrono::NaiveDate;
use daybook_core::calendar::{self, DayMarker};
use daybook_core::error::DaybookError;
use daybook_core::range::DateRange;
use daybook_core::stats::{Aggregation, CategoryTotal, Summary};

use super::activities::{format_minutes, ActivityView};
use super::api::{
    calendar_target, default_range, load_aggregation, stats_range, CalendarParams, StatsParams,
};
use super::{page_data, script_json, today, Flash, RangeParams};
use crate::error::AppError;
use crate::session::PageUser;
use crate::AppState;

/// Day presets offered on the statistics page.
const STATS_PRESETS: &[u32] = &[7, 30, 90];

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(dashboard))
        .route("/stats", get(stats_page))
        .route("/calendar", get(calendar_page))
}

/// Aggregation prepared for the chart widgets.
struct ChartsView {
    summary: Summary,
    average: String,
    categories: Vec<CategoryTotal>,
    category_chart_json: String,
    daily_chart_json: String,
}

impl ChartsView {
    fn new(aggregation: &Aggregation) -> Self {
        Self {
            summary: aggregation.summary,
            average: format_minutes(aggregation.summary.average_minutes),
            categories: aggregation.categories.clone(),
            category_chart_json: script_json(&aggregation.category_chart()),
            daily_chart_json: script_json(&aggregation.daily_chart()),
        }
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    toast: Option<String>,
    start: String,
    end: String,
    today: String,
    range_label: String,
    notice: Option<String>,
    charts: Option<ChartsView>,
    activities: Vec<ActivityView>,
}

struct Preset {
    days: u32,
    active: bool,
}

#[derive(Template)]
#[template(path = "stats.html")]
struct StatsTemplate {
    toast: Option<String>,
    presets: Vec<Preset>,
    start: String,
    end: String,
    range_label: String,
    charts: Option<ChartsView>,
}

struct CalendarCell {
    marker: Option<DayMarker>,
}

#[derive(Template)]
#[template(path = "calendar.html")]
struct CalendarTemplate {
    toast: Option<String>,
    title: String,
    prev_link: String,
    next_link: String,
    cells: Vec<CalendarCell>,
    selected: String,
    activities: Vec<ActivityView>,
}

/// Dashboard over the picked range, last 7 days by default. A half-picked
/// range shows a notice and loads nothing.
async fn dashboard(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    headers: HeaderMap,
    Query(params): Query<RangeParams>,
    Query(flash): Query<Flash>,
) -> Result<Html<String>, AppError> {
    let selector = params.selector()?;
    let picked = match selector.complete() {
        Some(range) => Some(range?),
        None if selector.is_empty() => Some(default_range(&state)),
        None => None,
    };

    let mut toast = flash.toast;
    let (range_label, notice, charts, activities) = match picked {
        Some(range) => {
            let loaded = load_aggregation(&state, &session.user_id, range)
                .await
                .map(Some);
            match page_data(loaded, &headers, &mut toast)? {
                Some((activities, aggregation)) => {
                    let views = activities
                        .iter()
                        .rev()
                        .map(|a| ActivityView::new(a, &state.palette))
                        .collect();
                    (range.to_string(), None, Some(ChartsView::new(&aggregation)), views)
                }
                None => (range.to_string(), None, None, Vec::new()),
            }
        }
        None => (
            String::new(),
            Some("Pick both a start and an end date to load the range.".to_string()),
            None,
            Vec::new(),
        ),
    };

    let tmpl = DashboardTemplate {
        toast,
        start: params.start.unwrap_or_default(),
        end: params.end.unwrap_or_default(),
        today: today().to_string(),
        range_label,
        notice,
        charts,
        activities,
    };
    Ok(Html(tmpl.render()?))
}

async fn stats_page(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    headers: HeaderMap,
    Query(params): Query<StatsParams>,
    Query(flash): Query<Flash>,
) -> Result<Html<String>, AppError> {
    let range: DateRange = stats_range(&state, &params)?;
    let mut toast = flash.toast;
    let loaded = load_aggregation(&state, &session.user_id, range)
        .await
        .map(Some);
    let charts = page_data(loaded, &headers, &mut toast)?
        .map(|(_, aggregation)| ChartsView::new(&aggregation));
    let custom = params.start.is_some() || params.end.is_some();
    let active_days = if custom { None } else { Some(range.len_days()) };

    let tmpl = StatsTemplate {
        toast,
        presets: STATS_PRESETS
            .iter()
            .map(|&days| Preset {
                days,
                active: active_days == Some(days as usize),
            })
            .collect(),
        start: range.start().to_string(),
        end: range.end().to_string(),
        range_label: range.to_string(),
        charts,
    };
    Ok(Html(tmpl.render()?))
}

fn month_link(year: i32, month: u32) -> String {
    format!("/calendar?year={year}&month={month}")
}

async fn calendar_page(
    State(state): State<Arc<AppState>>,
    PageUser(session): PageUser,
    headers: HeaderMap,
    Query(params): Query<CalendarParams>,
    Query(flash): Query<Flash>,
) -> Result<Html<String>, AppError> {
    let (year, month_number, selected) = calendar_target(&params)?;
    let mut toast = flash.toast;
    let loaded = calendar::load_month(
        &state.storage,
        &session.user_id,
        year,
        month_number,
        selected,
        &state.palette,
    )
    .await
    .map(Some);
    let month = match page_data(loaded, &headers, &mut toast)? {
        Some(month) => month,
        None => calendar::build_month(&[], year, month_number, selected, &state.palette)?,
    };
    let ((py, pm), (ny, nm)) = month.neighbours();

    let mut cells: Vec<CalendarCell> = (0..month.leading_blanks)
        .map(|_| CalendarCell { marker: None })
        .collect();
    cells.extend(month.days.iter().cloned().map(|m| CalendarCell { marker: Some(m) }));

    let title = NaiveDate::from_ymd_opt(month.year, month.month, 1)
        .map(|d| d.format("%B %Y").to_string())
        .ok_or_else(|| DaybookError::InvalidInput("invalid month".into()))?;

    let tmpl = CalendarTemplate {
        toast,
        title,
        prev_link: month_link(py, pm),
        next_link: month_link(ny, nm),
        cells,
        selected: month.selected.to_string(),
        activities: month
            .selected_activities
            .iter()
            .map(|a| ActivityView::new(a, &state.palette))
            .collect(),
    };
    Ok(Html(tmpl.render()?))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use chrono::{NaiveDate, NaiveTime};
    use daybook_core::model::{Activity, ActivityInput};
    use daybook_core::storage::StorageBackend;
    use tower::ServiceExt;

    async fn seed(state: &crate::AppState, date: NaiveDate, content: &str, tag: &str) {
        let activity = Activity::new(
            "local-user",
            ActivityInput {
                date,
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(10, 30, 0),
                content: content.into(),
                tags: vec![tag.into()],
            },
        );
        state.storage.save_activity(&activity).await.unwrap();
    }

    #[tokio::test]
    async fn dashboard_renders_range_summary() {
        let state = test_app_state();
        let token = sign_in(&state).await;
        seed(&state, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(), "Code review", "Gym").await;
        let app = test_router(state);

        let resp = app
            .oneshot(get_request("/?start=2024-05-01&end=2024-05-07", &token))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp.into_body()).await;
        assert!(html.contains("2024/05/01 - 2024/05/07"));
        assert!(html.contains("Code review"));
        assert!(html.contains("1h 30m"));
        assert!(html.contains("05/07"));
    }

    #[tokio::test]
    async fn dashboard_half_range_shows_notice_only() {
        let state = test_app_state();
        let token = sign_in(&state).await;
        seed(&state, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(), "Hidden", "Gym").await;
        let app = test_router(state);

        let resp = app
            .oneshot(get_request("/?start=2024-05-01", &token))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp.into_body()).await;
        assert!(html.contains("Pick both a start and an end date"));
        assert!(!html.contains("Hidden"));
    }

    #[tokio::test]
    async fn reversed_range_is_rejected() {
        let state = test_app_state();
        let token = sign_in(&state).await;
        let app = test_router(state);
        let resp = app
            .oneshot(get_request("/?start=2024-05-07&end=2024-05-01", &token))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stats_page_marks_active_preset() {
        let state = test_app_state();
        let token = sign_in(&state).await;
        let app = test_router(state);
        let resp = app.oneshot(get_request("/stats?days=30", &token)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp.into_body()).await;
        assert!(html.contains(r#"class="preset active" href="/stats?days=30""#));
    }

    #[tokio::test]
    async fn calendar_lists_selected_day() {
        let state = test_app_state();
        let token = sign_in(&state).await;
        seed(&state, NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(), "Leg day", "Gym").await;
        let app = test_router(state);

        let resp = app
            .oneshot(get_request("/calendar?day=2024-02-10", &token))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp.into_body()).await;
        assert!(html.contains("February 2024"));
        assert!(html.contains("Leg day"));
        assert!(html.contains("#D53F8C"));
        let links = hrefs(&html);
        assert!(links.iter().any(|h| h == "/calendar?year=2024&month=1"));
        assert!(links.iter().any(|h| h == "/calendar?year=2024&month=3"));
    }

    #[tokio::test]
    async fn oversized_dashboard_range_is_rejected() {
        let state = test_app_state();
        let token = sign_in(&state).await;
        let app = test_router(state);
        let resp = app
            .oneshot(get_request("/?start=1900-01-01&end=2099-12-31", &token))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let html = body_text(resp.into_body()).await;
        assert!(html.contains(r#"href="/stats""#));
    }

    #[tokio::test]
    async fn unreachable_store_keeps_pages_usable() {
        let state = unreachable_app_state();
        let token = sign_in(&state).await;
        let app = test_router(state);
        for uri in ["/", "/stats?days=7", "/calendar?day=2024-02-10"] {
            let resp = app.clone().oneshot(get_request(uri, &token)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{uri}");
            let html = body_text(resp.into_body()).await;
            assert!(html.contains(r#"href="/activities""#), "{uri}");
            assert!(html.contains("Could not load data"), "{uri}");
        }
    }
}
