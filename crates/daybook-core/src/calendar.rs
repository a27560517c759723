//! Month view: activities grouped by day, with coloured dot markers.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::{DaybookError, Result};
use crate::model::{Activity, ActivityQuery};
use crate::range::DateRange;
use crate::stats::CategoryPalette;
use crate::storage::StorageBackend;

/// Dots drawn per day before the overflow marker takes over.
pub const MAX_DOTS: usize = 5;

pub const OVERFLOW_DOT_COLOR: &str = "#718096";

/// First through last day of `year`-`month`.
pub fn month_range(year: i32, month: u32) -> Result<DateRange> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| DaybookError::InvalidInput(format!("invalid month {year}-{month}")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| DaybookError::InvalidInput(format!("invalid month {year}-{month}")))?;
    let last = next
        .pred_opt()
        .ok_or_else(|| DaybookError::InvalidInput(format!("invalid month {year}-{month}")))?;
    DateRange::new(first, last)
}

/// Group activities by their date. Order within a day is preserved.
pub fn group_by_date(activities: &[Activity]) -> BTreeMap<NaiveDate, Vec<&Activity>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<&Activity>> = BTreeMap::new();
    for activity in activities {
        grouped.entry(activity.date).or_default().push(activity);
    }
    grouped
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayMarker {
    pub date: NaiveDate,
    pub day: u32,
    pub count: usize,
    /// One colour per activity, up to [`MAX_DOTS`].
    pub dots: Vec<String>,
    /// Set when the day has more than [`MAX_DOTS`] activities.
    pub overflow: Option<String>,
    pub selected: bool,
}

pub fn day_marker(
    date: NaiveDate,
    activities: &[&Activity],
    palette: &CategoryPalette,
    selected: bool,
) -> DayMarker {
    DayMarker {
        date,
        day: date.day(),
        count: activities.len(),
        dots: activities
            .iter()
            .take(MAX_DOTS)
            .map(|a| palette.color_for_activity(a).to_string())
            .collect(),
        overflow: (activities.len() > MAX_DOTS).then(|| OVERFLOW_DOT_COLOR.to_string()),
        selected,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
    /// Empty cells before day 1 in a Sunday-first grid.
    pub leading_blanks: u32,
    pub days: Vec<DayMarker>,
    pub selected: NaiveDate,
    pub selected_activities: Vec<Activity>,
}

impl CalendarMonth {
    /// Previous and next `(year, month)` for navigation links.
    pub fn neighbours(&self) -> ((i32, u32), (i32, u32)) {
        let prev = if self.month == 1 {
            (self.year - 1, 12)
        } else {
            (self.year, self.month - 1)
        };
        let next = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        (prev, next)
    }
}

/// Build the month grid from activities already read for that month.
/// `selected` falls back to the 1st when it lies outside the month.
pub fn build_month(
    activities: &[Activity],
    year: i32,
    month: u32,
    selected: NaiveDate,
    palette: &CategoryPalette,
) -> Result<CalendarMonth> {
    let range = month_range(year, month)?;
    let selected = if range.contains(selected) {
        selected
    } else {
        range.start()
    };
    let grouped = group_by_date(activities);

    let days = range
        .days()
        .map(|date| {
            let on_day = grouped.get(&date).map(Vec::as_slice).unwrap_or(&[]);
            day_marker(date, on_day, palette, date == selected)
        })
        .collect();

    let selected_activities = grouped
        .get(&selected)
        .map(|list| list.iter().map(|a| (*a).clone()).collect())
        .unwrap_or_default();

    Ok(CalendarMonth {
        year,
        month,
        leading_blanks: range.start().weekday().num_days_from_sunday(),
        days,
        selected,
        selected_activities,
    })
}

/// Read one month of activities and build its grid.
pub async fn load_month(
    storage: &impl StorageBackend,
    user_id: &str,
    year: i32,
    month: u32,
    selected: NaiveDate,
    palette: &CategoryPalette,
) -> Result<CalendarMonth> {
    let range = month_range(year, month)?;
    let activities = storage
        .list_activities(user_id, &ActivityQuery::Range(range))
        .await?;
    build_month(&activities, year, month, selected, palette)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ActivityInput;
    use chrono::NaiveTime;

    fn activity(date: NaiveDate, hour: u32, tags: &[&str]) -> Activity {
        Activity::new(
            "u1",
            ActivityInput {
                date,
                start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
                end_time: None,
                content: "x".into(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
        )
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_range_handles_lengths() {
        let feb = month_range(2024, 2).unwrap();
        assert_eq!(feb.end(), ymd(2024, 2, 29));
        let dec = month_range(2023, 12).unwrap();
        assert_eq!(dec.start(), ymd(2023, 12, 1));
        assert_eq!(dec.end(), ymd(2023, 12, 31));
        assert!(month_range(2024, 13).is_err());
    }

    #[test]
    fn markers_cap_at_five_with_overflow() {
        let date = ymd(2024, 5, 10);
        let acts: Vec<Activity> = (0..7).map(|h| activity(date, h, &["Work & Study"])).collect();
        let refs: Vec<&Activity> = acts.iter().collect();
        let marker = day_marker(date, &refs, &CategoryPalette::default(), false);
        assert_eq!(marker.count, 7);
        assert_eq!(marker.dots.len(), MAX_DOTS);
        assert!(marker.dots.iter().all(|c| c == "#3182CE"));
        assert_eq!(marker.overflow.as_deref(), Some(OVERFLOW_DOT_COLOR));
    }

    #[test]
    fn marker_uses_first_tag_or_neutral() {
        let date = ymd(2024, 5, 10);
        let acts = [
            activity(date, 8, &["Gym", "Work & Study"]),
            activity(date, 9, &[]),
            activity(date, 10, &["Unknown"]),
        ];
        let refs: Vec<&Activity> = acts.iter().collect();
        let marker = day_marker(date, &refs, &CategoryPalette::default(), true);
        assert_eq!(marker.dots, vec!["#D53F8C", "#CBD5E0", "#CBD5E0"]);
        assert!(marker.overflow.is_none());
        assert!(marker.selected);
    }

    #[test]
    fn build_month_groups_and_selects() {
        let acts = vec![
            activity(ymd(2024, 5, 3), 9, &["Gym"]),
            activity(ymd(2024, 5, 3), 18, &[]),
            activity(ymd(2024, 5, 20), 7, &["Commute"]),
        ];
        let month = build_month(&acts, 2024, 5, ymd(2024, 5, 3), &CategoryPalette::default()).unwrap();
        assert_eq!(month.days.len(), 31);
        // 2024-05-01 is a Wednesday.
        assert_eq!(month.leading_blanks, 3);
        assert_eq!(month.days[2].count, 2);
        assert!(month.days[2].selected);
        assert_eq!(month.days[19].count, 1);
        assert_eq!(month.selected_activities.len(), 2);
    }

    #[test]
    fn selection_outside_month_falls_back_to_first() {
        let month = build_month(&[], 2024, 5, ymd(2024, 6, 9), &CategoryPalette::default()).unwrap();
        assert_eq!(month.selected, ymd(2024, 5, 1));
        assert!(month.selected_activities.is_empty());
    }

    #[test]
    fn neighbours_wrap_years() {
        let jan = build_month(&[], 2024, 1, ymd(2024, 1, 1), &CategoryPalette::default()).unwrap();
        assert_eq!(jan.neighbours(), ((2023, 12), (2024, 2)));
        let dec = build_month(&[], 2024, 12, ymd(2024, 12, 1), &CategoryPalette::default()).unwrap();
        assert_eq!(dec.neighbours(), ((2024, 11), (2025, 1)));
    }
}
