//! Time and category aggregation for the dashboard and statistics views.
//!
//! Durations come from `HH:MM` pairs on a fixed reference day; an end time
//! earlier than the start means the activity ran past midnight, so 1440
//! minutes are added. An activity tagged with several categories counts its
//! full duration toward each of them, so category totals can add up to more
//! than the logged time.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::config::CategoryConfig;
use crate::error::{DaybookError, Result};
use crate::model::Activity;
use crate::range::DateRange;

pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Longest range that can be aggregated. Every day of the range gets a bucket.
pub const MAX_RANGE_DAYS: usize = 366;

/// Bucket for activities without any tag.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Colour used for labels the palette doesn't know.
pub const NEUTRAL_COLOR: &str = "#CBD5E0";

/// Colour of the per-day series in the bar chart.
pub const DAILY_SERIES_COLOR: &str = "#D53F8C";

/// Built-in categories and their colour names.
pub const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Work & Study", "blue"),
    ("Life & Chores", "orange"),
    ("Sleep & Rest", "purple"),
    ("Hobbies & Leisure", "green"),
    ("Commute", "gray"),
    ("Other", "teal"),
    ("Gym", "pink"),
];

/// Resolve a colour name to its hex code. Hex codes pass through.
pub fn color_hex(name: &str) -> Option<&str> {
    let hex = match name {
        "blue" => "#3182CE",
        "orange" => "#DD6B20",
        "purple" => "#805AD5",
        "green" => "#38A169",
        "gray" => "#718096",
        "teal" => "#319795",
        "pink" => "#D53F8C",
        "red" => "#E53E3E",
        "yellow" => "#D69E2E",
        "cyan" => "#00B5D8",
        other if is_hex_color(other) => other,
        _ => return None,
    };
    Some(hex)
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Minutes from `start` to `end`, wrapping once past midnight.
pub fn duration_minutes(start: NaiveTime, end: NaiveTime) -> i64 {
    let diff = (end - start).num_minutes();
    if diff < 0 {
        diff + MINUTES_PER_DAY
    } else {
        diff
    }
}

/// Minutes to hours, rounded to one decimal for chart display.
pub fn hours_rounded(minutes: i64) -> f64 {
    (minutes as f64 / 60.0 * 10.0).round() / 10.0
}

/// Maps category labels to chart colours.
#[derive(Debug, Clone)]
pub struct CategoryPalette {
    entries: Vec<(String, String)>,
}

impl Default for CategoryPalette {
    fn default() -> Self {
        Self {
            entries: DEFAULT_CATEGORIES
                .iter()
                .map(|(label, color)| (label.to_string(), color.to_string()))
                .collect(),
        }
    }
}

impl CategoryPalette {
    /// Build from configured categories; an empty list keeps the defaults.
    pub fn from_config(categories: &[CategoryConfig]) -> Self {
        if categories.is_empty() {
            return Self::default();
        }
        Self {
            entries: categories
                .iter()
                .map(|c| (c.name.clone(), c.color.clone()))
                .collect(),
        }
    }

    /// Category labels offered in the activity form, in configured order.
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|(label, _)| label.as_str()).collect()
    }

    pub fn color_for(&self, label: &str) -> &str {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .and_then(|(_, color)| color_hex(color))
            .unwrap_or(NEUTRAL_COLOR)
    }

    /// Colour of an activity's marker: its first tag, or neutral.
    pub fn color_for_activity(&self, activity: &Activity) -> &str {
        activity
            .tags
            .first()
            .map(|t| self.color_for(t))
            .unwrap_or(NEUTRAL_COLOR)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub label: String,
    pub minutes: i64,
    pub hours: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTotal {
    pub date: NaiveDate,
    /// `MM/DD`, as shown on the chart axis.
    pub label: String,
    pub minutes: i64,
    pub hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    /// All activities, including those without an end time.
    pub count: usize,
    pub total_minutes: i64,
    pub total_hours: f64,
    pub average_minutes: i64,
}

/// Labels/data/colours in the shape the chart widgets consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub data: Vec<f64>,
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    pub range: DateRange,
    pub categories: Vec<CategoryTotal>,
    pub daily: Vec<DayTotal>,
    pub summary: Summary,
}

impl Aggregation {
    pub fn category_chart(&self) -> ChartSeries {
        ChartSeries {
            labels: self.categories.iter().map(|c| c.label.clone()).collect(),
            data: self.categories.iter().map(|c| c.hours).collect(),
            colors: self.categories.iter().map(|c| c.color.clone()).collect(),
        }
    }

    pub fn daily_chart(&self) -> ChartSeries {
        ChartSeries {
            labels: self.daily.iter().map(|d| d.label.clone()).collect(),
            data: self.daily.iter().map(|d| d.hours).collect(),
            colors: vec![DAILY_SERIES_COLOR.to_string(); self.daily.len()],
        }
    }
}

/// Reject ranges longer than [`MAX_RANGE_DAYS`].
pub fn check_range(range: DateRange) -> Result<()> {
    if range.len_days() > MAX_RANGE_DAYS {
        return Err(DaybookError::InvalidInput(format!(
            "range {range} spans {} days; at most {MAX_RANGE_DAYS} can be shown",
            range.len_days()
        )));
    }
    Ok(())
}

/// Aggregate activities over `range`.
///
/// Day buckets are seeded for every day of the range before accumulating, so
/// empty days show as zero. Activities dated outside the range still count
/// toward the summary and category totals.
pub fn aggregate(
    activities: &[Activity],
    range: DateRange,
    palette: &CategoryPalette,
) -> Aggregation {
    let mut daily: Vec<(NaiveDate, i64)> = range.days().map(|d| (d, 0)).collect();
    let day_index: HashMap<NaiveDate, usize> = daily
        .iter()
        .enumerate()
        .map(|(i, (d, _))| (*d, i))
        .collect();

    // Categories keep first-appearance order.
    let mut categories: Vec<(String, i64)> = Vec::new();
    let mut category_index: HashMap<String, usize> = HashMap::new();
    let mut add_category = |label: &str, minutes: i64| match category_index.get(label) {
        Some(&i) => categories[i].1 += minutes,
        None => {
            category_index.insert(label.to_string(), categories.len());
            categories.push((label.to_string(), minutes));
        }
    };

    let mut total_minutes = 0i64;
    for activity in activities {
        let Some(minutes) = activity.duration_minutes() else {
            continue;
        };
        total_minutes += minutes;

        if let Some(&i) = day_index.get(&activity.date) {
            daily[i].1 += minutes;
        }

        if activity.tags.is_empty() {
            add_category(UNCATEGORIZED, minutes);
        } else {
            for tag in &activity.tags {
                add_category(tag, minutes);
            }
        }
    }

    let count = activities.len();
    let average_minutes = if count == 0 {
        0
    } else {
        (total_minutes as f64 / count as f64).round() as i64
    };

    Aggregation {
        range,
        categories: categories
            .into_iter()
            .map(|(label, minutes)| CategoryTotal {
                color: palette.color_for(&label).to_string(),
                hours: hours_rounded(minutes),
                label,
                minutes,
            })
            .collect(),
        daily: daily
            .into_iter()
            .map(|(date, minutes)| DayTotal {
                date,
                label: date.format("%m/%d").to_string(),
                minutes,
                hours: hours_rounded(minutes),
            })
            .collect(),
        summary: Summary {
            count,
            total_minutes,
            total_hours: hours_rounded(total_minutes),
            average_minutes,
        },
    }
}
