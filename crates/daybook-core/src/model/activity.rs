use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_required, hhmm, normalize_tags, null_as_empty};
use crate::error::Result;
use crate::range::DateRange;

/// A single logged task with a time span and free-text description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub user_id: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm::option", default)]
    pub end_time: Option<NaiveTime>,
    pub content: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn new(user_id: impl Into<String>, input: ActivityInput) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            date: input.date,
            start_time: input.start_time,
            end_time: input.end_time,
            content: input.content.trim().to_string(),
            tags: normalize_tags(input.tags),
            created_at: Utc::now(),
        }
    }

    /// Minutes between start and end, wrapping past midnight.
    /// `None` while the activity has no end time.
    pub fn duration_minutes(&self) -> Option<i64> {
        self.end_time
            .map(|end| crate::stats::duration_minutes(self.start_time, end))
    }

    /// Apply an edit, keeping id, owner and creation time.
    pub fn apply(&mut self, input: ActivityInput) {
        self.date = input.date;
        self.start_time = input.start_time;
        self.end_time = input.end_time;
        self.content = input.content.trim().to_string();
        self.tags = normalize_tags(input.tags);
    }
}

/// Fields a user submits when creating or editing an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityInput {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm::option", default)]
    pub end_time: Option<NaiveTime>,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<&Activity> for ActivityInput {
    fn from(a: &Activity) -> Self {
        Self {
            date: a.date,
            start_time: a.start_time,
            end_time: a.end_time,
            content: a.content.clone(),
            tags: a.tags.clone(),
        }
    }
}

pub fn validate_activity_input(input: &ActivityInput) -> Result<()> {
    check_required("content", &input.content)
}

/// Which activities to read: one day (ordered by start time) or a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityQuery {
    Day(NaiveDate),
    Range(DateRange),
}

impl ActivityQuery {
    pub fn range(&self) -> DateRange {
        match self {
            Self::Day(date) => DateRange::day(*date),
            Self::Range(range) => *range,
        }
    }
}
