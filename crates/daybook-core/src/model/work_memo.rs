use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_length, check_required, normalize_optional};
use crate::error::Result;

/// A daily retrospective note. At most one per user per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkMemo {
    pub id: Uuid,
    pub user_id: String,
    pub date: NaiveDate,
    pub done_text: String,
    #[serde(default)]
    pub good_text: Option<String>,
    #[serde(default)]
    pub stuck_text: Option<String>,
    #[serde(default)]
    pub cause_text: Option<String>,
    #[serde(default)]
    pub improvement_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WorkMemo {
    pub fn new(user_id: impl Into<String>, input: WorkMemoInput) -> Self {
        let input = input.normalized();
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            date: input.date,
            done_text: input.done_text,
            good_text: input.good_text,
            stuck_text: input.stuck_text,
            cause_text: input.cause_text,
            improvement_text: input.improvement_text,
            created_at: Utc::now(),
        }
    }

    pub fn apply(&mut self, input: WorkMemoInput) {
        let input = input.normalized();
        self.date = input.date;
        self.done_text = input.done_text;
        self.good_text = input.good_text;
        self.stuck_text = input.stuck_text;
        self.cause_text = input.cause_text;
        self.improvement_text = input.improvement_text;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkMemoInput {
    pub date: NaiveDate,
    pub done_text: String,
    #[serde(default)]
    pub good_text: Option<String>,
    #[serde(default)]
    pub stuck_text: Option<String>,
    #[serde(default)]
    pub cause_text: Option<String>,
    #[serde(default)]
    pub improvement_text: Option<String>,
}

impl WorkMemoInput {
    pub fn normalized(self) -> Self {
        Self {
            date: self.date,
            done_text: self.done_text.trim().to_string(),
            good_text: normalize_optional(self.good_text),
            stuck_text: normalize_optional(self.stuck_text),
            cause_text: normalize_optional(self.cause_text),
            improvement_text: normalize_optional(self.improvement_text),
        }
    }
}

pub fn validate_work_memo_input(input: &WorkMemoInput) -> Result<()> {
    check_required("done_text", &input.done_text)?;
    for (field, value) in [
        ("good_text", &input.good_text),
        ("stuck_text", &input.stuck_text),
        ("cause_text", &input.cause_text),
        ("improvement_text", &input.improvement_text),
    ] {
        if let Some(v) = value {
            check_length(field, v)?;
        }
    }
    Ok(())
}

/// Optional bounds on the memo date; either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkMemoQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl WorkMemoQuery {
    pub fn matches(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}
