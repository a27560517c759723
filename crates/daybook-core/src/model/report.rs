use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DaybookError, Result};

/// A persisted AI-generated summary of a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub id: Uuid,
    pub user_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl WeeklyReport {
    pub fn new(user_id: impl Into<String>, input: ReportInput) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            start_date: input.start_date,
            end_date: input.end_date,
            content: input.content,
            created_at: Utc::now(),
        }
    }

    /// First line of the report, shown in the archive list.
    pub fn preview(&self) -> &str {
        self.content.lines().next().unwrap_or("").trim()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportInput {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub content: String,
}

pub fn validate_report_input(input: &ReportInput) -> Result<()> {
    if input.start_date > input.end_date {
        return Err(DaybookError::InvalidInput(
            "start_date must not be after end_date".into(),
        ));
    }
    // Generated reports can be long; only emptiness is checked.
    if input.content.trim().is_empty() {
        return Err(DaybookError::InvalidInput("content cannot be empty".into()));
    }
    Ok(())
}

