//! Inclusive calendar-day ranges and the dashboard's range selector.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{DaybookError, Result};

/// Range presets offered by the statistics view.
pub const STATS_PRESET_DAYS: &[u32] = &[7, 30, 90];

/// An inclusive `[start, end]` range of calendar days. Always `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(DaybookError::InvalidInput(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// A single-day range.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// The `days` most recent days ending at `today`, inclusive.
    /// `days == 0` is treated as 1.
    pub fn last_n_days(today: NaiveDate, days: u32) -> Self {
        let back = u64::from(days.max(1) - 1);
        let start = today.checked_sub_days(Days::new(back)).unwrap_or(today);
        Self { start, end: today }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days in the range, counting both ends.
    pub fn len_days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every day in the range, oldest first.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format("%Y/%m/%d"),
            self.end.format("%Y/%m/%d")
        )
    }
}

/// Start/end pair as picked in the UI. Either end may still be missing while
/// the user is choosing; only a complete selection yields a [`DateRange`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeSelector {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl RangeSelector {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Default dashboard selection: the last seven days.
    pub fn last_week(today: NaiveDate) -> Self {
        let range = DateRange::last_n_days(today, 7);
        Self::new(Some(range.start), Some(range.end))
    }

    /// Replace the selection. Partial updates are kept but not queryable.
    pub fn select(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        self.start = start;
        self.end = end;
    }

    /// The "today" shortcut: both ends on the current date.
    pub fn select_today(&mut self, today: NaiveDate) {
        self.start = Some(today);
        self.end = Some(today);
    }

    /// Nothing picked yet.
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// True when both ends are set to `today`.
    pub fn is_today(&self, today: NaiveDate) -> bool {
        self.start == Some(today) && self.end == Some(today)
    }

    /// The range to query, or `None` while the selection is incomplete.
    pub fn complete(&self) -> Option<Result<DateRange>> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)),
            _ => None,
        }
    }

    /// Resolve query parameters into a range.
    ///
    /// Both ends absent falls back to `default`; exactly one end present is
    /// rejected so a half-chosen selection never reaches the store.
    pub fn resolve(&self, default: DateRange) -> Result<DateRange> {
        match (self.start, self.end) {
            (None, None) => Ok(default),
            (Some(start), Some(end)) => DateRange::new(start, end),
            _ => Err(DaybookError::InvalidInput(
                "select both a start and an end date".into(),
            )),
        }
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| DaybookError::InvalidInput(format!("invalid date '{s}', expected YYYY-MM-DD")))
}
