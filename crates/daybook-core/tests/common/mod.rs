#![allow(dead_code)]

use chrono::{NaiveDate, NaiveTime};
use daybook_core::model::{ActivityInput, WorkMemoInput};
use daybook_core::storage::{SqliteStorage, Storage};

pub const USER: &str = "integration-user";
pub const OTHER_USER: &str = "someone-else";

pub fn test_storage() -> Storage {
    Storage::Sqlite(SqliteStorage::open_in_memory().expect("in-memory sqlite"))
}

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
}

pub fn activity_input(
    date: NaiveDate,
    start: NaiveTime,
    end: Option<NaiveTime>,
    content: &str,
    tags: &[&str],
) -> ActivityInput {
    ActivityInput {
        date,
        start_time: start,
        end_time: end,
        content: content.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

pub fn memo_input(date: NaiveDate, done: &str) -> WorkMemoInput {
    WorkMemoInput {
        date,
        done_text: done.to_string(),
        good_text: None,
        stuck_text: None,
        cause_text: None,
        improvement_text: None,
    }
}
