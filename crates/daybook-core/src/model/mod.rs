mod activity;
mod profile;
mod report;
mod template;
mod work_memo;

pub use activity::*;
pub use profile::*;
pub use report::*;
pub use template::*;
pub use work_memo::*;

#[cfg(test)]
mod tests;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer};

use crate::error::{DaybookError, Result};

pub const MAX_TEXT_LENGTH: usize = 10_000;
pub const MAX_TEMPLATE_NAME_LENGTH: usize = 100;

/// Parse a time of day written as `HH:MM` or `HH:MM:SS`.
///
/// Times have minute precision: seconds are accepted, since the hosted store
/// returns `time` columns that way, and dropped, so a parsed time is exactly
/// what gets stored and read back.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    let parsed = NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| DaybookError::InvalidInput(format!("invalid time '{s}', expected HH:MM")))?;
    NaiveTime::from_hms_opt(parsed.hour(), parsed.minute(), 0)
        .ok_or_else(|| DaybookError::InvalidInput(format!("invalid time '{s}', expected HH:MM")))
}

/// Trim, drop empties, and remove duplicates while keeping first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Blank optional text is stored as `None`.
pub fn normalize_optional(text: Option<String>) -> Option<String> {
    text.and_then(|t| {
        let trimmed = t.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn check_required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DaybookError::InvalidInput(format!("{field} cannot be empty")));
    }
    check_length(field, value)
}

fn check_length(field: &str, value: &str) -> Result<()> {
    if value.chars().count() > MAX_TEXT_LENGTH {
        return Err(DaybookError::InvalidInput(format!(
            "{field} exceeds maximum length of {MAX_TEXT_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Remote rows may carry `null` where we keep an empty list.
pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Serde adapter for `HH:MM` times that also accepts `HH:MM:SS` on input,
/// which is how the hosted store returns `time` columns. Seconds are dropped
/// by [`parse_time_of_day`](super::parse_time_of_day), so nothing is lost
/// when writing back as `HH:MM`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_time_of_day(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(t: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
            match t {
                Some(t) => s.serialize_str(&t.format("%H:%M").to_string()),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) if !raw.trim().is_empty() => super::super::parse_time_of_day(&raw)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                _ => Ok(None),
            }
        }
    }
}
