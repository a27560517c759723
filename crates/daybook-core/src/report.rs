//! Weekly report drafting: gather a range's records, build a prompt, and hand
//! it to a [`TextGenerator`].

use std::fmt::Write;

use serde::Serialize;

use crate::error::{DaybookError, Result};
use crate::llm::TextGenerator;
use crate::model::*;
use crate::range::DateRange;
use crate::storage::StorageBackend;

pub const SYSTEM_PROMPT: &str = "You are a supportive coach who turns a person's activity log \
and daily work notes into a concise, encouraging weekly review written in Markdown.";

/// Generated text for a range, not yet saved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDraft {
    pub range: DateRange,
    pub content: String,
}

impl ReportDraft {
    pub fn into_input(self) -> ReportInput {
        ReportInput {
            start_date: self.range.start(),
            end_date: self.range.end(),
            content: self.content,
        }
    }
}

fn or_none(text: Option<&str>) -> &str {
    match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => "none",
    }
}

/// Prompt listing every activity and work memo in `range`.
pub fn build_prompt(range: DateRange, activities: &[Activity], memos: &[WorkMemo]) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Write a weekly review for the period {} to {}.",
        range.start(),
        range.end()
    );

    prompt.push_str("\n## Activities\n");
    if activities.is_empty() {
        prompt.push_str("none\n");
    }
    for a in activities {
        let end = a
            .end_time
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_default();
        let tags = if a.tags.is_empty() {
            "none".to_string()
        } else {
            a.tags.join(", ")
        };
        let _ = writeln!(
            prompt,
            "- {} {}~{}: {} (tags: {})",
            a.date,
            a.start_time.format("%H:%M"),
            end,
            a.content,
            tags
        );
    }

    prompt.push_str("\n## Work memos\n");
    if memos.is_empty() {
        prompt.push_str("none\n");
    }
    for m in memos {
        let _ = writeln!(prompt, "### {}", m.date);
        let _ = writeln!(prompt, "- Done: {}", or_none(Some(&m.done_text)));
        let _ = writeln!(prompt, "- Stuck: {}", or_none(m.stuck_text.as_deref()));
        let _ = writeln!(prompt, "- Cause: {}", or_none(m.cause_text.as_deref()));
        let _ = writeln!(
            prompt,
            "- Improvement: {}",
            or_none(m.improvement_text.as_deref())
        );
    }

    prompt.push_str(
        "\nUse exactly these Markdown sections:\n\
         1. ## Overall summary\n\
         2. ## Daily highlights\n\
         3. ## Achievements\n\
         4. ## Challenges and improvements\n",
    );
    prompt
}

/// Read the range's records and ask `generator` for a draft. A range with
/// nothing recorded is rejected without calling the generator.
pub async fn generate_report(
    storage: &impl StorageBackend,
    generator: &impl TextGenerator,
    user_id: &str,
    range: DateRange,
) -> Result<ReportDraft> {
    let activities = storage
        .list_activities(user_id, &ActivityQuery::Range(range))
        .await?;
    let memos = storage
        .list_work_memos(
            user_id,
            &WorkMemoQuery {
                start: Some(range.start()),
                end: Some(range.end()),
            },
        )
        .await?;

    if activities.is_empty() && memos.is_empty() {
        tracing::warn!(%range, "report requested for a range with no records");
        return Err(DaybookError::InvalidInput(format!(
            "no activities or work memos recorded for {range}"
        )));
    }

    let prompt = build_prompt(range, &activities, &memos);
    tracing::info!(
        %range,
        activities = activities.len(),
        memos = memos.len(),
        "generating weekly report"
    );
    let content = generator.generate(&prompt, Some(SYSTEM_PROMPT)).await?;
    Ok(ReportDraft { range, content })
}

/// Validate and persist a report.
pub async fn save_report(
    storage: &impl StorageBackend,
    user_id: &str,
    input: ReportInput,
) -> Result<WeeklyReport> {
    validate_report_input(&input)?;
    let report = WeeklyReport::new(user_id, input);
    storage.save_report(&report).await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use chrono::{NaiveDate, NaiveTime};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned {
        calls: AtomicUsize,
        reply: Result<String>,
    }

    impl Canned {
        fn ok(text: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply: Ok(text.to_string()),
            }
        }
    }

    impl TextGenerator for Canned {
        async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(prompt.contains("## Activities"));
            assert_eq!(system, Some(SYSTEM_PROMPT));
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(DaybookError::Llm(e.to_string())),
            }
        }
    }

    fn ymd(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn week() -> DateRange {
        DateRange::new(ymd(6), ymd(12)).unwrap()
    }

    #[test]
    fn prompt_lists_activities_and_memos() {
        let activity = Activity::new(
            "u1",
            ActivityInput {
                date: ymd(6),
                start_time: hm(9, 0),
                end_time: Some(hm(10, 30)),
                content: "Write docs".into(),
                tags: vec!["Work & Study".into(), "Other".into()],
            },
        );
        let untagged = Activity::new(
            "u1",
            ActivityInput {
                date: ymd(7),
                start_time: hm(7, 0),
                end_time: None,
                content: "Walk".into(),
                tags: vec![],
            },
        );
        let memo = WorkMemo::new(
            "u1",
            WorkMemoInput {
                date: ymd(6),
                done_text: "Released v2".into(),
                good_text: None,
                stuck_text: Some("Flaky CI".into()),
                cause_text: None,
                improvement_text: None,
            },
        );

        let prompt = build_prompt(week(), &[activity, untagged], &[memo]);
        assert!(prompt.contains("2024-05-06 to 2024-05-12"));
        assert!(prompt.contains("- 2024-05-06 09:00~10:30: Write docs (tags: Work & Study, Other)"));
        assert!(prompt.contains("- 2024-05-07 07:00~: Walk (tags: none)"));
        assert!(prompt.contains("- Done: Released v2"));
        assert!(prompt.contains("- Stuck: Flaky CI"));
        assert!(prompt.contains("- Cause: none"));
        assert!(prompt.contains("## Challenges and improvements"));
    }

    #[tokio::test]
    async fn empty_range_is_rejected_without_generating() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let generator = Canned::ok("unused");
        let err = generate_report(&storage, &generator, "u1", week())
            .await
            .unwrap_err();
        assert!(matches!(err, DaybookError::InvalidInput(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn memo_only_range_generates_draft() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let memo = WorkMemo::new(
            "u1",
            WorkMemoInput {
                date: ymd(8),
                done_text: "Planning".into(),
                good_text: None,
                stuck_text: None,
                cause_text: None,
                improvement_text: None,
            },
        );
        storage.save_work_memo(&memo).await.unwrap();

        let generator = Canned::ok("## Overall summary\nSolid week");
        let draft = generate_report(&storage, &generator, "u1", week())
            .await
            .unwrap();
        assert_eq!(draft.range, week());
        assert!(draft.content.starts_with("## Overall summary"));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

        let saved = save_report(&storage, "u1", draft.into_input()).await.unwrap();
        let listed = storage.list_reports("u1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, saved.id);
        assert_eq!(listed[0].preview(), "## Overall summary");
    }

    #[tokio::test]
    async fn generator_failure_propagates() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let activity = Activity::new(
            "u1",
            ActivityInput {
                date: ymd(9),
                start_time: hm(9, 0),
                end_time: Some(hm(9, 30)),
                content: "Standup".into(),
                tags: vec![],
            },
        );
        storage.save_activity(&activity).await.unwrap();

        let generator = Canned {
            calls: AtomicUsize::new(0),
            reply: Err(DaybookError::Llm("quota exceeded".into())),
        };
        let err = generate_report(&storage, &generator, "u1", week())
            .await
            .unwrap_err();
        assert!(matches!(err, DaybookError::Llm(_)));
        assert!(storage.list_reports("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_rejects_empty_content() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let err = save_report(
            &storage,
            "u1",
            ReportInput {
                start_date: ymd(6),
                end_date: ymd(12),
                content: "  ".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DaybookError::InvalidInput(_)));
    }
}
