use chrono::NaiveDate;

use crate::model::*;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn activity_input(start: &str, end: Option<&str>) -> ActivityInput {
    ActivityInput {
        date: date("2024-05-01"),
        start_time: parse_time_of_day(start).unwrap(),
        end_time: end.map(|e| parse_time_of_day(e).unwrap()),
        content: "  Write the quarterly plan  ".to_string(),
        tags: vec!["Work".into(), " Work ".into(), "".into(), "Gym".into()],
    }
}

#[test]
fn test_activity_creation_normalizes() {
    let activity = Activity::new("user-1", activity_input("09:00", Some("10:30")));
    assert_eq!(activity.user_id, "user-1");
    assert_eq!(activity.content, "Write the quarterly plan");
    assert_eq!(activity.tags, vec!["Work", "Gym"]);
    assert_eq!(activity.duration_minutes(), Some(90));
}

#[test]
fn test_activity_without_end_has_no_duration() {
    let activity = Activity::new("u", activity_input("09:00", None));
    assert_eq!(activity.duration_minutes(), None);
}

#[test]
fn test_activity_apply_keeps_identity() {
    let mut activity = Activity::new("u", activity_input("09:00", None));
    let id = activity.id;
    let created = activity.created_at;
    let mut edit = activity_input("13:00", Some("14:00"));
    edit.content = "Review".into();
    activity.apply(edit);
    assert_eq!(activity.id, id);
    assert_eq!(activity.created_at, created);
    assert_eq!(activity.content, "Review");
    assert_eq!(activity.duration_minutes(), Some(60));
}

#[test]
fn test_parse_time_of_day_formats() {
    assert_eq!(
        parse_time_of_day("09:05").unwrap(),
        parse_time_of_day("09:05:00").unwrap()
    );
    assert!(parse_time_of_day("25:00").is_err());
    assert!(parse_time_of_day("nine").is_err());
}

#[test]
fn test_times_keep_minute_precision() {
    let with_seconds = parse_time_of_day("09:05:59").unwrap();
    assert_eq!(with_seconds, parse_time_of_day("09:05").unwrap());

    let json = r#"{
        "id": "0190a5b2-0000-7000-8000-000000000001",
        "user_id": "u",
        "date": "2024-05-01",
        "start_time": "09:05:59",
        "end_time": "10:00:30",
        "content": "Seconds from the store",
        "tags": [],
        "created_at": "2024-05-01T09:01:00Z"
    }"#;
    let activity: Activity = serde_json::from_str(json).unwrap();
    let reread: Activity =
        serde_json::from_value(serde_json::to_value(&activity).unwrap()).unwrap();
    assert_eq!(reread.start_time, activity.start_time);
    assert_eq!(reread.end_time, activity.end_time);
    assert_eq!(activity.duration_minutes(), Some(55));
}

#[test]
fn test_activity_serde_uses_hhmm() {
    let activity = Activity::new("u", activity_input("23:30", Some("00:15")));
    let json = serde_json::to_value(&activity).unwrap();
    assert_eq!(json["start_time"], "23:30");
    assert_eq!(json["end_time"], "00:15");
    assert_eq!(json["date"], "2024-05-01");
}

#[test]
fn test_activity_deserializes_remote_row() {
    let json = r#"{
        "id": "0190a5f1-0000-7000-8000-000000000001",
        "user_id": "u",
        "date": "2024-05-01",
        "start_time": "09:00:00",
        "end_time": null,
        "content": "Standup",
        "tags": null,
        "created_at": "2024-05-01T09:01:00Z"
    }"#;
    let activity: Activity = serde_json::from_str(json).unwrap();
    assert_eq!(activity.start_time, parse_time_of_day("09:00").unwrap());
    assert!(activity.end_time.is_none());
    assert!(activity.tags.is_empty());
}

#[test]
fn test_validate_activity_requires_content() {
    let mut input = activity_input("09:00", None);
    input.content = "   ".into();
    assert!(validate_activity_input(&input).is_err());

    input.content = "x".repeat(MAX_TEXT_LENGTH + 1);
    assert!(validate_activity_input(&input).is_err());
}

#[test]
fn test_work_memo_blank_optionals_become_none() {
    let memo = WorkMemo::new(
        "u",
        WorkMemoInput {
            date: date("2024-05-01"),
            done_text: " Shipped the release ".into(),
            good_text: Some("  ".into()),
            stuck_text: Some("Flaky CI".into()),
            cause_text: None,
            improvement_text: Some("".into()),
        },
    );
    assert_eq!(memo.done_text, "Shipped the release");
    assert!(memo.good_text.is_none());
    assert_eq!(memo.stuck_text.as_deref(), Some("Flaky CI"));
    assert!(memo.improvement_text.is_none());
}

#[test]
fn test_validate_work_memo_requires_done_text() {
    let input = WorkMemoInput {
        date: date("2024-05-01"),
        done_text: "".into(),
        good_text: None,
        stuck_text: None,
        cause_text: None,
        improvement_text: None,
    };
    let err = validate_work_memo_input(&input).unwrap_err();
    assert!(err.to_string().contains("done_text"));
}

#[test]
fn test_work_memo_query_bounds() {
    let q = WorkMemoQuery {
        start: Some(date("2024-05-01")),
        end: None,
    };
    assert!(q.matches(date("2024-06-01")));
    assert!(!q.matches(date("2024-04-30")));
    assert!(WorkMemoQuery::default().matches(date("1999-01-01")));
}

#[test]
fn test_validate_template_name() {
    let mut input = TemplateInput {
        template_name: " ".into(),
        content: "Morning run".into(),
        tags: vec![],
    };
    assert!(validate_template_input(&input).is_err());
    input.template_name = "Run".into();
    assert!(validate_template_input(&input).is_ok());
    input.template_name = "r".repeat(MAX_TEMPLATE_NAME_LENGTH + 1);
    assert!(validate_template_input(&input).is_err());
}

#[test]
fn test_report_preview_and_validation() {
    let input = ReportInput {
        start_date: date("2024-05-01"),
        end_date: date("2024-05-07"),
        content: "# Week in review\n\nBusy week.".into(),
    };
    assert!(validate_report_input(&input).is_ok());
    let report = WeeklyReport::new("u", input.clone());
    assert_eq!(report.preview(), "# Week in review");

    let reversed = ReportInput {
        start_date: date("2024-05-08"),
        ..input
    };
    assert!(validate_report_input(&reversed).is_err());
}

#[test]
fn test_profile_apply_partial_update() {
    let mut profile = Profile::empty("u");
    profile.apply(&UpdateProfileInput {
        full_name: Some("Sam".into()),
        avatar_url: None,
    });
    assert_eq!(profile.full_name.as_deref(), Some("Sam"));
    assert!(profile.avatar_url.is_none());

    profile.apply(&UpdateProfileInput {
        full_name: Some("".into()),
        avatar_url: Some("http://x/a.png".into()),
    });
    assert!(profile.full_name.is_none());
    assert_eq!(profile.avatar_url.as_deref(), Some("http://x/a.png"));
}

#[test]
fn test_profile_name_length_checked() {
    let long = UpdateProfileInput {
        full_name: Some("n".repeat(MAX_TEMPLATE_NAME_LENGTH + 1)),
        avatar_url: None,
    };
    assert!(validate_profile_input(&long).is_err());
    assert!(validate_profile_input(&UpdateProfileInput::default()).is_ok());
}
