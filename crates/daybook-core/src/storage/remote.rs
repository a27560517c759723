use chrono::NaiveDate;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use super::StorageBackend;
use crate::error::{DaybookError, Result};
use crate::model::*;

/// Hosted relational store reached through its REST gateway.
///
/// Tables live under `{url}/rest/v1/{table}` and are filtered with
/// PostgREST operators (`user_id=eq.…`, `date=gte.…`, `order=…`). Every
/// request carries an explicit `user_id` filter so rows owned by another
/// user are never read or written.
pub struct RemoteStorage {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

type Filters<'a> = &'a [(&'a str, String)];

impl RemoteStorage {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| DaybookError::Storage(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
        })
    }

    fn table_url(&self, table: &str, filters: Filters<'_>) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/rest/v1/{table}", self.base_url))
            .map_err(|e| DaybookError::Config(format!("invalid remote url: {e}")))?;
        if !filters.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in filters {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Send one request and decode the JSON body. Non-2xx statuses become
    /// errors carrying the response text.
    async fn request<B: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        table: &str,
        filters: Filters<'_>,
        prefer: Option<&str>,
        body: Option<&B>,
    ) -> Result<R> {
        let url = self.table_url(table, filters)?;
        let mut req = self
            .http
            .request(method.clone(), url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key);
        if let Some(prefer) = prefer {
            req = req.header("Prefer", prefer);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if status == StatusCode::CONFLICT {
            return Err(DaybookError::Conflict(format!("{table}: {}", preview(&text))));
        }
        if !status.is_success() {
            return Err(DaybookError::Storage(format!(
                "{method} {table} returned {status}: {}",
                preview(&text)
            )));
        }

        let text = if text.trim().is_empty() { "[]" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| {
            DaybookError::Storage(format!(
                "failed to deserialize {table} response: {e}\nBody: {}",
                preview(text)
            ))
        })
    }

    async fn select<R: DeserializeOwned>(&self, table: &str, filters: Filters<'_>) -> Result<Vec<R>> {
        self.request::<(), _>(Method::GET, table, filters, None, None)
            .await
    }

    async fn insert<B: Serialize>(&self, table: &str, row: &B) -> Result<()> {
        let _: serde_json::Value = self
            .request(Method::POST, table, &[], Some("return=minimal"), Some(row))
            .await?;
        Ok(())
    }

    /// PATCH the owned row with `id` and return the updated representation.
    async fn patch<R: DeserializeOwned>(
        &self,
        table: &str,
        what: &str,
        user_id: &str,
        id: Uuid,
        changes: &serde_json::Value,
    ) -> Result<R> {
        let rows: Vec<R> = self
            .request(
                Method::PATCH,
                table,
                &owned_row(user_id, id),
                Some("return=representation"),
                Some(changes),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DaybookError::NotFound(format!("{what} {id}")))
    }

    async fn remove(&self, table: &str, what: &str, user_id: &str, id: Uuid) -> Result<()> {
        let rows: Vec<serde_json::Value> = self
            .request::<(), _>(
                Method::DELETE,
                table,
                &owned_row(user_id, id),
                Some("return=representation"),
                None,
            )
            .await?;
        if rows.is_empty() {
            return Err(DaybookError::NotFound(format!("{what} {id}")));
        }
        Ok(())
    }

    async fn get_one<R: DeserializeOwned>(
        &self,
        table: &str,
        what: &str,
        user_id: &str,
        id: Uuid,
    ) -> Result<R> {
        let rows: Vec<R> = self.select(table, &owned_row(user_id, id)).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DaybookError::NotFound(format!("{what} {id}")))
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(300) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

fn owned_row(user_id: &str, id: Uuid) -> Vec<(&'static str, String)> {
    vec![("id", eq(id)), ("user_id", eq(user_id))]
}

fn time_text(t: Option<chrono::NaiveTime>) -> Option<String> {
    t.map(|t| t.format("%H:%M").to_string())
}

impl StorageBackend for RemoteStorage {
    // -- Activities --

    async fn list_activities(&self, user_id: &str, query: &ActivityQuery) -> Result<Vec<Activity>> {
        let filters = match query {
            ActivityQuery::Day(date) => vec![
                ("user_id", eq(user_id)),
                ("date", eq(date)),
                ("order", "start_time.asc".to_string()),
            ],
            ActivityQuery::Range(range) => vec![
                ("user_id", eq(user_id)),
                ("and", format!("(date.gte.{},date.lte.{})", range.start(), range.end())),
                ("order", "date.asc,start_time.asc".to_string()),
            ],
        };
        self.select("activities", &filters).await
    }

    async fn get_activity(&self, user_id: &str, id: Uuid) -> Result<Activity> {
        self.get_one("activities", "activity", user_id, id).await
    }

    async fn save_activity(&self, activity: &Activity) -> Result<()> {
        self.insert("activities", activity).await
    }

    async fn update_activity(
        &self,
        user_id: &str,
        id: Uuid,
        input: &ActivityInput,
    ) -> Result<Activity> {
        let changes = json!({
            "date": input.date,
            "start_time": time_text(Some(input.start_time)),
            "end_time": time_text(input.end_time),
            "content": input.content.trim(),
            "tags": normalize_tags(input.tags.clone()),
        });
        self.patch("activities", "activity", user_id, id, &changes)
            .await
    }

    async fn delete_activity(&self, user_id: &str, id: Uuid) -> Result<()> {
        self.remove("activities", "activity", user_id, id).await
    }

    // -- Work memos --

    async fn list_work_memos(&self, user_id: &str, query: &WorkMemoQuery) -> Result<Vec<WorkMemo>> {
        let mut bounds = Vec::new();
        if let Some(start) = query.start {
            bounds.push(format!("date.gte.{start}"));
        }
        if let Some(end) = query.end {
            bounds.push(format!("date.lte.{end}"));
        }
        let mut filters = vec![
            ("user_id", eq(user_id)),
            ("order", "date.desc".to_string()),
        ];
        if !bounds.is_empty() {
            filters.push(("and", format!("({})", bounds.join(","))));
        }
        self.select("work_memos", &filters).await
    }

    async fn get_work_memo(&self, user_id: &str, id: Uuid) -> Result<WorkMemo> {
        self.get_one("work_memos", "work memo", user_id, id).await
    }

    async fn find_work_memo_by_date(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<WorkMemo>> {
        let rows: Vec<WorkMemo> = self
            .select(
                "work_memos",
                &[("user_id", eq(user_id)), ("date", eq(date)), ("limit", "1".into())],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn save_work_memo(&self, memo: &WorkMemo) -> Result<()> {
        self.insert("work_memos", memo).await
    }

    async fn update_work_memo(
        &self,
        user_id: &str,
        id: Uuid,
        input: &WorkMemoInput,
    ) -> Result<WorkMemo> {
        let input = input.clone().normalized();
        let changes = json!({
            "date": input.date,
            "done_text": input.done_text,
            "good_text": input.good_text,
            "stuck_text": input.stuck_text,
            "cause_text": input.cause_text,
            "improvement_text": input.improvement_text,
        });
        self.patch("work_memos", "work memo", user_id, id, &changes)
            .await
    }

    async fn delete_work_memo(&self, user_id: &str, id: Uuid) -> Result<()> {
        self.remove("work_memos", "work memo", user_id, id).await
    }

    // -- Templates --

    async fn list_templates(&self, user_id: &str) -> Result<Vec<ActivityTemplate>> {
        self.select(
            "activity_templates",
            &[
                ("user_id", eq(user_id)),
                ("order", "template_name.asc".to_string()),
            ],
        )
        .await
    }

    async fn save_template(&self, template: &ActivityTemplate) -> Result<()> {
        self.insert("activity_templates", template).await
    }

    async fn delete_template(&self, user_id: &str, id: Uuid) -> Result<()> {
        self.remove("activity_templates", "template", user_id, id)
            .await
    }

    // -- Reports --

    async fn list_reports(&self, user_id: &str) -> Result<Vec<WeeklyReport>> {
        self.select(
            "weekly_reports",
            &[
                ("user_id", eq(user_id)),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn get_report(&self, user_id: &str, id: Uuid) -> Result<WeeklyReport> {
        self.get_one("weekly_reports", "report", user_id, id).await
    }

    async fn save_report(&self, report: &WeeklyReport) -> Result<()> {
        self.insert("weekly_reports", report).await
    }

    // -- Profile --

    async fn get_profile(&self, user_id: &str) -> Result<Profile> {
        let rows: Vec<Profile> = self
            .select("profiles", &[("user_id", eq(user_id))])
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .unwrap_or_else(|| Profile::empty(user_id)))
    }

    async fn update_profile(&self, user_id: &str, input: &UpdateProfileInput) -> Result<Profile> {
        let mut profile = self.get_profile(user_id).await?;
        profile.apply(input);
        let rows: Vec<Profile> = self
            .request(
                Method::POST,
                "profiles",
                &[("on_conflict", "user_id".to_string())],
                Some("resolution=merge-duplicates,return=representation"),
                Some(&profile),
            )
            .await?;
        Ok(rows.into_iter().next().unwrap_or(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_url_encodes_filters() {
        let storage = RemoteStorage::new("https://db.example.com/", "key").unwrap();
        let url = storage
            .table_url(
                "activities",
                &[("user_id", eq("a b")), ("order", "date.asc,start_time.asc".into())],
            )
            .unwrap();
        assert_eq!(url.path(), "/rest/v1/activities");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs[0], ("user_id".into(), "eq.a b".into()));
        assert_eq!(pairs[1], ("order".into(), "date.asc,start_time.asc".into()));
    }

    #[test]
    fn table_url_without_filters_has_no_query() {
        let storage = RemoteStorage::new("https://db.example.com", "key").unwrap();
        let url = storage.table_url("profiles", &[]).unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn preview_truncates_long_bodies_on_char_boundary() {
        let body = "é".repeat(400);
        assert_eq!(preview(&body).chars().count(), 300);
        assert_eq!(preview("short"), "short");
    }

    #[tokio::test]
    async fn unreachable_store_reports_upstream_error() {
        let storage = RemoteStorage::new("http://127.0.0.1:1", "key").unwrap();
        let err = storage.list_templates("u").await.unwrap_err();
        assert!(err.is_upstream(), "expected upstream error, got {err}");
    }
}
