use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use uuid::Uuid;

use super::StorageBackend;
use crate::error::{DaybookError, Result};
use crate::model::*;

/// SQLite-backed storage for Daybook.
///
/// Uses a single `Connection` behind `Arc<Mutex<>>` so it can be shared
/// across async tasks. All blocking SQLite calls go through
/// [`with_conn`](Self::with_conn) which runs them on the Tokio blocking
/// thread-pool.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStorage {
    /// Open (or create) a file-backed SQLite database at `path`.
    ///
    /// Sets WAL journal mode, then creates all tables and indexes if they
    /// don't already exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DaybookError::Storage(format!("failed to create database directory: {e}"))
                })?;
            }
        }
        let conn = Connection::open(&path)
            .map_err(|e| DaybookError::Storage(format!("failed to open SQLite database: {e}")))?;

        Self::configure_and_init(conn, path)
    }

    /// Open an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DaybookError::Storage(format!("failed to open in-memory SQLite database: {e}"))
        })?;

        Self::configure_and_init(conn, PathBuf::from(":memory:"))
    }

    /// Return the path this database was opened with (`:memory:` for in-memory).
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── helpers ────────────────────────────────────────────────────────

    fn configure_and_init(conn: Connection, path: PathBuf) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| DaybookError::Storage(format!("failed to set WAL mode: {e}")))?;

        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        };

        storage.create_tables()?;
        Ok(storage)
    }

    /// Create all tables and indexes (idempotent).
    fn create_tables(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DaybookError::Storage(format!("failed to acquire database lock: {e}")))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS activities (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,
                content TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS work_memos (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                done_text TEXT NOT NULL,
                good_text TEXT,
                stuck_text TEXT,
                cause_text TEXT,
                improvement_text TEXT,
                created_at TEXT NOT NULL,
                UNIQUE(user_id, date)
            );

            CREATE TABLE IF NOT EXISTS activity_templates (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                template_name TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                tags TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS weekly_reports (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                full_name TEXT,
                avatar_url TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_activities_user_date ON activities(user_id, date);
            CREATE INDEX IF NOT EXISTS idx_templates_user ON activity_templates(user_id);
            CREATE INDEX IF NOT EXISTS idx_reports_user_created ON weekly_reports(user_id, created_at DESC);
            ",
        )
        .map_err(|e| DaybookError::Storage(format!("failed to create tables: {e}")))?;

        Ok(())
    }

    /// Run a blocking closure against the SQLite connection on the Tokio
    /// blocking thread-pool.
    pub(crate) async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                DaybookError::Storage(format!("failed to acquire database lock: {e}"))
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| DaybookError::Storage(format!("task join error: {e}")))?
    }
}

// ── row conversion ─────────────────────────────────────────────────────

fn sql_err(e: rusqlite::Error) -> DaybookError {
    if let rusqlite::Error::SqliteFailure(ref err, _) = e {
        if err.code == ErrorCode::ConstraintViolation {
            return DaybookError::Conflict(e.to_string());
        }
    }
    DaybookError::Storage(e.to_string())
}

fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| DaybookError::Storage(format!("invalid id '{s}': {e}")))
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DaybookError::Storage(format!("invalid date '{s}': {e}")))
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DaybookError::Storage(format!("invalid timestamp '{s}': {e}")))
}

fn parse_tags(s: &str) -> Result<Vec<String>> {
    Ok(serde_json::from_str(s)?)
}

/// Times are kept at minute precision, matching `parse_time_of_day`.
fn hhmm(t: &chrono::NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

const ACTIVITY_COLUMNS: &str =
    "id, user_id, date, start_time, end_time, content, tags, created_at";

struct ActivityRow {
    id: String,
    user_id: String,
    date: String,
    start_time: String,
    end_time: Option<String>,
    content: String,
    tags: String,
    created_at: String,
}

impl ActivityRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            date: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            content: row.get(5)?,
            tags: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_activity(self) -> Result<Activity> {
        Ok(Activity {
            id: parse_uuid(&self.id)?,
            user_id: self.user_id,
            date: parse_day(&self.date)?,
            start_time: parse_time_of_day(&self.start_time)?,
            end_time: self
                .end_time
                .as_deref()
                .map(parse_time_of_day)
                .transpose()?,
            content: self.content,
            tags: parse_tags(&self.tags)?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

const MEMO_COLUMNS: &str = "id, user_id, date, done_text, good_text, stuck_text, cause_text, improvement_text, created_at";

struct MemoRow {
    id: String,
    user_id: String,
    date: String,
    done_text: String,
    good_text: Option<String>,
    stuck_text: Option<String>,
    cause_text: Option<String>,
    improvement_text: Option<String>,
    created_at: String,
}

impl MemoRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            date: row.get(2)?,
            done_text: row.get(3)?,
            good_text: row.get(4)?,
            stuck_text: row.get(5)?,
            cause_text: row.get(6)?,
            improvement_text: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_memo(self) -> Result<WorkMemo> {
        Ok(WorkMemo {
            id: parse_uuid(&self.id)?,
            user_id: self.user_id,
            date: parse_day(&self.date)?,
            done_text: self.done_text,
            good_text: self.good_text,
            stuck_text: self.stuck_text,
            cause_text: self.cause_text,
            improvement_text: self.improvement_text,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

const TEMPLATE_COLUMNS: &str = "id, user_id, template_name, content, tags, created_at";

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<[String; 6]> {
    Ok([
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ])
}

fn into_template([id, user_id, template_name, content, tags, created_at]: [String; 6]) -> Result<ActivityTemplate> {
    Ok(ActivityTemplate {
        id: parse_uuid(&id)?,
        user_id,
        template_name,
        content,
        tags: parse_tags(&tags)?,
        created_at: parse_ts(&created_at)?,
    })
}

const REPORT_COLUMNS: &str = "id, user_id, start_date, end_date, content, created_at";

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<[String; 6]> {
    Ok([
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ])
}

fn into_report([id, user_id, start_date, end_date, content, created_at]: [String; 6]) -> Result<WeeklyReport> {
    Ok(WeeklyReport {
        id: parse_uuid(&id)?,
        user_id,
        start_date: parse_day(&start_date)?,
        end_date: parse_day(&end_date)?,
        content,
        created_at: parse_ts(&created_at)?,
    })
}

fn fetch_activity(conn: &Connection, user_id: &str, id: &str) -> Result<Activity> {
    let sql = format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = ?1 AND user_id = ?2");
    conn.query_row(&sql, params![id, user_id], ActivityRow::from_row)
        .optional()
        .map_err(sql_err)?
        .ok_or_else(|| DaybookError::NotFound(format!("activity {id}")))?
        .into_activity()
}

fn fetch_memo(conn: &Connection, user_id: &str, id: &str) -> Result<WorkMemo> {
    let sql = format!("SELECT {MEMO_COLUMNS} FROM work_memos WHERE id = ?1 AND user_id = ?2");
    conn.query_row(&sql, params![id, user_id], MemoRow::from_row)
        .optional()
        .map_err(sql_err)?
        .ok_or_else(|| DaybookError::NotFound(format!("work memo {id}")))?
        .into_memo()
}

fn fetch_profile(conn: &Connection, user_id: &str) -> Result<Profile> {
    let row = conn
        .query_row(
            "SELECT user_id, full_name, avatar_url, updated_at FROM profiles WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()
        .map_err(sql_err)?;

    match row {
        Some((user_id, full_name, avatar_url, updated_at)) => Ok(Profile {
            user_id,
            full_name,
            avatar_url,
            updated_at: parse_ts(&updated_at)?,
        }),
        None => Ok(Profile::empty(user_id)),
    }
}

fn delete_owned(conn: &Connection, table: &str, what: &str, user_id: &str, id: &str) -> Result<()> {
    let sql = format!("DELETE FROM {table} WHERE id = ?1 AND user_id = ?2");
    let changed = conn.execute(&sql, params![id, user_id]).map_err(sql_err)?;
    if changed == 0 {
        return Err(DaybookError::NotFound(format!("{what} {id}")));
    }
    Ok(())
}

impl StorageBackend for SqliteStorage {
    // -- Activities --

    async fn list_activities(&self, user_id: &str, query: &ActivityQuery) -> Result<Vec<Activity>> {
        let user_id = user_id.to_string();
        let query = *query;
        self.with_conn(move |conn| {
            let (sql, start, end) = match query {
                ActivityQuery::Day(date) => (
                    format!(
                        "SELECT {ACTIVITY_COLUMNS} FROM activities \
                         WHERE user_id = ?1 AND date >= ?2 AND date <= ?3 \
                         ORDER BY start_time ASC, created_at ASC"
                    ),
                    date,
                    date,
                ),
                ActivityQuery::Range(range) => (
                    format!(
                        "SELECT {ACTIVITY_COLUMNS} FROM activities \
                         WHERE user_id = ?1 AND date >= ?2 AND date <= ?3 \
                         ORDER BY date ASC, start_time ASC, created_at ASC"
                    ),
                    range.start(),
                    range.end(),
                ),
            };
            let mut stmt = conn.prepare(&sql).map_err(sql_err)?;
            let rows = stmt
                .query_map(
                    params![user_id, start.to_string(), end.to_string()],
                    ActivityRow::from_row,
                )
                .map_err(sql_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(sql_err)?;
            rows.into_iter().map(ActivityRow::into_activity).collect()
        })
        .await
    }

    async fn get_activity(&self, user_id: &str, id: Uuid) -> Result<Activity> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| fetch_activity(conn, &user_id, &id.to_string()))
            .await
    }

    async fn save_activity(&self, activity: &Activity) -> Result<()> {
        let a = activity.clone();
        self.with_conn(move |conn| {
            conn.execute(
                &format!("INSERT INTO activities ({ACTIVITY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    a.id.to_string(),
                    a.user_id,
                    a.date.to_string(),
                    hhmm(&a.start_time),
                    a.end_time.as_ref().map(hhmm),
                    a.content,
                    serde_json::to_string(&a.tags)?,
                    ts(&a.created_at),
                ],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn update_activity(
        &self,
        user_id: &str,
        id: Uuid,
        input: &ActivityInput,
    ) -> Result<Activity> {
        let user_id = user_id.to_string();
        let input = input.clone();
        self.with_conn(move |conn| {
            let mut activity = fetch_activity(conn, &user_id, &id.to_string())?;
            activity.apply(input);
            conn.execute(
                "UPDATE activities SET date = ?1, start_time = ?2, end_time = ?3, content = ?4, tags = ?5 \
                 WHERE id = ?6 AND user_id = ?7",
                params![
                    activity.date.to_string(),
                    hhmm(&activity.start_time),
                    activity.end_time.as_ref().map(hhmm),
                    activity.content,
                    serde_json::to_string(&activity.tags)?,
                    id.to_string(),
                    user_id,
                ],
            )
            .map_err(sql_err)?;
            Ok(activity)
        })
        .await
    }

    async fn delete_activity(&self, user_id: &str, id: Uuid) -> Result<()> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            delete_owned(conn, "activities", "activity", &user_id, &id.to_string())
        })
        .await
    }

    // -- Work memos --

    async fn list_work_memos(&self, user_id: &str, query: &WorkMemoQuery) -> Result<Vec<WorkMemo>> {
        let user_id = user_id.to_string();
        let start = query.start.map(|d| d.to_string());
        let end = query.end.map(|d| d.to_string());
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {MEMO_COLUMNS} FROM work_memos \
                 WHERE user_id = ?1 AND (?2 IS NULL OR date >= ?2) AND (?3 IS NULL OR date <= ?3) \
                 ORDER BY date DESC"
            );
            let mut stmt = conn.prepare(&sql).map_err(sql_err)?;
            let rows = stmt
                .query_map(params![user_id, start, end], MemoRow::from_row)
                .map_err(sql_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(sql_err)?;
            rows.into_iter().map(MemoRow::into_memo).collect()
        })
        .await
    }

    async fn get_work_memo(&self, user_id: &str, id: Uuid) -> Result<WorkMemo> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| fetch_memo(conn, &user_id, &id.to_string()))
            .await
    }

    async fn find_work_memo_by_date(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<WorkMemo>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {MEMO_COLUMNS} FROM work_memos WHERE user_id = ?1 AND date = ?2");
            conn.query_row(&sql, params![user_id, date.to_string()], MemoRow::from_row)
                .optional()
                .map_err(sql_err)?
                .map(MemoRow::into_memo)
                .transpose()
        })
        .await
    }

    async fn save_work_memo(&self, memo: &WorkMemo) -> Result<()> {
        let m = memo.clone();
        self.with_conn(move |conn| {
            conn.execute(
                &format!("INSERT INTO work_memos ({MEMO_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
                params![
                    m.id.to_string(),
                    m.user_id,
                    m.date.to_string(),
                    m.done_text,
                    m.good_text,
                    m.stuck_text,
                    m.cause_text,
                    m.improvement_text,
                    ts(&m.created_at),
                ],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn update_work_memo(
        &self,
        user_id: &str,
        id: Uuid,
        input: &WorkMemoInput,
    ) -> Result<WorkMemo> {
        let user_id = user_id.to_string();
        let input = input.clone();
        self.with_conn(move |conn| {
            let mut memo = fetch_memo(conn, &user_id, &id.to_string())?;
            memo.apply(input);
            conn.execute(
                "UPDATE work_memos SET date = ?1, done_text = ?2, good_text = ?3, stuck_text = ?4, \
                 cause_text = ?5, improvement_text = ?6 WHERE id = ?7 AND user_id = ?8",
                params![
                    memo.date.to_string(),
                    memo.done_text,
                    memo.good_text,
                    memo.stuck_text,
                    memo.cause_text,
                    memo.improvement_text,
                    id.to_string(),
                    user_id,
                ],
            )
            .map_err(sql_err)?;
            Ok(memo)
        })
        .await
    }

    async fn delete_work_memo(&self, user_id: &str, id: Uuid) -> Result<()> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            delete_owned(conn, "work_memos", "work memo", &user_id, &id.to_string())
        })
        .await
    }

    // -- Templates --

    async fn list_templates(&self, user_id: &str) -> Result<Vec<ActivityTemplate>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {TEMPLATE_COLUMNS} FROM activity_templates WHERE user_id = ?1 \
                 ORDER BY template_name ASC"
            );
            let mut stmt = conn.prepare(&sql).map_err(sql_err)?;
            let rows = stmt
                .query_map(params![user_id], template_from_row)
                .map_err(sql_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(sql_err)?;
            rows.into_iter().map(into_template).collect()
        })
        .await
    }

    async fn save_template(&self, template: &ActivityTemplate) -> Result<()> {
        let t = template.clone();
        self.with_conn(move |conn| {
            conn.execute(
                &format!("INSERT INTO activity_templates ({TEMPLATE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    t.id.to_string(),
                    t.user_id,
                    t.template_name,
                    t.content,
                    serde_json::to_string(&t.tags)?,
                    ts(&t.created_at),
                ],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn delete_template(&self, user_id: &str, id: Uuid) -> Result<()> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            delete_owned(conn, "activity_templates", "template", &user_id, &id.to_string())
        })
        .await
    }

    // -- Reports --

    async fn list_reports(&self, user_id: &str) -> Result<Vec<WeeklyReport>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {REPORT_COLUMNS} FROM weekly_reports WHERE user_id = ?1 \
                 ORDER BY created_at DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql).map_err(sql_err)?;
            let rows = stmt
                .query_map(params![user_id], report_from_row)
                .map_err(sql_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(sql_err)?;
            rows.into_iter().map(into_report).collect()
        })
        .await
    }

    async fn get_report(&self, user_id: &str, id: Uuid) -> Result<WeeklyReport> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {REPORT_COLUMNS} FROM weekly_reports WHERE id = ?1 AND user_id = ?2");
            let row = conn
                .query_row(&sql, params![id.to_string(), user_id], report_from_row)
                .optional()
                .map_err(sql_err)?
                .ok_or_else(|| DaybookError::NotFound(format!("report {id}")))?;
            into_report(row)
        })
        .await
    }

    async fn save_report(&self, report: &WeeklyReport) -> Result<()> {
        let r = report.clone();
        self.with_conn(move |conn| {
            conn.execute(
                &format!("INSERT INTO weekly_reports ({REPORT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    r.id.to_string(),
                    r.user_id,
                    r.start_date.to_string(),
                    r.end_date.to_string(),
                    r.content,
                    ts(&r.created_at),
                ],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    // -- Profile --

    async fn get_profile(&self, user_id: &str) -> Result<Profile> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| fetch_profile(conn, &user_id)).await
    }

    async fn update_profile(&self, user_id: &str, input: &UpdateProfileInput) -> Result<Profile> {
        let user_id = user_id.to_string();
        let input = input.clone();
        self.with_conn(move |conn| {
            let mut profile = fetch_profile(conn, &user_id)?;
            profile.apply(&input);
            conn.execute(
                "INSERT INTO profiles (user_id, full_name, avatar_url, updated_at) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(user_id) DO UPDATE SET full_name = excluded.full_name, \
                 avatar_url = excluded.avatar_url, updated_at = excluded.updated_at",
                params![
                    profile.user_id,
                    profile.full_name,
                    profile.avatar_url,
                    ts(&profile.updated_at),
                ],
            )
            .map_err(sql_err)?;
            Ok(profile)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_creates_tables() {
        let storage = SqliteStorage::open_in_memory().expect("should open in-memory DB");
        assert_eq!(storage.path().to_str().unwrap(), ":memory:");

        let conn = storage.conn.lock().unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "activities",
            "work_memos",
            "activity_templates",
            "weekly_reports",
            "profiles",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn create_tables_is_idempotent() {
        let storage = SqliteStorage::open_in_memory().expect("should open in-memory DB");
        storage.create_tables().expect("idempotent create_tables");
    }

    #[test]
    fn constraint_violation_maps_to_conflict() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let conn = storage.conn.lock().unwrap();
        let insert = "INSERT INTO work_memos (id, user_id, date, done_text, created_at) \
                      VALUES (?1, 'u', '2024-05-01', 'x', '2024-05-01T00:00:00Z')";
        conn.execute(insert, params!["a"]).unwrap();
        let err = conn.execute(insert, params!["b"]).map_err(sql_err).unwrap_err();
        assert!(matches!(err, DaybookError::Conflict(_)));
    }

    #[tokio::test]
    async fn with_conn_runs_on_blocking_pool() {
        let storage = SqliteStorage::open_in_memory().expect("should open in-memory DB");
        let count: i64 = storage
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
                    [],
                    |row| row.get(0),
                )
                .map_err(sql_err)
            })
            .await
            .expect("with_conn should succeed");

        assert!(count >= 5, "expected at least 5 tables, got {count}");
    }

    #[test]
    fn open_file_based_db() {
        let dir = std::env::temp_dir().join(format!("daybook-test-{}", Uuid::now_v7()));
        let db_path = dir.join("nested").join("test.db");

        let storage = SqliteStorage::open(&db_path).expect("should open file DB");
        assert_eq!(storage.path(), db_path);

        drop(storage);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
