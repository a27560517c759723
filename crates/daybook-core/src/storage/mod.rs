mod backend;
mod remote;
mod sqlite;

pub use backend::StorageBackend;
pub use remote::RemoteStorage;
pub use sqlite::SqliteStorage;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::config::{self, DaybookConfig};
use crate::error::{DaybookError, Result};
use crate::model::*;

/// Enum wrapper for storage backends. Dispatches to the concrete implementation.
/// Using an enum instead of `Box<dyn StorageBackend>` because the trait uses RPITIT.
pub enum Storage {
    Sqlite(SqliteStorage),
    Remote(RemoteStorage),
}

impl StorageBackend for Storage {
    async fn list_activities(&self, user_id: &str, query: &ActivityQuery) -> Result<Vec<Activity>> {
        match self {
            Storage::Sqlite(s) => s.list_activities(user_id, query).await,
            Storage::Remote(s) => s.list_activities(user_id, query).await,
        }
    }

    async fn get_activity(&self, user_id: &str, id: Uuid) -> Result<Activity> {
        match self {
            Storage::Sqlite(s) => s.get_activity(user_id, id).await,
            Storage::Remote(s) => s.get_activity(user_id, id).await,
        }
    }

    async fn save_activity(&self, activity: &Activity) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.save_activity(activity).await,
            Storage::Remote(s) => s.save_activity(activity).await,
        }
    }

    async fn update_activity(&self, user_id: &str, id: Uuid, input: &ActivityInput) -> Result<Activity> {
        match self {
            Storage::Sqlite(s) => s.update_activity(user_id, id, input).await,
            Storage::Remote(s) => s.update_activity(user_id, id, input).await,
        }
    }

    async fn delete_activity(&self, user_id: &str, id: Uuid) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.delete_activity(user_id, id).await,
            Storage::Remote(s) => s.delete_activity(user_id, id).await,
        }
    }

    async fn list_work_memos(&self, user_id: &str, query: &WorkMemoQuery) -> Result<Vec<WorkMemo>> {
        match self {
            Storage::Sqlite(s) => s.list_work_memos(user_id, query).await,
            Storage::Remote(s) => s.list_work_memos(user_id, query).await,
        }
    }

    async fn get_work_memo(&self, user_id: &str, id: Uuid) -> Result<WorkMemo> {
        match self {
            Storage::Sqlite(s) => s.get_work_memo(user_id, id).await,
            Storage::Remote(s) => s.get_work_memo(user_id, id).await,
        }
    }

    async fn find_work_memo_by_date(&self, user_id: &str, date: NaiveDate) -> Result<Option<WorkMemo>> {
        match self {
            Storage::Sqlite(s) => s.find_work_memo_by_date(user_id, date).await,
            Storage::Remote(s) => s.find_work_memo_by_date(user_id, date).await,
        }
    }

    async fn save_work_memo(&self, memo: &WorkMemo) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.save_work_memo(memo).await,
            Storage::Remote(s) => s.save_work_memo(memo).await,
        }
    }

    async fn update_work_memo(&self, user_id: &str, id: Uuid, input: &WorkMemoInput) -> Result<WorkMemo> {
        match self {
            Storage::Sqlite(s) => s.update_work_memo(user_id, id, input).await,
            Storage::Remote(s) => s.update_work_memo(user_id, id, input).await,
        }
    }

    async fn delete_work_memo(&self, user_id: &str, id: Uuid) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.delete_work_memo(user_id, id).await,
            Storage::Remote(s) => s.delete_work_memo(user_id, id).await,
        }
    }

    async fn list_templates(&self, user_id: &str) -> Result<Vec<ActivityTemplate>> {
        match self {
            Storage::Sqlite(s) => s.list_templates(user_id).await,
            Storage::Remote(s) => s.list_templates(user_id).await,
        }
    }

    async fn save_template(&self, template: &ActivityTemplate) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.save_template(template).await,
            Storage::Remote(s) => s.save_template(template).await,
        }
    }

    async fn delete_template(&self, user_id: &str, id: Uuid) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.delete_template(user_id, id).await,
            Storage::Remote(s) => s.delete_template(user_id, id).await,
        }
    }

    async fn list_reports(&self, user_id: &str) -> Result<Vec<WeeklyReport>> {
        match self {
            Storage::Sqlite(s) => s.list_reports(user_id).await,
            Storage::Remote(s) => s.list_reports(user_id).await,
        }
    }

    async fn get_report(&self, user_id: &str, id: Uuid) -> Result<WeeklyReport> {
        match self {
            Storage::Sqlite(s) => s.get_report(user_id, id).await,
            Storage::Remote(s) => s.get_report(user_id, id).await,
        }
    }

    async fn save_report(&self, report: &WeeklyReport) -> Result<()> {
        match self {
            Storage::Sqlite(s) => s.save_report(report).await,
            Storage::Remote(s) => s.save_report(report).await,
        }
    }

    async fn get_profile(&self, user_id: &str) -> Result<Profile> {
        match self {
            Storage::Sqlite(s) => s.get_profile(user_id).await,
            Storage::Remote(s) => s.get_profile(user_id).await,
        }
    }

    async fn update_profile(&self, user_id: &str, input: &UpdateProfileInput) -> Result<Profile> {
        match self {
            Storage::Sqlite(s) => s.update_profile(user_id, input).await,
            Storage::Remote(s) => s.update_profile(user_id, input).await,
        }
    }
}

impl Storage {
    pub fn backend_name(&self) -> &'static str {
        match self {
            Storage::Sqlite(_) => "sqlite",
            Storage::Remote(_) => "remote",
        }
    }
}

/// Create a storage backend from the given configuration.
pub fn create_backend(config: &DaybookConfig) -> Result<Storage> {
    match config.storage.backend.as_str() {
        "sqlite" => {
            let path = match &config.storage.path {
                Some(p) => std::path::PathBuf::from(p),
                None => default_sqlite_path()?,
            };
            let storage = SqliteStorage::open(&path)?;
            tracing::info!(path = %path.display(), "opened sqlite storage");
            Ok(Storage::Sqlite(storage))
        }
        "remote" => {
            let (url, key) = config::resolve_remote(&config.remote)?;
            let storage = RemoteStorage::new(&url, &key)?;
            tracing::info!(%url, "using remote storage");
            Ok(Storage::Remote(storage))
        }
        other => Err(DaybookError::Config(format!(
            "unknown storage backend: {other}"
        ))),
    }
}

/// Default SQLite path: `~/.config/daybook/daybook.db`
fn default_sqlite_path() -> Result<std::path::PathBuf> {
    Ok(config::data_dir()?.join("daybook.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_backend_sqlite_with_custom_path() {
        let dir = std::env::temp_dir().join(format!("daybook-backend-{}", Uuid::now_v7()));
        let mut config = DaybookConfig::default_config();
        config.storage.path = Some(dir.join("db.sqlite").to_string_lossy().into_owned());

        let storage = create_backend(&config).unwrap();
        assert_eq!(storage.backend_name(), "sqlite");

        drop(storage);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn create_backend_remote_requires_url() {
        let mut config = DaybookConfig::default_config();
        config.storage.backend = "remote".to_string();
        let err = create_backend(&config).err().unwrap();
        assert!(matches!(err, DaybookError::Config(_)));
    }

    #[test]
    fn create_backend_remote_with_key() {
        let mut config = DaybookConfig::default_config();
        config.storage.backend = "remote".to_string();
        config.remote.url = Some("https://db.example.com".to_string());
        config.remote.api_key = Some("secret".to_string());
        let storage = create_backend(&config).unwrap();
        assert_eq!(storage.backend_name(), "remote");
    }

    #[test]
    fn create_backend_unknown_is_config_error() {
        let mut config = DaybookConfig::default_config();
        config.storage.backend = "cassandra".to_string();
        let err = create_backend(&config).err().unwrap();
        assert!(err.to_string().contains("unknown storage backend"));
    }
}
