use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::model::*;

/// Abstract data store. Every call is scoped to the owning `user_id`; a row
/// owned by someone else behaves as if it does not exist.
pub trait StorageBackend: Send + Sync {
    // -- Activities --

    /// One day ordered by start time, or a range ordered by date then start time.
    fn list_activities(
        &self,
        user_id: &str,
        query: &ActivityQuery,
    ) -> impl Future<Output = Result<Vec<Activity>>> + Send;

    fn get_activity(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> impl Future<Output = Result<Activity>> + Send;

    fn save_activity(&self, activity: &Activity) -> impl Future<Output = Result<()>> + Send;

    fn update_activity(
        &self,
        user_id: &str,
        id: Uuid,
        input: &ActivityInput,
    ) -> impl Future<Output = Result<Activity>> + Send;

    fn delete_activity(&self, user_id: &str, id: Uuid) -> impl Future<Output = Result<()>> + Send;

    // -- Work memos --

    /// Ordered by date, newest first.
    fn list_work_memos(
        &self,
        user_id: &str,
        query: &WorkMemoQuery,
    ) -> impl Future<Output = Result<Vec<WorkMemo>>> + Send;

    fn get_work_memo(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> impl Future<Output = Result<WorkMemo>> + Send;

    /// The memo for `date`, if any.
    fn find_work_memo_by_date(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<WorkMemo>>> + Send;

    fn save_work_memo(&self, memo: &WorkMemo) -> impl Future<Output = Result<()>> + Send;

    fn update_work_memo(
        &self,
        user_id: &str,
        id: Uuid,
        input: &WorkMemoInput,
    ) -> impl Future<Output = Result<WorkMemo>> + Send;

    fn delete_work_memo(&self, user_id: &str, id: Uuid)
        -> impl Future<Output = Result<()>> + Send;

    // -- Templates --

    /// Ordered by template name.
    fn list_templates(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<ActivityTemplate>>> + Send;

    fn save_template(
        &self,
        template: &ActivityTemplate,
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete_template(&self, user_id: &str, id: Uuid) -> impl Future<Output = Result<()>> + Send;

    // -- Reports --

    /// Ordered by creation time, newest first.
    fn list_reports(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<WeeklyReport>>> + Send;

    fn get_report(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> impl Future<Output = Result<WeeklyReport>> + Send;

    fn save_report(&self, report: &WeeklyReport) -> impl Future<Output = Result<()>> + Send;

    // -- Profile --

    /// The stored profile, or an empty one for a new user.
    fn get_profile(&self, user_id: &str) -> impl Future<Output = Result<Profile>> + Send;

    fn update_profile(
        &self,
        user_id: &str,
        input: &UpdateProfileInput,
    ) -> impl Future<Output = Result<Profile>> + Send;
}
