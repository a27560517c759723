use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::{DaybookError, Result};
use crate::model::{validate_work_memo_input, WorkMemo, WorkMemoInput};
use crate::storage::StorageBackend;

/// Reject `date` when the user already has a work memo for it, unless that
/// memo is the one being edited.
pub async fn ensure_unique_memo_date(
    storage: &impl StorageBackend,
    user_id: &str,
    date: NaiveDate,
    editing: Option<Uuid>,
) -> Result<()> {
    match storage.find_work_memo_by_date(user_id, date).await? {
        Some(existing) if Some(existing.id) != editing => {
            tracing::debug!(%date, existing = %existing.id, "duplicate work memo date");
            Err(duplicate_date(date))
        }
        _ => Ok(()),
    }
}

fn duplicate_date(date: NaiveDate) -> DaybookError {
    DaybookError::Conflict(format!("a work memo already exists for {date}"))
}

/// Validate, probe for a duplicate date, then insert.
pub async fn create_work_memo(
    storage: &impl StorageBackend,
    user_id: &str,
    input: WorkMemoInput,
) -> Result<WorkMemo> {
    validate_work_memo_input(&input)?;
    ensure_unique_memo_date(storage, user_id, input.date, None).await?;
    let memo = WorkMemo::new(user_id, input);
    storage
        .save_work_memo(&memo)
        .await
        .map_err(|e| conflict_as_duplicate(e, memo.date))?;
    Ok(memo)
}

/// Validate, probe only when the date changes, then update.
pub async fn update_work_memo(
    storage: &impl StorageBackend,
    user_id: &str,
    id: Uuid,
    input: WorkMemoInput,
) -> Result<WorkMemo> {
    validate_work_memo_input(&input)?;
    let current = storage.get_work_memo(user_id, id).await?;
    if current.date != input.date {
        ensure_unique_memo_date(storage, user_id, input.date, Some(id)).await?;
    }
    let date = input.date;
    storage
        .update_work_memo(user_id, id, &input)
        .await
        .map_err(|e| conflict_as_duplicate(e, date))
}

// A racing insert that slips past the probe hits the unique constraint.
fn conflict_as_duplicate(err: DaybookError, date: NaiveDate) -> DaybookError {
    match err {
        DaybookError::Conflict(_) => duplicate_date(date),
        other => other,
    }
}
