use super::rows::{LocalRecordRow, PendingActionRow};
use crate::domain::entities::{PendingAction, Record, RecordSnapshot};
use crate::domain::value_objects::{
    ActionKind, PendingActionId, RecordId, RecordPayload, SyncStatus, TableName,
};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};

pub(super) fn timestamp_from_millis(value: i64, field: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::<Utc>::from_timestamp_millis(value)
        .ok_or_else(|| AppError::DeserializationError(format!("Invalid {field} timestamp")))
}

pub(super) fn record_from_row(row: LocalRecordRow) -> Result<Record, AppError> {
    let sync_status = SyncStatus::from_str(&row.sync_status).ok_or_else(|| {
        AppError::DeserializationError(format!("Unknown sync status: {}", row.sync_status))
    })?;

    Ok(Record {
        id: RecordId::new(row.record_id).map_err(AppError::DeserializationError)?,
        table: TableName::new(row.table_name).map_err(AppError::DeserializationError)?,
        offline_id: row
            .offline_id
            .map(RecordId::new)
            .transpose()
            .map_err(AppError::DeserializationError)?,
        payload: RecordPayload::from_json_str(&row.payload)
            .map_err(AppError::DeserializationError)?,
        completed: row.completed,
        created_at: timestamp_from_millis(row.created_at, "created_at")?,
        updated_at: timestamp_from_millis(row.updated_at, "updated_at")?,
        needs_sync: row.needs_sync,
        sync_status,
        is_deleted: row.is_deleted,
        last_error: row.last_error,
    })
}

pub(super) fn action_from_row(row: PendingActionRow) -> Result<PendingAction, AppError> {
    let kind = ActionKind::from_str(&row.action_kind).ok_or_else(|| {
        AppError::DeserializationError(format!("Unknown action kind: {}", row.action_kind))
    })?;

    Ok(PendingAction {
        id: PendingActionId::new(row.id).map_err(AppError::DeserializationError)?,
        kind,
        table: TableName::new(row.target_table).map_err(AppError::DeserializationError)?,
        record_id: RecordId::new(row.record_id).map_err(AppError::DeserializationError)?,
        snapshot: snapshot_from_json(&row.payload)?,
        retry_count: u32::try_from(row.retry_count.max(0)).unwrap_or(u32::MAX),
        last_error: row.last_error,
        created_at: timestamp_from_millis(row.created_at, "created_at")?,
        updated_at: timestamp_from_millis(row.updated_at, "updated_at")?,
    })
}

/// delete アクションは空オブジェクトとして保存する。
pub(super) fn snapshot_to_json(snapshot: Option<&RecordSnapshot>) -> Result<String, AppError> {
    match snapshot {
        Some(snapshot) => serde_json::to_string(snapshot)
            .map_err(|err| AppError::SerializationError(err.to_string())),
        None => Ok("{}".to_string()),
    }
}

fn snapshot_from_json(json: &str) -> Result<Option<RecordSnapshot>, AppError> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|err| AppError::DeserializationError(err.to_string()))?;
    if value.as_object().is_some_and(|map| map.is_empty()) {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|err| AppError::DeserializationError(err.to_string()))
}
