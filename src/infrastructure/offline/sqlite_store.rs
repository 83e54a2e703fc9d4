use super::mappers::{action_from_row, record_from_row, snapshot_to_json};
use super::queries::{
    COUNT_PENDING_ACTIONS, COUNT_RECORDS_BY_STATUS, DELETE_PENDING_ACTION, DELETE_RECORD,
    EXISTS_PENDING_FOR_RECORD, INCREMENT_ACTION_RETRY, INSERT_PENDING_ACTION, RENAME_ACTION_TARGET,
    RENAME_RECORD, RESET_SYNCING_RECORDS, SELECT_CHECKPOINT, SELECT_KNOWN_TABLES, SELECT_PROMOTED_ID,
    SELECT_PENDING_ACTIONS, SELECT_RECORD_BY_ID, SELECT_RECORDS_BY_TABLE,
    SELECT_UNSYNCED_RECORDS, UPDATE_SYNC_STATE, UPSERT_CHECKPOINT, UPSERT_LOCAL_RECORD,
    UPSERT_REMOTE_RECORD,
};
use super::rows::{LocalRecordRow, PendingActionRow};
use crate::application::ports::{CheckpointStore, LocalStore, PendingActionLog};
use crate::domain::entities::{PendingAction, PendingActionDraft, Record, RecordFilter};
use crate::domain::value_objects::{PendingActionId, RecordId, SyncStatus, TableName};
use crate::infrastructure::database::ConnectionPool;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};

const GLOBAL_CHECKPOINT_SCOPE: &str = "global";

/// ローカルストア・ペンディングアクションログ・チェックポイントを同じ SQLite に保持する。
#[derive(Clone)]
pub struct SqliteOfflineStore {
    pool: ConnectionPool,
}

impl SqliteOfflineStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    async fn upsert_local_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        record: &Record,
    ) -> Result<(), AppError> {
        let payload = serde_json::to_string(record.payload.as_json())?;
        sqlx::query(UPSERT_LOCAL_RECORD)
            .bind(record.table.as_str())
            .bind(record.id.as_str())
            .bind(record.offline_id.as_ref().map(|id| id.as_str()))
            .bind(payload)
            .bind(record.completed)
            .bind(record.created_at.timestamp_millis())
            .bind(record.updated_at.timestamp_millis())
            .bind(record.needs_sync)
            .bind(record.sync_status.as_str())
            .bind(record.is_deleted)
            .bind(record.last_error.as_deref())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn insert_action_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        draft: PendingActionDraft,
    ) -> Result<PendingAction, AppError> {
        let now = Utc::now();
        let payload = snapshot_to_json(draft.snapshot.as_ref())?;
        let result = sqlx::query(INSERT_PENDING_ACTION)
            .bind(draft.kind.as_str())
            .bind(draft.table.as_str())
            .bind(draft.record_id.as_str())
            .bind(payload)
            .bind(now.timestamp_millis())
            .execute(&mut **tx)
            .await?;

        let id = PendingActionId::new(result.last_insert_rowid()).map_err(AppError::Internal)?;

        Ok(PendingAction {
            id,
            kind: draft.kind,
            table: draft.table,
            record_id: draft.record_id,
            snapshot: draft.snapshot,
            retry_count: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        })
    }
}

#[async_trait]
impl LocalStore for SqliteOfflineStore {
    async fn get(&self, table: &TableName, id: &RecordId) -> Result<Option<Record>, AppError> {
        let row = sqlx::query_as::<_, LocalRecordRow>(SELECT_RECORD_BY_ID)
            .bind(table.as_str())
            .bind(id.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(record_from_row).transpose()
    }

    async fn list(
        &self,
        table: &TableName,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>, AppError> {
        let limit = filter.limit.map(i64::from).unwrap_or(-1);
        let rows = sqlx::query_as::<_, LocalRecordRow>(SELECT_RECORDS_BY_TABLE)
            .bind(table.as_str())
            .bind(filter.completed)
            .bind(filter.sync_status.map(|status| status.as_str()))
            .bind(limit)
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn list_unsynced(&self) -> Result<Vec<Record>, AppError> {
        let rows = sqlx::query_as::<_, LocalRecordRow>(SELECT_UNSYNCED_RECORDS)
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn tables(&self) -> Result<Vec<TableName>, AppError> {
        let names: Vec<(String,)> = sqlx::query_as(SELECT_KNOWN_TABLES)
            .fetch_all(self.pool.get_pool())
            .await?;

        names
            .into_iter()
            .map(|(name,)| TableName::new(name).map_err(AppError::DeserializationError))
            .collect()
    }

    async fn write_with_action(
        &self,
        record: &Record,
        draft: PendingActionDraft,
    ) -> Result<PendingAction, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;

        // 読み出し後にスケジューラが識別子を付け替えていた場合は新しい識別子に書き込む
        let promoted: Option<(String,)> = sqlx::query_as(SELECT_PROMOTED_ID)
            .bind(record.table.as_str())
            .bind(record.id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let mut record = record.clone();
        let mut draft = draft;
        if let Some((promoted_id,)) = promoted {
            let promoted_id = RecordId::new(promoted_id).map_err(AppError::DeserializationError)?;
            record.id = promoted_id.clone();
            draft.record_id = promoted_id;
        }

        Self::upsert_local_in_tx(&mut tx, &record).await?;
        let action = Self::insert_action_in_tx(&mut tx, draft).await?;
        tx.commit().await?;
        Ok(action)
    }

    async fn upsert_remote(&self, record: &Record) -> Result<(), AppError> {
        let payload = serde_json::to_string(record.payload.as_json())?;
        sqlx::query(UPSERT_REMOTE_RECORD)
            .bind(record.table.as_str())
            .bind(record.id.as_str())
            .bind(record.offline_id.as_ref().map(|id| id.as_str()))
            .bind(payload)
            .bind(record.completed)
            .bind(record.created_at.timestamp_millis())
            .bind(record.updated_at.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn set_sync_state(
        &self,
        table: &TableName,
        id: &RecordId,
        status: SyncStatus,
        needs_sync: bool,
        last_error: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(UPDATE_SYNC_STATE)
            .bind(table.as_str())
            .bind(id.as_str())
            .bind(status.as_str())
            .bind(needs_sync)
            .bind(last_error)
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn promote_identifier(
        &self,
        table: &TableName,
        from: &RecordId,
        to: &RecordId,
    ) -> Result<(), AppError> {
        if from == to {
            return Ok(());
        }

        let mut tx = self.pool.get_pool().begin().await?;
        // 先にプルされた同一レコードがあれば、キューを持つローカル側を残す
        sqlx::query(DELETE_RECORD)
            .bind(table.as_str())
            .bind(to.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query(RENAME_RECORD)
            .bind(table.as_str())
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query(RENAME_ACTION_TARGET)
            .bind(table.as_str())
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn purge(&self, table: &TableName, id: &RecordId) -> Result<(), AppError> {
        sqlx::query(DELETE_RECORD)
            .bind(table.as_str())
            .bind(id.as_str())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn reset_syncing(&self) -> Result<u64, AppError> {
        let result = sqlx::query(RESET_SYNCING_RECORDS)
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_by_status(&self, status: SyncStatus) -> Result<u64, AppError> {
        let (count,): (i64,) = sqlx::query_as(COUNT_RECORDS_BY_STATUS)
            .bind(status.as_str())
            .fetch_one(self.pool.get_pool())
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl PendingActionLog for SqliteOfflineStore {
    async fn enqueue(&self, draft: PendingActionDraft) -> Result<PendingAction, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        let action = Self::insert_action_in_tx(&mut tx, draft).await?;
        tx.commit().await?;
        Ok(action)
    }

    async fn peek_all(&self) -> Result<Vec<PendingAction>, AppError> {
        let rows = sqlx::query_as::<_, PendingActionRow>(SELECT_PENDING_ACTIONS)
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(action_from_row).collect()
    }

    async fn remove(&self, id: PendingActionId) -> Result<(), AppError> {
        sqlx::query(DELETE_PENDING_ACTION)
            .bind(id.value())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn increment_retry(&self, id: PendingActionId, error: &str) -> Result<u32, AppError> {
        let row: Option<(i64,)> = sqlx::query_as(INCREMENT_ACTION_RETRY)
            .bind(id.value())
            .bind(error)
            .bind(Utc::now().timestamp_millis())
            .fetch_optional(self.pool.get_pool())
            .await?;

        match row {
            Some((retry_count,)) => Ok(u32::try_from(retry_count.max(0)).unwrap_or(u32::MAX)),
            None => Err(AppError::NotFound(format!("Pending action {id}"))),
        }
    }

    async fn count(&self) -> Result<u64, AppError> {
        let (count,): (i64,) = sqlx::query_as(COUNT_PENDING_ACTIONS)
            .fetch_one(self.pool.get_pool())
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn has_pending_for(&self, table: &TableName, id: &RecordId) -> Result<bool, AppError> {
        let (exists,): (bool,) = sqlx::query_as(EXISTS_PENDING_FOR_RECORD)
            .bind(table.as_str())
            .bind(id.as_str())
            .fetch_one(self.pool.get_pool())
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl CheckpointStore for SqliteOfflineStore {
    async fn load_checkpoint(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        let row: Option<(String,)> = sqlx::query_as(SELECT_CHECKPOINT)
            .bind(GLOBAL_CHECKPOINT_SCOPE)
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(|(value,)| {
            DateTime::parse_from_rfc3339(&value)
                .map(|parsed| parsed.with_timezone(&Utc))
                .map_err(|err| AppError::DeserializationError(err.to_string()))
        })
        .transpose()
    }

    async fn store_checkpoint(&self, checkpoint: DateTime<Utc>) -> Result<(), AppError> {
        let now = Utc::now().timestamp_millis();
        // 書き戻しは常に単一行の上書き
        sqlx::query(UPSERT_CHECKPOINT)
            .bind(GLOBAL_CHECKPOINT_SCOPE)
            .bind(checkpoint.to_rfc3339())
            .bind(now)
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }
}
