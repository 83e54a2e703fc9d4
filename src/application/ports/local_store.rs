use crate::domain::entities::{PendingAction, PendingActionDraft, Record, RecordFilter};
use crate::domain::value_objects::{RecordId, SyncStatus, TableName};
use crate::shared::error::AppError;
use async_trait::async_trait;

/// レコードと同期メタデータを保持する永続キャッシュ。ネットワークを一切知らない。
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// 識別子または offline_id で解決する。トゥームストーンも返す。
    async fn get(&self, table: &TableName, id: &RecordId) -> Result<Option<Record>, AppError>;
    /// トゥームストーンを除いたレコード一覧。
    async fn list(&self, table: &TableName, filter: &RecordFilter)
    -> Result<Vec<Record>, AppError>;
    /// needs_sync が立っているレコード（トゥームストーンを含む）。
    async fn list_unsynced(&self) -> Result<Vec<Record>, AppError>;
    async fn tables(&self) -> Result<Vec<TableName>, AppError>;
    /// レコードの upsert とペンディングアクションの追加を一つのトランザクションで行う。
    async fn write_with_action(
        &self,
        record: &Record,
        draft: PendingActionDraft,
    ) -> Result<PendingAction, AppError>;
    /// リモート由来のレコードを反映する。needs_sync は立てない。
    async fn upsert_remote(&self, record: &Record) -> Result<(), AppError>;
    async fn set_sync_state(
        &self,
        table: &TableName,
        id: &RecordId,
        status: SyncStatus,
        needs_sync: bool,
        last_error: Option<&str>,
    ) -> Result<(), AppError>;
    /// offline 識別子をリモートの正規識別子に付け替える（キュー上の参照も含む）。
    async fn promote_identifier(
        &self,
        table: &TableName,
        from: &RecordId,
        to: &RecordId,
    ) -> Result<(), AppError>;
    async fn purge(&self, table: &TableName, id: &RecordId) -> Result<(), AppError>;
    /// syncing のまま残ったレコードを pending に戻す。戻した件数を返す。
    async fn reset_syncing(&self) -> Result<u64, AppError>;
    async fn count_by_status(&self, status: SyncStatus) -> Result<u64, AppError>;
}
