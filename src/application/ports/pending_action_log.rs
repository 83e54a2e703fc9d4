use crate::domain::entities::{PendingAction, PendingActionDraft};
use crate::domain::value_objects::{PendingActionId, RecordId, TableName};
use crate::shared::error::AppError;
use async_trait::async_trait;

/// 未送信ミューテーションの永続キュー。追加順がそのままリプレイ順になる。
#[async_trait]
pub trait PendingActionLog: Send + Sync {
    async fn enqueue(&self, draft: PendingActionDraft) -> Result<PendingAction, AppError>;
    async fn peek_all(&self) -> Result<Vec<PendingAction>, AppError>;
    async fn remove(&self, id: PendingActionId) -> Result<(), AppError>;
    /// 加算後の retry_count を返す。
    async fn increment_retry(&self, id: PendingActionId, error: &str) -> Result<u32, AppError>;
    async fn count(&self) -> Result<u64, AppError>;
    async fn has_pending_for(&self, table: &TableName, id: &RecordId) -> Result<bool, AppError>;
}
