use crate::domain::entities::{RecordSnapshot, RemoteRecord};
use crate::domain::value_objects::{RecordId, TableName};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 正規ストアへの薄いアダプタ。リトライはスケジューラ側の責務で、ここでは行わない。
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// 正規の識別子を持つレコードを返す。
    async fn insert(
        &self,
        table: &TableName,
        offline_id: &RecordId,
        snapshot: &RecordSnapshot,
    ) -> Result<RemoteRecord, AppError>;
    async fn update(
        &self,
        table: &TableName,
        id: &RecordId,
        patch: &RecordSnapshot,
    ) -> Result<(), AppError>;
    async fn delete(&self, table: &TableName, id: &RecordId) -> Result<(), AppError>;
    /// 採番前のレコードは offline_id 列でしか特定できない。
    async fn delete_by_offline_id(
        &self,
        table: &TableName,
        offline_id: &RecordId,
    ) -> Result<(), AppError>;
    /// `since` 以降に更新されたレコード。None なら全件。
    async fn select_since(
        &self,
        table: &TableName,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteRecord>, AppError>;
}
