use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load_checkpoint(&self) -> Result<Option<DateTime<Utc>>, AppError>;
    async fn store_checkpoint(&self, checkpoint: DateTime<Utc>) -> Result<(), AppError>;
}
