use crate::shared::error::AppError;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// 到達できた場合は往復時間を返す。
    async fn probe(&self) -> Result<Duration, AppError>;
}
