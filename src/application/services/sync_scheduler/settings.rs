use crate::domain::value_objects::TableName;
use crate::shared::config::SyncConfig;
use crate::shared::error::AppError;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub auto_sync: bool,
    pub sync_on_start: bool,
    pub interval: Duration,
    pub max_retry: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// ローカルにまだ存在しなくても毎回プルするテーブル
    pub tables: Vec<TableName>,
}

impl SchedulerSettings {
    pub fn from_config(config: &SyncConfig) -> Result<Self, AppError> {
        let tables = config
            .tables
            .iter()
            .map(|name| TableName::new(name.clone()).map_err(AppError::ConfigurationError))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            auto_sync: config.auto_sync,
            sync_on_start: config.sync_on_start,
            interval: config.interval(),
            max_retry: config.max_retry.max(1),
            backoff_base: config.backoff_base(),
            backoff_cap: config.backoff_cap(),
            tables,
        })
    }
}

/// 連続失敗回数に比例した待ち時間（上限付き）。
pub fn backoff_delay(base: Duration, cap: Duration, consecutive_failures: u32) -> Duration {
    base.saturating_mul(consecutive_failures).min(cap)
}
