use crate::domain::value_objects::ConnectionQuality;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 表示・診断用の読み取り専用ステータス。エンジンの挙動には影響しない。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub is_online: bool,
    pub quality: ConnectionQuality,
    pub is_syncing: bool,
    pub pending_count: u64,
    pub failed_count: u64,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}
