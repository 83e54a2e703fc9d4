use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 同期サイクルを起動した要因。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Startup,
    Periodic,
    Reconnected,
    LocalWrite,
    Manual,
    BackoffRetry,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::Startup => "startup",
            SyncTrigger::Periodic => "periodic",
            SyncTrigger::Reconnected => "reconnected",
            SyncTrigger::LocalWrite => "local_write",
            SyncTrigger::Manual => "manual",
            SyncTrigger::BackoffRetry => "backoff_retry",
        }
    }
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncReport {
    pub pushed_count: u32,
    pub retried_count: u32,
    pub dropped_count: u32,
    pub pulled_count: u32,
    pub skipped_count: u32,
    pub pending_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// ネットワーク操作の直前にオフラインを検知した
    Disconnected,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed {
        report: SyncReport,
        checkpoint: DateTime<Utc>,
    },
    Aborted {
        reason: AbortReason,
        report: SyncReport,
    },
    /// 実行中のサイクルに吸収されたトリガー
    Coalesced,
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            CycleOutcome::Completed { report, .. } | CycleOutcome::Aborted { report, .. } => {
                Some(report)
            }
            CycleOutcome::Coalesced => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, CycleOutcome::Completed { .. })
    }
}
