use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CycleResultStatus {
    Success,
    Failure,
    Aborted,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetricsSnapshot {
    pub total_success: u64,
    pub total_failure: u64,
    pub total_aborted: u64,
    pub consecutive_failure: u64,
    pub last_success_ms: Option<u64>,
    pub last_failure_ms: Option<u64>,
    pub last_outcome: Option<CycleResultStatus>,
    pub last_trigger: Option<String>,
    pub last_error: Option<String>,
    pub last_backoff_ms: Option<u64>,
    pub last_duration_ms: Option<u64>,
    pub last_pushed_count: Option<u32>,
    pub last_pulled_count: Option<u32>,
    pub last_dropped_count: Option<u32>,
    pub last_timestamp_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CycleMetadata {
    pub trigger: Option<String>,
    pub error: Option<String>,
    pub backoff_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub pushed_count: Option<u32>,
    pub pulled_count: Option<u32>,
    pub dropped_count: Option<u32>,
    pub timestamp_ms: Option<u64>,
}

#[derive(Default, Clone)]
struct LastCycleMetadata {
    last_outcome: Option<CycleResultStatus>,
    trigger: Option<String>,
    error: Option<String>,
    backoff_ms: Option<u64>,
    duration_ms: Option<u64>,
    pushed_count: Option<u32>,
    pulled_count: Option<u32>,
    dropped_count: Option<u32>,
    timestamp_ms: Option<u64>,
}

/// 同期サイクルの結果を集計する。スケジューラごとに一つ持つ。
pub struct SyncMetrics {
    success: AtomicU64,
    failure: AtomicU64,
    aborted: AtomicU64,
    consecutive_failure: AtomicU64,
    last_success_ms: AtomicU64,
    last_failure_ms: AtomicU64,
    metadata: Mutex<LastCycleMetadata>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            success: AtomicU64::new(0),
            failure: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
            consecutive_failure: AtomicU64::new(0),
            last_success_ms: AtomicU64::new(0),
            last_failure_ms: AtomicU64::new(0),
            metadata: Mutex::new(LastCycleMetadata::default()),
        }
    }

    pub fn record(&self, status: CycleResultStatus, meta: &CycleMetadata) -> SyncMetricsSnapshot {
        match status {
            CycleResultStatus::Success => {
                self.success.fetch_add(1, Ordering::Relaxed);
                self.last_success_ms
                    .store(current_unix_ms(), Ordering::Relaxed);
                self.consecutive_failure.store(0, Ordering::Relaxed);
            }
            CycleResultStatus::Failure => {
                self.failure.fetch_add(1, Ordering::Relaxed);
                self.last_failure_ms
                    .store(current_unix_ms(), Ordering::Relaxed);
                self.consecutive_failure.fetch_add(1, Ordering::Relaxed);
            }
            // 切断による中断は失敗として数えない
            CycleResultStatus::Aborted => {
                self.aborted.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Ok(mut guard) = self.metadata.lock() {
            guard.last_outcome = Some(status);
            guard.trigger = meta.trigger.clone();
            guard.error = meta.error.clone();
            guard.backoff_ms = meta.backoff_ms;
            guard.duration_ms = meta.duration_ms;
            guard.pushed_count = meta.pushed_count;
            guard.pulled_count = meta.pulled_count;
            guard.dropped_count = meta.dropped_count;
            guard.timestamp_ms = meta.timestamp_ms.or_else(|| Some(current_unix_ms()));
        }

        self.snapshot()
    }

    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        let metadata = self
            .metadata
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|_| LastCycleMetadata::default());

        SyncMetricsSnapshot {
            total_success: self.success.load(Ordering::Relaxed),
            total_failure: self.failure.load(Ordering::Relaxed),
            total_aborted: self.aborted.load(Ordering::Relaxed),
            consecutive_failure: self.consecutive_failure.load(Ordering::Relaxed),
            last_success_ms: to_option(self.last_success_ms.load(Ordering::Relaxed)),
            last_failure_ms: to_option(self.last_failure_ms.load(Ordering::Relaxed)),
            last_outcome: metadata.last_outcome,
            last_trigger: metadata.trigger,
            last_error: metadata.error,
            last_backoff_ms: metadata.backoff_ms,
            last_duration_ms: metadata.duration_ms,
            last_pushed_count: metadata.pushed_count,
            last_pulled_count: metadata.pulled_count,
            last_dropped_count: metadata.dropped_count,
            last_timestamp_ms: metadata.timestamp_ms,
        }
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn to_option(value: u64) -> Option<u64> {
    if value == 0 { None } else { Some(value) }
}

fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}
