use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tasksync_lib::application::services::{NetworkMonitor, SchedulerSettings};
use tasksync_lib::domain::entities::{CycleOutcome, Record, RecordFilter};
use tasksync_lib::domain::value_objects::{RecordPayload, TableName};
use tasksync_lib::infrastructure::database::ConnectionPool;
use tasksync_lib::infrastructure::offline::SqliteOfflineStore;
use tasksync_lib::{AppState, SyncComponents};

use super::mocks::InMemoryRemote;

pub struct EngineHarness {
    pub state: AppState,
    pub store: Arc<SqliteOfflineStore>,
    pub remote: Arc<InMemoryRemote>,
    pub monitor: Arc<NetworkMonitor>,
}

pub async fn memory_store() -> (Arc<SqliteOfflineStore>, ConnectionPool) {
    let pool = ConnectionPool::from_memory().await.expect("in-memory sqlite");
    pool.migrate().await.expect("migrations");
    (Arc::new(SqliteOfflineStore::new(pool.clone())), pool)
}

pub fn tasks() -> TableName {
    TableName::new("tasks".to_string()).expect("table name")
}

pub fn payload(title: &str) -> RecordPayload {
    RecordPayload::new(json!({ "title": title })).expect("payload")
}

pub fn title_of(record: &Record) -> String {
    record.payload.as_json()["title"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

pub fn manual_settings(max_retry: u32) -> SchedulerSettings {
    SchedulerSettings {
        auto_sync: false,
        sync_on_start: false,
        interval: Duration::from_secs(300),
        max_retry,
        backoff_base: Duration::from_secs(30),
        backoff_cap: Duration::from_secs(300),
        tables: vec![tasks()],
    }
}

pub async fn start_engine(
    store: Arc<SqliteOfflineStore>,
    remote: Arc<InMemoryRemote>,
    online: bool,
    settings: SchedulerSettings,
) -> EngineHarness {
    let monitor = Arc::new(NetworkMonitor::new(online, None, 1_500));
    let state = AppState::start(SyncComponents {
        store: store.clone(),
        log: store.clone(),
        checkpoints: store.clone(),
        remote: remote.clone(),
        monitor: monitor.clone(),
        settings,
    })
    .await
    .expect("engine start");

    EngineHarness {
        state,
        store,
        remote,
        monitor,
    }
}

impl EngineHarness {
    pub async fn pending_count(&self) -> u64 {
        self.state
            .access
            .status()
            .await
            .expect("engine status")
            .pending_count
    }

    pub async fn visible(&self) -> Vec<Record> {
        self.state
            .access
            .read(&tasks(), &RecordFilter::default())
            .await
            .expect("read local records")
    }

    pub async fn sync(&self) -> CycleOutcome {
        self.state.scheduler.sync_now().await.expect("sync cycle")
    }

    /// キューが空になるまで手動同期を繰り返す。
    pub async fn sync_until_drained(&self, max_cycles: usize) {
        for _ in 0..max_cycles {
            self.sync().await;
            if self.pending_count().await == 0 {
                return;
            }
        }
        panic!("pending actions remained after {max_cycles} cycles");
    }
}

pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if condition().await {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within 5s");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
