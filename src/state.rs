use crate::application::ports::{
    CheckpointStore, LocalStore, PendingActionLog, ReachabilityProbe, RemoteClient,
};
use crate::application::services::{
    NetworkMonitor, RecordAccessService, SchedulerSettings, SyncCycleRunner, SyncScheduler,
    SyncSchedulerHandle,
};
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::network::HttpReachabilityProbe;
use crate::infrastructure::offline::{OfflineRecoveryJob, RecoveryReport, SqliteOfflineStore, SyncMetrics};
use crate::infrastructure::remote::HttpRemoteClient;
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// 同期エンジンを組み立てるための部品一式。テストでは差し替えて使う。
pub struct SyncComponents {
    pub store: Arc<dyn LocalStore>,
    pub log: Arc<dyn PendingActionLog>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub remote: Arc<dyn RemoteClient>,
    pub monitor: Arc<NetworkMonitor>,
    pub settings: SchedulerSettings,
}

#[derive(Default)]
struct BackgroundTasks {
    scheduler: Option<JoinHandle<()>>,
    probe: Option<JoinHandle<()>>,
}

/// アプリケーション全体の状態を管理する構造体
#[derive(Clone)]
pub struct AppState {
    pub access: Arc<RecordAccessService>,
    pub monitor: Arc<NetworkMonitor>,
    pub scheduler: SyncSchedulerHandle,
    pub metrics: Arc<SyncMetrics>,
    pub recovery_report: RecoveryReport,
    pool: Option<ConnectionPool>,
    tasks: Arc<Mutex<BackgroundTasks>>,
}

impl AppState {
    pub async fn initialize(config: AppConfig) -> Result<Self, AppError> {
        config.validate().map_err(AppError::ConfigurationError)?;

        let pool = ConnectionPool::new(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(config.database.connection_timeout),
        )
        .await?;
        pool.migrate().await?;

        let store = Arc::new(SqliteOfflineStore::new(pool.clone()));
        let remote: Arc<dyn RemoteClient> = Arc::new(HttpRemoteClient::from_config(&config.remote)?);
        let probe = HttpReachabilityProbe::from_config(&config.network)?
            .map(|probe| Arc::new(probe) as Arc<dyn ReachabilityProbe>);
        let monitor = Arc::new(NetworkMonitor::from_config(&config.network, probe));
        let settings = SchedulerSettings::from_config(&config.sync)?;

        let mut state = Self::start(SyncComponents {
            store: store.clone(),
            log: store.clone(),
            checkpoints: store,
            remote,
            monitor,
            settings,
        })
        .await?;
        state.pool = Some(pool);

        if let Some(probe_task) = state
            .monitor
            .spawn_probe_loop(config.network.probe_interval())
        {
            state.tasks.lock().await.probe = Some(probe_task);
        }

        Ok(state)
    }

    /// 起動時回復を済ませてからスケジューラを起動する。
    pub async fn start(components: SyncComponents) -> Result<Self, AppError> {
        let SyncComponents {
            store,
            log,
            checkpoints,
            remote,
            monitor,
            settings,
        } = components;

        let recovery = OfflineRecoveryJob::new(Arc::clone(&store), Arc::clone(&log));
        let recovery_report = recovery.run().await?;

        let metrics = Arc::new(SyncMetrics::new());
        let runner = SyncCycleRunner::new(
            Arc::clone(&store),
            Arc::clone(&log),
            Arc::clone(&checkpoints),
            remote,
            Arc::clone(&monitor),
            settings,
        );
        let (scheduler, scheduler_task) =
            SyncScheduler::new(runner, Arc::clone(&monitor), Arc::clone(&metrics)).spawn();

        let access = Arc::new(RecordAccessService::new(
            store,
            log,
            checkpoints,
            Arc::clone(&monitor),
            Some(scheduler.clone()),
        ));

        Ok(Self {
            access,
            monitor,
            scheduler,
            metrics,
            recovery_report,
            pool: None,
            tasks: Arc::new(Mutex::new(BackgroundTasks {
                scheduler: Some(scheduler_task),
                probe: None,
            })),
        })
    }

    /// 実行中のサイクルは最後まで走らせてから停止する。
    pub async fn shutdown(&self) {
        let (scheduler_task, probe_task) = {
            let mut tasks = self.tasks.lock().await;
            (tasks.scheduler.take(), tasks.probe.take())
        };

        if let Some(probe_task) = probe_task {
            probe_task.abort();
        }

        self.scheduler.shutdown().await;
        if let Some(scheduler_task) = scheduler_task
            && let Err(err) = scheduler_task.await
        {
            tracing::error!(target: "sync::scheduler", error = %err, "scheduler task panicked");
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
        tracing::info!("sync engine stopped");
    }
}
