use super::core::SyncCycleRunner;
use super::settings::backoff_delay;
use crate::application::services::network_monitor::NetworkMonitor;
use crate::domain::entities::{AbortReason, CycleOutcome, SyncReport, SyncTrigger};
use crate::domain::value_objects::ConnectionEvent;
use crate::infrastructure::offline::{
    CycleMetadata, CycleResultStatus, SyncMetrics, SyncMetricsSnapshot,
};
use crate::shared::error::AppError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const COMMAND_CHANNEL_CAPACITY: usize = 16;

type CycleResponder = oneshot::Sender<Result<CycleOutcome, AppError>>;

enum SchedulerCommand {
    Run {
        trigger: SyncTrigger,
        respond_to: Option<CycleResponder>,
    },
    Shutdown,
}

/// サイクル後に溜まっていた要求の処理結果。
enum QueuedRequests {
    Shutdown,
    Answered { local_write: bool },
}

#[derive(Default)]
struct SchedulerShared {
    in_progress: AtomicBool,
    consecutive_failures: AtomicU32,
}

/// 同期サイクルを単一のループで直列に実行するスケジューラ。
///
/// トリガー（定期タイマー・再接続イベント・明示的な要求）はすべてこのループに集約される。
/// サイクル実行中に届いた要求は実行後にまとめて `Coalesced` として応答する。
pub struct SyncScheduler {
    runner: SyncCycleRunner,
    monitor: Arc<NetworkMonitor>,
    metrics: Arc<SyncMetrics>,
    shared: Arc<SchedulerShared>,
}

impl SyncScheduler {
    pub fn new(
        runner: SyncCycleRunner,
        monitor: Arc<NetworkMonitor>,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            runner,
            monitor,
            metrics,
            shared: Arc::new(SchedulerShared::default()),
        }
    }

    pub fn spawn(self) -> (SyncSchedulerHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let events = self.monitor.subscribe();
        let handle = SyncSchedulerHandle {
            commands: commands_tx,
            shared: Arc::clone(&self.shared),
            metrics: Arc::clone(&self.metrics),
        };
        let task = tokio::spawn(self.run(commands_rx, events));
        (handle, task)
    }

    async fn run(
        self,
        mut commands: mpsc::Receiver<SchedulerCommand>,
        mut events: broadcast::Receiver<ConnectionEvent>,
    ) {
        let settings = self.runner.settings().clone();
        let mut ticker = tokio::time::interval_at(Instant::now() + settings.interval, settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut backoff_until: Option<Instant> = None;
        let mut events_open = true;
        let mut follow_up = false;

        tracing::info!(
            target: "sync::scheduler",
            interval_secs = settings.interval.as_secs(),
            auto_sync = settings.auto_sync,
            max_retry = settings.max_retry,
            "sync scheduler started"
        );

        if settings.sync_on_start && self.monitor.is_online() {
            self.execute(SyncTrigger::Startup, None, &mut backoff_until)
                .await;
            ticker.reset();
        }

        loop {
            let (trigger, respond_to) = if std::mem::take(&mut follow_up) {
                (SyncTrigger::LocalWrite, None)
            } else {
                tokio::select! {
                    command = commands.recv() => match command {
                        Some(SchedulerCommand::Run { trigger, respond_to }) => (trigger, respond_to),
                        Some(SchedulerCommand::Shutdown) | None => break,
                    },
                    event = events.recv(), if events_open => match event {
                        Ok(ConnectionEvent::Reconnected) => (SyncTrigger::Reconnected, None),
                        Ok(ConnectionEvent::Disconnected) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(target: "sync::scheduler", skipped, "connection events lagged");
                            if !self.monitor.is_online() {
                                continue;
                            }
                            (SyncTrigger::Reconnected, None)
                        }
                        Err(RecvError::Closed) => {
                            events_open = false;
                            continue;
                        }
                    },
                    _ = wait_until(backoff_until) => (SyncTrigger::BackoffRetry, None),
                    _ = ticker.tick(), if settings.auto_sync => {
                        // バックオフ中は定期トリガーを見送る
                        if backoff_until.is_some() {
                            continue;
                        }
                        (SyncTrigger::Periodic, None)
                    }
                }
            };

            self.execute(trigger, respond_to, &mut backoff_until).await;
            ticker.reset();

            match self.coalesce_queued(&mut commands) {
                QueuedRequests::Shutdown => break,
                // ピーク後に書き込まれたアクションを次の定期トリガーまで待たせない
                QueuedRequests::Answered { local_write } => {
                    follow_up = local_write
                        && backoff_until.is_none()
                        && self.has_queued_actions().await;
                }
            }
        }

        commands.close();
        while let Ok(command) = commands.try_recv() {
            if let SchedulerCommand::Run {
                respond_to: Some(respond_to),
                ..
            } = command
            {
                let _ = respond_to.send(Ok(CycleOutcome::Aborted {
                    reason: AbortReason::Shutdown,
                    report: SyncReport::default(),
                }));
            }
        }
        tracing::info!(target: "sync::scheduler", "sync scheduler stopped");
    }

    /// 実行中に積まれた要求をまとめて応答する。
    fn coalesce_queued(&self, commands: &mut mpsc::Receiver<SchedulerCommand>) -> QueuedRequests {
        let mut coalesced = 0usize;
        let mut local_write = false;
        while let Ok(command) = commands.try_recv() {
            match command {
                SchedulerCommand::Run {
                    trigger,
                    respond_to,
                } => {
                    coalesced += 1;
                    local_write |= trigger == SyncTrigger::LocalWrite;
                    if let Some(respond_to) = respond_to {
                        let _ = respond_to.send(Ok(CycleOutcome::Coalesced));
                    }
                }
                SchedulerCommand::Shutdown => return QueuedRequests::Shutdown,
            }
        }
        if coalesced > 0 {
            tracing::debug!(
                target: "sync::scheduler",
                coalesced,
                local_write,
                "coalesced queued sync requests"
            );
        }
        QueuedRequests::Answered { local_write }
    }

    async fn has_queued_actions(&self) -> bool {
        match self.runner.queued_action_count().await {
            Ok(count) => count > 0,
            Err(err) => {
                tracing::warn!(
                    target: "sync::scheduler",
                    error = %err,
                    "failed to count queued actions"
                );
                false
            }
        }
    }

    async fn execute(
        &self,
        trigger: SyncTrigger,
        respond_to: Option<CycleResponder>,
        backoff_until: &mut Option<Instant>,
    ) {
        if self.shared.in_progress.swap(true, Ordering::AcqRel) {
            if let Some(respond_to) = respond_to {
                let _ = respond_to.send(Ok(CycleOutcome::Coalesced));
            }
            return;
        }

        tracing::debug!(target: "sync::scheduler", trigger = trigger.as_str(), "sync cycle started");
        let started = std::time::Instant::now();
        let result = self.runner.run_cycle().await;
        self.shared.in_progress.store(false, Ordering::Release);

        let mut meta = CycleMetadata {
            trigger: Some(trigger.as_str().to_string()),
            duration_ms: Some(started.elapsed().as_millis() as u64),
            ..CycleMetadata::default()
        };

        match &result {
            Ok(CycleOutcome::Completed { report, .. }) => {
                self.shared.consecutive_failures.store(0, Ordering::Release);
                *backoff_until = None;
                fill_counts(&mut meta, report);
                self.metrics.record(CycleResultStatus::Success, &meta);
            }
            Ok(CycleOutcome::Aborted { report, .. }) => {
                // 再接続イベントが次のサイクルを起動する
                *backoff_until = None;
                fill_counts(&mut meta, report);
                self.metrics.record(CycleResultStatus::Aborted, &meta);
            }
            Ok(CycleOutcome::Coalesced) => {}
            Err(err) => {
                let failures = self
                    .shared
                    .consecutive_failures
                    .fetch_add(1, Ordering::AcqRel)
                    .saturating_add(1);
                let settings = self.runner.settings();
                let delay = backoff_delay(settings.backoff_base, settings.backoff_cap, failures);
                *backoff_until = Some(Instant::now() + delay);

                meta.error = Some(err.to_string());
                meta.backoff_ms = Some(delay.as_millis() as u64);
                self.metrics.record(CycleResultStatus::Failure, &meta);

                tracing::warn!(
                    target: "sync::scheduler",
                    trigger = trigger.as_str(),
                    consecutive_failures = failures,
                    backoff_ms = delay.as_millis() as u64,
                    error = %err,
                    "sync cycle failed"
                );
            }
        }

        if let Some(respond_to) = respond_to {
            let _ = respond_to.send(result);
        }
    }
}

fn fill_counts(meta: &mut CycleMetadata, report: &SyncReport) {
    meta.pushed_count = Some(report.pushed_count);
    meta.pulled_count = Some(report.pulled_count);
    meta.dropped_count = Some(report.dropped_count);
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// スケジューラへの送信口。複製して `RecordAccessService` やバイナリから使う。
#[derive(Clone)]
pub struct SyncSchedulerHandle {
    commands: mpsc::Sender<SchedulerCommand>,
    shared: Arc<SchedulerShared>,
    metrics: Arc<SyncMetrics>,
}

impl SyncSchedulerHandle {
    /// 完了を待たずに同期を要求する。キューが埋まっている場合は既存の要求に吸収される。
    pub fn request_sync(&self, trigger: SyncTrigger) -> bool {
        match self.commands.try_send(SchedulerCommand::Run {
            trigger,
            respond_to: None,
        }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!(
                    target: "sync::scheduler",
                    trigger = trigger.as_str(),
                    "sync request coalesced into queued requests"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(
                    target: "sync::scheduler",
                    trigger = trigger.as_str(),
                    "sync requested after scheduler stopped"
                );
                false
            }
        }
    }

    pub async fn sync_now(&self) -> Result<CycleOutcome, AppError> {
        self.run(SyncTrigger::Manual).await
    }

    pub async fn run(&self, trigger: SyncTrigger) -> Result<CycleOutcome, AppError> {
        let (respond_to, response) = oneshot::channel();
        self.commands
            .send(SchedulerCommand::Run {
                trigger,
                respond_to: Some(respond_to),
            })
            .await
            .map_err(|_| AppError::Internal("Sync scheduler is not running".to_string()))?;
        response.await.map_err(|_| {
            AppError::Internal("Sync scheduler stopped before finishing the cycle".to_string())
        })?
    }

    pub fn is_syncing(&self) -> bool {
        self.shared.in_progress.load(Ordering::Acquire)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.shared.consecutive_failures.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> SyncMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(SchedulerCommand::Shutdown).await;
    }
}
