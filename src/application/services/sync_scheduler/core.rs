use super::settings::SchedulerSettings;
use crate::application::ports::{CheckpointStore, LocalStore, PendingActionLog, RemoteClient};
use crate::application::services::network_monitor::NetworkMonitor;
use crate::domain::entities::{
    AbortReason, CycleOutcome, PendingAction, Record, RemoteRecord, SyncReport,
};
use crate::domain::value_objects::{ActionKind, RecordId, SyncStatus, TableName};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// 一回分の同期サイクル（プッシュ → プル）を実行する。
///
/// ローカルストアの失敗はサイクル全体の失敗として呼び出し側に返す。
/// リモートの失敗はアクション単位で閉じ込め、後続のアクションは処理を続ける。
pub struct SyncCycleRunner {
    store: Arc<dyn LocalStore>,
    log: Arc<dyn PendingActionLog>,
    checkpoints: Arc<dyn CheckpointStore>,
    remote: Arc<dyn RemoteClient>,
    monitor: Arc<NetworkMonitor>,
    settings: SchedulerSettings,
}

enum PushResult {
    Applied(Option<RemoteRecord>),
    Failed(AppError),
}

impl SyncCycleRunner {
    pub fn new(
        store: Arc<dyn LocalStore>,
        log: Arc<dyn PendingActionLog>,
        checkpoints: Arc<dyn CheckpointStore>,
        remote: Arc<dyn RemoteClient>,
        monitor: Arc<NetworkMonitor>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            log,
            checkpoints,
            remote,
            monitor,
            settings,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub async fn queued_action_count(&self) -> Result<u64, AppError> {
        self.log.count().await
    }

    pub async fn run_cycle(&self) -> Result<CycleOutcome, AppError> {
        let mut report = SyncReport::default();

        if !self.monitor.is_online() {
            return self.abort(AbortReason::Disconnected, report).await;
        }

        let checkpoint = self.checkpoints.load_checkpoint().await?;

        if let Some(reason) = self.push(&mut report).await? {
            return self.abort(reason, report).await;
        }

        let pull_started = Utc::now();
        if let Some(reason) = self.pull(checkpoint, &mut report).await? {
            return self.abort(reason, report).await;
        }

        self.checkpoints.store_checkpoint(pull_started).await?;
        report.pending_count = self.pending_count().await?;

        tracing::info!(
            target: "sync::scheduler",
            pushed = report.pushed_count,
            retried = report.retried_count,
            dropped = report.dropped_count,
            pulled = report.pulled_count,
            skipped = report.skipped_count,
            pending = report.pending_count,
            checkpoint = %pull_started,
            "sync cycle completed"
        );

        Ok(CycleOutcome::Completed {
            report,
            checkpoint: pull_started,
        })
    }

    async fn abort(
        &self,
        reason: AbortReason,
        mut report: SyncReport,
    ) -> Result<CycleOutcome, AppError> {
        let reverted = self.store.reset_syncing().await?;
        report.pending_count = self.pending_count().await?;
        tracing::info!(
            target: "sync::scheduler",
            reason = ?reason,
            reverted,
            pending = report.pending_count,
            "sync cycle aborted"
        );
        Ok(CycleOutcome::Aborted { reason, report })
    }

    async fn pending_count(&self) -> Result<u32, AppError> {
        let count = self.log.count().await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn push(&self, report: &mut SyncReport) -> Result<Option<AbortReason>, AppError> {
        let actions = self.log.peek_all().await?;
        // 同一サイクル内で採番されたレコードへの後続アクションは新しい識別子で送る
        let mut promoted: HashMap<(TableName, RecordId), RecordId> = HashMap::new();
        // 再送待ちになったレコードの後続アクションは次のサイクルまで送らない
        let mut deferred: HashSet<(TableName, RecordId)> = HashSet::new();

        for action in actions {
            if !self.monitor.is_online() {
                return Ok(Some(AbortReason::Disconnected));
            }

            let key = (action.table.clone(), action.record_id.clone());
            if deferred.contains(&key) {
                tracing::debug!(
                    target: "sync::push",
                    action_id = %action.id,
                    record_id = %action.record_id,
                    "action deferred behind a failed action"
                );
                continue;
            }

            let mut record_id = promoted
                .get(&key)
                .cloned()
                .unwrap_or_else(|| action.record_id.clone());

            let unpromoted = self
                .store
                .get(&action.table, &record_id)
                .await?
                .is_some_and(|record| record.is_unpromoted());

            self.store
                .set_sync_state(&action.table, &record_id, SyncStatus::Syncing, true, None)
                .await?;

            match self.dispatch(&action, &record_id, unpromoted).await {
                PushResult::Applied(remote) => {
                    if let Some(remote) = remote
                        && remote.id != record_id
                    {
                        self.store
                            .promote_identifier(&action.table, &record_id, &remote.id)
                            .await?;
                        promoted.insert(key, remote.id.clone());
                        record_id = remote.id;
                    }
                    self.log.remove(action.id).await?;
                    report.pushed_count += 1;
                    self.settle_applied(&action, &record_id).await?;
                }
                PushResult::Failed(err) => {
                    if !self.monitor.is_online() {
                        tracing::debug!(
                            target: "sync::push",
                            action_id = %action.id,
                            error = %err,
                            "push interrupted by disconnect"
                        );
                        return Ok(Some(AbortReason::Disconnected));
                    }
                    if self.settle_failed(&action, &record_id, &err, report).await? {
                        deferred.insert(key);
                    }
                }
            }
        }

        Ok(None)
    }

    /// `unpromoted` はリモート採番前のレコードを指す。識別子の形からは判断しない。
    async fn dispatch(
        &self,
        action: &PendingAction,
        record_id: &RecordId,
        unpromoted: bool,
    ) -> PushResult {
        let result = match action.kind {
            ActionKind::Create => match &action.snapshot {
                Some(snapshot) => self
                    .remote
                    .insert(&action.table, record_id, snapshot)
                    .await
                    .map(Some),
                None => Err(missing_snapshot(action)),
            },
            // リモートに未登録のまま残ったレコードは offline_id で upsert する
            ActionKind::Update if unpromoted => match &action.snapshot {
                Some(snapshot) => self
                    .remote
                    .insert(&action.table, record_id, snapshot)
                    .await
                    .map(Some),
                None => Err(missing_snapshot(action)),
            },
            ActionKind::Update => match &action.snapshot {
                Some(snapshot) => self
                    .remote
                    .update(&action.table, record_id, snapshot)
                    .await
                    .map(|_| None),
                None => Err(missing_snapshot(action)),
            },
            ActionKind::Delete if unpromoted => self
                .remote
                .delete_by_offline_id(&action.table, record_id)
                .await
                .map(|_| None),
            ActionKind::Delete => self
                .remote
                .delete(&action.table, record_id)
                .await
                .map(|_| None),
        };

        match result {
            Ok(remote) => PushResult::Applied(remote),
            Err(err) => PushResult::Failed(err),
        }
    }

    async fn settle_applied(
        &self,
        action: &PendingAction,
        record_id: &RecordId,
    ) -> Result<(), AppError> {
        let still_queued = self.log.has_pending_for(&action.table, record_id).await?;
        if still_queued {
            self.store
                .set_sync_state(&action.table, record_id, SyncStatus::Pending, true, None)
                .await?;
        } else if action.kind == ActionKind::Delete {
            self.store.purge(&action.table, record_id).await?;
        } else {
            self.store
                .set_sync_state(&action.table, record_id, SyncStatus::Synced, false, None)
                .await?;
        }

        tracing::debug!(
            target: "sync::push",
            action_id = %action.id,
            kind = action.kind.as_str(),
            table = %action.table,
            record_id = %record_id,
            still_queued,
            "action applied"
        );
        Ok(())
    }

    /// アクションが再送待ちとしてキューに残った場合は true。
    async fn settle_failed(
        &self,
        action: &PendingAction,
        record_id: &RecordId,
        err: &AppError,
        report: &mut SyncReport,
    ) -> Result<bool, AppError> {
        let message = err.to_string();
        let retry_count = self.log.increment_retry(action.id, &message).await?;

        if retry_count >= self.settings.max_retry {
            self.log.remove(action.id).await?;
            report.dropped_count += 1;
            let still_queued = self.log.has_pending_for(&action.table, record_id).await?;
            self.store
                .set_sync_state(
                    &action.table,
                    record_id,
                    SyncStatus::Failed,
                    still_queued,
                    Some(&message),
                )
                .await?;
            tracing::warn!(
                target: "sync::push",
                action_id = %action.id,
                kind = action.kind.as_str(),
                table = %action.table,
                record_id = %record_id,
                retry_count,
                remote_failure = err.is_remote_failure(),
                error = %err,
                "action dropped after reaching retry limit"
            );
            Ok(false)
        } else {
            report.retried_count += 1;
            self.store
                .set_sync_state(
                    &action.table,
                    record_id,
                    SyncStatus::Pending,
                    true,
                    Some(&message),
                )
                .await?;
            tracing::warn!(
                target: "sync::push",
                action_id = %action.id,
                kind = action.kind.as_str(),
                table = %action.table,
                record_id = %record_id,
                retry_count,
                max_retry = self.settings.max_retry,
                error = %err,
                "action failed, will retry"
            );
            Ok(true)
        }
    }

    async fn pull(
        &self,
        since: Option<DateTime<Utc>>,
        report: &mut SyncReport,
    ) -> Result<Option<AbortReason>, AppError> {
        let mut tables: BTreeSet<TableName> = self.settings.tables.iter().cloned().collect();
        tables.extend(self.store.tables().await?);

        for table in tables {
            if !self.monitor.is_online() {
                return Ok(Some(AbortReason::Disconnected));
            }

            let rows = match self.remote.select_since(&table, since).await {
                Ok(rows) => rows,
                Err(_) if !self.monitor.is_online() => {
                    return Ok(Some(AbortReason::Disconnected));
                }
                Err(err) => {
                    tracing::warn!(
                        target: "sync::pull",
                        table = %table,
                        error = %err,
                        "pull failed"
                    );
                    return Err(err);
                }
            };

            let fetched = rows.len();
            for remote in rows {
                if self.apply_remote(&table, remote).await? {
                    report.pulled_count += 1;
                } else {
                    report.skipped_count += 1;
                }
            }

            tracing::debug!(
                target: "sync::pull",
                table = %table,
                since = ?since,
                fetched,
                "pulled remote changes"
            );
        }

        Ok(None)
    }

    /// ローカルにキュー済みの変更や失敗状態がある場合はリモートで上書きしない。
    async fn apply_remote(&self, table: &TableName, remote: RemoteRecord) -> Result<bool, AppError> {
        let local = match self.store.get(table, &remote.id).await? {
            Some(local) => Some(local),
            None => match &remote.offline_id {
                Some(offline_id) => self.store.get(table, offline_id).await?,
                None => None,
            },
        };

        if let Some(local) = local {
            if local.sync_status == SyncStatus::Failed
                || self.log.has_pending_for(table, &local.id).await?
            {
                return Ok(false);
            }
            if local.id != remote.id {
                self.store
                    .promote_identifier(table, &local.id, &remote.id)
                    .await?;
            }
        }

        self.store
            .upsert_remote(&Record::from_remote(table.clone(), remote))
            .await?;
        Ok(true)
    }
}

fn missing_snapshot(action: &PendingAction) -> AppError {
    AppError::InvalidInput(format!(
        "Pending action {} ({}) has no record snapshot",
        action.id,
        action.kind.as_str()
    ))
}
