use crate::application::ports::{CheckpointStore, LocalStore, PendingActionLog};
use crate::application::services::network_monitor::NetworkMonitor;
use crate::application::services::sync_scheduler::SyncSchedulerHandle;
use crate::domain::entities::{
    EngineStatus, PendingActionDraft, Record, RecordFilter, RecordInput, SyncTrigger,
};
use crate::domain::value_objects::{ActionKind, RecordId, SyncStatus, TableName};
use crate::infrastructure::offline::SyncMetricsSnapshot;
use crate::shared::error::AppError;
use chrono::Utc;
use std::sync::Arc;

/// アプリケーションから見たデータアクセスの窓口。
///
/// 読み書きはすべてローカルストアに対して行い、ネットワークを待たない。
/// 書き込みはレコードとペンディングアクションを一つのトランザクションで記録したうえで、
/// オンラインならスケジューラに同期を要求する（完了は待たない）。
pub struct RecordAccessService {
    store: Arc<dyn LocalStore>,
    log: Arc<dyn PendingActionLog>,
    checkpoints: Arc<dyn CheckpointStore>,
    monitor: Arc<NetworkMonitor>,
    scheduler: Option<SyncSchedulerHandle>,
}

impl RecordAccessService {
    pub fn new(
        store: Arc<dyn LocalStore>,
        log: Arc<dyn PendingActionLog>,
        checkpoints: Arc<dyn CheckpointStore>,
        monitor: Arc<NetworkMonitor>,
        scheduler: Option<SyncSchedulerHandle>,
    ) -> Self {
        Self {
            store,
            log,
            checkpoints,
            monitor,
            scheduler,
        }
    }

    pub async fn read(
        &self,
        table: &TableName,
        filter: &RecordFilter,
    ) -> Result<Vec<Record>, AppError> {
        self.store.list(table, filter).await
    }

    /// トゥームストーンは存在しないものとして扱う。
    pub async fn get(&self, table: &TableName, id: &RecordId) -> Result<Option<Record>, AppError> {
        Ok(self
            .store
            .get(table, id)
            .await?
            .filter(|record| !record.is_deleted))
    }

    pub async fn write(&self, table: &TableName, input: RecordInput) -> Result<Record, AppError> {
        let now = Utc::now();
        let existing = match &input.id {
            Some(id) => self.store.get(table, id).await?,
            None => None,
        };

        let (mut record, kind) = match existing {
            Some(record) if record.is_deleted => {
                return Err(AppError::NotFound(format!(
                    "{}/{} has been deleted",
                    table, record.id
                )));
            }
            Some(mut record) => {
                record.apply_local_change(input.payload, input.completed, now);
                (record, ActionKind::Update)
            }
            None => {
                let id = input.id.unwrap_or_else(RecordId::generate_offline);
                let record = Record::new_local(
                    table.clone(),
                    id,
                    input.payload,
                    input.completed,
                    now,
                );
                (record, ActionKind::Create)
            }
        };

        let draft = PendingActionDraft::new(
            kind,
            table.clone(),
            record.id.clone(),
            Some(record.snapshot()),
        );
        let action = self.store.write_with_action(&record, draft).await?;
        record.id = action.record_id;

        tracing::debug!(
            target: "sync::access",
            table = %table,
            record_id = %record.id,
            kind = kind.as_str(),
            action_id = %action.id,
            "local write recorded"
        );
        self.notify_write();
        Ok(record)
    }

    pub async fn delete(&self, table: &TableName, id: &RecordId) -> Result<(), AppError> {
        let mut record = match self.store.get(table, id).await? {
            Some(record) if !record.is_deleted => record,
            _ => return Err(AppError::NotFound(format!("{}/{}", table, id))),
        };

        record.mark_deleted(Utc::now());
        let draft = PendingActionDraft::new(ActionKind::Delete, table.clone(), record.id.clone(), None);
        let action = self.store.write_with_action(&record, draft).await?;

        tracing::debug!(
            target: "sync::access",
            table = %table,
            record_id = %action.record_id,
            action_id = %action.id,
            "local delete recorded"
        );
        self.notify_write();
        Ok(())
    }

    /// 再送上限で破棄されたレコードを、現在の内容で再びキューに載せる。
    pub async fn retry_failed(&self, table: &TableName, id: &RecordId) -> Result<Record, AppError> {
        let mut record = self
            .store
            .get(table, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", table, id)))?;
        if record.sync_status != SyncStatus::Failed {
            return Err(AppError::InvalidInput(format!(
                "{}/{} is {}, only failed records can be retried",
                table, record.id, record.sync_status
            )));
        }

        record.reset_for_retry();
        let draft = PendingActionDraft::replay_of(&record);
        let kind = draft.kind;
        let action = self.store.write_with_action(&record, draft).await?;
        record.id = action.record_id;

        tracing::info!(
            target: "sync::access",
            table = %table,
            record_id = %record.id,
            kind = kind.as_str(),
            "failed record requeued"
        );
        self.notify_write();
        Ok(record)
    }

    pub async fn status(&self) -> Result<EngineStatus, AppError> {
        let network = self.monitor.state();
        let pending_count = self.log.count().await?;
        let failed_count = self.store.count_by_status(SyncStatus::Failed).await?;
        let last_sync_at = self.checkpoints.load_checkpoint().await?;

        Ok(EngineStatus {
            is_online: network.online,
            quality: network.quality,
            is_syncing: self
                .scheduler
                .as_ref()
                .is_some_and(|scheduler| scheduler.is_syncing()),
            pending_count,
            failed_count,
            last_sync_at,
            consecutive_failures: self
                .scheduler
                .as_ref()
                .map_or(0, |scheduler| scheduler.consecutive_failures()),
        })
    }

    pub fn sync_metrics(&self) -> Option<SyncMetricsSnapshot> {
        self.scheduler.as_ref().map(|scheduler| scheduler.metrics())
    }

    fn notify_write(&self) {
        if !self.monitor.is_online() {
            return;
        }
        if let Some(scheduler) = &self.scheduler {
            scheduler.request_sync(SyncTrigger::LocalWrite);
        }
    }
}
