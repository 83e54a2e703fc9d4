use crate::application::ports::{LocalStore, PendingActionLog};
use crate::domain::entities::PendingActionDraft;
use crate::domain::value_objects::SyncStatus;
use crate::shared::error::AppError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    /// syncing のまま残っていて pending に戻した件数
    pub reverted_syncing_count: u64,
    pub reflagged_record_ids: Vec<String>,
    pub requeued_record_ids: Vec<String>,
    pub pending_action_count: u64,
    pub emitted_at: i64,
}

/// 起動時にローカルストアとキューの整合性を回復するジョブ。
pub struct OfflineRecoveryJob {
    store: Arc<dyn LocalStore>,
    log: Arc<dyn PendingActionLog>,
    gate: Mutex<()>,
}

impl OfflineRecoveryJob {
    pub fn new(store: Arc<dyn LocalStore>, log: Arc<dyn PendingActionLog>) -> Arc<Self> {
        Arc::new(Self {
            store,
            log,
            gate: Mutex::new(()),
        })
    }

    /// 回復を実行して結果をログに残す。
    pub async fn run(&self) -> Result<RecoveryReport, AppError> {
        match self.recover_once().await {
            Ok(report) => {
                tracing::info!(
                    target: "offline::recovery",
                    reverted = report.reverted_syncing_count,
                    reflagged = report.reflagged_record_ids.len(),
                    requeued = report.requeued_record_ids.len(),
                    pending = report.pending_action_count,
                    "offline recovery completed"
                );
                Ok(report)
            }
            Err(err) => {
                tracing::error!(
                    target: "offline::recovery",
                    error = %err,
                    "offline recovery job failed"
                );
                Err(err)
            }
        }
    }

    pub async fn recover_once(&self) -> Result<RecoveryReport, AppError> {
        let _guard = self.gate.lock().await;

        let reverted_syncing_count = self.store.reset_syncing().await?;

        let mut queued_targets = BTreeSet::new();
        for action in self.log.peek_all().await? {
            queued_targets.insert((action.table, action.record_id));
        }

        let mut reflagged_record_ids = Vec::new();
        for (table, record_id) in &queued_targets {
            let Some(record) = self.store.get(table, record_id).await? else {
                continue;
            };
            if record.needs_sync {
                continue;
            }
            self.store
                .set_sync_state(table, &record.id, SyncStatus::Pending, true, None)
                .await?;
            reflagged_record_ids.push(format!("{}/{}", table, record.id));
        }

        let mut requeued_record_ids = Vec::new();
        for record in self.store.list_unsynced().await? {
            if queued_targets.contains(&(record.table.clone(), record.id.clone())) {
                continue;
            }
            tracing::warn!(
                target: "offline::recovery",
                table = %record.table,
                record_id = %record.id,
                "record flagged for sync without a queued action"
            );
            self.log.enqueue(PendingActionDraft::replay_of(&record)).await?;
            if record.sync_status != SyncStatus::Pending {
                self.store
                    .set_sync_state(&record.table, &record.id, SyncStatus::Pending, true, None)
                    .await?;
            }
            requeued_record_ids.push(format!("{}/{}", record.table, record.id));
        }

        Ok(RecoveryReport {
            reverted_syncing_count,
            reflagged_record_ids,
            requeued_record_ids,
            pending_action_count: self.log.count().await?,
            emitted_at: Utc::now().timestamp_millis(),
        })
    }
}
