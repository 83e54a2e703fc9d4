use crate::domain::value_objects::{RecordId, RecordPayload, SyncStatus, TableName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ローカルストアに保持されるレコードと同期メタデータ。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub table: TableName,
    pub offline_id: Option<RecordId>,
    pub payload: RecordPayload,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub needs_sync: bool,
    pub sync_status: SyncStatus,
    pub is_deleted: bool,
    pub last_error: Option<String>,
}

impl Record {
    /// `RecordAccessService` で新規作成されたレコード。リモート採番前の識別子を offline_id として保持する。
    pub fn new_local(
        table: TableName,
        id: RecordId,
        payload: RecordPayload,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let offline_id = Some(id.clone());
        Self {
            id,
            table,
            offline_id,
            payload,
            completed,
            created_at: now,
            updated_at: now,
            needs_sync: true,
            sync_status: SyncStatus::Pending,
            is_deleted: false,
            last_error: None,
        }
    }

    pub fn from_remote(table: TableName, remote: RemoteRecord) -> Self {
        Self {
            id: remote.id,
            table,
            offline_id: remote.offline_id,
            payload: remote.payload,
            completed: remote.completed,
            created_at: remote.created_at,
            updated_at: remote.updated_at,
            needs_sync: false,
            sync_status: SyncStatus::Synced,
            is_deleted: false,
            last_error: None,
        }
    }

    pub fn apply_local_change(
        &mut self,
        payload: RecordPayload,
        completed: bool,
        now: DateTime<Utc>,
    ) {
        self.payload = payload;
        self.completed = completed;
        self.updated_at = now;
        self.mark_pending();
    }

    pub fn mark_deleted(&mut self, now: DateTime<Utc>) {
        self.is_deleted = true;
        self.updated_at = now;
        self.mark_pending();
    }

    /// 失敗したレコードを再送対象に戻す。内容は変えない。
    pub fn reset_for_retry(&mut self) {
        self.mark_pending();
    }

    fn mark_pending(&mut self) {
        self.needs_sync = true;
        self.sync_status = SyncStatus::Pending;
        self.last_error = None;
    }

    pub fn snapshot(&self) -> RecordSnapshot {
        RecordSnapshot {
            payload: self.payload.clone(),
            completed: self.completed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// リモートでまだ採番されていない。識別子の形ではなく offline_id との一致で判定する。
    pub fn is_unpromoted(&self) -> bool {
        self.offline_id.as_ref() == Some(&self.id)
    }
}

/// ペンディングアクションに記録される、書き込み時点のレコード内容。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordSnapshot {
    pub payload: RecordPayload,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// リモートストアが返す正規のレコード表現。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteRecord {
    pub id: RecordId,
    pub offline_id: Option<RecordId>,
    pub payload: RecordPayload,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `RecordAccessService::write` への入力。`id` が None なら新規作成。
#[derive(Debug, Clone, PartialEq)]
pub struct RecordInput {
    pub id: Option<RecordId>,
    pub payload: RecordPayload,
    pub completed: bool,
}

impl RecordInput {
    pub fn create(payload: RecordPayload) -> Self {
        Self {
            id: None,
            payload,
            completed: false,
        }
    }

    pub fn update(id: RecordId, payload: RecordPayload, completed: bool) -> Self {
        Self {
            id: Some(id),
            payload,
            completed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub completed: Option<bool>,
    pub sync_status: Option<SyncStatus>,
    pub limit: Option<u32>,
}

impl RecordFilter {
    pub fn new(completed: Option<bool>, sync_status: Option<SyncStatus>, limit: Option<u32>) -> Self {
        Self {
            completed,
            sync_status,
            limit,
        }
    }
}
