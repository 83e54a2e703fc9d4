use super::{Record, RecordSnapshot};
use crate::domain::value_objects::{ActionKind, PendingActionId, RecordId, TableName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ペンディングアクションログに追加する際のドラフト。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingActionDraft {
    pub kind: ActionKind,
    pub table: TableName,
    pub record_id: RecordId,
    /// delete の場合は None
    pub snapshot: Option<RecordSnapshot>,
}

impl PendingActionDraft {
    pub fn new(
        kind: ActionKind,
        table: TableName,
        record_id: RecordId,
        snapshot: Option<RecordSnapshot>,
    ) -> Self {
        Self {
            kind,
            table,
            record_id,
            snapshot,
        }
    }

    /// レコードの現在の状態を再送するためのドラフト。
    pub fn replay_of(record: &Record) -> Self {
        let (kind, snapshot) = if record.is_deleted {
            (ActionKind::Delete, None)
        } else if record.is_unpromoted() {
            (ActionKind::Create, Some(record.snapshot()))
        } else {
            (ActionKind::Update, Some(record.snapshot()))
        };
        Self::new(kind, record.table.clone(), record.id.clone(), snapshot)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingAction {
    pub id: PendingActionId,
    pub kind: ActionKind,
    pub table: TableName,
    pub record_id: RecordId,
    pub snapshot: Option<RecordSnapshot>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
