pub mod network;
pub mod offline;

pub use network::{ConnectionEvent, ConnectionQuality};
pub use offline::{ActionKind, PendingActionId, RecordId, RecordPayload, SyncStatus, TableName};
