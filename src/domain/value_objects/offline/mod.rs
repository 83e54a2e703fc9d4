pub mod action_kind;
pub mod payload;
pub mod pending_action_id;
pub mod record_id;
pub mod sync_status;
pub mod table_name;

pub use action_kind::ActionKind;
pub use payload::RecordPayload;
pub use pending_action_id::PendingActionId;
pub use record_id::RecordId;
pub use sync_status::SyncStatus;
pub use table_name::TableName;
