pub mod engine_status;
pub mod pending_action;
pub mod record;
pub mod sync_report;

pub use engine_status::EngineStatus;
pub use pending_action::{PendingAction, PendingActionDraft};
pub use record::{Record, RecordFilter, RecordInput, RecordSnapshot, RemoteRecord};
pub use sync_report::{AbortReason, CycleOutcome, SyncReport, SyncTrigger};
