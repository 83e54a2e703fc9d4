pub mod offline;

pub use offline::{
    AbortReason, CycleOutcome, EngineStatus, PendingAction, PendingActionDraft, Record,
    RecordFilter, RecordInput, RecordSnapshot, RemoteRecord, SyncReport, SyncTrigger,
};
