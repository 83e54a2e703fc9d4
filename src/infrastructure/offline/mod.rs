mod mappers;
pub mod metrics;
mod queries;
pub mod recovery_job;
mod rows;
pub mod sqlite_store;

pub use metrics::{CycleMetadata, CycleResultStatus, SyncMetrics, SyncMetricsSnapshot};
pub use recovery_job::{OfflineRecoveryJob, RecoveryReport};
pub use sqlite_store::SqliteOfflineStore;
