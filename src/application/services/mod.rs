pub mod network_monitor;
pub mod record_access_service;
pub mod sync_scheduler;

pub use network_monitor::{NetworkMonitor, NetworkState};
pub use record_access_service::RecordAccessService;
pub use sync_scheduler::{SchedulerSettings, SyncCycleRunner, SyncScheduler, SyncSchedulerHandle};
