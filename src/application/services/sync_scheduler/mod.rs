pub mod core;
pub mod service;
pub mod settings;

pub use self::core::SyncCycleRunner;
pub use service::{SyncScheduler, SyncSchedulerHandle};
pub use settings::{SchedulerSettings, backoff_delay};
