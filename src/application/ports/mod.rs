pub mod checkpoint_store;
pub mod local_store;
pub mod pending_action_log;
pub mod reachability_probe;
pub mod remote_client;

pub use checkpoint_store::CheckpointStore;
pub use local_store::LocalStore;
pub use pending_action_log::PendingActionLog;
pub use reachability_probe::ReachabilityProbe;
pub use remote_client::RemoteClient;
