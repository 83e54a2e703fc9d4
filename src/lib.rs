pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use application::services::{NetworkMonitor, RecordAccessService, SyncSchedulerHandle};
pub use shared::config::AppConfig;
pub use shared::error::AppError;
pub use state::{AppState, SyncComponents};

/// `RUST_LOG` が未設定なら同期処理のログを debug まで出力する。
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tasksync=debug,sync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
