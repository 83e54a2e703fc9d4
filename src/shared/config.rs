use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub remote: RemoteConfig,
    pub network: NetworkConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// 到達性プローブの送信先。未設定ならプラットフォーム信号のみで判定する
    #[serde(default)]
    pub probe_url: Option<String>,
    pub probe_interval: u64,
    pub probe_timeout_ms: u64,
    pub degraded_latency_ms: u64,
    /// プローブ結果が出るまでの初期状態
    pub assume_online: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    pub sync_on_start: bool,
    pub sync_interval: u64,
    pub max_retry: u32,
    pub backoff_base: u64,
    pub backoff_cap: u64,
    pub tables: Vec<String>,
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_secs(self.backoff_cap)
    }
}

impl NetworkConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: default_database_url(),
                max_connections: 5,
                connection_timeout: 30,
            },
            remote: RemoteConfig {
                base_url: "http://localhost:54321".to_string(),
                api_key: None,
                request_timeout: 15,
            },
            network: NetworkConfig {
                probe_url: None,
                probe_interval: 30,
                probe_timeout_ms: 5_000,
                degraded_latency_ms: 1_500,
                assume_online: true,
            },
            sync: SyncConfig {
                auto_sync: true,
                sync_on_start: true,
                sync_interval: 300, // 5 minutes
                max_retry: 3,
                backoff_base: 10,
                backoff_cap: 300,
                tables: vec!["tasks".to_string()],
            },
        }
    }
}

fn default_database_url() -> String {
    let base = dirs::data_local_dir()
        .map(|dir| dir.join("tasksync"))
        .unwrap_or_else(|| std::path::PathBuf::from("./data"));
    format!("sqlite://{}?mode=rwc", base.join("tasksync.db").display())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("TASKSYNC_DATABASE_URL")
            && !v.trim().is_empty()
        {
            cfg.database.url = v.trim().to_string();
        }
        if let Ok(v) = std::env::var("TASKSYNC_DATABASE_MAX_CONNECTIONS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.database.max_connections = value.min(u64::from(u32::MAX)) as u32;
        }

        if let Ok(v) = std::env::var("TASKSYNC_REMOTE_URL")
            && !v.trim().is_empty()
        {
            cfg.remote.base_url = v.trim().trim_end_matches('/').to_string();
        }
        if let Ok(v) = std::env::var("TASKSYNC_REMOTE_API_KEY") {
            let key = v.trim();
            cfg.remote.api_key = if key.is_empty() {
                None
            } else {
                Some(key.to_string())
            };
        }
        if let Ok(v) = std::env::var("TASKSYNC_REMOTE_TIMEOUT_SECS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.remote.request_timeout = value.max(1);
        }

        if let Ok(v) = std::env::var("TASKSYNC_PROBE_URL") {
            let url = v.trim();
            cfg.network.probe_url = if url.is_empty() {
                None
            } else {
                Some(url.to_string())
            };
        }
        if let Ok(v) = std::env::var("TASKSYNC_PROBE_INTERVAL_SECS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.network.probe_interval = value.max(1);
        }
        if let Ok(v) = std::env::var("TASKSYNC_ASSUME_ONLINE") {
            cfg.network.assume_online = parse_bool(&v, cfg.network.assume_online);
        }

        if let Ok(v) = std::env::var("TASKSYNC_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Ok(v) = std::env::var("TASKSYNC_SYNC_ON_START") {
            cfg.sync.sync_on_start = parse_bool(&v, cfg.sync.sync_on_start);
        }
        if let Ok(v) = std::env::var("TASKSYNC_SYNC_INTERVAL_SECS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.sync.sync_interval = value.max(1);
        }
        if let Ok(v) = std::env::var("TASKSYNC_MAX_RETRY")
            && let Some(value) = parse_u64(&v)
        {
            cfg.sync.max_retry = value.clamp(1, 100) as u32;
        }
        if let Ok(v) = std::env::var("TASKSYNC_SYNC_TABLES") {
            let tables = parse_list(&v);
            if !tables.is_empty() {
                cfg.sync.tables = tables;
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.remote.base_url.trim().is_empty() {
            return Err("Remote base_url must not be empty".to_string());
        }
        if self.sync.sync_interval == 0 {
            return Err("Sync sync_interval must be greater than 0".to_string());
        }
        if self.sync.max_retry == 0 {
            return Err("Sync max_retry must be greater than 0".to_string());
        }
        if self.sync.backoff_cap < self.sync.backoff_base {
            return Err("Sync backoff_cap must not be smaller than backoff_base".to_string());
        }
        if self.sync.tables.is_empty() {
            return Err("Sync tables must list at least one table".to_string());
        }
        if self.network.probe_url.is_some() && self.network.probe_interval == 0 {
            return Err("Network probe_interval must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
