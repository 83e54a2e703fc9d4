use serde::{Deserialize, Serialize};
use std::fmt;

/// 接続品質の粗い分類。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionQuality {
    Unknown,
    Good,
    Degraded,
    Offline,
}

impl ConnectionQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionQuality::Unknown => "unknown",
            ConnectionQuality::Good => "good",
            ConnectionQuality::Degraded => "degraded",
            ConnectionQuality::Offline => "offline",
        }
    }

    pub fn from_latency_ms(latency_ms: u64, degraded_threshold_ms: u64) -> Self {
        if latency_ms > degraded_threshold_ms {
            ConnectionQuality::Degraded
        } else {
            ConnectionQuality::Good
        }
    }
}

impl fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionEvent {
    Reconnected,
    Disconnected,
}
