use crate::application::ports::ReachabilityProbe;
use crate::domain::value_objects::{ConnectionEvent, ConnectionQuality};
use crate::shared::config::NetworkConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkState {
    pub online: bool,
    pub quality: ConnectionQuality,
    pub last_latency_ms: Option<u64>,
    pub changed_at: DateTime<Utc>,
}

impl NetworkState {
    fn initial(online: bool) -> Self {
        Self {
            online,
            quality: if online {
                ConnectionQuality::Unknown
            } else {
                ConnectionQuality::Offline
            },
            last_latency_ms: None,
            changed_at: Utc::now(),
        }
    }
}

/// 接続状態の監視。状態は watch、遷移イベントは broadcast で配信する。
///
/// プラットフォームからの接続信号を一次情報とし、プローブが設定されていれば
/// その結果で補正する。オンライン/オフラインの遷移ごとにイベントはちょうど一度だけ発行される。
pub struct NetworkMonitor {
    state_tx: watch::Sender<NetworkState>,
    events_tx: broadcast::Sender<ConnectionEvent>,
    probe: Option<Arc<dyn ReachabilityProbe>>,
    degraded_latency_ms: u64,
}

impl NetworkMonitor {
    pub fn new(
        initial_online: bool,
        probe: Option<Arc<dyn ReachabilityProbe>>,
        degraded_latency_ms: u64,
    ) -> Self {
        let (state_tx, _) = watch::channel(NetworkState::initial(initial_online));
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state_tx,
            events_tx,
            probe,
            degraded_latency_ms,
        }
    }

    pub fn from_config(config: &NetworkConfig, probe: Option<Arc<dyn ReachabilityProbe>>) -> Self {
        Self::new(config.assume_online, probe, config.degraded_latency_ms)
    }

    pub fn is_online(&self) -> bool {
        self.state_tx.borrow().online
    }

    pub fn state(&self) -> NetworkState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<NetworkState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events_tx.subscribe()
    }

    /// OS などからの接続信号。遷移が起きた場合のみイベントを返す。
    pub fn report_platform_signal(&self, online: bool) -> Option<ConnectionEvent> {
        let quality = if online {
            None
        } else {
            Some(ConnectionQuality::Offline)
        };
        self.apply(online, quality, None)
    }

    pub async fn probe_once(&self) -> Option<ConnectionEvent> {
        let probe = self.probe.as_ref()?;
        match probe.probe().await {
            Ok(latency) => {
                let latency_ms = latency.as_millis().min(u128::from(u64::MAX)) as u64;
                let quality =
                    ConnectionQuality::from_latency_ms(latency_ms, self.degraded_latency_ms);
                self.apply(true, Some(quality), Some(latency_ms))
            }
            Err(err) => {
                tracing::debug!(target: "network::monitor", error = %err, "reachability probe failed");
                self.apply(false, Some(ConnectionQuality::Offline), None)
            }
        }
    }

    /// プローブが設定されていなければ None。
    pub fn spawn_probe_loop(self: &Arc<Self>, interval: Duration) -> Option<JoinHandle<()>> {
        self.probe.as_ref()?;
        let monitor = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.probe_once().await;
            }
        }))
    }

    fn apply(
        &self,
        online: bool,
        quality: Option<ConnectionQuality>,
        latency_ms: Option<u64>,
    ) -> Option<ConnectionEvent> {
        let mut event = None;
        self.state_tx.send_if_modified(|state| {
            let quality = match quality {
                Some(quality) => quality,
                None if !state.online => ConnectionQuality::Unknown,
                None => state.quality,
            };
            let latency_ms = if online {
                latency_ms.or(state.last_latency_ms)
            } else {
                None
            };
            if state.online == online
                && state.quality == quality
                && state.last_latency_ms == latency_ms
            {
                return false;
            }

            if state.online != online {
                event = Some(if online {
                    ConnectionEvent::Reconnected
                } else {
                    ConnectionEvent::Disconnected
                });
                state.changed_at = Utc::now();
            }
            state.online = online;
            state.quality = quality;
            state.last_latency_ms = latency_ms;
            true
        });

        if let Some(event) = event {
            tracing::info!(
                target: "network::monitor",
                event = ?event,
                quality = %self.state_tx.borrow().quality,
                "connectivity changed"
            );
            // 購読者がいなくても状態は watch に残る
            let _ = self.events_tx.send(event);
        }
        event
    }
}
