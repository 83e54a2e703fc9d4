use crate::application::ports::ReachabilityProbe;
use crate::shared::config::NetworkConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};

/// HEAD リクエストで到達性を確認する。ステータスコードは問わず応答があれば到達とみなす。
pub struct HttpReachabilityProbe {
    client: Client,
    url: String,
}

impl HttpReachabilityProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::ConfigurationError(err.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &NetworkConfig) -> Result<Option<Self>, AppError> {
        config
            .probe_url
            .as_ref()
            .map(|url| Self::new(url.clone(), config.probe_timeout()))
            .transpose()
    }
}

#[async_trait]
impl ReachabilityProbe for HttpReachabilityProbe {
    async fn probe(&self) -> Result<Duration, AppError> {
        let started = Instant::now();
        let response = self
            .client
            .head(&self.url)
            .send()
            .await
            .map_err(|err| AppError::Network(err.to_string()))?;
        let elapsed = started.elapsed();
        tracing::trace!(
            target: "network::probe",
            status = response.status().as_u16(),
            latency_ms = elapsed.as_millis() as u64,
            "probe answered"
        );
        Ok(elapsed)
    }
}
