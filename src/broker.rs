//! Topic subscription bridge to the external message broker.
//!
//! The gateway never talks wire-level pub-sub itself; after the authorization
//! gate allows access it registers the subscriber through the broker's
//! management API. Registration is synchronous with respect to the HTTP
//! response: the client does not see success until the broker accepted the
//! subscription. Failures are retried a bounded number of times with backoff
//! and then surfaced as a retryable dependency error.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::json;
use tracing::warn;

use crate::error::BrokerError;

/// Topic prefix carrying one account's sensor telemetry.
pub const TOPIC_SENSOR_REPORT: &str = "sensor_data_report";

/// Sensor reports are delivered at-least-once.
pub const SENSOR_REPORT_QOS: u8 = 1;

const BROKER_CALL_TIMEOUT: Duration = Duration::from_secs(5);
const BROKER_RETRIES: u32 = 3;
const BROKER_BACKOFF_BASE: Duration = Duration::from_millis(200);

/// The sensor-report topic for one account.
pub fn sensor_topic(account_id: &str) -> String {
    format!("{}/{}", TOPIC_SENSOR_REPORT, account_id)
}

#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    async fn subscribe(&self, subscriber_id: &str, topic: &str, qos: u8) -> Result<(), BrokerError>;
}

/// Broker adapter over the management REST API (EMQX-style `/mqtt/subscribe`).
pub struct HttpBroker {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBroker {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(BROKER_CALL_TIMEOUT)
            .build()?;
        Ok(Self { base_url: base_url.into().trim_end_matches('/').to_string(), client })
    }

    async fn subscribe_once(&self, subscriber_id: &str, topic: &str, qos: u8) -> Result<(), String> {
        let url = format!("{}/api/v4/mqtt/subscribe", self.base_url);
        let body = json!({
            "clientid": subscriber_id,
            "topic": topic,
            "qos": qos,
        });
        let resp = self.client.post(&url).json(&body).send().await.map_err(|e| e.to_string())?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(format!("broker returned status {}", resp.status()))
        }
    }
}

#[async_trait]
impl BrokerAdapter for HttpBroker {
    async fn subscribe(&self, subscriber_id: &str, topic: &str, qos: u8) -> Result<(), BrokerError> {
        let mut last_err = String::new();
        for attempt in 1..=BROKER_RETRIES {
            match self.subscribe_once(subscriber_id, topic, qos).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(subscriber = %subscriber_id, topic = %topic, attempt, "broker subscribe failed: {e}");
                    last_err = e;
                }
            }
            if attempt < BROKER_RETRIES {
                tokio::time::sleep(BROKER_BACKOFF_BASE * attempt).await;
            }
        }
        Err(BrokerError::Unavailable(last_err))
    }
}

/// In-process broker that records subscriptions. Used by tests and when no
/// broker URL is configured.
#[derive(Default)]
pub struct MemoryBroker {
    subscriptions: RwLock<Vec<(String, String, u8)>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_subscribed(&self, subscriber_id: &str, topic: &str) -> bool {
        self.subscriptions.read().iter().any(|(s, t, _)| s == subscriber_id && t == topic)
    }

    pub fn subscriptions(&self) -> Vec<(String, String, u8)> {
        self.subscriptions.read().clone()
    }
}

#[async_trait]
impl BrokerAdapter for MemoryBroker {
    async fn subscribe(&self, subscriber_id: &str, topic: &str, qos: u8) -> Result<(), BrokerError> {
        self.subscriptions.write().push((subscriber_id.to_string(), topic.to_string(), qos));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_topic_is_scoped_per_account() {
        assert_eq!(sensor_topic("u1001"), "sensor_data_report/u1001");
    }

    #[tokio::test]
    async fn memory_broker_records_subscriptions() {
        let broker = MemoryBroker::new();
        broker.subscribe("u1", &sensor_topic("u1"), SENSOR_REPORT_QOS).await.unwrap();
        assert!(broker.is_subscribed("u1", "sensor_data_report/u1"));
        assert_eq!(broker.subscriptions(), vec![("u1".into(), "sensor_data_report/u1".into(), 1)]);
    }
}
