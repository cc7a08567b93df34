use log::{debug, error, info, warn};
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::{Deserialize, Serialize};
#[cfg(test)]
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TOPIC_NOTIFICATIONS: &str = "rde-notifications";

const EVENT_TYPE_HEADER: &str = "event-type";

#[derive(Clone, Debug)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub client_id: String,
    pub topic: String,
    pub delivery_timeout: Duration,
    pub enabled: bool,
}

/// `KAFKA_ENABLED` switch: anything but an explicit "off" keeps the broker on.
fn switched_on(raw: Option<&str>) -> bool {
    match raw.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) => !matches!(v.as_str(), "0" | "false" | "no" | "off"),
        None => true,
    }
}

impl KafkaConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let var = |name: &str| std::env::var(name).ok();

        let delivery_timeout = var("KAFKA_DELIVERY_TIMEOUT_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(5));

        Self {
            bootstrap_servers: var("KAFKA_BOOTSTRAP_SERVERS").unwrap_or_else(|| "localhost:9092".to_string()),
            client_id: var("KAFKA_CLIENT_ID").unwrap_or_else(|| "rde-roster".to_string()),
            topic: var("KAFKA_NOTIFICATION_TOPIC").unwrap_or_else(|| TOPIC_NOTIFICATIONS.to_string()),
            delivery_timeout,
            enabled: switched_on(var("KAFKA_ENABLED").as_deref()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    EmailVerificationRequested,
    PasswordResetRequested,
    ProfileRecommended,
    DeploymentUpdated,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::EmailVerificationRequested => "email_verification_requested",
            EventType::PasswordResetRequested => "password_reset_requested",
            EventType::ProfileRecommended => "profile_recommended",
            EventType::DeploymentUpdated => "deployment_updated",
        }
    }
}

/// Envelope for everything published on the notification topic.
#[derive(Debug, Serialize, Deserialize)]
pub struct Event<T> {
    pub event_type: EventType,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub payload: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(event_type: EventType, payload: T) -> Self {
        Self {
            event_type,
            timestamp: chrono::Utc::now(),
            payload,
        }
    }

    fn encode(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|e| format!("Serialization error: {}", e))
    }
}

/// Notification bus handle. `Dummy` stands in when the broker is switched off
/// or cannot be reached at startup.
#[derive(Clone)]
pub enum KafkaProducer {
    Real(RdKafkaProducer),
    Dummy(DummyKafkaProducer),
}

impl KafkaProducer {
    /// Publishes one event keyed by `key` (the recipient for mail events).
    pub async fn publish<T: Serialize>(&self, key: &str, event: &Event<T>) -> Result<(), String> {
        let body = event.encode()?;
        match self {
            KafkaProducer::Real(producer) => producer.deliver(key, event.event_type, &body).await,
            KafkaProducer::Dummy(producer) => {
                producer.deliver(key, event.event_type, body);
                Ok(())
            }
        }
    }
}

#[derive(Clone)]
pub struct RdKafkaProducer {
    producer: FutureProducer,
    topic: String,
    delivery_timeout: Duration,
}

impl RdKafkaProducer {
    pub fn new(config: &KafkaConfig) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("client.id", &config.client_id)
            .set("message.timeout.ms", config.delivery_timeout.as_millis().to_string())
            .set("acks", "all")
            .create()?;

        Ok(Self {
            producer,
            topic: config.topic.clone(),
            delivery_timeout: config.delivery_timeout,
        })
    }

    async fn deliver(&self, key: &str, kind: EventType, body: &str) -> Result<(), String> {
        let headers = OwnedHeaders::new().insert(Header {
            key: EVENT_TYPE_HEADER,
            value: Some(kind.as_str()),
        });
        let record = FutureRecord::to(&self.topic)
            .key(key)
            .headers(headers)
            .payload(body);

        match self.producer.send(record, Timeout::After(self.delivery_timeout)).await {
            Ok((partition, offset)) => {
                info!(
                    "Queued {} notification on {} (partition {}, offset {})",
                    kind.as_str(),
                    self.topic,
                    partition,
                    offset
                );
                Ok(())
            }
            Err((err, _)) => {
                error!("Kafka rejected {} notification: {}", kind.as_str(), err);
                Err(format!("Failed to send message: {}", err))
            }
        }
    }
}

/// An event the dummy producer swallowed.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub struct Swallowed {
    pub key: String,
    pub event_type: EventType,
    pub body: String,
}

/// Logs events instead of publishing them. Payloads carry one-time codes,
/// so only their size is logged and only test builds keep them.
#[derive(Clone, Default)]
pub struct DummyKafkaProducer {
    #[cfg(test)]
    swallowed: Arc<Mutex<Vec<Swallowed>>>,
}

impl DummyKafkaProducer {
    pub fn new() -> Self {
        Self::default()
    }

    fn deliver(&self, key: &str, event_type: EventType, body: String) {
        warn!("Kafka unavailable, {} notification for {} not published", event_type.as_str(), key);
        debug!("Dropped {} byte payload", body.len());
        self.record(key, event_type, body);
    }

    #[cfg(test)]
    fn record(&self, key: &str, event_type: EventType, body: String) {
        if let Ok(mut swallowed) = self.swallowed.lock() {
            swallowed.push(Swallowed {
                key: key.to_string(),
                event_type,
                body,
            });
        }
    }

    #[cfg(not(test))]
    fn record(&self, _key: &str, _event_type: EventType, _body: String) {}

    /// Events swallowed so far by this producer and its clones.
    #[cfg(test)]
    pub fn swallowed(&self) -> Vec<Swallowed> {
        self.swallowed.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

pub fn create_producer(config: &KafkaConfig) -> KafkaProducer {
    if !config.enabled {
        info!("KAFKA_ENABLED is off; notifications will only be logged");
        return KafkaProducer::Dummy(DummyKafkaProducer::new());
    }

    match RdKafkaProducer::new(config) {
        Ok(producer) => {
            info!("Publishing notifications to {} via {}", config.topic, config.bootstrap_servers);
            KafkaProducer::Real(producer)
        }
        Err(e) => {
            error!("Failed to create Kafka producer: {}. Notifications will only be logged.", e);
            KafkaProducer::Dummy(DummyKafkaProducer::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn only_explicit_off_values_disable_the_broker() {
        assert!(switched_on(None));
        assert!(switched_on(Some("true")));
        assert!(switched_on(Some("1")));
        assert!(!switched_on(Some("false")));
        assert!(!switched_on(Some(" OFF ")));
        assert!(!switched_on(Some("0")));
    }

    #[test]
    fn event_type_serializes_like_its_header() {
        for kind in [
            EventType::EmailVerificationRequested,
            EventType::PasswordResetRequested,
            EventType::ProfileRecommended,
            EventType::DeploymentUpdated,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, Value::String(kind.as_str().to_string()));
        }
    }

    #[actix_web::test]
    async fn dummy_producer_keeps_what_it_swallowed() {
        let dummy = DummyKafkaProducer::new();
        let producer = KafkaProducer::Dummy(dummy.clone());

        let event = Event::new(EventType::ProfileRecommended, serde_json::json!({ "to": "a@b.org" }));
        producer.publish("a@b.org", &event).await.unwrap();

        let swallowed = dummy.swallowed();
        assert_eq!(swallowed.len(), 1);
        assert_eq!(swallowed[0].key, "a@b.org");
        assert_eq!(swallowed[0].event_type, EventType::ProfileRecommended);

        let body: Value = serde_json::from_str(&swallowed[0].body).unwrap();
        assert_eq!(body["event_type"], "profile_recommended");
        assert_eq!(body["payload"]["to"], "a@b.org");
    }
}
