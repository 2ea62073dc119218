//! CloudEvents for integration lifecycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{HttpSink, SinkError};

pub const INTEGRATION_CREATED_EVENT: &str = "com.dimo.zone.device.integration.create";
pub const INTEGRATION_DELETED_EVENT: &str = "com.dimo.zone.device.integration.delete";

const EVENT_SOURCE: &str = "devices-api";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudEvent<T> {
    pub id: String,
    pub source: String,
    pub specversion: String,
    pub subject: String,
    pub time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: T,
}

impl<T> CloudEvent<T> {
    pub fn new(event_type: &str, subject: &str, data: T) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: EVENT_SOURCE.to_string(),
            specversion: "1.0".to_string(),
            subject: subject.to_string(),
            time: Utc::now(),
            event_type: event_type.to_string(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationEventData {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub device: EventDevice,
    pub integration: EventIntegration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDevice {
    pub id: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventIntegration {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub style: String,
    pub vendor: String,
}

#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: &CloudEvent<IntegrationEventData>) -> Result<(), SinkError>;
}

#[derive(Debug, Clone)]
pub struct HttpEventEmitter {
    sink: HttpSink,
}

impl HttpEventEmitter {
    pub fn new(url: &str) -> Result<Self, SinkError> {
        Ok(Self {
            sink: HttpSink::new(url)?,
        })
    }
}

#[async_trait]
impl EventEmitter for HttpEventEmitter {
    async fn emit(&self, event: &CloudEvent<IntegrationEventData>) -> Result<(), SinkError> {
        self.sink.post_json("", event).await
    }
}
