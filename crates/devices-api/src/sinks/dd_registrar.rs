//! Device-definition registrar: analytics side channel told about every
//! new hardware pairing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{HttpSink, SinkError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrarDto {
    pub integration_id: String,
    pub vehicle_id: String,
    pub device_definition_id: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub region: String,
    pub make_slug: String,
    pub model_slug: String,
}

#[async_trait]
pub trait DeviceDefinitionRegistrar: Send + Sync {
    async fn register(&self, dto: &RegistrarDto) -> Result<(), SinkError>;
}

#[derive(Debug, Clone)]
pub struct HttpDeviceDefinitionRegistrar {
    sink: HttpSink,
}

impl HttpDeviceDefinitionRegistrar {
    pub fn new(url: &str) -> Result<Self, SinkError> {
        Ok(Self {
            sink: HttpSink::new(url)?,
        })
    }
}

#[async_trait]
impl DeviceDefinitionRegistrar for HttpDeviceDefinitionRegistrar {
    async fn register(&self, dto: &RegistrarDto) -> Result<(), SinkError> {
        self.sink.post_json("", dto).await
    }
}
