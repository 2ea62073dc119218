//! Ingest registrar: joins a hardware data stream to a vehicle.

use async_trait::async_trait;
use devices_core::TokenId;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{HttpSink, SinkError};

/// Address-based device↔vehicle mapping used for non-AutoPi hardware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceVehicleMapping {
    pub hardware_address: String,
    pub hardware_token: TokenId,
    pub hardware_serial: String,
    pub integration_id: String,
    pub vehicle_token: TokenId,
    pub vehicle_id: String,
}

#[async_trait]
pub trait IngestRegistrar: Send + Sync {
    /// Join an AutoPi unit to a vehicle.
    async fn register(
        &self,
        unit_id: &str,
        vehicle_id: &str,
        integration_id: &str,
    ) -> Result<(), SinkError>;

    /// Join address-identified hardware to a vehicle.
    async fn register_mapping(&self, mapping: &DeviceVehicleMapping) -> Result<(), SinkError>;

    async fn deregister(
        &self,
        device_id: &str,
        vehicle_id: &str,
        integration_id: &str,
    ) -> Result<(), SinkError>;

    async fn deregister_address(&self, hardware_address: &str) -> Result<(), SinkError>;
}

#[derive(Debug, Clone)]
pub struct HttpIngestRegistrar {
    sink: HttpSink,
}

impl HttpIngestRegistrar {
    pub fn new(base_url: &str) -> Result<Self, SinkError> {
        Ok(Self {
            sink: HttpSink::new(base_url)?,
        })
    }
}

#[async_trait]
impl IngestRegistrar for HttpIngestRegistrar {
    async fn register(
        &self,
        unit_id: &str,
        vehicle_id: &str,
        integration_id: &str,
    ) -> Result<(), SinkError> {
        self.sink
            .post_json(
                "/autopi/register",
                &json!({
                    "unitId": unit_id,
                    "vehicleId": vehicle_id,
                    "integrationId": integration_id,
                }),
            )
            .await
    }

    async fn register_mapping(&self, mapping: &DeviceVehicleMapping) -> Result<(), SinkError> {
        self.sink.post_json("/register", mapping).await
    }

    async fn deregister(
        &self,
        device_id: &str,
        vehicle_id: &str,
        integration_id: &str,
    ) -> Result<(), SinkError> {
        self.sink
            .post_json(
                "/autopi/deregister",
                &json!({
                    "deviceId": device_id,
                    "vehicleId": vehicle_id,
                    "integrationId": integration_id,
                }),
            )
            .await
    }

    async fn deregister_address(&self, hardware_address: &str) -> Result<(), SinkError> {
        self.sink
            .post_json("/deregister", &json!({ "hardwareAddress": hardware_address }))
            .await
    }
}
