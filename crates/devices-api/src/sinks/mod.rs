//! Outbound notification sinks: ingest registrar, domain events and the
//! device-definition registrar. All three post JSON to a configured URL.

mod dd_registrar;
mod events;
mod ingest;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub use dd_registrar::{DeviceDefinitionRegistrar, HttpDeviceDefinitionRegistrar, RegistrarDto};
pub use events::{
    CloudEvent, EventDevice, EventEmitter, EventIntegration, HttpEventEmitter,
    INTEGRATION_CREATED_EVENT, INTEGRATION_DELETED_EVENT, IntegrationEventData,
};
pub use ingest::{DeviceVehicleMapping, HttpIngestRegistrar, IngestRegistrar};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sink returned error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A JSON endpoint.
#[derive(Debug, Clone)]
pub struct HttpSink {
    http: reqwest::Client,
    url: String,
}

impl HttpSink {
    pub fn new(url: &str) -> Result<Self, SinkError> {
        if url.is_empty() {
            return Err(SinkError::Config("sink url is empty".into()));
        }

        // reqwest is built with rustls-no-provider; an `Err` means already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        Ok(Self {
            http: reqwest::Client::builder().build()?,
            url: url.trim_end_matches('/').to_string(),
        })
    }

    /// POST `body` to `{url}{path}`.
    pub async fn post_json<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<(), SinkError> {
        let url = format!("{}{}", self.url, path);
        let response = self.http.post(&url).json(body).send().await?;

        let status = response.status();
        if status.is_success() {
            debug!(url = %url, "Sink accepted payload");
            return Ok(());
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read body>".to_string());
        Err(SinkError::Api {
            status: status.as_u16(),
            body,
        })
    }
}
