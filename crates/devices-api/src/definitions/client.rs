//! HTTP client for the device-definitions service.

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{DefinitionsError, DeviceDefinition, DeviceDefinitionLookup, IntegrationDescriptor};

#[derive(Debug, Clone)]
pub struct DeviceDefinitionsClient {
    http: reqwest::Client,
    base_url: String,
}

impl DeviceDefinitionsClient {
    pub fn new(base_url: &str) -> Result<Self, DefinitionsError> {
        if base_url.is_empty() {
            return Err(DefinitionsError::Config("device definitions url is empty".into()));
        }

        // reqwest is built with rustls-no-provider; an `Err` means already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    fn check_status(resp: &reqwest::Response, what: &str) -> Result<(), DefinitionsError> {
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DefinitionsError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            return Err(DefinitionsError::Api {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceDefinitionLookup for DeviceDefinitionsClient {
    async fn get_integrations(&self) -> Result<Vec<IntegrationDescriptor>, DefinitionsError> {
        let resp = self.http.get(self.url("/integrations")).send().await?;
        Self::check_status(&resp, "integrations")?;
        Ok(resp.json().await?)
    }

    async fn get_device_definition_by_id(
        &self,
        id: &str,
    ) -> Result<DeviceDefinition, DefinitionsError> {
        let resp = self
            .http
            .get(self.url(&format!("/device-definitions/{id}")))
            .send()
            .await?;
        Self::check_status(&resp, &format!("device definition {id}"))?;
        Ok(resp.json().await?)
    }
}
