//! AutoPi REST client.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;

use super::{AutoPiApi, AutoPiError, DongleDevice, VehicleProfile};

#[derive(Debug, Clone)]
pub struct AutoPiClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    jid: String,
}

impl AutoPiClient {
    pub fn new(base_url: &str, api_token: &str) -> Result<Self, AutoPiError> {
        if base_url.is_empty() {
            return Err(AutoPiError::Config("base_url is empty".into()));
        }
        if api_token.is_empty() {
            return Err(AutoPiError::Config("api token is empty".into()));
        }

        let mut headers = HeaderMap::new();
        let token_val = HeaderValue::from_str(&format!("APIToken {api_token}"))
            .map_err(|_| AutoPiError::Config("Invalid token format".into()))?;
        headers.insert(AUTHORIZATION, token_val);

        // reqwest is built with rustls-no-provider; an `Err` means already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn check_status(resp: &reqwest::Response) -> Result<(), AutoPiError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(AutoPiError::Api {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AutoPiApi for AutoPiClient {
    async fn get_device_by_unit_id(&self, unit_id: &str) -> Result<DongleDevice, AutoPiError> {
        let resp = self
            .http
            .get(self.url(&format!("dongle/devices/by_unit_id/{unit_id}/")))
            .send()
            .await?;
        Self::check_status(&resp)?;
        Ok(resp.json().await?)
    }

    async fn patch_vehicle_profile(
        &self,
        vehicle_id: i64,
        profile: &VehicleProfile,
    ) -> Result<(), AutoPiError> {
        let resp = self
            .http
            .patch(self.url(&format!("vehicle/v2/profile/{vehicle_id}/")))
            .json(profile)
            .send()
            .await?;
        Self::check_status(&resp)
    }

    async fn unassociate_device_template(
        &self,
        device_id: &str,
        template_id: i64,
    ) -> Result<(), AutoPiError> {
        let resp = self
            .http
            .post(self.url(&format!("dongle/templates/{template_id}/unassociate_devices/")))
            .json(&json!({ "devices": [device_id] }))
            .send()
            .await?;
        Self::check_status(&resp)
    }

    async fn associate_device_to_template(
        &self,
        device_id: &str,
        template_id: i64,
    ) -> Result<(), AutoPiError> {
        let resp = self
            .http
            .patch(self.url(&format!("dongle/templates/{template_id}/")))
            .json(&json!({ "devices": [device_id] }))
            .send()
            .await?;
        Self::check_status(&resp)
    }

    async fn apply_template(&self, device_id: &str, template_id: i64) -> Result<(), AutoPiError> {
        let resp = self
            .http
            .post(self.url(&format!("dongle/devices/{device_id}/apply_explicit_template/")))
            .json(&json!({ "template": template_id }))
            .send()
            .await?;
        Self::check_status(&resp)
    }

    async fn execute_raw_command(
        &self,
        device_id: &str,
        command: &str,
    ) -> Result<String, AutoPiError> {
        let resp = self
            .http
            .post(self.url(&format!("dongle/devices/{device_id}/execute_raw/")))
            .json(&json!({ "command": command }))
            .send()
            .await?;
        Self::check_status(&resp)?;
        let body: CommandResponse = resp.json().await?;
        Ok(body.jid)
    }
}
