//! Device definitions lookup.
//!
//! Integration descriptors and device definitions are owned by the sibling
//! device-definitions service; this module only reads them.

mod client;

use async_trait::async_trait;
use devices_core::TokenId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::PowertrainType;

pub use client::DeviceDefinitionsClient;

/// Vendor name of the AutoPi integration.
pub const AUTOPI_VENDOR: &str = "AutoPi";
/// Vendor name of the Macaron integration.
pub const MACARON_VENDOR: &str = "Macaron";

/// Device definitions lookup errors.
#[derive(Debug, Error)]
pub enum DefinitionsError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Device definitions API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// An integration as described by the device-definitions service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationDescriptor {
    pub id: String,
    pub vendor: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub style: String,
    /// Template applied when nothing more specific matches.
    #[serde(default)]
    pub autopi_default_template_id: i64,
    #[serde(default)]
    pub autopi_powertrain_template: Option<PowertrainTemplates>,
    /// Manufacturer NFT whose devices belong to this integration.
    #[serde(default)]
    pub manufacturer_token_id: Option<TokenId>,
}

/// Template per powertrain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct PowertrainTemplates {
    #[serde(default)]
    pub ice: i64,
    #[serde(default)]
    pub hev: i64,
    #[serde(default)]
    pub phev: i64,
    #[serde(default)]
    pub bev: i64,
}

impl PowertrainTemplates {
    pub const fn template_for(&self, powertrain: PowertrainType) -> i64 {
        match powertrain {
            PowertrainType::Ice => self.ice,
            PowertrainType::Hev => self.hev,
            PowertrainType::Phev => self.phev,
            PowertrainType::Bev => self.bev,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDefinition {
    pub id: String,
    #[serde(default)]
    pub year: i32,
    pub make: DeviceMake,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub model_slug: String,
    #[serde(default)]
    pub hardware_template_id: Option<String>,
    #[serde(default)]
    pub device_styles: Vec<DeviceStyle>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMake {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub name_slug: String,
    #[serde(default)]
    pub hardware_template_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStyle {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub hardware_template_id: Option<String>,
}

/// Read access to the device-definitions service.
#[async_trait]
pub trait DeviceDefinitionLookup: Send + Sync {
    /// All known integrations.
    async fn get_integrations(&self) -> Result<Vec<IntegrationDescriptor>, DefinitionsError>;

    async fn get_device_definition_by_id(
        &self,
        id: &str,
    ) -> Result<DeviceDefinition, DefinitionsError>;

    /// The integration of a vendor, matched case-insensitively.
    async fn get_integration_by_vendor(
        &self,
        vendor: &str,
    ) -> Result<IntegrationDescriptor, DefinitionsError> {
        self.get_integrations()
            .await?
            .into_iter()
            .find(|i| i.vendor.eq_ignore_ascii_case(vendor))
            .ok_or_else(|| DefinitionsError::NotFound(format!("integration for vendor {vendor}")))
    }
}
