//! Data models for the devices-api record store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A vehicle registered by a user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserDevice {
    pub id: String,
    pub user_id: String,
    pub definition_id: String,
    pub device_style_id: Option<String>,
    pub name: Option<String>,
    pub vin: Option<String>,
    pub vin_confirmed: i64,
    pub country_code: Option<String>,
    /// Free-form JSON, see [`UserDeviceMetadata`].
    pub metadata: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Known keys of `user_devices.metadata`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeviceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub powertrain_type: Option<PowertrainType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_protocol: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowertrainType {
    #[serde(rename = "ICE")]
    Ice,
    #[serde(rename = "HEV")]
    Hev,
    #[serde(rename = "PHEV")]
    Phev,
    #[serde(rename = "BEV")]
    Bev,
}

/// A minted vehicle NFT row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VehicleNft {
    pub token_id: String,
    pub user_device_id: Option<String>,
    pub owner_address: Option<String>,
    pub created_at: i64,
}

/// A vehicle looked up by token, with its user device when still live.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub nft: VehicleNft,
    pub user_device: Option<UserDevice>,
}

/// A physical aftermarket unit.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AftermarketDevice {
    /// Vendor serial; the AutoPi unit ID for AutoPi devices.
    pub serial: String,
    pub token_id: Option<String>,
    pub ethereum_address: Option<String>,
    pub owner_address: Option<String>,
    pub beneficiary: Option<String>,
    pub device_manufacturer_token_id: Option<String>,
    /// Token of the vehicle this unit is currently paired with.
    pub vehicle_token_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Join row between a vehicle and an integration.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IntegrationLink {
    pub user_device_id: String,
    pub integration_id: String,
    pub external_id: Option<String>,
    pub serial: Option<String>,
    pub status: String,
    /// JSON, see [`LinkMetadata`].
    pub metadata: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl IntegrationLink {
    /// Parsed metadata; a missing column yields the default.
    pub fn parsed_metadata(&self) -> Result<LinkMetadata, serde_json::Error> {
        match self.metadata.as_deref() {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw),
            _ => Ok(LinkMetadata::default()),
        }
    }
}

/// Integration link metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMetadata {
    #[serde(rename = "autoPiUnitId", default, skip_serializing_if = "Option::is_none")]
    pub autopi_unit_id: Option<String>,
    #[serde(rename = "autoPiIMEI", default, skip_serializing_if = "Option::is_none")]
    pub autopi_imei: Option<String>,
    #[serde(
        rename = "autoPiTemplateApplied",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub autopi_template_applied: Option<i64>,
    #[serde(rename = "autoPiSubStatus", default, skip_serializing_if = "Option::is_none")]
    pub autopi_sub_status: Option<PairingSubStatus>,
    #[serde(
        rename = "autoPiRegistrationError",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub autopi_registration_error: Option<String>,
}

impl LinkMetadata {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Integration link status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationStatus {
    Pending,
    PendingFirstData,
    Active,
    Failed,
}

impl IntegrationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::PendingFirstData => "PendingFirstData",
            Self::Active => "Active",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "PendingFirstData" => Ok(Self::PendingFirstData),
            "Active" => Ok(Self::Active),
            "Failed" => Ok(Self::Failed),
            other => Err(format!("unknown integration status {other}")),
        }
    }
}

/// How far an AutoPi pairing got. Ordered by progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PairingSubStatus {
    Pending,
    PatchedVehicleProfile,
    AssociatedDeviceToTemplate,
    AppliedTemplate,
    PendingTemplateConfirm,
}

/// An AutoPi command job.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AutoPiJob {
    pub id: String,
    pub device_id: String,
    pub command: String,
    pub state: String,
    pub user_device_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
