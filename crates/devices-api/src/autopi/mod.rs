//! AutoPi cloud API.
//!
//! The control plane for AutoPi dongles: device lookup, vehicle profile,
//! template association and raw commands.

mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::storage::Database;

pub use client::AutoPiClient;

/// Salt command that makes a dongle pull its pending template state.
pub const SYNC_COMMAND: &str = "state.sls pending";

/// AutoPi API errors.
#[derive(Debug, Error)]
pub enum AutoPiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AutoPi API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A dongle as reported by AutoPi.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DongleDevice {
    pub id: String,
    pub unit_id: String,
    #[serde(default)]
    pub imei: String,
    /// Currently associated template, 0 for none.
    #[serde(default)]
    pub template: i64,
    #[serde(default)]
    pub vehicle: DongleVehicle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DongleVehicle {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub vin: String,
    #[serde(default)]
    pub display: String,
}

/// Patch body for the AutoPi vehicle profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_name: Option<String>,
}

/// AutoPi control plane operations.
#[async_trait]
pub trait AutoPiApi: Send + Sync {
    async fn get_device_by_unit_id(&self, unit_id: &str) -> Result<DongleDevice, AutoPiError>;

    async fn patch_vehicle_profile(
        &self,
        vehicle_id: i64,
        profile: &VehicleProfile,
    ) -> Result<(), AutoPiError>;

    async fn unassociate_device_template(
        &self,
        device_id: &str,
        template_id: i64,
    ) -> Result<(), AutoPiError>;

    async fn associate_device_to_template(
        &self,
        device_id: &str,
        template_id: i64,
    ) -> Result<(), AutoPiError>;

    /// Schedule the template for the device's next reboot.
    async fn apply_template(&self, device_id: &str, template_id: i64) -> Result<(), AutoPiError>;

    /// Run a raw command; returns the job ID.
    async fn execute_raw_command(
        &self,
        device_id: &str,
        command: &str,
    ) -> Result<String, AutoPiError>;
}

/// Ask the dongle to sync and record the job. The command has already been
/// sent once AutoPi returns a job ID, so a failed job record is only logged.
pub async fn command_sync_device(
    api: &dyn AutoPiApi,
    db: &Database,
    unit_id: &str,
    device_id: &str,
    user_device_id: &str,
) -> Result<String, AutoPiError> {
    let job_id = api.execute_raw_command(device_id, SYNC_COMMAND).await?;
    if let Err(e) = db
        .create_autopi_job(&job_id, device_id, SYNC_COMMAND, Some(user_device_id))
        .await
    {
        warn!(unit_id, device_id, job_id = %job_id, error = %e, "Failed to record sync job");
    }
    info!(unit_id, device_id, job_id = %job_id, "Sent sync command");
    Ok(job_id)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_helpers::{DONGLE_ID, Harness, UNIT_ID, USER_DEVICE_ID};

    #[test]
    fn dongle_device_tolerates_sparse_json() {
        let device: DongleDevice =
            serde_json::from_str(r#"{"id": "dev1", "unit_id": "unit1"}"#).unwrap();
        assert_eq!(device.template, 0);
        assert_eq!(device.vehicle.id, 0);
    }

    #[test]
    fn vehicle_profile_omits_unset_fields() {
        let profile = VehicleProfile {
            year: Some(2020),
            call_name: None,
        };
        assert_eq!(serde_json::to_string(&profile).unwrap(), r#"{"year":2020}"#);
    }

    #[tokio::test]
    async fn sync_records_job() {
        let h = Harness::new().await;

        let job_id =
            command_sync_device(h.autopi.as_ref(), &h.db, UNIT_ID, DONGLE_ID, USER_DEVICE_ID)
                .await
                .unwrap();

        assert_eq!(job_id, "job-0");
        let job = h.db.get_autopi_job("job-0").await.unwrap();
        assert_eq!(job.command, SYNC_COMMAND);
        assert_eq!(job.user_device_id.as_deref(), Some(USER_DEVICE_ID));
    }

    #[tokio::test]
    async fn sync_job_id_survives_failed_job_record() {
        let h = Harness::new().await;
        h.db.create_autopi_job("job-0", DONGLE_ID, SYNC_COMMAND, None)
            .await
            .unwrap();

        let job_id =
            command_sync_device(h.autopi.as_ref(), &h.db, UNIT_ID, DONGLE_ID, USER_DEVICE_ID)
                .await
                .unwrap();

        assert_eq!(job_id, "job-0");
        assert_eq!(h.autopi.calls(), vec!["command dev1 state.sls pending"]);
        let job = h.db.get_autopi_job("job-0").await.unwrap();
        assert!(job.user_device_id.is_none());
    }
}
