//! Hardware template resolution and forced template application.
//!
//! A template is the AutoPi configuration profile a dongle runs. The choice
//! walks from the most specific override to the integration default:
//! device style, device definition, make, powertrain map, vendor default,
//! and finally [`DEFAULT_TEMPLATE_ID`].

use std::sync::Arc;

use tracing::{info, warn};

use crate::autopi::{self, AutoPiApi, DongleDevice};
use crate::definitions::{DeviceDefinition, IntegrationDescriptor};
use crate::error::PairingError;
use crate::storage::{Database, PairingSubStatus, UserDevice, UserDeviceMetadata};

/// Used when nothing in the chain yields a template.
pub const DEFAULT_TEMPLATE_ID: &str = "10";

/// Positive integer template IDs only.
pub fn is_valid_template_id(id: &str) -> bool {
    parse_template_id(id).is_some()
}

fn parse_template_id(id: &str) -> Option<i64> {
    id.trim().parse::<i64>().ok().filter(|v| *v > 0)
}

fn valid(id: Option<&str>) -> Option<String> {
    id.and_then(parse_template_id).map(|v| v.to_string())
}

/// Pick the template for a vehicle.
///
/// Malformed vehicle metadata is an error only when the integration has a
/// powertrain map to consult.
pub fn get_template_id(
    user_device: &UserDevice,
    definition: &DeviceDefinition,
    integration: &IntegrationDescriptor,
) -> Result<String, PairingError> {
    if let Some(style_id) = user_device.device_style_id.as_deref() {
        let style_template = definition
            .device_styles
            .iter()
            .find(|s| s.id == style_id)
            .and_then(|s| valid(s.hardware_template_id.as_deref()));
        if let Some(t) = style_template {
            return Ok(t);
        }
    }

    if let Some(t) = valid(definition.hardware_template_id.as_deref()) {
        return Ok(t);
    }

    if let Some(t) = valid(definition.make.hardware_template_id.as_deref()) {
        return Ok(t);
    }

    if let Some(templates) = &integration.autopi_powertrain_template {
        if let Some(raw) = user_device.metadata.as_deref().filter(|m| !m.trim().is_empty()) {
            let metadata: UserDeviceMetadata = serde_json::from_str(raw)?;
            if let Some(powertrain) = metadata.powertrain_type {
                let t = templates.template_for(powertrain);
                if t > 0 {
                    return Ok(t.to_string());
                }
            }
        }
    }

    if integration.autopi_default_template_id > 0 {
        return Ok(integration.autopi_default_template_id.to_string());
    }

    warn!(
        user_device_id = %user_device.id,
        definition_id = %definition.id,
        integration_id = %integration.id,
        "No hardware template configured, using fallback {DEFAULT_TEMPLATE_ID}"
    );
    Ok(DEFAULT_TEMPLATE_ID.to_string())
}

/// Move a dongle onto `template_id`: drop its current template, associate
/// and apply the new one. `progress` tracks the last completed step.
pub(crate) async fn reassign_template(
    api: &dyn AutoPiApi,
    device: &DongleDevice,
    template_id: i64,
    progress: &mut PairingSubStatus,
) -> Result<(), PairingError> {
    if device.template > 0 {
        api.unassociate_device_template(&device.id, device.template)
            .await
            .map_err(PairingError::vendor(format!(
                "failed to unassociate template {}",
                device.template
            )))?;
    }

    api.associate_device_to_template(&device.id, template_id)
        .await
        .map_err(PairingError::vendor(format!(
            "failed to associate autoPiDevice {} to template {template_id}",
            device.id
        )))?;
    *progress = PairingSubStatus::AssociatedDeviceToTemplate;

    api.apply_template(&device.id, template_id)
        .await
        .map_err(PairingError::vendor(format!(
            "failed to apply autoPiDevice {} with template {template_id}",
            device.id
        )))?;
    *progress = PairingSubStatus::AppliedTemplate;

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyHardwareTemplateRequest {
    pub user_device_id: String,
    pub unit_id: String,
    pub hardware_template_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyHardwareTemplateResponse {
    pub applied: bool,
}

/// Forces a template onto an already-paired AutoPi unit.
#[derive(Clone)]
pub struct HardwareTemplateService {
    db: Database,
    autopi: Arc<dyn AutoPiApi>,
}

impl HardwareTemplateService {
    pub fn new(db: Database, autopi: Arc<dyn AutoPiApi>) -> Self {
        Self { db, autopi }
    }

    pub fn get_template_id(
        &self,
        user_device: &UserDevice,
        definition: &DeviceDefinition,
        integration: &IntegrationDescriptor,
    ) -> Result<String, PairingError> {
        get_template_id(user_device, definition, integration)
    }

    /// Vendor calls run with no transaction open; the applied template is
    /// written to the link only after all of them succeed.
    pub async fn apply_hardware_template(
        &self,
        req: &ApplyHardwareTemplateRequest,
    ) -> Result<ApplyHardwareTemplateResponse, PairingError> {
        let template_id = parse_template_id(&req.hardware_template_id)
            .ok_or_else(|| PairingError::InvalidTemplate(req.hardware_template_id.clone()))?;

        let link = self
            .db
            .get_integration_link_by_external_id(&req.user_device_id, &req.unit_id)
            .await?;
        let hardware = self.db.get_aftermarket_device(&req.unit_id).await?;

        let device = self
            .autopi
            .get_device_by_unit_id(&hardware.serial)
            .await
            .map_err(PairingError::vendor(format!(
                "failed to get autopi device {}",
                hardware.serial
            )))?;

        let mut progress = PairingSubStatus::Pending;
        reassign_template(self.autopi.as_ref(), &device, template_id, &mut progress).await?;

        autopi::command_sync_device(
            self.autopi.as_ref(),
            &self.db,
            &hardware.serial,
            &device.id,
            &req.user_device_id,
        )
        .await
        .map_err(PairingError::vendor(format!(
            "failed to sync changes to autoPiDevice {}",
            device.id
        )))?;

        let mut metadata = link.parsed_metadata()?;
        metadata.autopi_template_applied = Some(template_id);
        self.db
            .update_integration_link_metadata(
                &link.user_device_id,
                &link.integration_id,
                &metadata.to_json()?,
            )
            .await?;

        info!(
            user_device_id = %req.user_device_id,
            unit_id = %req.unit_id,
            template_id,
            "Applied hardware template"
        );

        Ok(ApplyHardwareTemplateResponse { applied: true })
    }
}
