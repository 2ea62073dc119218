//! Aftermarket device pairing.
//!
//! `pair` links a hardware token to a vehicle token:
//! 1. resolve hardware, integration, vehicle and device definition
//! 2. stage a Pending integration link (one short transaction)
//! 3. AutoPi only: reconfigure the dongle, then persist the reached
//!    sub-status, or mark the link Failed if a vendor call fails
//! 4. register with the ingest registrar (errors propagate)
//! 5. emit the integration event and notify the DD registrar (best effort)
//!
//! No transaction is held across vendor calls. Ingest registration happens
//! after the link is committed and is not rolled back on failure.

mod vendor;


use std::sync::Arc;

use chrono::Utc;
use devices_core::TokenId;
use devices_core::region::region_for_country;
use tracing::{error, info, instrument, warn};

use crate::autopi::{self, AutoPiApi, DongleDevice, VehicleProfile};
use crate::definitions::{DeviceDefinition, DeviceDefinitionLookup, IntegrationDescriptor};
use crate::error::PairingError;
use crate::sinks::{
    CloudEvent, DeviceDefinitionRegistrar, DeviceVehicleMapping, EventDevice, EventEmitter,
    EventIntegration, INTEGRATION_CREATED_EVENT, INTEGRATION_DELETED_EVENT, IngestRegistrar,
    IntegrationEventData, RegistrarDto,
};
use crate::storage::{
    Database, DatabaseError, IntegrationLink, IntegrationStatus, LinkMetadata, PairingSubStatus,
    StageLink, UserDevice,
};
use crate::template;

pub use vendor::{Vendor, hardware_address};

/// Services the orchestrator talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub db: Database,
    pub definitions: Arc<dyn DeviceDefinitionLookup>,
    pub ingest: Arc<dyn IngestRegistrar>,
    pub events: Arc<dyn EventEmitter>,
    pub dd_registrar: Arc<dyn DeviceDefinitionRegistrar>,
}

#[derive(Clone)]
pub struct PairingOrchestrator {
    deps: Collaborators,
    vendor: Vendor,
}

/// AutoPi state gathered before the link is staged.
struct AutoPiPlan {
    api: Arc<dyn AutoPiApi>,
    device: DongleDevice,
    template_id: i64,
}

impl PairingOrchestrator {
    pub const fn new(deps: Collaborators, vendor: Vendor) -> Self {
        Self { deps, vendor }
    }

    pub fn autopi(deps: Collaborators, api: Arc<dyn AutoPiApi>) -> Self {
        Self::new(deps, Vendor::AutoPi(api))
    }

    pub const fn generic(deps: Collaborators) -> Self {
        Self::new(deps, Vendor::GenericAftermarket)
    }

    pub const fn macaron(deps: Collaborators) -> Self {
        Self::new(deps, Vendor::Macaron)
    }

    pub const fn vendor(&self) -> &Vendor {
        &self.vendor
    }

    /// Pair a hardware token with a vehicle token. Re-pairing replaces the
    /// existing link for the (vehicle, integration) pair.
    #[instrument(skip(self), fields(vendor = self.vendor.label()))]
    pub async fn pair(
        &self,
        hardware_token: TokenId,
        vehicle_token: TokenId,
    ) -> Result<(), PairingError> {
        let db = &self.deps.db;

        let hardware = db.get_aftermarket_device_by_token(hardware_token).await?;
        let integration = self
            .vendor
            .resolve_integration(self.deps.definitions.as_ref(), &hardware)
            .await?;

        let autopi_device = match &self.vendor {
            Vendor::AutoPi(api) => Some(
                api.get_device_by_unit_id(&hardware.serial)
                    .await
                    .map_err(PairingError::vendor(format!(
                        "failed to get autopi device {}",
                        hardware.serial
                    )))?,
            ),
            _ => None,
        };

        let user_device = self.live_user_device(vehicle_token).await?;
        let definition = self
            .deps
            .definitions
            .get_device_definition_by_id(&user_device.definition_id)
            .await?;

        let plan = match (&self.vendor, autopi_device) {
            (Vendor::AutoPi(api), Some(device)) => {
                let template = template::get_template_id(&user_device, &definition, &integration)?;
                let template_id = template
                    .parse::<i64>()
                    .map_err(|_| PairingError::InvalidTemplate(template.clone()))?;
                Some(AutoPiPlan {
                    api: Arc::clone(api),
                    device,
                    template_id,
                })
            }
            _ => None,
        };

        let mapping = if self.vendor.uses_hardware_address() {
            Some(DeviceVehicleMapping {
                hardware_address: hardware_address(&hardware)?,
                hardware_token,
                hardware_serial: hardware.serial.clone(),
                integration_id: integration.id.clone(),
                vehicle_token,
                vehicle_id: user_device.id.clone(),
            })
        } else {
            None
        };

        let metadata = plan.as_ref().map(|p| LinkMetadata {
            autopi_unit_id: Some(hardware.serial.clone()),
            autopi_imei: Some(p.device.imei.clone()).filter(|i| !i.is_empty()),
            autopi_template_applied: Some(p.template_id),
            autopi_sub_status: Some(PairingSubStatus::Pending),
            autopi_registration_error: None,
        });
        let metadata_json = metadata.as_ref().map(LinkMetadata::to_json).transpose()?;

        let (link, replaced) = db
            .stage_integration_link(StageLink {
                user_device_id: &user_device.id,
                integration_id: &integration.id,
                external_id: Some(&hardware.serial),
                serial: &hardware.serial,
                status: IntegrationStatus::Pending,
                metadata: metadata_json.as_deref(),
                vehicle_token_id: vehicle_token,
            })
            .await?;
        if replaced {
            info!(
                user_device_id = %user_device.id,
                integration_id = %integration.id,
                "Replaced existing integration link"
            );
        }

        if let (Some(plan), Some(metadata)) = (plan, metadata) {
            self.configure_autopi(&plan, &link, metadata, &user_device, &definition)
                .await?;
        }

        let registered = match &mapping {
            Some(mapping) => self.deps.ingest.register_mapping(mapping).await,
            None => {
                self.deps
                    .ingest
                    .register(&hardware.serial, &user_device.id, &integration.id)
                    .await
            }
        };
        registered.map_err(|e| {
            error!(
                serial = %hardware.serial,
                user_device_id = %user_device.id,
                error = %e,
                "Ingest registration failed after link was committed"
            );
            PairingError::Ingest(e)
        })?;

        self.emit(INTEGRATION_CREATED_EVENT, &user_device, &definition, &integration)
            .await;

        if self.vendor.registers_definitions() {
            self.register_definition(&user_device, &definition, &integration)
                .await;
        }

        info!(
            serial = %hardware.serial,
            user_device_id = %user_device.id,
            integration_id = %integration.id,
            "Paired aftermarket device"
        );
        Ok(())
    }

    /// Unpair a hardware token from a vehicle token. A missing link is not
    /// an error.
    #[instrument(skip(self), fields(vendor = self.vendor.label()))]
    pub async fn unpair(
        &self,
        hardware_token: TokenId,
        vehicle_token: TokenId,
    ) -> Result<(), PairingError> {
        let db = &self.deps.db;

        let user_device = self.live_user_device(vehicle_token).await?;
        let hardware = db.get_aftermarket_device_by_token(hardware_token).await?;
        let integration = self
            .vendor
            .resolve_integration(self.deps.definitions.as_ref(), &hardware)
            .await?;

        let address = if self.vendor.uses_hardware_address() {
            Some(hardware_address(&hardware)?)
        } else {
            None
        };

        let removed = db
            .remove_integration_link(
                &user_device.id,
                &integration.id,
                &hardware.serial,
                vehicle_token,
            )
            .await?;
        if !removed {
            info!(
                user_device_id = %user_device.id,
                integration_id = %integration.id,
                "No integration link to remove"
            );
        }

        let deregistered = match &address {
            Some(address) => self.deps.ingest.deregister_address(address).await,
            None => {
                self.deps
                    .ingest
                    .deregister(&hardware.serial, &user_device.id, &integration.id)
                    .await
            }
        };
        deregistered.map_err(|e| {
            error!(
                serial = %hardware.serial,
                user_device_id = %user_device.id,
                error = %e,
                "Ingest deregistration failed after link was removed"
            );
            PairingError::Ingest(e)
        })?;

        let definition = self
            .deps
            .definitions
            .get_device_definition_by_id(&user_device.definition_id)
            .await?;
        self.emit(INTEGRATION_DELETED_EVENT, &user_device, &definition, &integration)
            .await;

        info!(
            serial = %hardware.serial,
            user_device_id = %user_device.id,
            integration_id = %integration.id,
            "Unpaired aftermarket device"
        );
        Ok(())
    }

    async fn live_user_device(&self, vehicle_token: TokenId) -> Result<UserDevice, PairingError> {
        self.deps
            .db
            .get_vehicle_by_token(vehicle_token)
            .await?
            .user_device
            .ok_or(PairingError::VehicleDeleted(vehicle_token))
    }

    /// Run the AutoPi reconfiguration and persist how far it got. Any error,
    /// including the final write, marks the link Failed before it is returned.
    async fn configure_autopi(
        &self,
        plan: &AutoPiPlan,
        link: &IntegrationLink,
        metadata: LinkMetadata,
        user_device: &UserDevice,
        definition: &DeviceDefinition,
    ) -> Result<(), PairingError> {
        let mut progress = PairingSubStatus::Pending;

        let outcome = match self
            .run_autopi_steps(plan, user_device, definition, &mut progress)
            .await
        {
            Ok(()) => self.persist_sub_status(link, &metadata, progress).await,
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            self.record_failure(link, metadata, progress, &e).await;
            return Err(e);
        }
        Ok(())
    }

    async fn persist_sub_status(
        &self,
        link: &IntegrationLink,
        metadata: &LinkMetadata,
        progress: PairingSubStatus,
    ) -> Result<(), PairingError> {
        let json = LinkMetadata {
            autopi_sub_status: Some(progress),
            ..metadata.clone()
        }
        .to_json()?;

        let updated = self
            .deps
            .db
            .update_integration_link_metadata(&link.user_device_id, &link.integration_id, &json)
            .await?;
        if !updated {
            return Err(DatabaseError::NotFound(format!(
                "Integration link for {} and {}",
                link.user_device_id, link.integration_id
            ))
            .into());
        }
        Ok(())
    }

    async fn run_autopi_steps(
        &self,
        plan: &AutoPiPlan,
        user_device: &UserDevice,
        definition: &DeviceDefinition,
        progress: &mut PairingSubStatus,
    ) -> Result<(), PairingError> {
        let api = plan.api.as_ref();
        let device = &plan.device;

        let profile = VehicleProfile {
            year: Some(definition.year).filter(|y| *y > 0),
            call_name: user_device.name.clone(),
        };
        api.patch_vehicle_profile(device.vehicle.id, &profile)
            .await
            .map_err(PairingError::vendor(format!(
                "failed to patch autopi vehicle profile {}",
                device.vehicle.id
            )))?;
        *progress = PairingSubStatus::PatchedVehicleProfile;

        template::reassign_template(api, device, plan.template_id, progress).await?;

        // The dongle picks the template up on its own eventually.
        match autopi::command_sync_device(
            api,
            &self.deps.db,
            &device.unit_id,
            &device.id,
            &user_device.id,
        )
        .await
        {
            Ok(_) => *progress = PairingSubStatus::PendingTemplateConfirm,
            Err(e) => warn!(
                device_id = %device.id,
                error = %e,
                "Failed to sync changes to autopi device"
            ),
        }

        Ok(())
    }

    async fn record_failure(
        &self,
        link: &IntegrationLink,
        mut metadata: LinkMetadata,
        progress: PairingSubStatus,
        err: &PairingError,
    ) {
        metadata.autopi_sub_status = Some(progress);
        metadata.autopi_registration_error = Some(err.to_string());

        let json = match metadata.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to encode failed-pairing metadata");
                return;
            }
        };

        if let Err(e) = self
            .deps
            .db
            .update_integration_link(
                &link.user_device_id,
                &link.integration_id,
                IntegrationStatus::Failed,
                Some(&json),
            )
            .await
        {
            error!(
                user_device_id = %link.user_device_id,
                error = %e,
                "Failed to persist failed pairing status"
            );
        }
    }

    async fn emit(
        &self,
        event_type: &str,
        user_device: &UserDevice,
        definition: &DeviceDefinition,
        integration: &IntegrationDescriptor,
    ) {
        let event = CloudEvent::new(
            event_type,
            &user_device.id,
            integration_event(user_device, definition, integration),
        );
        if let Err(e) = self.deps.events.emit(&event).await {
            warn!(event_type, error = %e, "Failed to emit integration event");
        }
    }

    async fn register_definition(
        &self,
        user_device: &UserDevice,
        definition: &DeviceDefinition,
        integration: &IntegrationDescriptor,
    ) {
        let region = user_device
            .country_code
            .as_deref()
            .and_then(region_for_country)
            .unwrap_or_default();
        let dto = RegistrarDto {
            integration_id: integration.id.clone(),
            vehicle_id: user_device.id.clone(),
            device_definition_id: definition.id.clone(),
            make: definition.make.name.clone(),
            model: definition.model.clone(),
            year: definition.year,
            region: region.to_string(),
            make_slug: definition.make.name_slug.clone(),
            model_slug: definition.model_slug.clone(),
        };
        if let Err(e) = self.deps.dd_registrar.register(&dto).await {
            warn!(error = %e, "Failed to register with device definition registrar");
        }
    }
}

fn integration_event(
    user_device: &UserDevice,
    definition: &DeviceDefinition,
    integration: &IntegrationDescriptor,
) -> IntegrationEventData {
    IntegrationEventData {
        timestamp: Utc::now(),
        user_id: user_device.user_id.clone(),
        device: EventDevice {
            id: user_device.id.clone(),
            make: definition.make.name.clone(),
            model: definition.model.clone(),
            year: definition.year,
            vin: user_device.vin.clone(),
        },
        integration: EventIntegration {
            id: integration.id.clone(),
            kind: integration.kind.clone(),
            style: integration.style.clone(),
            vendor: integration.vendor.clone(),
        },
    }
}
