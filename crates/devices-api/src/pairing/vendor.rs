//! Per-vendor pieces of pairing: integration resolution and ingest
//! identity. Only AutoPi reconfigures the physical device.

use std::fmt;
use std::sync::Arc;

use devices_core::TokenId;

use crate::autopi::AutoPiApi;
use crate::definitions::{
    AUTOPI_VENDOR, DeviceDefinitionLookup, IntegrationDescriptor, MACARON_VENDOR,
};
use crate::error::PairingError;
use crate::storage::AftermarketDevice;

#[derive(Clone)]
pub enum Vendor {
    /// AutoPi dongles, identified by unit ID and configured via templates.
    AutoPi(Arc<dyn AutoPiApi>),
    /// Any hardware whose integration is found through its manufacturer token.
    GenericAftermarket,
    Macaron,
}

impl fmt::Debug for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Vendor {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::AutoPi(_) => AUTOPI_VENDOR,
            Self::GenericAftermarket => "GenericAftermarket",
            Self::Macaron => MACARON_VENDOR,
        }
    }

    /// Whether pairings are reported to the device-definition registrar.
    pub const fn registers_definitions(&self) -> bool {
        matches!(self, Self::AutoPi(_) | Self::Macaron)
    }

    /// AutoPi is addressed by unit ID; everything else by Ethereum address.
    pub const fn uses_hardware_address(&self) -> bool {
        !matches!(self, Self::AutoPi(_))
    }

    pub async fn resolve_integration(
        &self,
        definitions: &dyn DeviceDefinitionLookup,
        hardware: &AftermarketDevice,
    ) -> Result<IntegrationDescriptor, PairingError> {
        match self {
            Self::AutoPi(_) => Ok(definitions.get_integration_by_vendor(AUTOPI_VENDOR).await?),
            Self::Macaron => Ok(definitions.get_integration_by_vendor(MACARON_VENDOR).await?),
            Self::GenericAftermarket => {
                let manufacturer = hardware
                    .device_manufacturer_token_id
                    .as_deref()
                    .ok_or_else(|| PairingError::MissingHardwareField {
                        serial: hardware.serial.clone(),
                        field: "manufacturer token",
                    })?;
                let manufacturer = TokenId::from_db(manufacturer)?;

                definitions
                    .get_integrations()
                    .await?
                    .into_iter()
                    .find(|i| i.manufacturer_token_id == Some(manufacturer))
                    .ok_or_else(|| PairingError::NoManufacturerIntegration(manufacturer.to_string()))
            }
        }
    }
}

/// The hardware's Ethereum address, required by address-based ingest.
pub fn hardware_address(hardware: &AftermarketDevice) -> Result<String, PairingError> {
    hardware
        .ethereum_address
        .clone()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| PairingError::MissingHardwareField {
            serial: hardware.serial.clone(),
            field: "ethereum address",
        })
}
