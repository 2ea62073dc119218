//! Error type for pairing and template operations.

use devices_core::TokenId;
use thiserror::Error;

use crate::autopi::AutoPiError;
use crate::definitions::DefinitionsError;
use crate::sinks::SinkError;
use crate::storage::DatabaseError;

#[derive(Debug, Error)]
pub enum PairingError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Device definitions lookup failed: {0}")]
    Lookup(#[from] DefinitionsError),

    #[error("{context}: {source}")]
    Vendor {
        context: String,
        source: AutoPiError,
    },

    #[error("Vehicle with token {0} was deleted")]
    VehicleDeleted(TokenId),

    #[error("Manufacturer {0} does not have an associated integration")]
    NoManufacturerIntegration(String),

    #[error("Hardware {serial} has no {field}")]
    MissingHardwareField { serial: String, field: &'static str },

    #[error("Invalid hardware template id {0:?}")]
    InvalidTemplate(String),

    #[error("Failed to handle metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Ingest registration failed: {0}")]
    Ingest(#[source] SinkError),

    #[error("Invalid token: {0}")]
    Token(#[from] devices_core::Error),
}

impl PairingError {
    /// Wrap an AutoPi failure with what was being attempted.
    pub fn vendor(context: impl Into<String>) -> impl FnOnce(AutoPiError) -> Self {
        let context = context.into();
        move |source| Self::Vendor { context, source }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Database(DatabaseError::NotFound(_)))
            || matches!(self, Self::Lookup(DefinitionsError::NotFound(_)))
    }
}
