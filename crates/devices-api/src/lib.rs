//! devices-api Library
//!
//! Aftermarket device pairing for user vehicles:
//! - `SQLite` record store for vehicles, hardware and integration links
//! - AutoPi control-plane client and hardware template selection
//! - Pair/unpair orchestration across AutoPi, generic and Macaron hardware
//! - Ingest, event and device-definition registrar sinks

pub mod autopi;
pub mod definitions;
pub mod error;
pub mod pairing;
pub mod sinks;
pub mod storage;
pub mod template;

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod test_helpers;

pub use error::PairingError;
