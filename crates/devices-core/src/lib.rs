//! `devices-api` Core Library
//!
//! Shared functionality for the devices-api crates:
//! - Configuration resolution and hierarchy
//! - `SQLite` pool helpers and the shared `DatabaseError`
//! - Token ID / decimal conversion and country→region lookup
//! - Common error types

pub mod config;
pub mod convert;
pub mod db;
pub mod error;
pub mod region;
pub mod tracing_init;

pub use config::Settings;
pub use convert::TokenId;
pub use error::{Error, Result};
