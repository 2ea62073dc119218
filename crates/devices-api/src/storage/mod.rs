//! `SQLite` storage for devices-api.
//!
//! Provides persistence for user devices, vehicle NFTs, aftermarket devices,
//! integration links and AutoPi jobs.

mod db;
mod models;
mod queries;
mod queries_links;

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests;

pub use db::{Database, DatabaseError};
pub use models::*;
pub use queries::{NewAftermarketDevice, NewUserDevice};
pub use queries_links::StageLink;
