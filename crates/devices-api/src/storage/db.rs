//! Database connection and initialization.

pub use devices_core::db::DatabaseError;

devices_core::define_database!(Database, "Database migrations complete");
