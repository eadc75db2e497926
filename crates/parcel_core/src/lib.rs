//! Persistence layer for tracked parcels.
//! This crate owns the parcel status state machine and the guarded
//! operations that enforce it over SQLite.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{DbConfig, StoreConfig};
pub use db::{open_db, open_db_in_memory, open_db_with_config, DbError, DbHandle, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::parcel::{ClientId, Parcel, ParcelNumber};
pub use model::status::{check_transition, ParcelStatus, Transition, TransitionError};
pub use repo::parcel_repo::{ParcelRepository, SqliteParcelRepository};
pub use service::call::{CallOptions, CancelToken};
pub use service::error::{InterruptReason, OpTarget, StoreError, StoreOperation, StoreResult};
pub use service::parcel_store::ParcelStore;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
