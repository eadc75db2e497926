//! Parcel store service.
//!
//! # Responsibility
//! - Expose the guarded parcel operations to callers.
//! - Translate storage outcomes into semantic errors.

pub mod call;
pub mod error;
pub mod parcel_store;
