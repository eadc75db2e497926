//! Parcel domain model.
//!
//! # Responsibility
//! - Define the parcel record and its lifecycle status.
//! - Keep the status state machine free of storage concerns.
//!
//! # Invariants
//! - Status only ever advances one rank at a time.
//! - Address and deletion are only allowed while `registered`.

pub mod parcel;
pub mod status;
