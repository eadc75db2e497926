//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define storage contracts used by the parcel store.
//! - Isolate SQLite query details from guard and state-machine logic.
//!
//! # Invariants
//! - Repository APIs report raw storage outcomes (`Option`, affected-row
//!   flags); semantic errors are raised by the service layer.

pub mod parcel_repo;
