//! Parcel domain record.
//!
//! # Responsibility
//! - Define the canonical shape of one row in `parcel`.
//!
//! # Invariants
//! - `number` is zero until the store assigns one on insert.
//! - `client` and `created_at` never change after creation.
//! - `status` holds the raw persisted token; it may be unrecognised when the
//!   stored row is corrupt.

use crate::model::status::ParcelStatus;
use serde::{Deserialize, Serialize};

/// Store-assigned parcel identifier (`parcel.number`).
pub type ParcelNumber = i64;

/// Opaque identifier of the party owning a parcel.
pub type ClientId = i64;

/// One tracked shipment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    pub number: ParcelNumber,
    pub client: ClientId,
    /// Raw status token as written to storage.
    pub status: String,
    pub address: String,
    pub created_at: String,
}

impl Parcel {
    /// Creates an unsaved parcel with a known starting status.
    pub fn new(
        client: ClientId,
        status: ParcelStatus,
        address: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            number: 0,
            client,
            status: status.as_str().to_string(),
            address: address.into(),
            created_at: created_at.into(),
        }
    }

    /// Creates an unsaved parcel in the usual initial `registered` status.
    pub fn registered(
        client: ClientId,
        address: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self::new(client, ParcelStatus::Registered, address, created_at)
    }

    /// Parsed status, or `None` when the stored token is unrecognised.
    pub fn parsed_status(&self) -> Option<ParcelStatus> {
        ParcelStatus::parse(&self.status)
    }

    pub fn is_saved(&self) -> bool {
        self.number != 0
    }
}
