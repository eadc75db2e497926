//! Parcel lifecycle status and its forward-only state machine.
//!
//! # Responsibility
//! - Map status tokens to a fixed rank order.
//! - Decide whether a requested status change is a legal single step.
//!
//! # Invariants
//! - Ranks are `registered(0) < sent(1) < delivered(2)`.
//! - Unknown tokens are rejected before any rank arithmetic happens.
//! - The only legal move is from rank N to rank N+1.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Lifecycle status of a tracked parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParcelStatus {
    /// Accepted by the carrier, not yet dispatched.
    Registered,
    /// Dispatched and in transit.
    Sent,
    /// Handed over to the recipient. Terminal.
    Delivered,
}

impl ParcelStatus {
    /// All known statuses in rank order.
    pub const ALL: [ParcelStatus; 3] = [Self::Registered, Self::Sent, Self::Delivered];

    /// Storage token persisted in `parcel.status`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
        }
    }

    /// Parses a storage token. Returns `None` for anything outside the known set.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "registered" => Some(Self::Registered),
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            _ => None,
        }
    }

    /// Position in the forward sequence.
    pub fn rank(self) -> u8 {
        match self {
            Self::Registered => 0,
            Self::Sent => 1,
            Self::Delivered => 2,
        }
    }

    /// The single legal successor, or `None` for the terminal status.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Registered => Some(Self::Sent),
            Self::Sent => Some(Self::Delivered),
            Self::Delivered => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// Whether `to` is exactly one rank ahead of `self`.
    pub fn can_advance_to(self, to: ParcelStatus) -> bool {
        i16::from(to.rank()) - i16::from(self.rank()) == 1
    }
}

impl Display for ParcelStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for ParcelStatus {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Raised when parsing an unknown status token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl Display for UnknownStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unrecognised parcel status `{}`", self.0)
    }
}

impl Error for UnknownStatus {}

impl FromStr for ParcelStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| UnknownStatus(value.to_string()))
    }
}

/// A validated single-step status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ParcelStatus,
    pub to: ParcelStatus,
}

/// Why a requested status change was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Requested token is outside the known set.
    NewStatusUnrecognised(String),
    /// Persisted token is outside the known set; the record needs manual repair.
    StoredStatusUnrecognised(String),
    /// Known statuses, but not a single forward step.
    NotOneStepForward {
        from: ParcelStatus,
        to: ParcelStatus,
    },
}

impl Display for TransitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewStatusUnrecognised(value) => write!(f, "unrecognised new status `{value}`"),
            Self::StoredStatusUnrecognised(value) => {
                write!(f, "unrecognised stored status `{value}`")
            }
            Self::NotOneStepForward { from, to } => {
                write!(f, "invalid status transition `{from}` -> `{to}`")
            }
        }
    }
}

impl Error for TransitionError {}

/// Validates a status change from the persisted token to the requested one.
///
/// The requested token is checked before the stored one, so a caller typo is
/// reported even when the record itself is corrupt.
pub fn check_transition(stored: &str, requested: &str) -> Result<Transition, TransitionError> {
    let to = ParcelStatus::parse(requested)
        .ok_or_else(|| TransitionError::NewStatusUnrecognised(requested.to_string()))?;
    let from = ParcelStatus::parse(stored)
        .ok_or_else(|| TransitionError::StoredStatusUnrecognised(stored.to_string()))?;

    if !from.can_advance_to(to) {
        return Err(TransitionError::NotOneStepForward { from, to });
    }
    Ok(Transition { from, to })
}
