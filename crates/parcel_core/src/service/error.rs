//! Error taxonomy of the parcel store.
//!
//! # Responsibility
//! - Give every failure a closed, matchable kind.
//! - Carry enough context (operation, parcel number or client, statuses) to
//!   log or display an error without a second lookup.

use crate::db::DbError;
use crate::model::parcel::{ClientId, ParcelNumber};
use crate::model::status::ParcelStatus;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Public store operation, used for error context and log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Add,
    Get,
    GetByClient,
    SetStatus,
    SetAddress,
    Delete,
}

impl StoreOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Get => "get",
            Self::GetByClient => "get_by_client",
            Self::SetStatus => "set_status",
            Self::SetAddress => "set_address",
            Self::Delete => "delete",
        }
    }
}

impl Display for StoreOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an operation was acting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTarget {
    Parcel(ParcelNumber),
    Client(ClientId),
}

impl Display for OpTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parcel(number) => write!(f, "parcel {number}"),
            Self::Client(client) => write!(f, "client {client}"),
        }
    }
}

/// Why a call was interrupted before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptReason {
    DeadlineExceeded,
    Cancelled,
}

impl Display for InterruptReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Errors returned by `ParcelStore` operations.
#[derive(Debug)]
pub enum StoreError {
    /// The store is not bound to a database handle.
    NoConnection,
    /// The handle given at bind time does not carry the parcel schema.
    SchemaNotReady(DbError),
    /// Caller-supplied status is outside the known set.
    NewStatusUnrecognised { target: OpTarget, status: String },
    /// Persisted status is outside the known set; the record needs manual repair.
    StoredStatusUnrecognised {
        number: ParcelNumber,
        status: String,
    },
    /// Requested change is not exactly one rank forward.
    InvalidStatusTransition {
        number: ParcelNumber,
        from: ParcelStatus,
        to: ParcelStatus,
    },
    /// Address change or deletion attempted outside `registered`.
    RequireRegisteredStatus {
        operation: StoreOperation,
        number: ParcelNumber,
        status: String,
    },
    NotFound(ParcelNumber),
    /// The guarded row changed between the check and the write.
    ConcurrentModification {
        operation: StoreOperation,
        number: ParcelNumber,
    },
    Interrupted {
        operation: StoreOperation,
        target: OpTarget,
        reason: InterruptReason,
    },
    Db {
        operation: StoreOperation,
        target: OpTarget,
        source: DbError,
    },
}

impl StoreError {
    pub(crate) fn db(operation: StoreOperation, target: OpTarget, source: DbError) -> Self {
        Self::Db {
            operation,
            target,
            source,
        }
    }

    /// Stable snake_case code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoConnection => "no_connection",
            Self::SchemaNotReady(_) => "schema_not_ready",
            Self::NewStatusUnrecognised { .. } => "new_status_unrecognised",
            Self::StoredStatusUnrecognised { .. } => "stored_status_unrecognised",
            Self::InvalidStatusTransition { .. } => "invalid_status_transition",
            Self::RequireRegisteredStatus { .. } => "require_registered_status",
            Self::NotFound(_) => "not_found",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::Interrupted {
                reason: InterruptReason::DeadlineExceeded,
                ..
            } => "deadline_exceeded",
            Self::Interrupted {
                reason: InterruptReason::Cancelled,
                ..
            } => "cancelled",
            Self::Db { .. } => "db_error",
        }
    }

    /// Whether the caller's input or the record state refused the call, as
    /// opposed to an infrastructure failure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NewStatusUnrecognised { .. }
                | Self::StoredStatusUnrecognised { .. }
                | Self::InvalidStatusTransition { .. }
                | Self::RequireRegisteredStatus { .. }
                | Self::NotFound(_)
                | Self::ConcurrentModification { .. }
        )
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoConnection => write!(f, "no database connection"),
            Self::SchemaNotReady(err) => write!(f, "database is not ready for parcels: {err}"),
            Self::NewStatusUnrecognised { target, status } => {
                write!(f, "unrecognised new status `{status}` for {target}")
            }
            Self::StoredStatusUnrecognised { number, status } => write!(
                f,
                "unrecognised stored status `{status}` for parcel {number}; record needs manual repair"
            ),
            Self::InvalidStatusTransition { number, from, to } => write!(
                f,
                "invalid status transition `{from}` -> `{to}` for parcel {number}"
            ),
            Self::RequireRegisteredStatus {
                operation,
                number,
                status,
            } => write!(
                f,
                "{operation} requires registered status (parcel {number} has status `{status}`)"
            ),
            Self::NotFound(number) => write!(f, "parcel not found: {number}"),
            Self::ConcurrentModification { operation, number } => write!(
                f,
                "{operation} lost a race: parcel {number} changed between check and write"
            ),
            Self::Interrupted {
                operation,
                target,
                reason,
            } => write!(f, "{operation} on {target} interrupted: {reason}"),
            Self::Db {
                operation,
                target,
                source,
            } => write!(f, "{operation} failed for {target}: {source}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SchemaNotReady(err) => Some(err),
            Self::Db { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{OpTarget, StoreError, StoreOperation};
    use crate::db::DbError;
    use crate::model::status::ParcelStatus;
    use std::error::Error;

    #[test]
    fn messages_carry_number_and_statuses() {
        let err = StoreError::InvalidStatusTransition {
            number: 7,
            from: ParcelStatus::Delivered,
            to: ParcelStatus::Sent,
        };
        let message = err.to_string();
        assert!(message.contains("parcel 7"));
        assert!(message.contains("`delivered` -> `sent`"));
        assert_eq!(err.code(), "invalid_status_transition");
        assert!(err.is_rejection());
    }

    #[test]
    fn db_errors_keep_their_source() {
        let err = StoreError::db(StoreOperation::GetByClient, OpTarget::Client(42), DbError::Poisoned);
        assert_eq!(
            err.to_string(),
            "get_by_client failed for client 42: shared database connection is poisoned"
        );
        assert!(err.source().is_some());
        assert!(!err.is_rejection());
    }
}
