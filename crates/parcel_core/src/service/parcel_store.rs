//! Guarded parcel CRUD.
//!
//! # Responsibility
//! - Validate caller input and enforce the status state machine.
//! - Gate address changes and deletion on `registered` status.
//! - Wrap storage failures with operation context and log every outcome.
//!
//! # Invariants
//! - `NoConnection` is reported before any other validation.
//! - Guarded writes re-check the guard in their own predicate; a write that
//!   matches no row fails with `ConcurrentModification`, never silently.
//! - A rejected call leaves the stored row untouched.
//! - The store holds no mutable state; clones share the same handle.

use crate::config::StoreConfig;
use crate::db::DbHandle;
use crate::model::parcel::{ClientId, Parcel, ParcelNumber};
use crate::model::status::{check_transition, ParcelStatus, Transition, TransitionError};
use crate::repo::parcel_repo::{ParcelRepository, SqliteParcelRepository};
use crate::service::call::{ActiveCall, CallOptions, InterruptGuard};
use crate::service::error::{InterruptReason, OpTarget, StoreError, StoreOperation, StoreResult};
use log::{debug, error, info, warn};
use std::time::Instant;

/// Stateless façade over the `parcel` table.
#[derive(Debug, Clone, Default)]
pub struct ParcelStore {
    db: Option<DbHandle>,
    config: StoreConfig,
    options: CallOptions,
}

impl ParcelStore {
    /// Binds a store to a handle whose schema is already migrated.
    pub fn try_new(handle: DbHandle) -> StoreResult<Self> {
        Self::try_with_config(handle, StoreConfig::default())
    }

    /// Binds a store to a migrated handle using explicit call settings.
    ///
    /// # Errors
    /// - `SchemaNotReady` when the schema version, the `parcel` table or one
    ///   of its columns does not match this build.
    pub fn try_with_config(handle: DbHandle, config: StoreConfig) -> StoreResult<Self> {
        {
            let conn = handle.lock().map_err(StoreError::SchemaNotReady)?;
            SqliteParcelRepository::try_new(&conn).map_err(StoreError::SchemaNotReady)?;
        }

        Ok(Self {
            db: Some(handle),
            config,
            options: CallOptions::default(),
        })
    }

    /// A store without a database handle. Every operation fails with
    /// `NoConnection`.
    pub fn unbound() -> Self {
        Self::default()
    }

    pub fn is_bound(&self) -> bool {
        self.db.is_some()
    }

    /// Returns a clone whose calls are bounded by `options`.
    pub fn with_options(&self, options: CallOptions) -> Self {
        Self {
            db: self.db.clone(),
            config: self.config.clone(),
            options,
        }
    }

    /// Inserts a new parcel and returns its generated number.
    ///
    /// Any known status is accepted as the starting value; the forward-only
    /// rule applies to updates. `parcel.number` is ignored.
    ///
    /// # Errors
    /// - `NewStatusUnrecognised` when `parcel.status` is not a known token;
    ///   nothing is inserted.
    pub fn add(&self, parcel: &Parcel) -> StoreResult<ParcelNumber> {
        let operation = StoreOperation::Add;
        let target = OpTarget::Client(parcel.client);
        self.run(operation, target, |repo| {
            if ParcelStatus::parse(&parcel.status).is_none() {
                return Err(StoreError::NewStatusUnrecognised {
                    target,
                    status: parcel.status.clone(),
                });
            }
            repo.insert_parcel(parcel)
                .map_err(|err| StoreError::db(operation, target, err))
        })
    }

    /// Loads one parcel by number.
    pub fn get(&self, number: ParcelNumber) -> StoreResult<Parcel> {
        let operation = StoreOperation::Get;
        let target = OpTarget::Parcel(number);
        self.run(operation, target, |repo| {
            repo.get_parcel(number)
                .map_err(|err| StoreError::db(operation, target, err))?
                .ok_or(StoreError::NotFound(number))
        })
    }

    /// Loads every parcel owned by `client`, in no particular order.
    pub fn get_by_client(&self, client: ClientId) -> StoreResult<Vec<Parcel>> {
        let operation = StoreOperation::GetByClient;
        let target = OpTarget::Client(client);
        self.run(operation, target, |repo| {
            repo.list_by_client(client)
                .map_err(|err| StoreError::db(operation, target, err))
        })
    }

    /// Moves a parcel to `status`, which must be exactly one rank ahead of
    /// the stored status.
    ///
    /// Accepts a typed `ParcelStatus` or a raw token.
    ///
    /// # Errors
    /// - `NotFound` when the parcel does not exist.
    /// - `NewStatusUnrecognised` when `status` is not a known token.
    /// - `StoredStatusUnrecognised` when the stored token is corrupt.
    /// - `InvalidStatusTransition` for backward moves, skips and no-ops.
    /// - `ConcurrentModification` when the row changed after the check.
    pub fn set_status(&self, number: ParcelNumber, status: impl AsRef<str>) -> StoreResult<()> {
        let requested = status.as_ref();
        let operation = StoreOperation::SetStatus;
        self.run(operation, OpTarget::Parcel(number), |repo| {
            let stored = load_status(repo, operation, number)?;
            let transition = check_transition(&stored, requested)
                .map_err(|err| transition_error(number, err))?;
            write_transition(repo, number, transition)
        })
    }

    /// Moves a parcel to the status following its stored one and returns it.
    ///
    /// # Errors
    /// - `InvalidStatusTransition` from `delivered` to itself when the parcel
    ///   is already terminal.
    /// - Otherwise the same errors as `set_status`.
    pub fn advance_status(&self, number: ParcelNumber) -> StoreResult<ParcelStatus> {
        let operation = StoreOperation::SetStatus;
        self.run(operation, OpTarget::Parcel(number), |repo| {
            let stored = load_status(repo, operation, number)?;
            let from = ParcelStatus::parse(&stored).ok_or_else(|| {
                StoreError::StoredStatusUnrecognised {
                    number,
                    status: stored.clone(),
                }
            })?;
            let to = from.next().ok_or(StoreError::InvalidStatusTransition {
                number,
                from,
                to: from,
            })?;
            write_transition(repo, number, Transition { from, to })?;
            Ok(to)
        })
    }

    /// Replaces the delivery address of a `registered` parcel.
    ///
    /// # Errors
    /// - `NotFound` when the parcel does not exist.
    /// - `RequireRegisteredStatus` when it has moved past `registered`.
    /// - `ConcurrentModification` when the row changed after the check.
    pub fn set_address(&self, number: ParcelNumber, address: &str) -> StoreResult<()> {
        let operation = StoreOperation::SetAddress;
        let target = OpTarget::Parcel(number);
        self.run(operation, target, |repo| {
            let stored = load_status(repo, operation, number)?;
            require_registered(operation, number, stored)?;

            let changed = repo
                .update_address_if(number, ParcelStatus::Registered, address)
                .map_err(|err| StoreError::db(operation, target, err))?;
            if !changed {
                return Err(StoreError::ConcurrentModification { operation, number });
            }
            Ok(())
        })
    }

    /// Deletes a `registered` parcel.
    ///
    /// # Errors
    /// - `NotFound` when the parcel does not exist.
    /// - `RequireRegisteredStatus` when it has moved past `registered`.
    /// - `ConcurrentModification` when the row changed after the check.
    pub fn delete(&self, number: ParcelNumber) -> StoreResult<()> {
        let operation = StoreOperation::Delete;
        let target = OpTarget::Parcel(number);
        self.run(operation, target, |repo| {
            let stored = load_status(repo, operation, number)?;
            require_registered(operation, number, stored)?;

            let deleted = repo
                .delete_if(number, ParcelStatus::Registered)
                .map_err(|err| StoreError::db(operation, target, err))?;
            if !deleted {
                return Err(StoreError::ConcurrentModification { operation, number });
            }
            Ok(())
        })
    }

    fn run<T>(
        &self,
        operation: StoreOperation,
        target: OpTarget,
        body: impl FnOnce(&SqliteParcelRepository<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let started_at = Instant::now();
        let result = self.execute(operation, target, body);
        log_outcome(operation, target, started_at, &result);
        result
    }

    fn execute<T>(
        &self,
        operation: StoreOperation,
        target: OpTarget,
        body: impl FnOnce(&SqliteParcelRepository<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let handle = self.db.as_ref().ok_or(StoreError::NoConnection)?;

        let call = self.options.start(self.config.default_timeout());
        if let Some(reason) = call.interruption() {
            return Err(StoreError::Interrupted {
                operation,
                target,
                reason,
            });
        }

        let conn = handle
            .lock()
            .map_err(|err| StoreError::db(operation, target, err))?;
        let _interrupt = InterruptGuard::install(&conn, &call, self.config.interrupt_check_ops);
        let repo = SqliteParcelRepository::new(&conn);

        body(&repo).map_err(|err| classify_interrupt(err, &call))
    }
}

fn load_status(
    repo: &impl ParcelRepository,
    operation: StoreOperation,
    number: ParcelNumber,
) -> StoreResult<String> {
    repo.stored_status(number)
        .map_err(|err| StoreError::db(operation, OpTarget::Parcel(number), err))?
        .ok_or(StoreError::NotFound(number))
}

fn require_registered(
    operation: StoreOperation,
    number: ParcelNumber,
    stored: String,
) -> StoreResult<()> {
    if ParcelStatus::parse(&stored) == Some(ParcelStatus::Registered) {
        return Ok(());
    }
    Err(StoreError::RequireRegisteredStatus {
        operation,
        number,
        status: stored,
    })
}

fn write_transition(
    repo: &impl ParcelRepository,
    number: ParcelNumber,
    transition: Transition,
) -> StoreResult<()> {
    let operation = StoreOperation::SetStatus;
    let changed = repo
        .update_status_if(number, transition.from, transition.to)
        .map_err(|err| StoreError::db(operation, OpTarget::Parcel(number), err))?;
    if !changed {
        return Err(StoreError::ConcurrentModification { operation, number });
    }
    Ok(())
}

fn transition_error(number: ParcelNumber, err: TransitionError) -> StoreError {
    match err {
        TransitionError::NewStatusUnrecognised(status) => StoreError::NewStatusUnrecognised {
            target: OpTarget::Parcel(number),
            status,
        },
        TransitionError::StoredStatusUnrecognised(status) => {
            StoreError::StoredStatusUnrecognised { number, status }
        }
        TransitionError::NotOneStepForward { from, to } => {
            StoreError::InvalidStatusTransition { number, from, to }
        }
    }
}

fn classify_interrupt(err: StoreError, call: &ActiveCall) -> StoreError {
    match err {
        StoreError::Db {
            operation,
            target,
            source,
        } if source.is_interrupted() => StoreError::Interrupted {
            operation,
            target,
            reason: call
                .interruption()
                .unwrap_or(InterruptReason::DeadlineExceeded),
        },
        other => other,
    }
}

fn target_field(target: OpTarget) -> String {
    match target {
        OpTarget::Parcel(number) => format!("number={number}"),
        OpTarget::Client(client) => format!("client={client}"),
    }
}

fn log_outcome<T>(
    operation: StoreOperation,
    target: OpTarget,
    started_at: Instant,
    result: &StoreResult<T>,
) {
    let duration_ms = started_at.elapsed().as_millis();
    let target = target_field(target);
    match result {
        Ok(_) if matches!(operation, StoreOperation::Get | StoreOperation::GetByClient) => {
            debug!(
                "event=parcel_{operation} module=store status=ok {target} duration_ms={duration_ms}"
            );
        }
        Ok(_) => {
            info!(
                "event=parcel_{operation} module=store status=ok {target} duration_ms={duration_ms}"
            );
        }
        Err(err) if err.is_rejection() => {
            warn!(
                "event=parcel_{operation} module=store status=rejected {target} duration_ms={duration_ms} error_code={}",
                err.code()
            );
        }
        Err(err) => {
            error!(
                "event=parcel_{operation} module=store status=error {target} duration_ms={duration_ms} error_code={} error={}",
                err.code(),
                err
            );
        }
    }
}
