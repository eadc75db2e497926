//! Per-call deadlines and cancellation.
//!
//! # Responsibility
//! - Let callers bound one store call by a deadline, a timeout or a
//!   cancellation token.
//! - Propagate that bound into SQLite through a progress handler that
//!   interrupts the running statement.
//!
//! # Invariants
//! - A call already expired or cancelled at entry runs no statement.
//! - The progress handler never outlives the call that installed it.

use crate::service::error::InterruptReason;
use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag used to abort in-flight store calls from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every call carrying this token (or a clone).
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Bounds applied to a single store call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    cancel: Option<CancelToken>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative bound, measured from the moment the call starts.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Absolute bound.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Resolves the effective bound for a call starting now.
    ///
    /// The earliest of the explicit deadline, this call's timeout and the
    /// store default wins.
    pub(crate) fn start(&self, default_timeout: Option<Duration>) -> ActiveCall {
        let now = Instant::now();
        let deadline = [
            self.deadline,
            self.timeout.and_then(|timeout| now.checked_add(timeout)),
            default_timeout.and_then(|timeout| now.checked_add(timeout)),
        ]
        .into_iter()
        .flatten()
        .min();

        ActiveCall {
            deadline,
            cancel: self.cancel.clone(),
        }
    }
}

/// Resolved bounds of one running call.
#[derive(Debug, Clone)]
pub(crate) struct ActiveCall {
    deadline: Option<Instant>,
    cancel: Option<CancelToken>,
}

impl ActiveCall {
    pub(crate) fn interruption(&self) -> Option<InterruptReason> {
        interruption(self.deadline, self.cancel.as_ref())
    }

    fn is_unbounded(&self) -> bool {
        self.deadline.is_none() && self.cancel.is_none()
    }
}

fn interruption(deadline: Option<Instant>, cancel: Option<&CancelToken>) -> Option<InterruptReason> {
    if cancel.is_some_and(CancelToken::is_cancelled) {
        return Some(InterruptReason::Cancelled);
    }
    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
        return Some(InterruptReason::DeadlineExceeded);
    }
    None
}

/// Installs a SQLite progress handler for the lifetime of one call.
pub(crate) struct InterruptGuard<'conn> {
    conn: &'conn Connection,
    installed: bool,
}

impl<'conn> InterruptGuard<'conn> {
    pub(crate) fn install(conn: &'conn Connection, call: &ActiveCall, check_ops: u32) -> Self {
        if call.is_unbounded() {
            return Self {
                conn,
                installed: false,
            };
        }

        let deadline = call.deadline;
        let cancel = call.cancel.clone();
        let check_ops = i32::try_from(check_ops.max(1)).unwrap_or(i32::MAX);
        // Returning true makes SQLite abort the statement with SQLITE_INTERRUPT.
        conn.progress_handler(
            check_ops,
            Some(move || interruption(deadline, cancel.as_ref()).is_some()),
        );

        Self {
            conn,
            installed: true,
        }
    }
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        if self.installed {
            self.conn.progress_handler(0, None::<fn() -> bool>);
        }
    }
}
