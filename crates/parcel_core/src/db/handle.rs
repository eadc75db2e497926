//! Thread-safe shared connection handle.
//!
//! # Invariants
//! - At most one caller uses the wrapped connection at a time.
//! - Cloning shares the same connection; it never opens a new one.

use super::{DbError, DbResult};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

/// Cloneable handle to one SQLite connection, safe to send across threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<Mutex<Connection>>,
}

impl DbHandle {
    pub fn new(conn: Connection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `f` with exclusive access to the connection.
    ///
    /// Intended for setup and maintenance work outside the guarded store API,
    /// such as repairing a corrupt status by hand.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> DbResult<T> {
        let conn = self.lock()?;
        Ok(f(&conn)?)
    }

    pub(crate) fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.inner.lock().map_err(|_| DbError::Poisoned)
    }
}

impl From<Connection> for DbHandle {
    fn from(value: Connection) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Debug for DbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbHandle")
            .field("shared", &Arc::strong_count(&self.inner))
            .finish()
    }
}
