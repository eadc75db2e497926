//! Parcel repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Own every SQL statement touching the `parcel` table.
//! - Express status guards inside write predicates so a check and its write
//!   cannot be split by another connection.
//!
//! # Invariants
//! - Conditional writes report `false` when no row matched their predicate;
//!   callers decide what that means.
//! - Read paths return stored tokens verbatim, including corrupt ones.

use crate::db::migrations::latest_version;
use crate::db::{DbError, DbResult};
use crate::model::parcel::{ClientId, Parcel, ParcelNumber};
use crate::model::status::ParcelStatus;
use rusqlite::{named_params, Connection, OptionalExtension, Row};

const PARCEL_TABLE: &str = "parcel";
const PARCEL_COLUMNS: [&str; 5] = ["number", "client", "status", "address", "created_at"];

const PARCEL_SELECT_SQL: &str = "SELECT
    number,
    client,
    status,
    address,
    created_at
FROM parcel";

/// Storage operations needed by the parcel store.
pub trait ParcelRepository {
    /// Inserts a row and returns the generated number. `parcel.number` is ignored.
    fn insert_parcel(&self, parcel: &Parcel) -> DbResult<ParcelNumber>;
    fn get_parcel(&self, number: ParcelNumber) -> DbResult<Option<Parcel>>;
    fn list_by_client(&self, client: ClientId) -> DbResult<Vec<Parcel>>;
    /// Reads only the raw status token.
    fn stored_status(&self, number: ParcelNumber) -> DbResult<Option<String>>;
    /// Sets `to` only while the row still holds `from`.
    fn update_status_if(
        &self,
        number: ParcelNumber,
        from: ParcelStatus,
        to: ParcelStatus,
    ) -> DbResult<bool>;
    /// Sets the address only while the row holds `required`.
    fn update_address_if(
        &self,
        number: ParcelNumber,
        required: ParcelStatus,
        address: &str,
    ) -> DbResult<bool>;
    /// Deletes the row only while it holds `required`.
    fn delete_if(&self, number: ParcelNumber, required: ParcelStatus) -> DbResult<bool>;
}

/// SQLite-backed parcel repository.
pub struct SqliteParcelRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteParcelRepository<'conn> {
    /// Wraps a connection without checking its schema.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Wraps a connection after verifying the migrated parcel schema.
    pub fn try_new(conn: &'conn Connection) -> DbResult<Self> {
        ensure_parcel_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ParcelRepository for SqliteParcelRepository<'_> {
    fn insert_parcel(&self, parcel: &Parcel) -> DbResult<ParcelNumber> {
        self.conn.execute(
            "INSERT INTO parcel (client, status, address, created_at)
             VALUES (:client, :status, :address, :created_at);",
            named_params! {
                ":client": parcel.client,
                ":status": parcel.status.as_str(),
                ":address": parcel.address.as_str(),
                ":created_at": parcel.created_at.as_str(),
            },
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn get_parcel(&self, number: ParcelNumber) -> DbResult<Option<Parcel>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PARCEL_SELECT_SQL} WHERE number = :number;"))?;

        let mut rows = stmt.query(named_params! { ":number": number })?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_parcel_row(row)?));
        }

        Ok(None)
    }

    fn list_by_client(&self, client: ClientId) -> DbResult<Vec<Parcel>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PARCEL_SELECT_SQL} WHERE client = :client;"))?;

        let mut rows = stmt.query(named_params! { ":client": client })?;
        let mut parcels = Vec::new();
        while let Some(row) = rows.next()? {
            parcels.push(parse_parcel_row(row)?);
        }

        Ok(parcels)
    }

    fn stored_status(&self, number: ParcelNumber) -> DbResult<Option<String>> {
        let status = self
            .conn
            .query_row(
                "SELECT status FROM parcel WHERE number = :number;",
                named_params! { ":number": number },
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(status)
    }

    fn update_status_if(
        &self,
        number: ParcelNumber,
        from: ParcelStatus,
        to: ParcelStatus,
    ) -> DbResult<bool> {
        let changed = self.conn.execute(
            "UPDATE parcel
             SET status = :to
             WHERE number = :number
               AND status = :from;",
            named_params! {
                ":to": to.as_str(),
                ":number": number,
                ":from": from.as_str(),
            },
        )?;
        Ok(changed > 0)
    }

    fn update_address_if(
        &self,
        number: ParcelNumber,
        required: ParcelStatus,
        address: &str,
    ) -> DbResult<bool> {
        let changed = self.conn.execute(
            "UPDATE parcel
             SET address = :address
             WHERE number = :number
               AND status = :required;",
            named_params! {
                ":address": address,
                ":number": number,
                ":required": required.as_str(),
            },
        )?;
        Ok(changed > 0)
    }

    fn delete_if(&self, number: ParcelNumber, required: ParcelStatus) -> DbResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM parcel
             WHERE number = :number
               AND status = :required;",
            named_params! {
                ":number": number,
                ":required": required.as_str(),
            },
        )?;
        Ok(changed > 0)
    }
}

fn parse_parcel_row(row: &Row<'_>) -> rusqlite::Result<Parcel> {
    Ok(Parcel {
        number: row.get("number")?,
        client: row.get("client")?,
        status: row.get("status")?,
        address: row.get("address")?,
        created_at: row.get("created_at")?,
    })
}

/// Verifies the connection carries the migrated parcel schema.
pub fn ensure_parcel_connection_ready(conn: &Connection) -> DbResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(DbError::UninitializedSchema {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, PARCEL_TABLE)? {
        return Err(DbError::MissingRequiredTable(PARCEL_TABLE));
    }

    for column in PARCEL_COLUMNS {
        if !table_has_column(conn, PARCEL_TABLE, column)? {
            return Err(DbError::MissingRequiredColumn {
                table: PARCEL_TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
