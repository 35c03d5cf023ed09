//! Accession batch repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist numbering periods and resolve the active one.
//! - Compute per-year sequences inside the write transaction.
//!
//! # Invariants
//! - Starting a batch deactivates every other batch in the same transaction.
//! - `(year, sequence)` is unique; sequences start at 1 per year.
//! - Batches are never deleted.

use crate::db::{ensure_connection_ready, DbError};
use crate::model::batch::{Batch, BatchId};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const BATCH_SELECT_SQL: &str = "SELECT
    batch_id,
    year,
    sequence,
    retrospective,
    active,
    note,
    created_at,
    date(created_at / 1000, 'unixepoch') AS created_on
FROM accession_batches";

pub type BatchRepoResult<T> = Result<T, BatchRepoError>;

/// Errors from batch persistence operations.
#[derive(Debug)]
pub enum BatchRepoError {
    Db(DbError),
    /// Explicit batch year must be positive.
    InvalidYear(u16),
    InvalidData(String),
}

impl Display for BatchRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidYear(year) => write!(f, "invalid batch year: {year}"),
            Self::InvalidData(message) => write!(f, "invalid persisted batch data: {message}"),
        }
    }
}

impl Error for BatchRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidYear(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for BatchRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for BatchRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Input for starting a numbering period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartBatchRequest {
    /// `None` uses the current UTC calendar year of the database clock.
    pub year: Option<u16>,
    pub retrospective: bool,
    pub note: String,
}

/// Repository interface for the batch ledger.
pub trait BatchRepository {
    /// Deactivates all batches and persists a new active one.
    fn start_batch(&self, request: &StartBatchRequest) -> BatchRepoResult<Batch>;
    fn get_active_batch(&self) -> BatchRepoResult<Option<Batch>>;
    fn get_batch(&self, batch_id: BatchId) -> BatchRepoResult<Option<Batch>>;
    /// Lists all batches, newest first (`year DESC, sequence DESC`).
    fn list_batches(&self) -> BatchRepoResult<Vec<Batch>>;
}

/// SQLite-backed batch repository.
pub struct SqliteBatchRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBatchRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> BatchRepoResult<Self> {
        ensure_connection_ready(conn, &["accession_batches"])?;
        Ok(Self { conn })
    }
}

impl BatchRepository for SqliteBatchRepository<'_> {
    fn start_batch(&self, request: &StartBatchRequest) -> BatchRepoResult<Batch> {
        if request.year == Some(0) {
            return Err(BatchRepoError::InvalidYear(0));
        }

        // Immediate: the sequence read below must not race another starter.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let year: u16 = match request.year {
            Some(year) => year,
            None => tx.query_row(
                "SELECT CAST(strftime('%Y', 'now') AS INTEGER);",
                [],
                |row| row.get(0),
            )?,
        };

        let sequence: u32 = tx.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1
             FROM accession_batches
             WHERE year = ?1;",
            [year],
            |row| row.get(0),
        )?;

        tx.execute(
            "UPDATE accession_batches
             SET active = 0
             WHERE active = 1;",
            [],
        )?;
        tx.execute(
            "INSERT INTO accession_batches (
                year,
                sequence,
                retrospective,
                active,
                note
            ) VALUES (?1, ?2, ?3, 1, ?4);",
            params![
                year,
                sequence,
                bool_to_int(request.retrospective),
                request.note.as_str(),
            ],
        )?;

        let batch_id = tx.last_insert_rowid();
        let batch = load_batch(&tx, batch_id)?.ok_or_else(|| {
            BatchRepoError::InvalidData(format!("batch {batch_id} missing after insert"))
        })?;
        tx.commit()?;
        Ok(batch)
    }

    fn get_active_batch(&self) -> BatchRepoResult<Option<Batch>> {
        load_active_batch(self.conn)
    }

    fn get_batch(&self, batch_id: BatchId) -> BatchRepoResult<Option<Batch>> {
        load_batch(self.conn, batch_id)
    }

    fn list_batches(&self) -> BatchRepoResult<Vec<Batch>> {
        let mut stmt = self.conn.prepare(&format!(
            "{BATCH_SELECT_SQL} ORDER BY year DESC, sequence DESC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut batches = Vec::new();
        while let Some(row) = rows.next()? {
            batches.push(parse_batch_row(row)?);
        }
        Ok(batches)
    }
}

/// Loads the active batch on any connection or open transaction.
pub(crate) fn load_active_batch(conn: &Connection) -> BatchRepoResult<Option<Batch>> {
    let mut stmt = conn.prepare(&format!("{BATCH_SELECT_SQL} WHERE active = 1;"))?;
    let mut rows = stmt.query([])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_batch_row(row)?));
    }
    Ok(None)
}

fn load_batch(conn: &Connection, batch_id: BatchId) -> BatchRepoResult<Option<Batch>> {
    let mut stmt = conn.prepare(&format!("{BATCH_SELECT_SQL} WHERE batch_id = ?1;"))?;
    let mut rows = stmt.query([batch_id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_batch_row(row)?));
    }
    Ok(None)
}

fn parse_batch_row(row: &Row<'_>) -> BatchRepoResult<Batch> {
    Ok(Batch {
        batch_id: row.get("batch_id")?,
        year: row.get("year")?,
        sequence: row.get("sequence")?,
        retrospective: parse_flag(row, "retrospective")?,
        active: parse_flag(row, "active")?,
        note: row.get("note")?,
        created_at: row.get("created_at")?,
        created_on: row.get("created_on")?,
    })
}

fn parse_flag(row: &Row<'_>, column: &'static str) -> BatchRepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(BatchRepoError::InvalidData(format!(
            "invalid {column} value `{other}` in accession_batches.{column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
