//! Accession number repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Draw object numbers from the active batch.
//! - Draw part numbers from a parent's `(batch, object_number)` group and
//!   keep sibling part counts in sync.
//!
//! # Invariants
//! - Each allocation runs in one `BEGIN IMMEDIATE` transaction: the
//!   already-allocated guard, the max read, the insert and sibling updates
//!   commit together or not at all.
//! - A work is allocated at most once.
//! - Every part in a group reports the group's current highest part number
//!   as `part_count`.

use crate::db::{ensure_connection_ready, DbError};
use crate::model::accession::AccessionAllocation;
use crate::model::batch::{BatchId, BatchLabel};
use crate::model::work::WorkId;
use crate::repo::batch_repo::{load_active_batch, BatchRepoError};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ALLOCATION_SELECT_SQL: &str = "SELECT
    a.work_id AS work_id,
    a.batch_id AS batch_id,
    b.year AS year,
    b.sequence AS sequence,
    b.retrospective AS retrospective,
    a.object_number AS object_number,
    a.part_number AS part_number,
    a.part_count AS part_count,
    a.created_at AS created_at
FROM accession_numbers a
JOIN accession_batches b ON b.batch_id = a.batch_id";

const ALLOCATION_ORDER_SQL: &str =
    "ORDER BY a.object_number ASC, a.part_number IS NOT NULL, a.part_number ASC";

pub type AccessionRepoResult<T> = Result<T, AccessionRepoError>;

/// Errors from accession number persistence operations.
#[derive(Debug)]
pub enum AccessionRepoError {
    /// The work already holds an accession number.
    AlreadyAllocated(WorkId),
    /// The parent of a part has no accession number yet.
    ParentNotAllocated { work_id: WorkId, parent_id: WorkId },
    /// No batch has been started.
    NoActiveBatch,
    Db(DbError),
    InvalidData(String),
}

impl Display for AccessionRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyAllocated(work_id) => {
                write!(f, "work {work_id} already has an accession number")
            }
            Self::ParentNotAllocated { work_id, parent_id } => write!(
                f,
                "work {work_id} is part of work {parent_id}, which has no accession number"
            ),
            Self::NoActiveBatch => write!(f, "no active accession batch"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted accession data: {message}")
            }
        }
    }
}

impl Error for AccessionRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for AccessionRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for AccessionRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<BatchRepoError> for AccessionRepoError {
    fn from(value: BatchRepoError) -> Self {
        match value {
            BatchRepoError::Db(err) => Self::Db(err),
            other => Self::InvalidData(other.to_string()),
        }
    }
}

/// Repository interface for accession number allocation.
pub trait AccessionRepository {
    fn get_allocation(&self, work_id: WorkId) -> AccessionRepoResult<Option<AccessionAllocation>>;
    /// Allocates the next object number of the active batch to `work_id`.
    fn allocate_object(&self, work_id: WorkId) -> AccessionRepoResult<AccessionAllocation>;
    /// Allocates the next part number under `parent_id`'s object number.
    fn allocate_part(
        &self,
        work_id: WorkId,
        parent_id: WorkId,
    ) -> AccessionRepoResult<AccessionAllocation>;
    /// Lists a batch's allocations by object number, unnumbered object first.
    fn list_batch_allocations(
        &self,
        batch_id: BatchId,
    ) -> AccessionRepoResult<Vec<AccessionAllocation>>;
    /// Lists the numbered parts of one object, ascending part number.
    fn list_parts(
        &self,
        batch_id: BatchId,
        object_number: u32,
    ) -> AccessionRepoResult<Vec<AccessionAllocation>>;
}

/// SQLite-backed accession number repository.
pub struct SqliteAccessionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAccessionRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> AccessionRepoResult<Self> {
        ensure_connection_ready(conn, &["accession_batches", "accession_numbers"])?;
        Ok(Self { conn })
    }
}

impl AccessionRepository for SqliteAccessionRepository<'_> {
    fn get_allocation(&self, work_id: WorkId) -> AccessionRepoResult<Option<AccessionAllocation>> {
        load_allocation(self.conn, work_id)
    }

    fn allocate_object(&self, work_id: WorkId) -> AccessionRepoResult<AccessionAllocation> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_unallocated(&tx, work_id)?;

        let batch = load_active_batch(&tx)?.ok_or(AccessionRepoError::NoActiveBatch)?;
        let object_number: u32 = tx.query_row(
            "SELECT COALESCE(MAX(object_number), 0) + 1
             FROM accession_numbers
             WHERE batch_id = ?1;",
            [batch.batch_id],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO accession_numbers (
                work_id,
                batch_id,
                object_number,
                part_number,
                part_count
            ) VALUES (?1, ?2, ?3, NULL, NULL);",
            params![work_id, batch.batch_id, object_number],
        )?;

        let allocation = load_required_allocation(&tx, work_id)?;
        tx.commit()?;
        Ok(allocation)
    }

    fn allocate_part(
        &self,
        work_id: WorkId,
        parent_id: WorkId,
    ) -> AccessionRepoResult<AccessionAllocation> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_unallocated(&tx, work_id)?;

        let parent = load_allocation(&tx, parent_id)?
            .ok_or(AccessionRepoError::ParentNotAllocated { work_id, parent_id })?;
        let part_number: u32 = tx.query_row(
            "SELECT COALESCE(MAX(part_number), 0) + 1
             FROM accession_numbers
             WHERE batch_id = ?1
               AND object_number = ?2
               AND part_number IS NOT NULL;",
            params![parent.batch_id, parent.object_number],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO accession_numbers (
                work_id,
                batch_id,
                object_number,
                part_number,
                part_count
            ) VALUES (?1, ?2, ?3, ?4, ?4);",
            params![work_id, parent.batch_id, parent.object_number, part_number],
        )?;
        tx.execute(
            "UPDATE accession_numbers
             SET part_count = ?3
             WHERE batch_id = ?1
               AND object_number = ?2
               AND part_number IS NOT NULL;",
            params![parent.batch_id, parent.object_number, part_number],
        )?;

        let allocation = load_required_allocation(&tx, work_id)?;
        tx.commit()?;
        Ok(allocation)
    }

    fn list_batch_allocations(
        &self,
        batch_id: BatchId,
    ) -> AccessionRepoResult<Vec<AccessionAllocation>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ALLOCATION_SELECT_SQL}
             WHERE a.batch_id = ?1
             {ALLOCATION_ORDER_SQL};"
        ))?;
        let mut rows = stmt.query([batch_id])?;
        let mut allocations = Vec::new();
        while let Some(row) = rows.next()? {
            allocations.push(parse_allocation_row(row)?);
        }
        Ok(allocations)
    }

    fn list_parts(
        &self,
        batch_id: BatchId,
        object_number: u32,
    ) -> AccessionRepoResult<Vec<AccessionAllocation>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ALLOCATION_SELECT_SQL}
             WHERE a.batch_id = ?1
               AND a.object_number = ?2
               AND a.part_number IS NOT NULL
             {ALLOCATION_ORDER_SQL};"
        ))?;
        let mut rows = stmt.query(params![batch_id, object_number])?;
        let mut allocations = Vec::new();
        while let Some(row) = rows.next()? {
            allocations.push(parse_allocation_row(row)?);
        }
        Ok(allocations)
    }
}

fn ensure_unallocated(conn: &Connection, work_id: WorkId) -> AccessionRepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM accession_numbers WHERE work_id = ?1);",
        [work_id],
        |row| row.get(0),
    )?;
    if exists == 1 {
        return Err(AccessionRepoError::AlreadyAllocated(work_id));
    }
    Ok(())
}

fn load_allocation(
    conn: &Connection,
    work_id: WorkId,
) -> AccessionRepoResult<Option<AccessionAllocation>> {
    let mut stmt = conn.prepare(&format!("{ALLOCATION_SELECT_SQL} WHERE a.work_id = ?1;"))?;
    let mut rows = stmt.query([work_id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_allocation_row(row)?));
    }
    Ok(None)
}

fn load_required_allocation(
    conn: &Connection,
    work_id: WorkId,
) -> AccessionRepoResult<AccessionAllocation> {
    load_allocation(conn, work_id)?.ok_or_else(|| {
        AccessionRepoError::InvalidData(format!("allocation for work {work_id} missing after insert"))
    })
}

fn parse_allocation_row(row: &Row<'_>) -> AccessionRepoResult<AccessionAllocation> {
    let retrospective = match row.get::<_, i64>("retrospective")? {
        0 => false,
        1 => true,
        other => {
            return Err(AccessionRepoError::InvalidData(format!(
                "invalid retrospective value `{other}` in accession_batches.retrospective"
            )));
        }
    };

    let allocation = AccessionAllocation {
        work_id: row.get("work_id")?,
        batch_id: row.get("batch_id")?,
        batch: BatchLabel::new(row.get("year")?, row.get("sequence")?, retrospective),
        object_number: row.get("object_number")?,
        part_number: row.get("part_number")?,
        part_count: row.get("part_count")?,
        created_at: row.get("created_at")?,
    };

    match (allocation.part_number, allocation.part_count) {
        (None, None) => {}
        (Some(number), Some(count)) if number <= count => {}
        (number, count) => {
            return Err(AccessionRepoError::InvalidData(format!(
                "inconsistent part {number:?}/{count:?} for work {}",
                allocation.work_id
            )));
        }
    }
    Ok(allocation)
}
