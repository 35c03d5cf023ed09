//! Work registry contracts and SQLite implementation.
//!
//! # Responsibility
//! - Register works and the VRA Core 4 relations between them.
//! - Answer the hierarchy questions the accession allocator asks.
//!
//! # Invariants
//! - A work has at most one edge per relation type, so at most one
//!   `partOf` parent.
//! - `partOf` edges never form a cycle.

use crate::db::{ensure_connection_ready, DbError};
use crate::model::work::{NewWork, RelationType, Work, WorkId, WorkType, WorkValidationError};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const WORK_SELECT_SQL: &str = "SELECT
    work_id,
    work_type,
    preferred_title,
    brief_description,
    created_at
FROM works";

pub type WorkRepoResult<T> = Result<T, WorkRepoError>;

/// Errors from work registry operations.
#[derive(Debug)]
pub enum WorkRepoError {
    Validation(WorkValidationError),
    Db(DbError),
    WorkNotFound(WorkId),
    /// A work cannot be related to itself.
    SelfRelation(WorkId),
    /// `lesser` already has an edge of this relation type.
    RelationExists {
        lesser: WorkId,
        relation: RelationType,
    },
    /// Linking would make a work (transitively) part of itself.
    CycleDetected {
        lesser: WorkId,
        greater: WorkId,
    },
    InvalidData(String),
}

impl Display for WorkRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::WorkNotFound(id) => write!(f, "work not found: {id}"),
            Self::SelfRelation(id) => write!(f, "work {id} cannot be related to itself"),
            Self::RelationExists { lesser, relation } => write!(
                f,
                "work {lesser} already has a `{}` relation",
                relation.as_str()
            ),
            Self::CycleDetected { lesser, greater } => write!(
                f,
                "making work {lesser} part of work {greater} would create a cycle"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted work data: {message}"),
        }
    }
}

impl Error for WorkRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<WorkValidationError> for WorkRepoError {
    fn from(value: WorkValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for WorkRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for WorkRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One stored relation edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkRelation {
    pub lesser: WorkId,
    pub greater: WorkId,
    pub relation: RelationType,
}

/// Hierarchy lookups consumed by the accession allocator.
pub trait WorkHierarchy {
    fn work_exists(&self, work_id: WorkId) -> WorkRepoResult<bool>;
    /// Returns the greater work of `work_id`'s `partOf` relation, if any.
    fn get_parent(&self, work_id: WorkId) -> WorkRepoResult<Option<WorkId>>;
}

/// Repository interface for the work registry.
pub trait WorkRepository: WorkHierarchy {
    fn register_work(&self, input: &NewWork) -> WorkRepoResult<Work>;
    fn get_work(&self, work_id: WorkId) -> WorkRepoResult<Option<Work>>;
    fn link_works(
        &self,
        lesser: WorkId,
        greater: WorkId,
        relation: RelationType,
    ) -> WorkRepoResult<WorkRelation>;
    /// Lists outgoing edges of `lesser`, ordered by relation type.
    fn list_relations(&self, lesser: WorkId) -> WorkRepoResult<Vec<WorkRelation>>;
    /// Lists works that are `partOf` `greater`, ascending id.
    fn list_parts_of(&self, greater: WorkId) -> WorkRepoResult<Vec<WorkId>>;
}

/// SQLite-backed work registry.
pub struct SqliteWorkRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteWorkRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> WorkRepoResult<Self> {
        ensure_connection_ready(conn, &["works", "work_hierarchy"])?;
        Ok(Self { conn })
    }
}

impl WorkHierarchy for SqliteWorkRepository<'_> {
    fn work_exists(&self, work_id: WorkId) -> WorkRepoResult<bool> {
        work_exists(self.conn, work_id)
    }

    fn get_parent(&self, work_id: WorkId) -> WorkRepoResult<Option<WorkId>> {
        part_parent(self.conn, work_id)
    }
}

impl WorkRepository for SqliteWorkRepository<'_> {
    fn register_work(&self, input: &NewWork) -> WorkRepoResult<Work> {
        input.validate()?;

        self.conn.execute(
            "INSERT INTO works (
                work_type,
                preferred_title,
                brief_description
            ) VALUES (?1, ?2, ?3);",
            params![
                input.work_type.as_str(),
                input.preferred_title.trim(),
                input.brief_description.as_str(),
            ],
        )?;

        let work_id = self.conn.last_insert_rowid();
        self.get_work(work_id)?.ok_or_else(|| {
            WorkRepoError::InvalidData(format!("work {work_id} missing after insert"))
        })
    }

    fn get_work(&self, work_id: WorkId) -> WorkRepoResult<Option<Work>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{WORK_SELECT_SQL} WHERE work_id = ?1;"))?;
        let mut rows = stmt.query([work_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_work_row(row)?));
        }
        Ok(None)
    }

    fn link_works(
        &self,
        lesser: WorkId,
        greater: WorkId,
        relation: RelationType,
    ) -> WorkRepoResult<WorkRelation> {
        if lesser == greater {
            return Err(WorkRepoError::SelfRelation(lesser));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for work_id in [lesser, greater] {
            if !work_exists(&tx, work_id)? {
                return Err(WorkRepoError::WorkNotFound(work_id));
            }
        }

        let existing: Option<WorkId> = tx
            .query_row(
                "SELECT greater_id
                 FROM work_hierarchy
                 WHERE lesser_id = ?1 AND relation_type = ?2;",
                params![lesser, relation.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(WorkRepoError::RelationExists { lesser, relation });
        }

        if relation.is_part_relation() && is_part_ancestor(&tx, lesser, greater)? {
            return Err(WorkRepoError::CycleDetected { lesser, greater });
        }

        tx.execute(
            "INSERT INTO work_hierarchy (lesser_id, greater_id, relation_type)
             VALUES (?1, ?2, ?3);",
            params![lesser, greater, relation.as_str()],
        )?;
        tx.commit()?;

        Ok(WorkRelation {
            lesser,
            greater,
            relation,
        })
    }

    fn list_relations(&self, lesser: WorkId) -> WorkRepoResult<Vec<WorkRelation>> {
        let mut stmt = self.conn.prepare(
            "SELECT lesser_id, greater_id, relation_type
             FROM work_hierarchy
             WHERE lesser_id = ?1
             ORDER BY relation_type ASC;",
        )?;
        let mut rows = stmt.query([lesser])?;
        let mut relations = Vec::new();
        while let Some(row) = rows.next()? {
            let relation_text: String = row.get(2)?;
            let relation = RelationType::parse(&relation_text).ok_or_else(|| {
                WorkRepoError::InvalidData(format!(
                    "invalid relation type `{relation_text}` in work_hierarchy.relation_type"
                ))
            })?;
            relations.push(WorkRelation {
                lesser: row.get(0)?,
                greater: row.get(1)?,
                relation,
            });
        }
        Ok(relations)
    }

    fn list_parts_of(&self, greater: WorkId) -> WorkRepoResult<Vec<WorkId>> {
        let mut stmt = self.conn.prepare(
            "SELECT lesser_id
             FROM work_hierarchy
             WHERE greater_id = ?1 AND relation_type = ?2
             ORDER BY lesser_id ASC;",
        )?;
        let mut rows = stmt.query(params![greater, RelationType::PartOf.as_str()])?;
        let mut parts = Vec::new();
        while let Some(row) = rows.next()? {
            parts.push(row.get(0)?);
        }
        Ok(parts)
    }
}

fn work_exists(conn: &Connection, work_id: WorkId) -> WorkRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM works WHERE work_id = ?1);",
        [work_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn part_parent(conn: &Connection, work_id: WorkId) -> WorkRepoResult<Option<WorkId>> {
    let parent = conn
        .query_row(
            "SELECT greater_id
             FROM work_hierarchy
             WHERE lesser_id = ?1 AND relation_type = ?2;",
            params![work_id, RelationType::PartOf.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(parent)
}

/// Whether `ancestor` is reachable from `work_id` by following `partOf` edges.
fn is_part_ancestor(conn: &Connection, ancestor: WorkId, work_id: WorkId) -> WorkRepoResult<bool> {
    let mut visited = HashSet::new();
    let mut cursor = Some(work_id);
    while let Some(current) = cursor {
        if current == ancestor {
            return Ok(true);
        }
        if !visited.insert(current) {
            return Err(WorkRepoError::InvalidData(format!(
                "partOf cycle through work {current}"
            )));
        }
        cursor = part_parent(conn, current)?;
    }
    Ok(false)
}

fn parse_work_row(row: &Row<'_>) -> WorkRepoResult<Work> {
    let type_text: String = row.get("work_type")?;
    let work_type = WorkType::parse(&type_text).ok_or_else(|| {
        WorkRepoError::InvalidData(format!("invalid work type `{type_text}` in works.work_type"))
    })?;

    Ok(Work {
        work_id: row.get("work_id")?,
        work_type,
        preferred_title: row.get("preferred_title")?,
        brief_description: row.get("brief_description")?,
        created_at: row.get("created_at")?,
    })
}
