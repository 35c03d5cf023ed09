//! Accession number allocation service.
//!
//! # Responsibility
//! - Decide between part numbering and object numbering for a work.
//! - Translate repository outcomes into caller-actionable errors.
//!
//! # Invariants
//! - A work receives exactly one accession number.
//! - A part shares its parent's batch and object number; the parent itself
//!   is never given a part number.
//! - Nothing is retried internally; every error is terminal for the call.

use crate::model::accession::AccessionAllocation;
use crate::model::batch::BatchId;
use crate::model::work::WorkId;
use crate::repo::accession_repo::{AccessionRepoError, AccessionRepository};
use crate::repo::work_repo::{WorkHierarchy, WorkRepoError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors from accession number generation.
#[derive(Debug)]
pub enum AccessionServiceError {
    /// The work already has an accession number; a double submission.
    AlreadyAllocated(WorkId),
    /// Generate the parent's accession number first, then retry.
    ParentNotAllocated { work_id: WorkId, parent_id: WorkId },
    /// Start a batch before generating accession numbers.
    NoActiveBatch,
    /// The registry does not know this work.
    WorkNotFound(WorkId),
    /// Allocation store failure; safe to retry the whole call.
    Repo(AccessionRepoError),
    /// Registry lookup failure; safe to retry the whole call.
    Registry(WorkRepoError),
}

impl AccessionServiceError {
    /// Whether the failure came from the store rather than caller state.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, Self::Repo(_) | Self::Registry(_))
    }
}

impl Display for AccessionServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyAllocated(work_id) => {
                write!(f, "work {work_id} already has an accession number")
            }
            Self::ParentNotAllocated { work_id, parent_id } => write!(
                f,
                "work {work_id} is part of work {parent_id}; generate the parent's accession number first"
            ),
            Self::NoActiveBatch => {
                write!(f, "no active batch; start a batch before generating accession numbers")
            }
            Self::WorkNotFound(work_id) => write!(f, "work not found: {work_id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Registry(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AccessionServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Registry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AccessionRepoError> for AccessionServiceError {
    fn from(value: AccessionRepoError) -> Self {
        match value {
            AccessionRepoError::AlreadyAllocated(work_id) => Self::AlreadyAllocated(work_id),
            AccessionRepoError::ParentNotAllocated { work_id, parent_id } => {
                Self::ParentNotAllocated { work_id, parent_id }
            }
            AccessionRepoError::NoActiveBatch => Self::NoActiveBatch,
            other => Self::Repo(other),
        }
    }
}

impl From<WorkRepoError> for AccessionServiceError {
    fn from(value: WorkRepoError) -> Self {
        match value {
            WorkRepoError::WorkNotFound(work_id) => Self::WorkNotFound(work_id),
            other => Self::Registry(other),
        }
    }
}

pub type AccessionServiceResult<T> = Result<T, AccessionServiceError>;

/// Accession allocator over an allocation store and a work hierarchy.
pub struct AccessionService<R: AccessionRepository, H: WorkHierarchy> {
    repo: R,
    hierarchy: H,
}

impl<R: AccessionRepository, H: WorkHierarchy> AccessionService<R, H> {
    pub fn new(repo: R, hierarchy: H) -> Self {
        Self { repo, hierarchy }
    }

    /// Generates and persists the accession number of `work_id`.
    ///
    /// # Contract
    /// - Part of another work: inherits the parent's batch and object number
    ///   and takes the next part number; all sibling part counts follow.
    /// - Otherwise: takes the next object number of the active batch.
    ///
    /// # Errors
    /// - `WorkNotFound`, `AlreadyAllocated`, `ParentNotAllocated`,
    ///   `NoActiveBatch` for caller-side state; nothing is written.
    /// - `Repo`/`Registry` for store failures, returned unchanged.
    pub fn generate(&self, work_id: WorkId) -> AccessionServiceResult<AccessionAllocation> {
        let started_at = Instant::now();
        match self.allocate(work_id) {
            Ok(allocation) => {
                info!(
                    "event=accession_generate module=accession status=ok work_id={} batch_id={} accession={} duration_ms={}",
                    work_id,
                    allocation.batch_id,
                    allocation,
                    started_at.elapsed().as_millis()
                );
                Ok(allocation)
            }
            Err(err) if err.is_persistence_failure() => {
                error!(
                    "event=accession_generate module=accession status=error work_id={} duration_ms={} error={}",
                    work_id,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
            Err(err) => {
                warn!(
                    "event=accession_generate module=accession status=rejected work_id={} error={}",
                    work_id, err
                );
                Err(err)
            }
        }
    }

    pub fn get_allocation(
        &self,
        work_id: WorkId,
    ) -> AccessionServiceResult<Option<AccessionAllocation>> {
        self.repo.get_allocation(work_id).map_err(Into::into)
    }

    pub fn has_allocation(&self, work_id: WorkId) -> AccessionServiceResult<bool> {
        Ok(self.repo.get_allocation(work_id)?.is_some())
    }

    /// Lists a batch's allocations ordered by object number, each
    /// unnumbered object before its parts.
    pub fn list_batch_allocations(
        &self,
        batch_id: BatchId,
    ) -> AccessionServiceResult<Vec<AccessionAllocation>> {
        self.repo.list_batch_allocations(batch_id).map_err(Into::into)
    }

    pub fn list_parts(
        &self,
        batch_id: BatchId,
        object_number: u32,
    ) -> AccessionServiceResult<Vec<AccessionAllocation>> {
        self.repo
            .list_parts(batch_id, object_number)
            .map_err(Into::into)
    }

    fn allocate(&self, work_id: WorkId) -> AccessionServiceResult<AccessionAllocation> {
        if !self.hierarchy.work_exists(work_id)? {
            return Err(AccessionServiceError::WorkNotFound(work_id));
        }
        // Re-checked inside the allocation transaction.
        if self.repo.get_allocation(work_id)?.is_some() {
            return Err(AccessionServiceError::AlreadyAllocated(work_id));
        }

        let allocation = match self.hierarchy.get_parent(work_id)? {
            Some(parent_id) => self.repo.allocate_part(work_id, parent_id)?,
            None => self.repo.allocate_object(work_id)?,
        };
        Ok(allocation)
    }
}
