//! Batch ledger use-case service.
//!
//! # Responsibility
//! - Start numbering periods and expose the active one to callers.
//!
//! # Invariants
//! - The active batch is always read from the store, never cached.
//! - Service APIs never bypass repository transactions.

use crate::model::batch::{Batch, BatchId};
use crate::repo::batch_repo::{BatchRepoResult, BatchRepository, StartBatchRequest};
use log::{error, info};

/// Banner text when no batch has been started.
pub const NO_ACTIVE_BATCH_BANNER: &str = "No active batch.";

/// Use-case service wrapper for the batch ledger.
pub struct BatchService<R: BatchRepository> {
    repo: R,
}

impl<R: BatchRepository> BatchService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Starts a batch in the current calendar year and makes it the only
    /// active one.
    pub fn start_batch(&self, retrospective: bool, note: impl Into<String>) -> BatchRepoResult<Batch> {
        self.start(StartBatchRequest {
            year: None,
            retrospective,
            note: note.into(),
        })
    }

    /// Starts a batch for an explicit year.
    ///
    /// Used by imports of historical registers and by tests that need a
    /// fixed year.
    pub fn start_batch_in_year(
        &self,
        year: u16,
        retrospective: bool,
        note: impl Into<String>,
    ) -> BatchRepoResult<Batch> {
        self.start(StartBatchRequest {
            year: Some(year),
            retrospective,
            note: note.into(),
        })
    }

    pub fn get_active_batch(&self) -> BatchRepoResult<Option<Batch>> {
        self.repo.get_active_batch()
    }

    pub fn get_batch(&self, batch_id: BatchId) -> BatchRepoResult<Option<Batch>> {
        self.repo.get_batch(batch_id)
    }

    /// Lists batches newest first.
    pub fn list_batches(&self) -> BatchRepoResult<Vec<Batch>> {
        self.repo.list_batches()
    }

    /// Current batch label for page banners, or [`NO_ACTIVE_BATCH_BANNER`].
    pub fn active_batch_banner(&self) -> BatchRepoResult<String> {
        Ok(match self.repo.get_active_batch()? {
            Some(batch) => batch.label().to_string(),
            None => NO_ACTIVE_BATCH_BANNER.to_string(),
        })
    }

    fn start(&self, request: StartBatchRequest) -> BatchRepoResult<Batch> {
        match self.repo.start_batch(&request) {
            Ok(batch) => {
                info!(
                    "event=batch_start module=batch status=ok batch_id={} batch={} retrospective={}",
                    batch.batch_id,
                    batch.label(),
                    batch.retrospective
                );
                Ok(batch)
            }
            Err(err) => {
                error!(
                    "event=batch_start module=batch status=error retrospective={} error={}",
                    request.retrospective, err
                );
                Err(err)
            }
        }
    }
}
