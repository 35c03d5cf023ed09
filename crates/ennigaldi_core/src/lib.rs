//! Core domain logic for Ennigaldi collection registration.
//! This crate owns accession batches and accession number allocation.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{open_with_config, ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::accession::{
    AccessionAllocation, AccessionNumber, AccessionNumberParseError, PartPosition,
};
pub use model::batch::{Batch, BatchId, BatchLabel};
pub use model::work::{
    NewWork, RelationType, Work, WorkId, WorkType, WorkValidationError,
};
pub use repo::accession_repo::{
    AccessionRepoError, AccessionRepoResult, AccessionRepository, SqliteAccessionRepository,
};
pub use repo::batch_repo::{
    BatchRepoError, BatchRepoResult, BatchRepository, SqliteBatchRepository, StartBatchRequest,
};
pub use repo::work_repo::{
    SqliteWorkRepository, WorkHierarchy, WorkRelation, WorkRepoError, WorkRepoResult,
    WorkRepository,
};
pub use service::accession_service::{
    AccessionService, AccessionServiceError, AccessionServiceResult,
};
pub use service::batch_service::{BatchService, NO_ACTIVE_BATCH_BANNER};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
