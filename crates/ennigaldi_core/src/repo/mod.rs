//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repositories only accept connections migrated to the latest schema.
//! - Every read-then-write sequence runs inside one immediate transaction.
//! - Repository APIs return semantic errors in addition to DB transport errors.

pub mod accession_repo;
pub mod batch_repo;
pub mod work_repo;
