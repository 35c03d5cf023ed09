//! Domain model for accession registration.
//!
//! # Responsibility
//! - Define the records the ledger, allocator and registry exchange.
//! - Own display/parse rules for batch labels and accession numbers.
//!
//! # Invariants
//! - Display identities are derived from stored fields, never stored.
//! - Works are identified by store-assigned integer ids.

pub mod accession;
pub mod batch;
pub mod work;
