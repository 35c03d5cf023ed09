//! Accession batch model.
//!
//! # Responsibility
//! - Represent one numbering period and its display identity.
//!
//! # Invariants
//! - `sequence` starts at 1 for every calendar year and is shared by
//!   retrospective and regular batches of that year.
//! - At most one persisted batch has `active == true`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Store-assigned batch identifier.
pub type BatchId = i64;

/// Human-facing batch identity, `2024.3` or `2024.R.3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchLabel {
    pub year: u16,
    pub sequence: u32,
    /// Set for batches recording objects accessioned in an earlier year.
    pub retrospective: bool,
}

impl BatchLabel {
    pub fn new(year: u16, sequence: u32, retrospective: bool) -> Self {
        Self {
            year,
            sequence,
            retrospective,
        }
    }
}

impl Display for BatchLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.retrospective {
            write!(f, "{}.R.{}", self.year, self.sequence)
        } else {
            write!(f, "{}.{}", self.year, self.sequence)
        }
    }
}

/// Persisted numbering period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: BatchId,
    pub year: u16,
    pub sequence: u32,
    pub retrospective: bool,
    pub active: bool,
    pub note: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// UTC calendar date of `created_at`, `YYYY-MM-DD`.
    pub created_on: String,
}

impl Batch {
    /// Returns the display identity of this batch.
    pub fn label(&self) -> BatchLabel {
        BatchLabel::new(self.year, self.sequence, self.retrospective)
    }

    /// Confirmation line shown after a batch is started.
    pub fn confirmation(&self) -> String {
        format!("Working on batch {} since {}", self.label(), self.created_on)
    }
}

impl Display for Batch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::{Batch, BatchLabel};

    fn batch(retrospective: bool) -> Batch {
        Batch {
            batch_id: 7,
            year: 2017,
            sequence: 2,
            retrospective,
            active: true,
            note: String::new(),
            created_at: 0,
            created_on: "2017-05-04".to_string(),
        }
    }

    #[test]
    fn label_marks_retrospective_batches() {
        assert_eq!(BatchLabel::new(2017, 1, true).to_string(), "2017.R.1");
        assert_eq!(BatchLabel::new(2017, 2, false).to_string(), "2017.2");
    }

    #[test]
    fn confirmation_includes_label_and_start_date() {
        assert_eq!(
            batch(false).confirmation(),
            "Working on batch 2017.2 since 2017-05-04"
        );
        assert_eq!(batch(true).to_string(), "2017.R.2");
    }
}
