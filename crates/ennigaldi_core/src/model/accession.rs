//! Accession number model.
//!
//! # Responsibility
//! - Represent one persisted allocation and its display identity.
//! - Parse display identities back into their components.
//!
//! # Invariants
//! - `part_number` and `part_count` are both set or both unset.
//! - `part_number <= part_count` when set.
//! - Rendering then parsing recovers batch label, object number and part.

use crate::model::batch::{BatchId, BatchLabel};
use crate::model::work::WorkId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static ACCESSION_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]+)\.(?:(R)\.)?([0-9]+)\.([0-9]+)(?:-([0-9]+)/([0-9]+))?$")
        .expect("valid accession number regex")
});
static BATCH_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+)\.(?:(R)\.)?([0-9]+)$").expect("valid batch label regex"));

/// Position of a work inside a set of parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartPosition {
    pub number: u32,
    /// Current number of parts issued for the object.
    pub count: u32,
}

/// Accession number display identity, `2024.1.7` or `2024.R.1.7-2/3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessionNumber {
    pub batch: BatchLabel,
    pub object_number: u32,
    pub part: Option<PartPosition>,
}

impl Display for AccessionNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.batch, self.object_number)?;
        if let Some(part) = self.part {
            write!(f, "-{}/{}", part.number, part.count)?;
        }
        Ok(())
    }
}

/// Parse failure for accession numbers and batch labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessionNumberParseError {
    /// Input does not match `YEAR.[R.]SEQ.OBJECT[-PART/COUNT]`.
    Malformed(String),
    /// A component is zero or out of range.
    InvalidComponent {
        component: &'static str,
        value: String,
    },
    /// Part number is greater than the part count.
    PartExceedsCount { number: u32, count: u32 },
}

impl Display for AccessionNumberParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(value) => write!(f, "malformed accession number `{value}`"),
            Self::InvalidComponent { component, value } => {
                write!(f, "invalid {component} `{value}` in accession number")
            }
            Self::PartExceedsCount { number, count } => {
                write!(f, "part number {number} exceeds part count {count}")
            }
        }
    }
}

impl Error for AccessionNumberParseError {}

impl FromStr for BatchLabel {
    type Err = AccessionNumberParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let captures = BATCH_LABEL_RE
            .captures(trimmed)
            .ok_or_else(|| AccessionNumberParseError::Malformed(trimmed.to_string()))?;
        Ok(BatchLabel {
            year: parse_positive(&captures[1], "year")?,
            sequence: parse_positive(&captures[3], "batch sequence")?,
            retrospective: captures.get(2).is_some(),
        })
    }
}

impl FromStr for AccessionNumber {
    type Err = AccessionNumberParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let captures = ACCESSION_NUMBER_RE
            .captures(trimmed)
            .ok_or_else(|| AccessionNumberParseError::Malformed(trimmed.to_string()))?;

        let batch = BatchLabel {
            year: parse_positive(&captures[1], "year")?,
            sequence: parse_positive(&captures[3], "batch sequence")?,
            retrospective: captures.get(2).is_some(),
        };
        let object_number = parse_positive(&captures[4], "object number")?;

        let part = match (captures.get(5), captures.get(6)) {
            (Some(number), Some(count)) => {
                let number: u32 = parse_positive(number.as_str(), "part number")?;
                let count: u32 = parse_positive(count.as_str(), "part count")?;
                if number > count {
                    return Err(AccessionNumberParseError::PartExceedsCount { number, count });
                }
                Some(PartPosition { number, count })
            }
            _ => None,
        };

        Ok(Self {
            batch,
            object_number,
            part,
        })
    }
}

fn parse_positive<T>(value: &str, component: &'static str) -> Result<T, AccessionNumberParseError>
where
    T: FromStr + Default + PartialEq,
{
    let invalid = || AccessionNumberParseError::InvalidComponent {
        component,
        value: value.to_string(),
    };
    let parsed = value.parse::<T>().map_err(|_| invalid())?;
    if parsed == T::default() {
        return Err(invalid());
    }
    Ok(parsed)
}

/// Persisted accession number of one work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessionAllocation {
    pub work_id: WorkId,
    pub batch_id: BatchId,
    pub batch: BatchLabel,
    pub object_number: u32,
    /// Set only when the work is part of another work.
    pub part_number: Option<u32>,
    /// Mirrors the highest part number issued for `object_number`.
    pub part_count: Option<u32>,
    /// Epoch milliseconds.
    pub created_at: i64,
}

impl AccessionAllocation {
    pub fn accession_number(&self) -> AccessionNumber {
        let part = match (self.part_number, self.part_count) {
            (Some(number), Some(count)) => Some(PartPosition { number, count }),
            _ => None,
        };
        AccessionNumber {
            batch: self.batch,
            object_number: self.object_number,
            part,
        }
    }

    pub fn is_part(&self) -> bool {
        self.part_number.is_some()
    }

    /// Confirmation line shown after a number is generated.
    pub fn confirmation(&self) -> String {
        format!("Registered accession number {}", self.accession_number())
    }
}

impl Display for AccessionAllocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.accession_number())
    }
}
