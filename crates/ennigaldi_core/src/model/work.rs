//! Work (museum object record) model and hierarchy relation types.
//!
//! # Responsibility
//! - Define the registry record that accession numbers are attached to.
//! - Enumerate VRA Core 4 work relation types.
//!
//! # Invariants
//! - `work_id` is assigned by the store and never reused.
//! - `preferred_title` is never blank.
//! - Only `partOf` drives accession numbering.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned work identifier. Distinct from the accession number.
pub type WorkId = i64;

/// VRA Core 4 work type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkType {
    Artifact,
    IssuedObject,
    Specimen,
}

impl WorkType {
    /// Storage/wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Artifact => "artifact",
            Self::IssuedObject => "issuedObject",
            Self::Specimen => "specimen",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "artifact" => Some(Self::Artifact),
            "issuedObject" => Some(Self::IssuedObject),
            "specimen" => Some(Self::Specimen),
            _ => None,
        }
    }
}

/// Directed relation `lesser <relation> greater`.
///
/// Inverse relations (`largerContextFor`, `componentIs`, ...) are derived by
/// querying the edge from the other side and are not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationType {
    PartOf,
    FormerlyPartOf,
    ComponentOf,
    CartoonFor,
    CounterProofFor,
    ModelFor,
    PlanFor,
    PrepatoryFor,
    PrintingPlateFor,
    PrototypeFor,
    ReliefFor,
    StudyFor,
    CopyAfter,
    FacsimileOf,
    ReplicaOf,
    VersionOf,
}

impl RelationType {
    pub const ALL: [RelationType; 16] = [
        Self::PartOf,
        Self::FormerlyPartOf,
        Self::ComponentOf,
        Self::CartoonFor,
        Self::CounterProofFor,
        Self::ModelFor,
        Self::PlanFor,
        Self::PrepatoryFor,
        Self::PrintingPlateFor,
        Self::PrototypeFor,
        Self::ReliefFor,
        Self::StudyFor,
        Self::CopyAfter,
        Self::FacsimileOf,
        Self::ReplicaOf,
        Self::VersionOf,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PartOf => "partOf",
            Self::FormerlyPartOf => "formerlyPartOf",
            Self::ComponentOf => "componentOf",
            Self::CartoonFor => "cartoonFor",
            Self::CounterProofFor => "counterProofFor",
            Self::ModelFor => "modelFor",
            Self::PlanFor => "planFor",
            Self::PrepatoryFor => "prepatoryFor",
            Self::PrintingPlateFor => "printingPlateFor",
            Self::PrototypeFor => "prototypeFor",
            Self::ReliefFor => "reliefFor",
            Self::StudyFor => "studyFor",
            Self::CopyAfter => "copyAfter",
            Self::FacsimileOf => "facsimileOf",
            Self::ReplicaOf => "replicaOf",
            Self::VersionOf => "versionOf",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|relation| relation.as_str() == value)
    }

    /// Whether the lesser work shares the greater one's object number.
    /// `componentOf` works are numbered on their own.
    pub fn is_part_relation(self) -> bool {
        matches!(self, Self::PartOf)
    }

    /// Human-readable label, e.g. `part of`.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::PartOf => "part of",
            Self::FormerlyPartOf => "formerly part of",
            Self::ComponentOf => "component of",
            Self::CartoonFor => "cartoon for",
            Self::CounterProofFor => "counter proof for",
            Self::ModelFor => "model for",
            Self::PlanFor => "plan for",
            Self::PrepatoryFor => "prepatory for",
            Self::PrintingPlateFor => "printing plate for",
            Self::PrototypeFor => "prototype for",
            Self::ReliefFor => "relief for",
            Self::StudyFor => "study for",
            Self::CopyAfter => "copy after",
            Self::FacsimileOf => "facsimile of",
            Self::ReplicaOf => "replica of",
            Self::VersionOf => "version of",
        }
    }
}

/// Validation error for work registration input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkValidationError {
    BlankTitle,
}

impl Display for WorkValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "preferred title must not be blank"),
        }
    }
}

impl Error for WorkValidationError {}

/// Registration input for a new work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWork {
    pub work_type: WorkType,
    pub preferred_title: String,
    #[serde(default)]
    pub brief_description: String,
}

impl NewWork {
    pub fn new(work_type: WorkType, preferred_title: impl Into<String>) -> Self {
        Self {
            work_type,
            preferred_title: preferred_title.into(),
            brief_description: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), WorkValidationError> {
        if self.preferred_title.trim().is_empty() {
            return Err(WorkValidationError::BlankTitle);
        }
        Ok(())
    }
}

/// Registered work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Work {
    pub work_id: WorkId,
    pub work_type: WorkType,
    pub preferred_title: String,
    pub brief_description: String,
    /// Epoch milliseconds.
    pub created_at: i64,
}

impl Work {
    /// VRA Core 4 work reference, `w_0000012`.
    pub fn work_ref(&self) -> String {
        format!("w_{:07}", self.work_id)
    }
}

impl Display for Work {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.work_ref(), self.preferred_title)
    }
}

#[cfg(test)]
mod tests {
    use super::{NewWork, RelationType, Work, WorkType, WorkValidationError};

    #[test]
    fn relation_names_round_trip_and_only_parts_drive_numbering() {
        for relation in RelationType::ALL {
            assert_eq!(RelationType::parse(relation.as_str()), Some(relation));
        }
        let parts: Vec<_> = RelationType::ALL
            .into_iter()
            .filter(|relation| relation.is_part_relation())
            .collect();
        assert_eq!(parts, vec![RelationType::PartOf]);
    }

    #[test]
    fn work_display_pads_reference() {
        let work = Work {
            work_id: 12,
            work_type: WorkType::Artifact,
            preferred_title: "Ceramic bowl".to_string(),
            brief_description: String::new(),
            created_at: 0,
        };
        assert_eq!(work.to_string(), "w_0000012 Ceramic bowl");
    }

    #[test]
    fn blank_title_is_rejected() {
        let input = NewWork::new(WorkType::Specimen, "   ");
        assert_eq!(input.validate(), Err(WorkValidationError::BlankTitle));
    }
}
