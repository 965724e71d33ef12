//! Estimation workflow stages.
//!
//! Stages are stored by label in `opportunity_opportunity.estimation_stage`.
//! Ordering follows declaration order, so comparisons are ordinal.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum EstimationStage {
    #[default]
    SelectTaskCode,
    UploadCadFile,
    MaterialList,
    TaskMapping,
    GenerateEstimate,
    ProposalCreation,
    ProposalPreview,
    FinalDocument,
}

impl EstimationStage {
    pub const ALL: [EstimationStage; 8] = [
        EstimationStage::SelectTaskCode,
        EstimationStage::UploadCadFile,
        EstimationStage::MaterialList,
        EstimationStage::TaskMapping,
        EstimationStage::GenerateEstimate,
        EstimationStage::ProposalCreation,
        EstimationStage::ProposalPreview,
        EstimationStage::FinalDocument,
    ];

    /// Human label, as stored in the database.
    pub fn label(&self) -> &'static str {
        match self {
            EstimationStage::SelectTaskCode => "Select Task Code",
            EstimationStage::UploadCadFile => "Upload CAD File",
            EstimationStage::MaterialList => "Material List",
            EstimationStage::TaskMapping => "Task Mapping",
            EstimationStage::GenerateEstimate => "Generate Estimate",
            EstimationStage::ProposalCreation => "Proposal Creation",
            EstimationStage::ProposalPreview => "Proposal Preview",
            EstimationStage::FinalDocument => "Final Document",
        }
    }

    /// 1-based position in the workflow.
    pub fn ordinal(&self) -> u8 {
        *self as u8 + 1
    }

    /// Constant name used by the front end (`STAGE_1` .. `STAGE_8`).
    pub fn constant(&self) -> String {
        format!("STAGE_{}", self.ordinal())
    }

    /// Move forward to `requested`; same or earlier stages are refused.
    pub fn advance(self, requested: EstimationStage) -> StageTransition {
        if requested > self {
            StageTransition::Advanced {
                from: self,
                to: requested,
            }
        } else {
            StageTransition::Unchanged { current: self }
        }
    }
}

impl std::fmt::Display for EstimationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for EstimationStage {
    type Err = String;

    /// Accepts the label ("Material List") or the constant ("STAGE_3").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(stage) = Self::ALL
            .iter()
            .find(|stage| stage.label().eq_ignore_ascii_case(trimmed))
        {
            return Ok(*stage);
        }

        trimmed
            .to_uppercase()
            .strip_prefix("STAGE_")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1))
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or_else(|| format!("Invalid estimation stage: {}", s))
    }
}

impl TryFrom<String> for EstimationStage {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Serialize for EstimationStage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for EstimationStage {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Outcome of a stage change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageTransition {
    Advanced {
        from: EstimationStage,
        to: EstimationStage,
    },
    Unchanged {
        current: EstimationStage,
    },
}

impl StageTransition {
    pub fn stage(&self) -> EstimationStage {
        match self {
            StageTransition::Advanced { to, .. } => *to,
            StageTransition::Unchanged { current } => *current,
        }
    }

    pub fn changed(&self) -> bool {
        matches!(self, StageTransition::Advanced { .. })
    }
}
