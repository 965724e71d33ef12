//! Response DTOs for estimate API endpoints.

use rust_decimal::Decimal;
use serde::Serialize;

use super::calculators::MarginBasis;
use super::models::TaskMapping;
use super::stage::{EstimationStage, StageTransition};

/// Response for a markup calculation
#[derive(Debug, Serialize)]
pub struct MarkupResponse {
    #[serde(with = "rust_decimal::serde::str")]
    pub cost: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub margin_percent: Decimal,
    pub basis: MarginBasis,
    #[serde(with = "rust_decimal::serde::str")]
    pub sale_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub margin_amount: Decimal,
}

/// Response for a margin update
#[derive(Debug, Serialize)]
pub struct MarginUpdateResponse {
    pub document_number: String,
    pub tasks_updated: u64,
}

/// Response for a stage request
#[derive(Debug, Serialize)]
pub struct StageResponse {
    pub document_number: String,
    pub stage: EstimationStage,
    pub stage_number: u8,
    /// Front-end constant, `STAGE_n`
    pub stage_constant: String,
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_stage: Option<EstimationStage>,
}

impl StageResponse {
    pub fn new(document_number: String, transition: StageTransition) -> Self {
        let previous_stage = match transition {
            StageTransition::Advanced { from, .. } => Some(from),
            StageTransition::Unchanged { .. } => None,
        };
        let stage = transition.stage();

        Self {
            document_number,
            stage,
            stage_number: stage.ordinal(),
            stage_constant: stage.constant(),
            changed: transition.changed(),
            previous_stage,
        }
    }
}

/// Response for a labor link or unlink
#[derive(Debug, Serialize)]
pub struct LaborLinkResponse {
    pub task_id: i64,
    pub code: String,
    pub linked_task_id: Option<i64>,
}

impl From<TaskMapping> for LaborLinkResponse {
    fn from(task: TaskMapping) -> Self {
        Self {
            task_id: task.id,
            code: task.code,
            linked_task_id: task.linked_task_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_response_advanced() {
        let transition = EstimationStage::MaterialList.advance(EstimationStage::GenerateEstimate);
        let response = StageResponse::new("OPP-9".to_string(), transition);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["stage"], "Generate Estimate");
        assert_eq!(json["stage_constant"], format!("STAGE_{}", response.stage_number));
        assert_eq!(json["previous_stage"], "Material List");
        assert_eq!(json["changed"], true);
    }

    #[test]
    fn test_stage_response_unchanged_omits_previous() {
        let transition = EstimationStage::ProposalPreview.advance(EstimationStage::MaterialList);
        let response = StageResponse::new("OPP-9".to_string(), transition);

        assert_eq!(response.stage_constant, EstimationStage::ProposalPreview.constant());
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("previous_stage").is_none());
        assert_eq!(json["changed"], false);
    }
}
