//! Request DTOs for estimate API endpoints.

use rust_decimal::Decimal;
use serde::Deserialize;

use super::calculators::MarginBasis;
use super::models::{AssignedProduct, TaskMapping};
use super::services::MarginUpdate;

/// Request to roll up posted tasks and lines without touching the database
#[derive(Debug, Deserialize)]
pub struct RollupRequest {
    pub tasks: Vec<TaskMapping>,
    #[serde(default)]
    pub lines: Vec<AssignedProduct>,
    /// Overrides the configured sales tax for this request
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub sales_tax_percent: Option<Decimal>,
}

/// Request to price a cost at a margin
#[derive(Debug, Deserialize)]
pub struct MarkupRequest {
    #[serde(with = "rust_decimal::serde::str")]
    pub cost: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub margin_percent: Decimal,
    #[serde(default = "default_markup_basis")]
    pub basis: MarginBasis,
}

fn default_markup_basis() -> MarginBasis {
    MarginBasis::OnSell
}

/// Request to set margins across an opportunity's tasks
#[derive(Debug, Default, Deserialize)]
pub struct MarginUpdateRequest {
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub labor_gp_percent: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub mat_gp_percent: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub s_and_h: Option<Decimal>,
}

impl From<MarginUpdateRequest> for MarginUpdate {
    fn from(req: MarginUpdateRequest) -> Self {
        MarginUpdate {
            labor_gp_percent: req.labor_gp_percent,
            mat_gp_percent: req.mat_gp_percent,
            s_and_h: req.s_and_h,
        }
    }
}

/// Request to move an opportunity to a stage, by label or `STAGE_n`
#[derive(Debug, Deserialize)]
pub struct StageRequest {
    pub stage: String,
}

/// Request to link a labor task to a product task
#[derive(Debug, Deserialize)]
pub struct LaborLinkRequest {
    pub labor_task_id: i64,
    pub product_task_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_markup_request_defaults_to_sell_basis() {
        let req: MarkupRequest =
            serde_json::from_str(r#"{"cost": "50.00", "margin_percent": "25"}"#).unwrap();
        assert_eq!(req.cost, dec!(50.00));
        assert_eq!(req.basis, MarginBasis::OnSell);

        let req: MarkupRequest = serde_json::from_str(
            r#"{"cost": "50.00", "margin_percent": "25", "basis": "on_cost"}"#,
        )
        .unwrap();
        assert_eq!(req.basis, MarginBasis::OnCost);
    }

    #[test]
    fn test_margin_update_request_partial() {
        let req: MarginUpdateRequest = serde_json::from_str(r#"{"mat_gp_percent": "30"}"#).unwrap();
        let update = MarginUpdate::from(req);
        assert_eq!(update.mat_gp_percent, Some(dec!(30)));
        assert_eq!(update.labor_gp_percent, None);
    }
}
