//! Bid service functions with database access.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;

use crate::error::AppError;
use crate::estimate::calculators::{amount_in_range, percent_in_range, MarginBasis};
use crate::estimate::queries::find_opportunity;
use crate::estimate::EstimateError;

use super::calculators::{self, BidItemTotals};
use super::models::{BidScheduleLine, BidStatus, ColorCode};
use super::queries;

/// Bid validation error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BidError {
    #[error("Bid item {id} not found")]
    BidItemNotFound { id: i64 },

    #[error("{field} must not be negative, got {value}")]
    NegativeAmount { field: String, value: Decimal },

    #[error("{field} is out of range")]
    OutOfRange { field: String },

    #[error("A {margin_percent}% margin on sell leaves no sale price, it must be below 100")]
    MarginLeavesNoPrice { margin_percent: Decimal },
}

/// Reject negative quantities, hours, rates and costs.
pub fn ensure_non_negative(field: impl Into<String>, value: Decimal) -> Result<(), BidError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(BidError::NegativeAmount {
            field: field.into(),
            value,
        });
    }
    Ok(())
}

/// Reject amounts wider than the bid columns hold.
pub fn ensure_in_range(field: impl Into<String>, value: Decimal) -> Result<(), BidError> {
    if !amount_in_range(value) {
        return Err(BidError::OutOfRange {
            field: field.into(),
        });
    }
    Ok(())
}

/// Check a bid item margin against the basis it will be applied on.
///
/// Margin on sell divides by `1 - m/100`, so 100% or more has no price.
pub fn validate_margin(margin_percent: Decimal, basis: MarginBasis) -> Result<(), BidError> {
    if !percent_in_range(margin_percent) {
        return Err(BidError::OutOfRange {
            field: "margin_percent".to_string(),
        });
    }
    if basis == MarginBasis::OnSell && margin_percent >= Decimal::ONE_HUNDRED {
        return Err(BidError::MarginLeavesNoPrice { margin_percent });
    }
    Ok(())
}

/// One bid schedule row with its bid item's stored totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidScheduleRow {
    pub id: i64,
    pub item_code: String,
    pub description: String,
    pub engineer_estimate: Option<Decimal>,
    pub status: BidStatus,
    pub color_code: ColorCode,
    pub bid_item_id: Option<i64>,
    pub our_cost: Decimal,
    pub sale_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidScheduleSummary {
    pub document_number: String,
    pub items: Vec<BidScheduleRow>,
    pub total_our_cost: Decimal,
    pub total_sale_price: Decimal,
    pub total_engineer_estimate: Decimal,
}

/// Summarize schedule rows. Rows without a bid item count as zero.
pub fn summarize_schedule(document_number: String, lines: Vec<BidScheduleLine>) -> BidScheduleSummary {
    let mut total_our_cost = Decimal::ZERO;
    let mut total_sale_price = Decimal::ZERO;
    let mut total_engineer_estimate = Decimal::ZERO;

    let items = lines
        .into_iter()
        .map(|line| {
            let our_cost = line.our_cost.unwrap_or(Decimal::ZERO);
            let sale_price = line.sale_price.unwrap_or(Decimal::ZERO);
            total_our_cost += our_cost;
            total_sale_price += sale_price;
            total_engineer_estimate += line.engineer_estimate.unwrap_or(Decimal::ZERO);

            BidScheduleRow {
                id: line.id,
                item_code: line.item_code,
                description: line.description,
                engineer_estimate: line.engineer_estimate,
                status: line.status,
                color_code: line.color_code,
                bid_item_id: line.bid_item_id,
                our_cost,
                sale_price,
            }
        })
        .collect();

    BidScheduleSummary {
        document_number,
        items,
        total_our_cost,
        total_sale_price,
        total_engineer_estimate,
    }
}

/// Bid schedule of an opportunity with per-item and overall totals.
pub async fn bid_schedule_summary(
    pool: &PgPool,
    document_number: &str,
) -> Result<BidScheduleSummary, AppError> {
    let opportunity = find_opportunity(pool, document_number).await?.ok_or_else(|| {
        EstimateError::OpportunityNotFound {
            document_number: document_number.to_string(),
        }
    })?;

    let lines = queries::get_bid_schedule(pool, opportunity.internal_id).await?;
    Ok(summarize_schedule(opportunity.document_number, lines))
}

/// Recompute a bid item's line totals and item totals and store them.
///
/// Lines and totals are written in one transaction with the item row locked,
/// so concurrent recalculations of the same item serialize. A margin the
/// basis cannot price rolls the transaction back without writing.
pub async fn recalculate_bid_item(
    pool: &PgPool,
    basis: MarginBasis,
    bid_item_id: i64,
) -> Result<BidItemTotals, AppError> {
    let mut tx = pool.begin().await?;

    let item = queries::lock_bid_item(&mut tx, bid_item_id)
        .await?
        .ok_or(BidError::BidItemNotFound { id: bid_item_id })?;
    validate_margin(item.margin_percent, basis)?;

    let materials = queries::get_materials(&mut tx, item.id).await?;
    let labor = queries::get_labor(&mut tx, item.id).await?;
    let equipment = queries::get_equipment(&mut tx, item.id).await?;

    let material_totals: Vec<Decimal> = materials.iter().map(|m| m.total_cost()).collect();
    let labor_totals: Vec<Decimal> = labor.iter().map(|l| l.total_cost()).collect();
    let equipment_totals: Vec<Decimal> = equipment.iter().map(|e| e.total_cost()).collect();

    let totals = calculators::calculate_totals(
        &material_totals,
        &labor_totals,
        &equipment_totals,
        item.subcontractor_total,
        item.margin_percent,
        basis,
    );

    queries::save_bid_item_totals(&mut tx, item.id, &materials, &labor, &equipment, &totals)
        .await?;
    tx.commit().await?;

    info!(
        "Recalculated bid item {}: cost {} sale {}",
        item.id, totals.our_cost, totals.sale_price
    );
    Ok(totals)
}
