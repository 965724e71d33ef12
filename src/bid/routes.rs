//! Bid route handlers

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;

use crate::error::Result;
use crate::estimate::calculators::{extended_total, MarginBasis};
use crate::AppState;

use super::calculators::{self, equipment_total, labor_total, material_total};
use super::requests::BidCalculateRequest;
use super::responses::{BidCalculateResponse, RecalculateResponse};
use super::services::{
    self, ensure_in_range, ensure_non_negative, validate_margin, BidError, BidScheduleSummary,
};

/// Bid routes, mounted at the application root
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/bid/calculate", post(calculate))
        .route("/api/bid-items/:id/recalculate", post(recalculate))
        .route("/api/opportunities/:doc/bid-schedule", get(bid_schedule))
}

fn check(field: String, value: Decimal) -> std::result::Result<(), BidError> {
    ensure_non_negative(field.clone(), value)?;
    ensure_in_range(field, value)
}

fn validate(req: &BidCalculateRequest, basis: MarginBasis) -> std::result::Result<(), BidError> {
    check("subcontractor_total".to_string(), req.subcontractor_total)?;
    for (i, line) in req.materials.iter().enumerate() {
        check(format!("materials[{}].quantity", i), line.quantity)?;
        check(format!("materials[{}].unit_cost", i), line.unit_cost)?;
    }
    for (i, line) in req.labor.iter().enumerate() {
        check(format!("labor[{}].hours", i), line.hours)?;
        check(format!("labor[{}].rate", i), line.rate)?;
    }
    for (i, line) in req.equipment.iter().enumerate() {
        check(format!("equipment[{}].hours", i), line.hours)?;
        check(format!("equipment[{}].rate", i), line.rate)?;
        check(format!("equipment[{}].fuel_gallons", i), line.fuel_gallons)?;
        check(
            format!("equipment[{}].fuel_cost_per_gallon", i),
            line.fuel_cost_per_gallon,
        )?;
    }

    // The item's cost must fit as well as each figure
    let extended = req
        .materials
        .iter()
        .map(|m| (m.quantity, m.unit_cost))
        .chain(req.labor.iter().map(|l| (l.hours, l.rate)))
        .chain(req.equipment.iter().flat_map(|e| {
            [(e.hours, e.rate), (e.fuel_gallons, e.fuel_cost_per_gallon)]
        }))
        .chain(std::iter::once((req.subcontractor_total, Decimal::ONE)));
    if extended_total(extended).is_none() {
        return Err(BidError::OutOfRange {
            field: "our_cost".to_string(),
        });
    }

    validate_margin(req.margin_percent, basis)
}

/// Calculate bid item totals from posted lines
pub async fn calculate(
    State(state): State<AppState>,
    Json(req): Json<BidCalculateRequest>,
) -> Result<Json<BidCalculateResponse>> {
    let basis = req.margin_basis.unwrap_or(state.config.bid_margin_basis);
    validate(&req, basis)?;

    let material_totals: Vec<Decimal> = req
        .materials
        .iter()
        .map(|m| material_total(m.quantity, m.unit_cost))
        .collect();
    let labor_totals: Vec<Decimal> = req
        .labor
        .iter()
        .map(|l| labor_total(l.hours, l.rate))
        .collect();
    let equipment_totals: Vec<Decimal> = req
        .equipment
        .iter()
        .map(|e| equipment_total(e.hours, e.rate, e.fuel_gallons, e.fuel_cost_per_gallon))
        .collect();

    let totals = calculators::calculate_totals(
        &material_totals,
        &labor_totals,
        &equipment_totals,
        req.subcontractor_total,
        req.margin_percent,
        basis,
    );

    Ok(Json(BidCalculateResponse {
        material_totals,
        labor_totals,
        equipment_totals,
        totals,
    }))
}

/// Recompute and store a bid item's totals
pub async fn recalculate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RecalculateResponse>> {
    let totals =
        services::recalculate_bid_item(&state.db, state.config.bid_margin_basis, id).await?;
    Ok(Json(RecalculateResponse {
        bid_item_id: id,
        totals,
    }))
}

/// Bid schedule summary for an opportunity
pub async fn bid_schedule(
    State(state): State<AppState>,
    Path(doc): Path<String>,
) -> Result<Json<BidScheduleSummary>> {
    let summary = services::bid_schedule_summary(&state.db, &doc).await?;
    Ok(Json(summary))
}
