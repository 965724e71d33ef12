//! Estimate route handlers

use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};

use crate::error::Result;
use crate::AppState;

use super::calculators::{round_money, MarginBasis};
use super::proposal::FinalDocument;
use super::requests::{
    LaborLinkRequest, MarginUpdateRequest, MarkupRequest, RollupRequest, StageRequest,
};
use super::responses::{LaborLinkResponse, MarginUpdateResponse, MarkupResponse, StageResponse};
use super::rollup::{rollup, EstimateRollup};
use super::services::{self, EstimateError, KpiBreakdown, KpiKind, ProposalView};
use super::stage::EstimationStage;

/// Estimate routes, mounted at the application root
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/estimate/rollup", post(rollup_estimate))
        .route("/api/estimate/markup", post(markup))
        .route("/api/opportunities/:doc/estimate", get(opportunity_estimate))
        .route("/api/opportunities/:doc/kpi/:kind", get(opportunity_kpi))
        .route("/api/opportunities/:doc/margins", put(update_margins))
        .route("/api/opportunities/:doc/stage", post(advance_stage))
        .route("/api/opportunities/:doc/labor-links", post(link_labor))
        .route(
            "/api/opportunities/:doc/labor-links/:labor_task_id",
            delete(unlink_labor),
        )
        .route("/api/opportunities/:doc/proposal", get(proposal))
        .route("/api/opportunities/:doc/final-document", get(final_document))
}

/// Roll up posted tasks and lines
pub async fn rollup_estimate(
    State(state): State<AppState>,
    Json(req): Json<RollupRequest>,
) -> Result<Json<EstimateRollup>> {
    services::validate_rollup_input(&req.tasks, &req.lines, req.sales_tax_percent)?;

    let mut settings = state.config.estimate;
    if let Some(rate) = req.sales_tax_percent {
        settings.sales_tax_percent = rate;
    }

    Ok(Json(rollup(&req.tasks, &req.lines, &settings)))
}

/// Price a cost at a margin
pub async fn markup(Json(req): Json<MarkupRequest>) -> Result<Json<MarkupResponse>> {
    services::validate_markup(req.cost, req.margin_percent)?;

    let sale_price = req.basis.sale_price(req.cost, req.margin_percent);
    let sale_price = round_money(sale_price, 2);

    Ok(Json(MarkupResponse {
        cost: req.cost,
        margin_percent: req.margin_percent,
        basis: req.basis,
        sale_price,
        margin_amount: match req.basis {
            // A 100%+ margin on sell has no price
            MarginBasis::OnSell if sale_price.is_zero() => sale_price,
            _ => sale_price - req.cost,
        },
    }))
}

/// Full estimate for an opportunity
pub async fn opportunity_estimate(
    State(state): State<AppState>,
    Path(doc): Path<String>,
) -> Result<Json<EstimateRollup>> {
    let estimate =
        services::load_estimate(&state.db, &state.cache, &state.config.estimate, &doc).await?;
    Ok(Json(estimate.as_ref().clone()))
}

/// One KPI breakdown for an opportunity
pub async fn opportunity_kpi(
    State(state): State<AppState>,
    Path((doc, kind)): Path<(String, String)>,
) -> Result<Json<KpiBreakdown>> {
    let kind: KpiKind = kind.parse()?;
    let breakdown =
        services::opportunity_kpi(&state.db, &state.cache, &state.config.estimate, &doc, kind)
            .await?;
    Ok(Json(breakdown))
}

/// Set margins on every task of an opportunity
pub async fn update_margins(
    State(state): State<AppState>,
    Path(doc): Path<String>,
    Json(req): Json<MarginUpdateRequest>,
) -> Result<Json<MarginUpdateResponse>> {
    let tasks_updated =
        services::update_margins(&state.db, &state.cache, &doc, req.into()).await?;
    Ok(Json(MarginUpdateResponse {
        document_number: doc,
        tasks_updated,
    }))
}

/// Advance an opportunity's estimation stage
pub async fn advance_stage(
    State(state): State<AppState>,
    Path(doc): Path<String>,
    Json(req): Json<StageRequest>,
) -> Result<Json<StageResponse>> {
    let requested: EstimationStage = req
        .stage
        .parse()
        .map_err(|_| EstimateError::InvalidStage { value: req.stage.clone() })?;

    let transition = services::advance_stage(&state.db, &state.cache, &doc, requested).await?;
    Ok(Json(StageResponse::new(doc, transition)))
}

/// Link a labor task to a product task
pub async fn link_labor(
    State(state): State<AppState>,
    Path(doc): Path<String>,
    Json(req): Json<LaborLinkRequest>,
) -> Result<Json<LaborLinkResponse>> {
    let task = services::link_labor(
        &state.db,
        &state.cache,
        &doc,
        req.labor_task_id,
        req.product_task_id,
    )
    .await?;
    Ok(Json(task.into()))
}

/// Clear a labor task's link
pub async fn unlink_labor(
    State(state): State<AppState>,
    Path((doc, labor_task_id)): Path<(String, i64)>,
) -> Result<Json<LaborLinkResponse>> {
    let task = services::unlink_labor(&state.db, &state.cache, &doc, labor_task_id).await?;
    Ok(Json(task.into()))
}

/// Proposal groups and totals
pub async fn proposal(
    State(state): State<AppState>,
    Path(doc): Path<String>,
) -> Result<Json<ProposalView>> {
    let view =
        services::load_proposal(&state.db, &state.cache, &state.config.estimate, &doc).await?;
    Ok(Json(view))
}

/// Final document reports
pub async fn final_document(
    State(state): State<AppState>,
    Path(doc): Path<String>,
) -> Result<Json<FinalDocument>> {
    let report = services::load_final_document(&state.db, &doc).await?;
    Ok(Json(report))
}
