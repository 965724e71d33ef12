//! Estimate service functions with database access.
//!
//! These functions load opportunity data through [`super::queries`], run the
//! pure calculators and keep the rollup cache consistent with every write.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::AppCache;
use crate::error::AppError;

use super::calculators::{amount_in_range, extended_total, percent_in_range};
use super::models::{AssignedProduct, Opportunity, TaskMapping};
use super::proposal::{self, FinalDocument, ProposalGroup, ProposalTotals};
use super::queries;
use super::rollup::{
    rollup, CostBreakdown, EstimateRollup, EstimateSettings, GpBreakdown, GpPercentBreakdown,
    SaleBreakdown,
};
use super::stage::{EstimationStage, StageTransition};

/// Estimate workflow error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EstimateError {
    #[error("Opportunity {document_number} not found")]
    OpportunityNotFound { document_number: String },

    #[error("Task mapping {task_id} not found on this opportunity")]
    TaskNotFound { task_id: i64 },

    #[error("Task mapping {task_id} is not a labor task")]
    NotALaborTask { task_id: i64 },

    #[error("Labor can only be linked to a product task, task mapping {task_id} is labor")]
    LinkTargetNotProduct { task_id: i64 },

    #[error("Labor cannot be linked to freight task mapping {task_id}")]
    LinkTargetIsFreight { task_id: i64 },

    #[error("Invalid margins")]
    InvalidMargins { errors: Vec<String> },

    #[error("At least one of labor_gp_percent, mat_gp_percent or s_and_h is required")]
    EmptyMarginUpdate,

    #[error("Unknown estimation stage: {value}")]
    InvalidStage { value: String },

    #[error("Unknown KPI {value}. Use cost, sale, gp or gp-percent")]
    UnknownKpi { value: String },

    #[error("{field} is out of range")]
    OutOfRange { field: String },
}

impl EstimateError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EstimateError::OpportunityNotFound { .. } | EstimateError::TaskNotFound { .. }
        )
    }

    /// The request is well formed but clashes with the tasks as stored.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            EstimateError::NotALaborTask { .. }
                | EstimateError::LinkTargetNotProduct { .. }
                | EstimateError::LinkTargetIsFreight { .. }
        )
    }
}

/// KPI views over an estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KpiKind {
    Cost,
    Sale,
    Gp,
    GpPercent,
}

impl std::str::FromStr for KpiKind {
    type Err = EstimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cost" => Ok(KpiKind::Cost),
            "sale" => Ok(KpiKind::Sale),
            "gp" => Ok(KpiKind::Gp),
            "gp-percent" | "gp_percent" => Ok(KpiKind::GpPercent),
            _ => Err(EstimateError::UnknownKpi {
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KpiBreakdown {
    Cost(CostBreakdown),
    Sale(SaleBreakdown),
    Gp(GpBreakdown),
    GpPercent(GpPercentBreakdown),
}

impl KpiBreakdown {
    pub fn from_rollup(estimate: &EstimateRollup, kind: KpiKind) -> Self {
        match kind {
            KpiKind::Cost => KpiBreakdown::Cost(estimate.cost_breakdown()),
            KpiKind::Sale => KpiBreakdown::Sale(estimate.sale_breakdown()),
            KpiKind::Gp => KpiBreakdown::Gp(estimate.gp_breakdown()),
            KpiKind::GpPercent => KpiBreakdown::GpPercent(estimate.gp_percent_breakdown()),
        }
    }
}

/// Margin fields to set on every task of an opportunity
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarginUpdate {
    pub labor_gp_percent: Option<Decimal>,
    pub mat_gp_percent: Option<Decimal>,
    pub s_and_h: Option<Decimal>,
}

impl MarginUpdate {
    pub fn validate(&self) -> Result<(), EstimateError> {
        if self.labor_gp_percent.is_none() && self.mat_gp_percent.is_none() && self.s_and_h.is_none()
        {
            return Err(EstimateError::EmptyMarginUpdate);
        }

        let mut errors = Vec::new();
        for (field, value) in [
            ("labor_gp_percent", self.labor_gp_percent),
            ("mat_gp_percent", self.mat_gp_percent),
        ] {
            if let Some(value) = value {
                if value >= Decimal::ONE_HUNDRED {
                    errors.push(format!("{} must be below 100, got {}", field, value));
                }
            }
        }
        if let Some(s_and_h) = self.s_and_h {
            if s_and_h.is_sign_negative() {
                errors.push(format!("s_and_h must not be negative, got {}", s_and_h));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(EstimateError::InvalidMargins { errors })
        }
    }
}

/// Check that `labor` may carry the labor of `target`.
pub fn validate_labor_link(labor: &TaskMapping, target: &TaskMapping) -> Result<(), EstimateError> {
    if !labor.is_labor() {
        return Err(EstimateError::NotALaborTask { task_id: labor.id });
    }
    if target.is_labor() {
        return Err(EstimateError::LinkTargetNotProduct { task_id: target.id });
    }
    if target.is_freight() {
        return Err(EstimateError::LinkTargetIsFreight { task_id: target.id });
    }
    Ok(())
}

fn check_percent(field: impl FnOnce() -> String, value: Option<Decimal>) -> Result<(), EstimateError> {
    match value {
        Some(value) if !percent_in_range(value) => Err(EstimateError::OutOfRange { field: field() }),
        _ => Ok(()),
    }
}

fn check_amount(field: impl FnOnce() -> String, value: Option<Decimal>) -> Result<(), EstimateError> {
    match value {
        Some(value) if !amount_in_range(value) => Err(EstimateError::OutOfRange { field: field() }),
        _ => Ok(()),
    }
}

/// Reject posted figures too large for the rollup arithmetic.
///
/// Stored estimates are bounded by their columns; posted ones are checked
/// here before any markup is applied.
pub fn validate_rollup_input(
    tasks: &[TaskMapping],
    lines: &[AssignedProduct],
    sales_tax_percent: Option<Decimal>,
) -> Result<(), EstimateError> {
    check_percent(|| "sales_tax_percent".to_string(), sales_tax_percent)?;

    for (i, task) in tasks.iter().enumerate() {
        check_percent(|| format!("tasks[{}].labor_gp_percent", i), task.labor_gp_percent)?;
        check_percent(|| format!("tasks[{}].mat_gp_percent", i), task.mat_gp_percent)?;
        check_amount(|| format!("tasks[{}].s_and_h", i), task.s_and_h)?;
    }

    for (i, line) in lines.iter().enumerate() {
        check_amount(|| format!("lines[{}].quantity", i), Some(line.quantity))?;
        check_amount(|| format!("lines[{}].standard_cost", i), line.standard_cost)?;
        check_amount(|| format!("lines[{}].vendor_quoted_cost", i), line.vendor_quoted_cost)?;
        check_amount(|| format!("lines[{}].local_cost", i), line.local_cost)?;
    }

    let extended = lines
        .iter()
        .filter_map(|line| line.unit_cost().map(|cost| (line.quantity, cost)));
    if extended_total(extended).is_none() {
        return Err(EstimateError::OutOfRange {
            field: "lines".to_string(),
        });
    }
    Ok(())
}

/// Reject a markup request whose cost or margin is out of range.
pub fn validate_markup(cost: Decimal, margin_percent: Decimal) -> Result<(), EstimateError> {
    check_amount(|| "cost".to_string(), Some(cost))?;
    check_percent(|| "margin_percent".to_string(), Some(margin_percent))
}

/// Proposal view for one opportunity
#[derive(Debug, Clone, Serialize)]
pub struct ProposalView {
    pub document_number: String,
    pub groups: Vec<ProposalGroup>,
    pub totals: ProposalTotals,
}

async fn get_opportunity(pool: &PgPool, document_number: &str) -> Result<Opportunity, AppError> {
    queries::find_opportunity(pool, document_number)
        .await?
        .ok_or_else(|| {
            EstimateError::OpportunityNotFound {
                document_number: document_number.to_string(),
            }
            .into()
        })
}

async fn get_task(pool: &PgPool, opportunity_id: i64, task_id: i64) -> Result<TaskMapping, AppError> {
    queries::find_task_mapping(pool, opportunity_id, task_id)
        .await?
        .ok_or_else(|| EstimateError::TaskNotFound { task_id }.into())
}

/// Roll up an opportunity's estimate, serving from cache when possible.
pub async fn load_estimate(
    pool: &PgPool,
    cache: &AppCache,
    settings: &EstimateSettings,
    document_number: &str,
) -> Result<Arc<EstimateRollup>, AppError> {
    if let Some(cached) = cache.get_rollup(document_number).await {
        debug!("Cache HIT for estimate: {}", document_number);
        return Ok(cached);
    }
    debug!("Cache MISS for estimate: {}", document_number);

    let generation = cache.generation();
    let opportunity = get_opportunity(pool, document_number).await?;
    let tasks = queries::get_task_mappings(pool, opportunity.internal_id).await?;
    let lines = queries::get_assigned_products(pool, opportunity.internal_id).await?;

    let estimate = Arc::new(rollup(&tasks, &lines, settings));
    if estimate.missing_cost_lines > 0 {
        warn!(
            "Opportunity {} has {} lines without a cost",
            document_number, estimate.missing_cost_lines
        );
    }

    cache
        .insert_rollup(document_number, estimate.clone(), generation)
        .await;
    Ok(estimate)
}

/// One KPI breakdown of an opportunity's estimate.
pub async fn opportunity_kpi(
    pool: &PgPool,
    cache: &AppCache,
    settings: &EstimateSettings,
    document_number: &str,
    kind: KpiKind,
) -> Result<KpiBreakdown, AppError> {
    let estimate = load_estimate(pool, cache, settings, document_number).await?;
    Ok(KpiBreakdown::from_rollup(&estimate, kind))
}

/// Apply margins to every task of an opportunity.
///
/// Returns the number of tasks updated.
pub async fn update_margins(
    pool: &PgPool,
    cache: &AppCache,
    document_number: &str,
    update: MarginUpdate,
) -> Result<u64, AppError> {
    update.validate()?;
    let opportunity = get_opportunity(pool, document_number).await?;

    let updated = queries::update_margins(
        pool,
        opportunity.internal_id,
        update.labor_gp_percent,
        update.mat_gp_percent,
        update.s_and_h,
    )
    .await?;

    cache.invalidate_opportunity(document_number).await;
    info!("Updated margins on {} tasks of {}", updated, document_number);
    Ok(updated)
}

/// Move an opportunity to a later stage. Earlier or equal stages are a no-op.
pub async fn advance_stage(
    pool: &PgPool,
    cache: &AppCache,
    document_number: &str,
    requested: EstimationStage,
) -> Result<StageTransition, AppError> {
    let opportunity = get_opportunity(pool, document_number).await?;
    let transition = opportunity.estimation_stage.advance(requested);

    if let StageTransition::Advanced { from, to } = transition {
        queries::update_stage(pool, opportunity.internal_id, to).await?;
        cache.invalidate_opportunity(document_number).await;
        info!("Opportunity {} moved from {} to {}", document_number, from, to);
    } else {
        debug!(
            "Opportunity {} stays at {} (requested {})",
            document_number, opportunity.estimation_stage, requested
        );
    }

    Ok(transition)
}

/// Link a labor task to the product task whose labor it carries.
pub async fn link_labor(
    pool: &PgPool,
    cache: &AppCache,
    document_number: &str,
    labor_task_id: i64,
    product_task_id: i64,
) -> Result<TaskMapping, AppError> {
    let opportunity = get_opportunity(pool, document_number).await?;
    let mut labor = get_task(pool, opportunity.internal_id, labor_task_id).await?;
    let target = get_task(pool, opportunity.internal_id, product_task_id).await?;
    validate_labor_link(&labor, &target)?;

    queries::set_labor_link(pool, opportunity.internal_id, labor.id, Some(target.id)).await?;
    cache.invalidate_opportunity(document_number).await;
    info!(
        "Linked labor task {} to task {} on {}",
        labor.id, target.id, document_number
    );

    labor.linked_task_id = Some(target.id);
    Ok(labor)
}

/// Clear a labor task's link; its labor becomes a row of its own.
pub async fn unlink_labor(
    pool: &PgPool,
    cache: &AppCache,
    document_number: &str,
    labor_task_id: i64,
) -> Result<TaskMapping, AppError> {
    let opportunity = get_opportunity(pool, document_number).await?;
    let mut labor = get_task(pool, opportunity.internal_id, labor_task_id).await?;
    if !labor.is_labor() {
        return Err(EstimateError::NotALaborTask { task_id: labor.id }.into());
    }

    queries::set_labor_link(pool, opportunity.internal_id, labor.id, None).await?;
    cache.invalidate_opportunity(document_number).await;
    info!("Unlinked labor task {} on {}", labor.id, document_number);

    labor.linked_task_id = None;
    Ok(labor)
}

/// Proposal groups and totals for an opportunity.
pub async fn load_proposal(
    pool: &PgPool,
    cache: &AppCache,
    settings: &EstimateSettings,
    document_number: &str,
) -> Result<ProposalView, AppError> {
    let estimate = load_estimate(pool, cache, settings, document_number).await?;
    let opportunity = get_opportunity(pool, document_number).await?;

    let proposals = queries::get_proposals(pool, opportunity.internal_id).await?;
    let lines = queries::get_assigned_products(pool, opportunity.internal_id).await?;
    let invoice = queries::find_invoice(pool, opportunity.internal_id).await?;

    Ok(ProposalView {
        document_number: opportunity.document_number,
        groups: proposal::group_proposals(&proposals, &estimate, &lines),
        totals: proposal::proposal_totals(&proposals, &lines, invoice.as_ref()),
    })
}

/// Cost variance, new material master and NetSuite extract reports.
pub async fn load_final_document(
    pool: &PgPool,
    document_number: &str,
) -> Result<FinalDocument, AppError> {
    let opportunity = get_opportunity(pool, document_number).await?;
    let lines = queries::get_assigned_products(pool, opportunity.internal_id).await?;
    let catalog = queries::get_catalog_matches(pool, opportunity.internal_id).await?;

    Ok(proposal::final_document(&lines, &catalog))
}
