//! Database queries for the estimate engine.
//!
//! Reads and writes the Django `opportunity_*` tables directly. Numeric
//! columns are cast to `numeric` so they decode into `Decimal` regardless of
//! the column's declared type.

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::error::AppError;

use super::models::{
    AssignedProduct, CatalogMatch, Invoice, Opportunity, ProposalCreation, TaskMapping,
};
use super::stage::EstimationStage;

/// Get an opportunity by its document number
pub async fn find_opportunity(
    pool: &PgPool,
    document_number: &str,
) -> Result<Option<Opportunity>, AppError> {
    let opportunity = sqlx::query_as::<_, Opportunity>(
        r#"
        SELECT
            internal_id::bigint AS internal_id, document_number, title,
            customer_id::bigint AS customer_id, estimation_stage, updated_at
        FROM opportunity_opportunity
        WHERE document_number = $1
        "#,
    )
    .bind(document_number)
    .fetch_optional(pool)
    .await?;

    Ok(opportunity)
}

const TASK_COLUMNS: &str = r#"
    tm.id::bigint AS id,
    tm.code,
    COALESCE(t.description, tm.description, '') AS description,
    tm.task_kind,
    tm.linked_task_id::bigint AS linked_task_id,
    tm.labor_gp_percent::numeric AS labor_gp_percent,
    tm.mat_gp_percent::numeric AS mat_gp_percent,
    tm.s_and_h::numeric AS s_and_h,
    COALESCE(tm.sequence, 0)::int AS sequence
"#;

/// Get all task mappings of an opportunity in display order
pub async fn get_task_mappings(
    pool: &PgPool,
    opportunity_id: i64,
) -> Result<Vec<TaskMapping>, AppError> {
    let sql = format!(
        r#"
        SELECT {TASK_COLUMNS}
        FROM opportunity_taskmapping tm
        LEFT JOIN task_task t ON t.id = tm.task_id
        WHERE tm.opportunity_id = $1
        ORDER BY tm.sequence, tm.id
        "#
    );

    let tasks = sqlx::query_as::<_, TaskMapping>(&sql)
        .bind(opportunity_id)
        .fetch_all(pool)
        .await?;

    Ok(tasks)
}

/// Get one task mapping, scoped to its opportunity
pub async fn find_task_mapping(
    pool: &PgPool,
    opportunity_id: i64,
    task_id: i64,
) -> Result<Option<TaskMapping>, AppError> {
    let sql = format!(
        r#"
        SELECT {TASK_COLUMNS}
        FROM opportunity_taskmapping tm
        LEFT JOIN task_task t ON t.id = tm.task_id
        WHERE tm.opportunity_id = $1 AND tm.id = $2
        "#
    );

    let task = sqlx::query_as::<_, TaskMapping>(&sql)
        .bind(opportunity_id)
        .bind(task_id)
        .fetch_optional(pool)
        .await?;

    Ok(task)
}

/// Get every assigned product line of an opportunity
pub async fn get_assigned_products(
    pool: &PgPool,
    opportunity_id: i64,
) -> Result<Vec<AssignedProduct>, AppError> {
    let lines = sqlx::query_as::<_, AssignedProduct>(
        r#"
        SELECT
            ap.id::bigint AS id,
            ap.task_mapping_id::bigint AS task_mapping_id,
            ap.item_code,
            COALESCE(ap.description, '') AS description,
            COALESCE(ap.quantity, 0)::numeric AS quantity,
            ap.standard_cost::numeric AS standard_cost,
            ap.vendor_quoted_cost::numeric AS vendor_quoted_cost,
            ap.local_cost::numeric AS local_cost,
            ap.is_select,
            ap.is_assign,
            COALESCE(ap.sequence, 0)::int AS sequence
        FROM opportunity_assignedproduct ap
        JOIN opportunity_taskmapping tm ON tm.id = ap.task_mapping_id
        WHERE tm.opportunity_id = $1
        ORDER BY ap.task_mapping_id, ap.sequence, ap.id
        "#,
    )
    .bind(opportunity_id)
    .fetch_all(pool)
    .await?;

    Ok(lines)
}

/// Get the proposal rows of an opportunity in creation order
pub async fn get_proposals(
    pool: &PgPool,
    opportunity_id: i64,
) -> Result<Vec<ProposalCreation>, AppError> {
    let proposals = sqlx::query_as::<_, ProposalCreation>(
        r#"
        SELECT
            id::bigint AS id,
            group_name,
            task_mapping_id::bigint AS task_mapping_id
        FROM opportunity_proposalcreation
        WHERE opportunity_id = $1
        ORDER BY created_at, id
        "#,
    )
    .bind(opportunity_id)
    .fetch_all(pool)
    .await?;

    Ok(proposals)
}

/// Get the latest invoice of an opportunity, if any
pub async fn find_invoice(
    pool: &PgPool,
    opportunity_id: i64,
) -> Result<Option<Invoice>, AppError> {
    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        SELECT
            id::bigint AS id,
            COALESCE(sales_tax, 0)::numeric AS sales_tax,
            COALESCE(other_tax, 0)::numeric AS other_tax,
            COALESCE(tax_rate, 0)::numeric AS tax_rate
        FROM opportunity_invoice
        WHERE opportunity_id = $1
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(opportunity_id)
    .fetch_optional(pool)
    .await?;

    Ok(invoice)
}

/// Match assigned lines to catalog products by item code
pub async fn get_catalog_matches(
    pool: &PgPool,
    opportunity_id: i64,
) -> Result<Vec<CatalogMatch>, AppError> {
    let matches = sqlx::query_as::<_, CatalogMatch>(
        r#"
        SELECT DISTINCT ON (ap.id)
            ap.id::bigint AS assigned_product_id,
            p.internal_id::bigint AS internal_id
        FROM opportunity_assignedproduct ap
        JOIN opportunity_taskmapping tm ON tm.id = ap.task_mapping_id
        LEFT JOIN product_product p ON p.display_name = ap.item_code
        WHERE tm.opportunity_id = $1
        ORDER BY ap.id, p.internal_id
        "#,
    )
    .bind(opportunity_id)
    .fetch_all(pool)
    .await?;

    Ok(matches)
}

/// Persist a new estimation stage
pub async fn update_stage(
    pool: &PgPool,
    opportunity_id: i64,
    stage: EstimationStage,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE opportunity_opportunity
        SET estimation_stage = $2, updated_at = NOW()
        WHERE internal_id = $1
        "#,
    )
    .bind(opportunity_id)
    .bind(stage.label())
    .execute(pool)
    .await?;

    Ok(())
}

/// Point a labor task at a product task, or clear the link with `None`
pub async fn set_labor_link(
    pool: &PgPool,
    opportunity_id: i64,
    labor_task_id: i64,
    target_task_id: Option<i64>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE opportunity_taskmapping
        SET linked_task_id = $3, updated_at = NOW()
        WHERE opportunity_id = $1 AND id = $2
        "#,
    )
    .bind(opportunity_id)
    .bind(labor_task_id)
    .bind(target_task_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Set margins on every task of an opportunity. `None` leaves a column as is.
///
/// Returns the number of tasks updated.
pub async fn update_margins(
    pool: &PgPool,
    opportunity_id: i64,
    labor_gp_percent: Option<Decimal>,
    mat_gp_percent: Option<Decimal>,
    s_and_h: Option<Decimal>,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE opportunity_taskmapping
        SET labor_gp_percent = COALESCE($2, labor_gp_percent),
            mat_gp_percent = COALESCE($3, mat_gp_percent),
            s_and_h = COALESCE($4, s_and_h),
            updated_at = NOW()
        WHERE opportunity_id = $1
        "#,
    )
    .bind(opportunity_id)
    .bind(labor_gp_percent)
    .bind(mat_gp_percent)
    .bind(s_and_h)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
