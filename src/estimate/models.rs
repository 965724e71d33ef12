//! Database models for estimate queries.
//!
//! These models use sqlx's FromRow derive for direct database deserialization
//! and double as calculator inputs for the stateless endpoints.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::calculators;
use super::stage::EstimationStage;

/// Discriminates material tasks from labor tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    Product,
    Labor,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Product => "PRODUCT",
            TaskKind::Labor => "LABOR",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PRODUCT" => Ok(TaskKind::Product),
            "LABOR" => Ok(TaskKind::Labor),
            other => Err(format!("Invalid task kind: {}. Use PRODUCT or LABOR", other)),
        }
    }
}

impl TryFrom<String> for TaskKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Opportunity from opportunity_opportunity
#[derive(Debug, Clone, FromRow)]
pub struct Opportunity {
    pub internal_id: i64,
    pub document_number: String,
    pub title: String,
    pub customer_id: Option<i64>,
    #[sqlx(try_from = "String")]
    pub estimation_stage: EstimationStage,
    pub updated_at: DateTime<Utc>,
}

/// TaskMapping from opportunity_taskmapping
///
/// `description` is the catalog task description when a catalog task is
/// linked, otherwise the ad-hoc description typed on the row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskMapping {
    pub id: i64,
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[sqlx(try_from = "String")]
    pub task_kind: TaskKind,
    #[serde(default)]
    pub linked_task_id: Option<i64>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub labor_gp_percent: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub mat_gp_percent: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub s_and_h: Option<Decimal>,
    #[serde(default)]
    pub sequence: i32,
}

impl TaskMapping {
    /// Freight rows are tracked apart from the base totals.
    pub fn is_freight(&self) -> bool {
        self.code.to_uppercase().contains("FRT")
            || self.description.to_lowercase().contains("freight")
    }

    pub fn is_labor(&self) -> bool {
        self.task_kind == TaskKind::Labor
    }
}

/// AssignedProduct from opportunity_assignedproduct
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AssignedProduct {
    pub id: i64,
    pub task_mapping_id: i64,
    #[serde(default)]
    pub item_code: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub standard_cost: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub vendor_quoted_cost: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub local_cost: Option<Decimal>,
    #[serde(default)]
    pub is_select: bool,
    #[serde(default)]
    pub is_assign: bool,
    #[serde(default)]
    pub sequence: i32,
}

impl AssignedProduct {
    pub fn unit_cost(&self) -> Option<Decimal> {
        calculators::unit_cost(self.vendor_quoted_cost, self.standard_cost)
    }

    pub fn line_total(&self) -> Option<Decimal> {
        calculators::line_total(self.quantity, self.vendor_quoted_cost, self.standard_cost)
    }

    /// `local_cost * quantity` when a local cost was entered.
    pub fn local_total(&self) -> Option<Decimal> {
        self.local_cost.map(|cost| cost * self.quantity)
    }
}

/// ProposalCreation from opportunity_proposalcreation
#[derive(Debug, Clone, FromRow)]
pub struct ProposalCreation {
    pub id: i64,
    pub group_name: String,
    pub task_mapping_id: i64,
}

/// Invoice from opportunity_invoice
#[derive(Debug, Clone, FromRow)]
pub struct Invoice {
    pub id: i64,
    pub sales_tax: Decimal,
    pub other_tax: Decimal,
    pub tax_rate: Decimal,
}

/// Assigned line joined with the catalog product sharing its item code,
/// used for the NetSuite extract.
#[derive(Debug, Clone, FromRow)]
pub struct CatalogMatch {
    pub assigned_product_id: i64,
    pub internal_id: Option<i64>,
}
