//! Estimate engine for opportunities.
//!
//! Rolls task mappings and their assigned products up into labor, material,
//! tax and gross profit figures, drives the estimation stage workflow and
//! builds the proposal and final document views. Django calls these
//! endpoints over HTTP/JSON instead of computing totals in its views.

pub mod calculators;
pub mod models;
pub mod proposal;
pub mod queries;
pub mod requests;
pub mod responses;
pub mod rollup;
pub mod routes;
pub mod services;
pub mod stage;

// Re-export commonly used items
pub use calculators::{round_money, sell_price, MarginBasis};
pub use models::{AssignedProduct, TaskKind, TaskMapping};
pub use rollup::{rollup, EstimateRollup, EstimateSettings, OpportunityTotals, TaskRollup};
pub use routes::router;
pub use services::{EstimateError, KpiKind};
pub use stage::{EstimationStage, StageTransition};
