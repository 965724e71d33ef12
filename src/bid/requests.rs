//! Request DTOs for bid API endpoints.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::estimate::calculators::MarginBasis;

use super::calculators::{DEFAULT_FUEL_COST_PER_GALLON, DEFAULT_MARGIN_PERCENT};

/// Request to calculate bid item totals without touching the database
#[derive(Debug, Deserialize)]
pub struct BidCalculateRequest {
    #[serde(default)]
    pub materials: Vec<MaterialLineRequest>,
    #[serde(default)]
    pub labor: Vec<LaborLineRequest>,
    #[serde(default)]
    pub equipment: Vec<EquipmentLineRequest>,
    #[serde(default, with = "rust_decimal::serde::str")]
    pub subcontractor_total: Decimal,
    #[serde(default = "default_margin_percent", with = "rust_decimal::serde::str")]
    pub margin_percent: Decimal,
    /// Falls back to the configured bid margin basis
    #[serde(default)]
    pub margin_basis: Option<MarginBasis>,
}

fn default_margin_percent() -> Decimal {
    DEFAULT_MARGIN_PERCENT
}

fn default_fuel_cost() -> Decimal {
    DEFAULT_FUEL_COST_PER_GALLON
}

#[derive(Debug, Deserialize)]
pub struct MaterialLineRequest {
    #[serde(default)]
    pub name: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub unit_cost: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct LaborLineRequest {
    #[serde(default)]
    pub classification: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub hours: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub rate: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct EquipmentLineRequest {
    #[serde(default)]
    pub equipment_type: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub hours: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub rate: Decimal,
    #[serde(default, with = "rust_decimal::serde::str")]
    pub fuel_gallons: Decimal,
    #[serde(default = "default_fuel_cost", with = "rust_decimal::serde::str")]
    pub fuel_cost_per_gallon: Decimal,
}
