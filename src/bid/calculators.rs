//! Bid item line and total calculations.
//!
//! Pure functions - no database access. Stored bid amounts have two decimal
//! places, so every figure written back is rounded with [`round_money`].

use rust_decimal::Decimal;
use serde::Serialize;

use crate::estimate::calculators::{round_money, MarginBasis};

/// Default fuel price per gallon for equipment lines.
pub const DEFAULT_FUEL_COST_PER_GALLON: Decimal = Decimal::from_parts(450, 0, 0, false, 2);

/// Default bid item margin, in percent.
pub const DEFAULT_MARGIN_PERCENT: Decimal = Decimal::from_parts(25, 0, 0, false, 0);

/// `quantity * unit_cost`
pub fn material_total(quantity: Decimal, unit_cost: Decimal) -> Decimal {
    round_money(quantity * unit_cost, 2)
}

/// `hours * rate`
pub fn labor_total(hours: Decimal, rate: Decimal) -> Decimal {
    round_money(hours * rate, 2)
}

/// Rental (`hours * rate`) plus fuel (`gallons * price`).
pub fn equipment_total(
    hours: Decimal,
    rate: Decimal,
    fuel_gallons: Decimal,
    fuel_cost_per_gallon: Decimal,
) -> Decimal {
    round_money(hours * rate + fuel_gallons * fuel_cost_per_gallon, 2)
}

/// Recalculated totals for one bid item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidItemTotals {
    pub materials_total: Decimal,
    pub labor_total: Decimal,
    pub equipment_total: Decimal,
    pub subcontractor_total: Decimal,
    pub our_cost: Decimal,
    pub margin_percent: Decimal,
    pub margin_basis: MarginBasis,
    pub margin_amount: Decimal,
    pub sale_price: Decimal,
}

/// Sum line totals and apply the bid item's margin.
///
/// The subcontractor total is entered by hand and passed through as-is.
pub fn calculate_totals(
    material_totals: &[Decimal],
    labor_totals: &[Decimal],
    equipment_totals: &[Decimal],
    subcontractor_total: Decimal,
    margin_percent: Decimal,
    basis: MarginBasis,
) -> BidItemTotals {
    let materials_total: Decimal = material_totals.iter().sum();
    let labor_total: Decimal = labor_totals.iter().sum();
    let equipment_total: Decimal = equipment_totals.iter().sum();

    let our_cost = materials_total + labor_total + equipment_total + subcontractor_total;
    let sale_price = basis.sale_price(our_cost, margin_percent);
    let margin_amount = sale_price - our_cost;

    BidItemTotals {
        materials_total: round_money(materials_total, 2),
        labor_total: round_money(labor_total, 2),
        equipment_total: round_money(equipment_total, 2),
        subcontractor_total: round_money(subcontractor_total, 2),
        our_cost: round_money(our_cost, 2),
        margin_percent,
        margin_basis: basis,
        margin_amount: round_money(margin_amount, 2),
        sale_price: round_money(sale_price, 2),
    }
}
