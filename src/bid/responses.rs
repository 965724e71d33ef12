//! Response DTOs for bid API endpoints.

use rust_decimal::Decimal;
use serde::Serialize;

use super::calculators::BidItemTotals;

/// Response for a stateless bid calculation
#[derive(Debug, Serialize)]
pub struct BidCalculateResponse {
    pub material_totals: Vec<Decimal>,
    pub labor_totals: Vec<Decimal>,
    pub equipment_totals: Vec<Decimal>,
    pub totals: BidItemTotals,
}

/// Response for a stored bid item recalculation
#[derive(Debug, Serialize)]
pub struct RecalculateResponse {
    pub bid_item_id: i64,
    pub totals: BidItemTotals,
}
