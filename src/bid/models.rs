//! Database models for bid schedule queries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::calculators;

/// Bid schedule status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    #[default]
    Draft,
    Estimating,
    Quoted,
    Complete,
    NotNeeded,
}

impl std::str::FromStr for BidStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(BidStatus::Draft),
            "estimating" => Ok(BidStatus::Estimating),
            "quoted" => Ok(BidStatus::Quoted),
            "complete" => Ok(BidStatus::Complete),
            "not_needed" => Ok(BidStatus::NotNeeded),
            _ => Err(format!("Invalid bid status: {}", s)),
        }
    }
}

impl TryFrom<String> for BidStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Color flag estimators put on schedule rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorCode {
    /// Done
    Green,
    /// Needs work
    #[default]
    Red,
    /// Needs a quote
    Yellow,
    /// Waiting
    Orange,
    /// Not needed
    Black,
}

impl std::str::FromStr for ColorCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "green" => Ok(ColorCode::Green),
            "red" => Ok(ColorCode::Red),
            "yellow" => Ok(ColorCode::Yellow),
            "orange" => Ok(ColorCode::Orange),
            "black" => Ok(ColorCode::Black),
            _ => Err(format!("Invalid color code: {}", s)),
        }
    }
}

impl TryFrom<String> for ColorCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// BidSchedule row joined with its bid item's stored totals
#[derive(Debug, Clone, FromRow)]
pub struct BidScheduleLine {
    pub id: i64,
    pub item_code: String,
    pub description: String,
    pub engineer_estimate: Option<Decimal>,
    #[sqlx(try_from = "String")]
    pub status: BidStatus,
    #[sqlx(try_from = "String")]
    pub color_code: ColorCode,
    pub sequence: i32,
    pub bid_item_id: Option<i64>,
    pub our_cost: Option<Decimal>,
    pub sale_price: Option<Decimal>,
}

/// BidItem from bid_biditem
#[derive(Debug, Clone, FromRow)]
pub struct BidItem {
    pub id: i64,
    pub bid_schedule_id: i64,
    pub subcontractor_total: Decimal,
    pub margin_percent: Decimal,
}

/// BidItemMaterial from bid_biditemmaterial, with the linked product's cost
#[derive(Debug, Clone, FromRow)]
pub struct BidItemMaterial {
    pub id: i64,
    pub name: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    /// Standard cost of the linked catalog product, if any
    pub product_std_cost: Option<Decimal>,
    /// NetSuite internal id of the linked catalog product
    pub product_internal_id: Option<i64>,
}

impl BidItemMaterial {
    /// Linked catalog products price the line at their standard cost.
    pub fn effective_unit_cost(&self) -> Decimal {
        self.product_std_cost.unwrap_or(self.unit_cost)
    }

    pub fn total_cost(&self) -> Decimal {
        calculators::material_total(self.quantity, self.effective_unit_cost())
    }
}

/// BidItemLabor from bid_biditemlabor
#[derive(Debug, Clone, FromRow)]
pub struct BidItemLabor {
    pub id: i64,
    pub classification: String,
    pub hours: Decimal,
    pub rate: Decimal,
}

impl BidItemLabor {
    pub fn total_cost(&self) -> Decimal {
        calculators::labor_total(self.hours, self.rate)
    }
}

/// BidItemEquipment from bid_biditemequipment
#[derive(Debug, Clone, FromRow)]
pub struct BidItemEquipment {
    pub id: i64,
    pub equipment_type: String,
    pub hours: Decimal,
    pub rate: Decimal,
    pub fuel_gallons: Decimal,
    pub fuel_cost_per_gallon: Decimal,
}

impl BidItemEquipment {
    pub fn total_cost(&self) -> Decimal {
        calculators::equipment_total(
            self.hours,
            self.rate,
            self.fuel_gallons,
            self.fuel_cost_per_gallon,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_and_color_parse() {
        assert_eq!("not_needed".parse::<BidStatus>().unwrap(), BidStatus::NotNeeded);
        assert_eq!("Quoted".parse::<BidStatus>().unwrap(), BidStatus::Quoted);
        assert!("archived".parse::<BidStatus>().is_err());
        assert_eq!("yellow".parse::<ColorCode>().unwrap(), ColorCode::Yellow);
        assert!("purple".parse::<ColorCode>().is_err());
        assert_eq!(ColorCode::default(), ColorCode::Red);
    }

    #[test]
    fn test_material_prefers_catalog_cost() {
        let mut material = BidItemMaterial {
            id: 1,
            name: "Epoxy coating".to_string(),
            quantity: dec!(4),
            unit_cost: dec!(20),
            product_std_cost: Some(dec!(18.75)),
            product_internal_id: Some(2210),
        };
        assert_eq!(material.total_cost(), dec!(75.00));

        material.product_std_cost = None;
        assert_eq!(material.total_cost(), dec!(80));
    }

    #[test]
    fn test_equipment_includes_fuel() {
        let equipment = BidItemEquipment {
            id: 1,
            equipment_type: "Excavator".to_string(),
            hours: dec!(8),
            rate: dec!(110),
            fuel_gallons: dec!(20),
            fuel_cost_per_gallon: dec!(4.50),
        };
        assert_eq!(equipment.total_cost(), dec!(970.00));
    }
}
