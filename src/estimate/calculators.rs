//! Core estimate calculation functions.
//!
//! Pure functions for markup and line-cost math - no database access.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Largest magnitude accepted for a posted quantity, cost or extended total
/// (1,000,000,000,000). The Django amount columns hold twelve digits.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// Largest magnitude accepted for a posted margin or tax percentage.
pub const MAX_PERCENT: Decimal = Decimal::from_parts(1_000, 0, 0, false, 0);

/// Round to specified decimal places using banker's rounding (ROUND_HALF_EVEN).
///
/// Banker's rounding rounds to the nearest even number when the value is exactly
/// halfway between two possibilities, so figures agree with what the estimate
/// pages show.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use laurel_estimating::estimate::round_money;
///
/// assert_eq!(round_money(dec!(2.5), 0), dec!(2));   // rounds to even
/// assert_eq!(round_money(dec!(3.5), 0), dec!(4));   // rounds to even
/// assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
/// ```
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// How a margin percentage turns cost into a sale price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginBasis {
    /// Margin is a share of the sale price: `cost / (1 - m/100)`.
    /// Used by task mapping estimates.
    OnSell,
    /// Margin is a share of cost: `cost * (1 + m/100)`.
    /// Used by bid items, matching the estimator's spreadsheets.
    #[default]
    OnCost,
}

impl MarginBasis {
    /// Sale price for `cost` at `margin_percent` on this basis (unrounded).
    pub fn sale_price(self, cost: Decimal, margin_percent: Decimal) -> Decimal {
        match self {
            MarginBasis::OnSell => sell_price(cost, margin_percent),
            MarginBasis::OnCost => cost + markup_amount(cost, margin_percent),
        }
    }
}

impl std::fmt::Display for MarginBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarginBasis::OnSell => write!(f, "on_sell"),
            MarginBasis::OnCost => write!(f, "on_cost"),
        }
    }
}

/// Sell price when the margin is expressed as a share of the sell price.
///
/// `sell = cost / (1 - margin_percent / 100)`. A margin of 100% or more has no
/// finite sell price; it yields zero instead of dividing by zero.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use laurel_estimating::estimate::sell_price;
///
/// assert_eq!(sell_price(dec!(75), dec!(25)), dec!(100));
/// assert_eq!(sell_price(dec!(75), dec!(100)), dec!(0));
/// ```
pub fn sell_price(cost: Decimal, margin_percent: Decimal) -> Decimal {
    if margin_percent >= HUNDRED {
        return Decimal::ZERO;
    }
    let divisor = Decimal::ONE - margin_percent / HUNDRED;
    cost.checked_div(divisor).unwrap_or(Decimal::ZERO)
}

/// Cost-plus markup amount: `cost * margin_percent / 100`.
pub fn markup_amount(cost: Decimal, margin_percent: Decimal) -> Decimal {
    cost * (margin_percent / HUNDRED)
}

/// Tax on an amount at `rate_percent`, rounded to cents.
pub fn tax_on(amount: Decimal, rate_percent: Decimal) -> Decimal {
    round_money(amount * rate_percent / HUNDRED, 2)
}

/// `part / whole * 100`, or zero when `whole` is zero.
pub fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    part.checked_div(whole)
        .map(|ratio| ratio * HUNDRED)
        .unwrap_or(Decimal::ZERO)
}

/// Unit cost of an assigned line: the vendor quote when one was recorded,
/// else the standard cost. `None` when neither was entered.
///
/// A recorded zero is a real price and wins over the fallback.
pub fn unit_cost(vendor_quoted_cost: Option<Decimal>, standard_cost: Option<Decimal>) -> Option<Decimal> {
    vendor_quoted_cost.or(standard_cost)
}

/// Extended cost of an assigned line (`unit_cost * quantity`).
pub fn line_total(
    quantity: Decimal,
    vendor_quoted_cost: Option<Decimal>,
    standard_cost: Option<Decimal>,
) -> Option<Decimal> {
    unit_cost(vendor_quoted_cost, standard_cost).map(|cost| cost * quantity)
}

/// Whether `value` is within `MAX_AMOUNT` either side of zero.
pub fn amount_in_range(value: Decimal) -> bool {
    value.abs() <= MAX_AMOUNT
}

/// Whether `value` is a usable percentage: within `MAX_PERCENT` either side
/// of zero and no finer than hundredths.
///
/// Finer margins just under 100 would push a margin-on-sell price past what
/// a `Decimal` can hold.
pub fn percent_in_range(value: Decimal) -> bool {
    value.abs() <= MAX_PERCENT && value.normalize().scale() <= 2
}

/// Sum of `|quantity * price|` over `pairs`, or `None` once it passes
/// `MAX_AMOUNT`.
///
/// # Examples
/// ```
/// use rust_decimal::Decimal;
/// use rust_decimal_macros::dec;
/// use laurel_estimating::estimate::calculators::extended_total;
///
/// assert_eq!(extended_total([(dec!(10), dec!(5)), (dec!(-2), dec!(3))]), Some(dec!(56)));
/// assert_eq!(extended_total([(Decimal::MAX, dec!(2))]), None);
/// ```
pub fn extended_total<I>(pairs: I) -> Option<Decimal>
where
    I: IntoIterator<Item = (Decimal, Decimal)>,
{
    pairs
        .into_iter()
        .try_fold(Decimal::ZERO, |total, (quantity, price)| {
            let total = total.checked_add(quantity.checked_mul(price)?.abs())?;
            (total <= MAX_AMOUNT).then_some(total)
        })
}
