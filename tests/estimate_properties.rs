//! Property-based tests for the estimate and bid calculators.
//!
//! These check the arithmetic invariants of markup, tax and rollups over a
//! wide range of costs and margins.

use proptest::prelude::*;
use rust_decimal::Decimal;

use laurel_estimating::bid::calculate_totals;
use laurel_estimating::estimate::{
    rollup, round_money, sell_price, AssignedProduct, EstimateSettings, EstimationStage,
    MarginBasis, TaskKind, TaskMapping,
};

// Strategies for generating test data
fn money_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn margin_strategy() -> impl Strategy<Value = Decimal> {
    // 0.00 .. 99.99 percent
    (0i64..10_000).prop_map(|bp| Decimal::new(bp, 2))
}

fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..5_000).prop_map(|q| Decimal::new(q, 1))
}

fn stage_strategy() -> impl Strategy<Value = EstimationStage> {
    (0usize..EstimationStage::ALL.len()).prop_map(|i| EstimationStage::ALL[i])
}

fn task(id: i64, freight: bool, mat_gp: Decimal) -> TaskMapping {
    TaskMapping {
        id,
        code: if freight { format!("FRT-{}", id) } else { format!("T-{}", id) },
        description: "Rotor zone".to_string(),
        task_kind: TaskKind::Product,
        linked_task_id: None,
        labor_gp_percent: None,
        mat_gp_percent: Some(mat_gp),
        s_and_h: None,
        sequence: id as i32,
    }
}

fn line(id: i64, task_id: i64, quantity: Decimal, cost: Decimal) -> AssignedProduct {
    AssignedProduct {
        id,
        task_mapping_id: task_id,
        item_code: None,
        description: String::new(),
        quantity,
        standard_cost: Some(cost),
        vendor_quoted_cost: None,
        local_cost: None,
        is_select: false,
        is_assign: true,
        sequence: 0,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn sell_price_never_below_cost(cost in money_strategy(), margin in margin_strategy()) {
        let sell = sell_price(cost, margin);
        prop_assert!(sell >= cost, "sell {} below cost {} at {}%", sell, cost, margin);
    }

    #[test]
    fn sell_price_recovers_cost(cost in money_strategy(), margin in margin_strategy()) {
        let sell = sell_price(cost, margin);
        let recovered = sell * (Decimal::ONE - margin / Decimal::ONE_HUNDRED);
        let tolerance = Decimal::new(1, 10);
        prop_assert!((recovered - cost).abs() < tolerance, "{} != {}", recovered, cost);
    }

    #[test]
    fn full_margin_yields_zero(cost in money_strategy(), extra in 0i64..500) {
        let margin = Decimal::ONE_HUNDRED + Decimal::new(extra, 1);
        prop_assert_eq!(sell_price(cost, margin), Decimal::ZERO);
    }

    #[test]
    fn material_sell_includes_quarter_tax(cost in money_strategy(), margin in margin_strategy()) {
        let tasks = vec![task(1, false, margin)];
        let lines = vec![line(1, 1, Decimal::ONE, cost)];

        let result = rollup(&tasks, &lines, &EstimateSettings::default());
        let row = &result.rows[0];

        prop_assert_eq!(row.mat_sell, round_money(row.mat_plus_mu * Decimal::new(125, 2), 2));
        prop_assert_eq!(row.mat_tax_labor, row.mat_sell + row.labor_sell);
    }

    #[test]
    fn totals_sum_non_freight_rows(
        specs in prop::collection::vec(
            (any::<bool>(), margin_strategy(), quantity_strategy(), money_strategy()),
            1..12,
        )
    ) {
        let mut tasks = Vec::new();
        let mut lines = Vec::new();
        let mut freight_total = Decimal::ZERO;

        for (i, (freight, margin, quantity, cost)) in specs.into_iter().enumerate() {
            let id = i as i64 + 1;
            tasks.push(task(id, freight, margin));
            lines.push(line(id, id, quantity, cost));
            if freight {
                freight_total += quantity * cost;
            }
        }

        let result = rollup(&tasks, &lines, &EstimateSettings::default());
        let t = &result.totals;

        prop_assert!(result.rows.iter().all(|r| !r.code.starts_with("FRT")));
        prop_assert_eq!(result.frt_total, round_money(freight_total, 2));

        let cost: Decimal = result.rows.iter().map(|r| r.mat_cost + r.labor_cost).sum();
        let sale: Decimal = result.rows.iter().map(|r| r.mat_sell + r.labor_sell).sum();
        let gp: Decimal = result.rows.iter().map(|r| r.mat_gp + r.labor_gp).sum();
        prop_assert_eq!(t.total_cost, cost);
        prop_assert_eq!(t.total_sale, sale);
        prop_assert_eq!(t.total_gp, gp);
        prop_assert_eq!(result.cost_breakdown().total_cost, t.total_cost);
        prop_assert_eq!(result.sale_breakdown().total_sale, t.total_sale);
    }

    #[test]
    fn stage_never_moves_backwards(current in stage_strategy(), requested in stage_strategy()) {
        let transition = current.advance(requested);
        prop_assert!(transition.stage() >= current);
        prop_assert_eq!(transition.changed(), requested > current);
    }

    #[test]
    fn bid_sale_is_cost_plus_margin(
        materials in prop::collection::vec(money_strategy(), 0..6),
        labor in prop::collection::vec(money_strategy(), 0..6),
        subcontractor in money_strategy(),
        margin in margin_strategy(),
    ) {
        let totals = calculate_totals(&materials, &labor, &[], subcontractor, margin, MarginBasis::OnCost);

        prop_assert_eq!(
            totals.our_cost,
            totals.materials_total + totals.labor_total + totals.equipment_total + totals.subcontractor_total
        );
        prop_assert!(totals.sale_price >= totals.our_cost);
        let drift = (totals.sale_price - (totals.our_cost + totals.margin_amount)).abs();
        prop_assert!(drift <= Decimal::new(1, 2), "sale {} vs cost {} + margin {}", totals.sale_price, totals.our_cost, totals.margin_amount);
    }
}
