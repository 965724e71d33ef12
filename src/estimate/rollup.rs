//! Task and opportunity cost rollups.
//!
//! Turns the task mappings of one opportunity and their assigned lines into
//! per-task figures, opportunity totals and the KPI breakdowns. Pure: callers
//! load rows (or receive them over HTTP) and pass them in.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use super::calculators::{percent_of, round_money, sell_price, tax_on};
use super::models::{AssignedProduct, TaskKind, TaskMapping};

/// Rates applied when rolling up an estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimateSettings {
    /// Sales tax applied to marked-up material, in percent.
    pub sales_tax_percent: Decimal,
    /// Margin used when a task has no labor margin set.
    pub default_labor_gp_percent: Decimal,
    /// Margin used when a task has no material margin set.
    pub default_mat_gp_percent: Decimal,
}

impl Default for EstimateSettings {
    fn default() -> Self {
        Self {
            sales_tax_percent: Decimal::from(25),
            default_labor_gp_percent: Decimal::ZERO,
            default_mat_gp_percent: Decimal::ZERO,
        }
    }
}

/// Derived figures for one estimate row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRollup {
    pub task_id: i64,
    pub code: String,
    pub description: String,
    pub task_kind: TaskKind,
    /// Labor tasks folded into this row.
    pub labor_task_ids: Vec<i64>,
    pub labor_cost: Decimal,
    pub labor_gp_percent: Decimal,
    pub labor_gp: Decimal,
    pub labor_sell: Decimal,
    pub mat_cost: Decimal,
    pub mat_gp_percent: Decimal,
    pub mat_gp: Decimal,
    pub mat_plus_mu: Decimal,
    pub sales_tax: Decimal,
    pub mat_sell: Decimal,
    pub mat_tax_labor: Decimal,
    pub comb_gp: Decimal,
    pub s_and_h: Option<Decimal>,
}

impl TaskRollup {
    /// Apply markup, tax and GP math to a row's labor and material cost.
    pub fn compute(
        task: &TaskMapping,
        labor_cost: Decimal,
        mat_cost: Decimal,
        settings: &EstimateSettings,
    ) -> Self {
        let labor_gp_percent = task
            .labor_gp_percent
            .unwrap_or(settings.default_labor_gp_percent);
        let mat_gp_percent = task
            .mat_gp_percent
            .unwrap_or(settings.default_mat_gp_percent);

        let labor_cost = round_money(labor_cost, 2);
        let labor_sell = round_money(sell_price(labor_cost, labor_gp_percent), 2);
        let labor_gp = labor_sell - labor_cost;

        let mat_cost = round_money(mat_cost, 2);
        let mat_plus_mu = round_money(sell_price(mat_cost, mat_gp_percent), 2);
        let mat_gp = mat_plus_mu - mat_cost;

        // Tax applies to material only
        let sales_tax = tax_on(mat_plus_mu, settings.sales_tax_percent);
        let mat_sell = mat_plus_mu + sales_tax;
        let mat_tax_labor = mat_sell + labor_sell;

        let comb_gp = percent_of(mat_gp + labor_gp, labor_sell + mat_plus_mu);

        TaskRollup {
            task_id: task.id,
            code: task.code.clone(),
            description: task.description.clone(),
            task_kind: task.task_kind,
            labor_task_ids: vec![],
            labor_cost,
            labor_gp_percent,
            labor_gp,
            labor_sell,
            mat_cost,
            mat_gp_percent,
            mat_gp,
            mat_plus_mu,
            sales_tax,
            mat_sell,
            mat_tax_labor,
            comb_gp,
            s_and_h: task.s_and_h,
        }
    }
}

/// Opportunity-level sums over all non-freight rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OpportunityTotals {
    pub total_labor_cost: Decimal,
    pub total_labor_gp: Decimal,
    pub total_labor_sell: Decimal,
    pub total_mat_cost: Decimal,
    pub total_mat_gp: Decimal,
    pub total_mat_mu: Decimal,
    pub total_sales_tax: Decimal,
    pub total_mat_sell: Decimal,
    pub total_mat_tax_labor: Decimal,
    pub total_comb_gp: Decimal,
    pub total_cost: Decimal,
    pub total_sale: Decimal,
    pub total_gp: Decimal,
    pub total_gp_percent: Decimal,
    /// Shared by every row, `None` when rows disagree or there are none.
    pub labor_gp_percent: Option<Decimal>,
    pub mat_gp_percent: Option<Decimal>,
    pub s_and_h: Option<Decimal>,
}

impl OpportunityTotals {
    pub fn from_rows(rows: &[TaskRollup]) -> Self {
        let mut totals = OpportunityTotals::default();

        for row in rows {
            totals.total_labor_cost += row.labor_cost;
            totals.total_labor_gp += row.labor_gp;
            totals.total_labor_sell += row.labor_sell;
            totals.total_mat_cost += row.mat_cost;
            totals.total_mat_gp += row.mat_gp;
            totals.total_mat_mu += row.mat_plus_mu;
            totals.total_sales_tax += row.sales_tax;
            totals.total_mat_sell += row.mat_sell;
            totals.total_mat_tax_labor += row.mat_tax_labor;
            totals.total_comb_gp += round_money(row.comb_gp, 2);
        }

        totals.total_cost = totals.total_labor_cost + totals.total_mat_cost;
        totals.total_sale = totals.total_labor_sell + totals.total_mat_sell;
        totals.total_gp = totals.total_mat_gp + totals.total_labor_gp;
        totals.total_gp_percent = round_money(percent_of(totals.total_gp, totals.total_sale), 2);

        totals.labor_gp_percent = shared_value(rows.iter().map(|r| Some(r.labor_gp_percent)));
        totals.mat_gp_percent = shared_value(rows.iter().map(|r| Some(r.mat_gp_percent)));
        totals.s_and_h = shared_value(rows.iter().map(|r| r.s_and_h));

        totals
    }
}

fn shared_value(mut values: impl Iterator<Item = Option<Decimal>>) -> Option<Decimal> {
    let first = values.next()??;
    values.all(|v| v == Some(first)).then_some(first)
}

/// Full estimate for one opportunity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateRollup {
    pub rows: Vec<TaskRollup>,
    pub totals: OpportunityTotals,
    /// Line totals of freight tasks; never part of `totals`.
    pub frt_total: Decimal,
    /// Lines with neither a vendor quote nor a standard cost.
    pub missing_cost_lines: u32,
    /// Labor tasks whose link points at a missing or non-product task.
    pub dangling_labor_links: Vec<i64>,
}

impl EstimateRollup {
    pub fn cost_breakdown(&self) -> CostBreakdown {
        CostBreakdown {
            total_labor_cost: self.totals.total_labor_cost,
            total_mat_cost: self.totals.total_mat_cost,
            total_cost: self.totals.total_cost,
        }
    }

    pub fn sale_breakdown(&self) -> SaleBreakdown {
        SaleBreakdown {
            total_labor_sale: self.totals.total_labor_sell,
            total_mat_sale: self.totals.total_mat_sell,
            total_sale: self.totals.total_sale,
        }
    }

    pub fn gp_breakdown(&self) -> GpBreakdown {
        GpBreakdown {
            total_mat_gp: self.totals.total_mat_gp,
            total_labor_gp: self.totals.total_labor_gp,
            total_gp: self.totals.total_gp,
        }
    }

    pub fn gp_percent_breakdown(&self) -> GpPercentBreakdown {
        GpPercentBreakdown {
            total_gp: self.totals.total_gp,
            total_sell: self.totals.total_sale,
            sale_less_cost: self.totals.total_sale - self.totals.total_cost,
            total_gp_percent: self.totals.total_gp_percent,
        }
    }

    pub fn row(&self, task_id: i64) -> Option<&TaskRollup> {
        self.rows
            .iter()
            .find(|row| row.task_id == task_id || row.labor_task_ids.contains(&task_id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub total_labor_cost: Decimal,
    pub total_mat_cost: Decimal,
    pub total_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleBreakdown {
    pub total_labor_sale: Decimal,
    pub total_mat_sale: Decimal,
    pub total_sale: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpBreakdown {
    pub total_mat_gp: Decimal,
    pub total_labor_gp: Decimal,
    pub total_gp: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpPercentBreakdown {
    pub total_gp: Decimal,
    pub total_sell: Decimal,
    /// Sale minus cost; differs from `total_gp` by the sales tax.
    pub sale_less_cost: Decimal,
    pub total_gp_percent: Decimal,
}

/// Roll up an opportunity's tasks and lines.
///
/// Rows are produced in the order `tasks` is given. Freight tasks only feed
/// `frt_total`. Labor tasks linked to a product task fold into that task's
/// row; unlinked labor tasks form rows of their own.
pub fn rollup(
    tasks: &[TaskMapping],
    lines: &[AssignedProduct],
    settings: &EstimateSettings,
) -> EstimateRollup {
    let by_id: HashMap<i64, &TaskMapping> = tasks.iter().map(|t| (t.id, t)).collect();

    let mut own_totals: HashMap<i64, Decimal> = HashMap::new();
    let mut missing_cost_lines = 0u32;
    for line in lines {
        if !by_id.contains_key(&line.task_mapping_id) {
            warn!(
                "Assigned product {} references unknown task mapping {}",
                line.id, line.task_mapping_id
            );
            continue;
        }
        let total = match line.line_total() {
            Some(total) => total,
            None => {
                missing_cost_lines += 1;
                Decimal::ZERO
            }
        };
        *own_totals.entry(line.task_mapping_id).or_insert(Decimal::ZERO) += total;
    }
    let own_total = |id: i64| own_totals.get(&id).copied().unwrap_or(Decimal::ZERO);

    // Resolve labor links to product rows
    let mut linked_labor: HashMap<i64, (Decimal, Vec<i64>)> = HashMap::new();
    let mut dangling_labor_links = Vec::new();
    for task in tasks.iter().filter(|t| t.is_labor() && !t.is_freight()) {
        let Some(target_id) = task.linked_task_id else {
            continue;
        };
        match by_id.get(&target_id) {
            Some(target) if !target.is_labor() && !target.is_freight() => {
                let entry = linked_labor
                    .entry(target_id)
                    .or_insert((Decimal::ZERO, Vec::new()));
                entry.0 += own_total(task.id);
                entry.1.push(task.id);
            }
            _ => {
                warn!(
                    "Labor task {} links to task {} which is not an estimable product task",
                    task.id, target_id
                );
                dangling_labor_links.push(task.id);
            }
        }
    }

    let mut rows = Vec::new();
    let mut frt_total = Decimal::ZERO;
    for task in tasks {
        if task.is_freight() {
            frt_total += own_total(task.id);
            continue;
        }

        let row = match task.task_kind {
            TaskKind::Product => {
                let (labor_cost, labor_ids) = linked_labor
                    .get(&task.id)
                    .cloned()
                    .unwrap_or((Decimal::ZERO, Vec::new()));
                let mut row = TaskRollup::compute(task, labor_cost, own_total(task.id), settings);
                row.labor_task_ids = labor_ids;
                row
            }
            TaskKind::Labor => {
                let folded = task.linked_task_id.is_some()
                    && !dangling_labor_links.contains(&task.id);
                if folded {
                    continue;
                }
                TaskRollup::compute(task, own_total(task.id), Decimal::ZERO, settings)
            }
        };
        rows.push(row);
    }

    let totals = OpportunityTotals::from_rows(&rows);

    EstimateRollup {
        rows,
        totals,
        frt_total: round_money(frt_total, 2),
        missing_cost_lines,
        dangling_labor_links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product_task(id: i64, code: &str, mat_gp: Decimal, labor_gp: Decimal) -> TaskMapping {
        TaskMapping {
            id,
            code: code.to_string(),
            description: format!("{} install", code),
            task_kind: TaskKind::Product,
            linked_task_id: None,
            labor_gp_percent: Some(labor_gp),
            mat_gp_percent: Some(mat_gp),
            s_and_h: None,
            sequence: id as i32,
        }
    }

    fn labor_task(id: i64, linked: Option<i64>, labor_gp: Decimal) -> TaskMapping {
        TaskMapping {
            id,
            code: format!("L-{}", id),
            description: "Labor".to_string(),
            task_kind: TaskKind::Labor,
            linked_task_id: linked,
            labor_gp_percent: Some(labor_gp),
            mat_gp_percent: None,
            s_and_h: None,
            sequence: id as i32,
        }
    }

    fn line(id: i64, task: i64, qty: Decimal, standard: Option<Decimal>, vendor: Option<Decimal>) -> AssignedProduct {
        AssignedProduct {
            id,
            task_mapping_id: task,
            item_code: None,
            description: format!("line {}", id),
            quantity: qty,
            standard_cost: standard,
            vendor_quoted_cost: vendor,
            local_cost: None,
            is_select: true,
            is_assign: true,
            sequence: 0,
        }
    }

    #[test]
    fn test_single_material_line_example() {
        let tasks = vec![product_task(1, "T-100", dec!(25), dec!(0))];
        let lines = vec![line(1, 1, dec!(10), Some(dec!(5.00)), None)];

        let result = rollup(&tasks, &lines, &EstimateSettings::default());
        let row = &result.rows[0];

        assert_eq!(row.mat_cost, dec!(50.00));
        assert_eq!(row.mat_plus_mu, dec!(66.67));
        assert_eq!(row.sales_tax, dec!(16.67));
        assert_eq!(row.mat_sell, dec!(83.34));
        assert_eq!(row.mat_sell, round_money(row.mat_plus_mu * dec!(1.25), 2));
        assert_eq!(row.mat_gp, dec!(16.67));
        assert_eq!(row.labor_cost, dec!(0));
        assert_eq!(row.mat_tax_labor, dec!(83.34));
    }

    #[test]
    fn test_total_gp_percent_is_over_taxed_sale() {
        let tasks = vec![product_task(1, "T-100", dec!(25), dec!(0))];
        let lines = vec![line(1, 1, dec!(10), Some(dec!(5.00)), None)];

        let result = rollup(&tasks, &lines, &EstimateSettings::default());

        // Row GP% excludes tax: 16.67 / 66.67
        assert_eq!(round_money(result.rows[0].comb_gp, 2), dec!(25.00));
        // Opportunity GP% is over what the customer pays: 16.67 / 83.34
        assert_eq!(result.totals.total_sale, dec!(83.34));
        assert_eq!(result.totals.total_gp_percent, dec!(20.00));
    }

    #[test]
    fn test_comb_gp_formula() {
        let tasks = vec![
            product_task(1, "T-100", dec!(25), dec!(40)),
            labor_task(2, Some(1), dec!(40)),
        ];
        let lines = vec![
            line(1, 1, dec!(4), Some(dec!(25)), None),
            line(2, 2, dec!(6), None, Some(dec!(10))),
        ];

        let result = rollup(&tasks, &lines, &EstimateSettings::default());
        assert_eq!(result.rows.len(), 1);
        let row = &result.rows[0];

        // labor 60 / 0.6 = 100, material 100 / 0.75 = 133.33
        assert_eq!(row.labor_cost, dec!(60));
        assert_eq!(row.labor_sell, dec!(100));
        assert_eq!(row.labor_gp, dec!(40));
        assert_eq!(row.mat_plus_mu, dec!(133.33));
        assert_eq!(
            row.comb_gp,
            (row.mat_gp + row.labor_gp) / (row.labor_sell + row.mat_plus_mu) * dec!(100)
        );
        assert_eq!(row.labor_task_ids, vec![2]);
    }

    #[test]
    fn test_labor_uses_task_margin_not_material_margin() {
        let mut task = product_task(1, "T-1", dec!(50), dec!(20));
        task.mat_gp_percent = Some(dec!(50));
        let tasks = vec![task, labor_task(2, Some(1), dec!(99))];
        let lines = vec![line(1, 2, dec!(1), Some(dec!(80)), None)];

        let result = rollup(&tasks, &lines, &EstimateSettings::default());
        // the product row's labor margin applies to folded labor
        assert_eq!(result.rows[0].labor_sell, dec!(100));
    }

    #[test]
    fn test_full_margin_does_not_divide_by_zero() {
        let tasks = vec![product_task(1, "T-1", dec!(100), dec!(100))];
        let lines = vec![line(1, 1, dec!(2), Some(dec!(10)), None)];

        let result = rollup(&tasks, &lines, &EstimateSettings::default());
        let row = &result.rows[0];
        assert_eq!(row.mat_plus_mu, dec!(0));
        assert_eq!(row.sales_tax, dec!(0));
        assert_eq!(row.mat_sell, dec!(0));
        assert_eq!(row.comb_gp, dec!(0));
    }

    #[test]
    fn test_unlinked_labor_is_its_own_row() {
        let tasks = vec![
            product_task(1, "T-1", dec!(25), dec!(25)),
            labor_task(2, None, dec!(25)),
        ];
        let lines = vec![
            line(1, 1, dec!(1), Some(dec!(75)), None),
            line(2, 2, dec!(3), Some(dec!(25)), None),
        ];

        let result = rollup(&tasks, &lines, &EstimateSettings::default());
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].labor_cost, dec!(0));
        assert_eq!(result.rows[1].labor_cost, dec!(75));
        assert_eq!(result.rows[1].mat_cost, dec!(0));
        assert_eq!(result.totals.total_labor_cost, dec!(75));
        assert_eq!(result.totals.total_labor_sell, dec!(100));
    }

    #[test]
    fn test_dangling_link_becomes_row() {
        let tasks = vec![
            product_task(1, "T-1", dec!(0), dec!(0)),
            labor_task(2, Some(99), dec!(0)),
            labor_task(3, Some(2), dec!(0)),
        ];
        let lines = vec![line(1, 2, dec!(1), Some(dec!(10)), None), line(2, 3, dec!(1), Some(dec!(5)), None)];

        let result = rollup(&tasks, &lines, &EstimateSettings::default());
        assert_eq!(result.dangling_labor_links, vec![2, 3]);
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.totals.total_labor_cost, dec!(15));
    }

    #[test]
    fn test_freight_excluded_from_totals() {
        let mut freight = product_task(3, "FRT", dec!(25), dec!(25));
        freight.description = "Freight".to_string();
        let tasks = vec![
            product_task(1, "T-1", dec!(25), dec!(0)),
            product_task(2, "T-2", dec!(25), dec!(0)),
            freight,
        ];
        let lines = vec![
            line(1, 1, dec!(10), Some(dec!(5.00)), None),
            line(2, 2, dec!(3), Some(dec!(25)), None),
            line(3, 3, dec!(1), Some(dec!(400)), Some(dec!(350))),
        ];

        let result = rollup(&tasks, &lines, &EstimateSettings::default());

        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.frt_total, dec!(350));
        assert_eq!(result.totals.total_mat_cost, dec!(125));
        let row_sum: Decimal = result.rows.iter().map(|r| r.mat_sell + r.labor_sell).sum();
        assert_eq!(result.totals.total_sale, row_sum);
        let cost_sum: Decimal = result.rows.iter().map(|r| r.mat_cost + r.labor_cost).sum();
        assert_eq!(result.totals.total_cost, cost_sum);
    }

    #[test]
    fn test_missing_costs_are_counted_not_guessed() {
        let tasks = vec![product_task(1, "T-1", dec!(0), dec!(0))];
        let lines = vec![
            line(1, 1, dec!(2), None, None),
            line(2, 1, dec!(2), Some(dec!(7)), Some(dec!(0))),
            line(3, 1, dec!(2), Some(dec!(7)), None),
        ];

        let result = rollup(&tasks, &lines, &EstimateSettings::default());
        assert_eq!(result.missing_cost_lines, 1);
        // zero vendor quote is honoured
        assert_eq!(result.rows[0].mat_cost, dec!(14));
    }

    #[test]
    fn test_default_margins_apply_when_unset() {
        let mut task = product_task(1, "T-1", dec!(0), dec!(0));
        task.mat_gp_percent = None;
        let settings = EstimateSettings {
            default_mat_gp_percent: dec!(20),
            ..EstimateSettings::default()
        };
        let lines = vec![line(1, 1, dec!(1), Some(dec!(80)), None)];

        let result = rollup(&[task], &lines, &settings);
        assert_eq!(result.rows[0].mat_gp_percent, dec!(20));
        assert_eq!(result.rows[0].mat_plus_mu, dec!(100));
    }

    #[test]
    fn test_totals_and_kpi_breakdowns_agree() {
        let tasks = vec![
            product_task(1, "T-1", dec!(30), dec!(35)),
            labor_task(2, Some(1), dec!(0)),
            product_task(3, "T-3", dec!(20), dec!(0)),
        ];
        let lines = vec![
            line(1, 1, dec!(12), Some(dec!(3.25)), None),
            line(2, 2, dec!(8), Some(dec!(45)), None),
            line(3, 3, dec!(5), None, Some(dec!(19.99))),
        ];

        let result = rollup(&tasks, &lines, &EstimateSettings::default());
        let t = &result.totals;

        assert_eq!(result.cost_breakdown().total_cost, t.total_labor_cost + t.total_mat_cost);
        assert_eq!(result.sale_breakdown().total_sale, t.total_labor_sell + t.total_mat_sell);
        assert_eq!(result.gp_breakdown().total_gp, t.total_labor_gp + t.total_mat_gp);
        assert_eq!(
            result.gp_percent_breakdown().sale_less_cost,
            t.total_gp + t.total_sales_tax
        );
        assert_eq!(
            t.total_gp_percent,
            round_money(t.total_gp / t.total_sale * dec!(100), 2)
        );
        assert!(result.row(2).is_some());
    }

    #[test]
    fn test_shared_margins_reported() {
        let tasks = vec![
            product_task(1, "T-1", dec!(25), dec!(30)),
            product_task(2, "T-2", dec!(25), dec!(35)),
        ];
        let result = rollup(&tasks, &[], &EstimateSettings::default());

        assert_eq!(result.totals.mat_gp_percent, Some(dec!(25)));
        assert_eq!(result.totals.labor_gp_percent, None);
        assert_eq!(result.totals.s_and_h, None);
    }

    #[test]
    fn test_empty_estimate() {
        let result = rollup(&[], &[], &EstimateSettings::default());
        assert!(result.rows.is_empty());
        assert_eq!(result.totals, OpportunityTotals::default());
        assert_eq!(result.frt_total, dec!(0));
    }
}
