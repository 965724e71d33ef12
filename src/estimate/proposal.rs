//! Proposal grouping, proposal totals and final document reports.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::Serialize;

use super::calculators::round_money;
use super::models::{AssignedProduct, CatalogMatch, Invoice, ProposalCreation};
use super::rollup::EstimateRollup;

/// One task inside a proposal group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalTask {
    pub proposal_id: i64,
    pub task_mapping_id: i64,
    pub code: String,
    pub description: String,
    /// The task's material-with-tax plus labor sell.
    pub value: Decimal,
    /// Lines flagged for display on the proposal.
    pub selected_products: Vec<AssignedProduct>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalGroup {
    pub group_name: String,
    pub tasks: Vec<ProposalTask>,
    pub main_total: Decimal,
    pub proposal_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalTotals {
    pub grand_total_price: Decimal,
    pub final_total_price: Decimal,
}

/// Group proposal rows by group name, in first-seen order.
///
/// Each estimate row counts once toward its group's total. A labor task
/// folded into a product row is valued with that row, so a group holding
/// both counts the row once. Tasks with no estimate row (freight, or a task
/// deleted since the proposal was built) are valued at zero.
pub fn group_proposals(
    proposals: &[ProposalCreation],
    estimate: &EstimateRollup,
    lines: &[AssignedProduct],
) -> Vec<ProposalGroup> {
    let mut groups: Vec<ProposalGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counted: HashSet<(usize, i64)> = HashSet::new();

    for proposal in proposals {
        let slot = *index.entry(proposal.group_name.as_str()).or_insert_with(|| {
            groups.push(ProposalGroup {
                group_name: proposal.group_name.clone(),
                tasks: Vec::new(),
                main_total: Decimal::ZERO,
                proposal_ids: Vec::new(),
            });
            groups.len() - 1
        });

        let row = estimate.row(proposal.task_mapping_id);
        let value = row.map(|r| r.mat_tax_labor).unwrap_or(Decimal::ZERO);

        let selected_products = lines
            .iter()
            .filter(|line| line.task_mapping_id == proposal.task_mapping_id && line.is_select)
            .cloned()
            .collect();

        let group = &mut groups[slot];
        if let Some(row) = row {
            if counted.insert((slot, row.task_id)) {
                group.main_total += value;
            }
        }
        group.proposal_ids.push(proposal.id);
        group.tasks.push(ProposalTask {
            proposal_id: proposal.id,
            task_mapping_id: proposal.task_mapping_id,
            code: row.map(|r| r.code.clone()).unwrap_or_default(),
            description: row.map(|r| r.description.clone()).unwrap_or_default(),
            value,
            selected_products,
        });
    }

    groups
}

/// Price of the proposal's tasks plus invoice taxes.
///
/// `grand_total_price` sums each line's extended cost and its local cost.
/// The invoice adds its flat taxes and `tax_rate` percent of the grand total.
pub fn proposal_totals(
    proposals: &[ProposalCreation],
    lines: &[AssignedProduct],
    invoice: Option<&Invoice>,
) -> ProposalTotals {
    let mut grand_total = Decimal::ZERO;

    for line in lines
        .iter()
        .filter(|line| proposals.iter().any(|p| p.task_mapping_id == line.task_mapping_id))
    {
        grand_total += line.line_total().unwrap_or(Decimal::ZERO);
        grand_total += line.local_total().unwrap_or(Decimal::ZERO);
    }

    let final_total = match invoice {
        Some(invoice) => {
            grand_total
                + invoice.sales_tax
                + invoice.other_tax
                + grand_total * invoice.tax_rate / Decimal::ONE_HUNDRED
        }
        None => grand_total,
    };

    ProposalTotals {
        grand_total_price: round_money(grand_total, 2),
        final_total_price: round_money(final_total, 2),
    }
}

/// A line whose vendor quote differs from the standard catalog cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostVariance {
    pub assigned_product_id: i64,
    pub task_mapping_id: i64,
    pub item_code: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub standard_cost: Option<Decimal>,
    pub vendor_quoted_cost: Decimal,
    /// Vendor quote minus standard cost, per unit.
    pub unit_variance: Option<Decimal>,
    pub extended_variance: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetsuiteLine {
    pub assigned_product_id: i64,
    pub item_code: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub internal_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalDocument {
    pub cost_variances: Vec<CostVariance>,
    /// Lines not yet matched to the material master.
    pub new_material_master: Vec<AssignedProduct>,
    pub netsuite_extract: Vec<NetsuiteLine>,
}

/// Build the final document reports from an opportunity's lines.
pub fn final_document(lines: &[AssignedProduct], catalog: &[CatalogMatch]) -> FinalDocument {
    let cost_variances = lines
        .iter()
        .filter_map(|line| {
            let vendor = line.vendor_quoted_cost.filter(|cost| *cost > Decimal::ZERO)?;
            let unit_variance = line.standard_cost.map(|standard| vendor - standard);
            Some(CostVariance {
                assigned_product_id: line.id,
                task_mapping_id: line.task_mapping_id,
                item_code: line.item_code.clone(),
                description: line.description.clone(),
                quantity: line.quantity,
                standard_cost: line.standard_cost,
                vendor_quoted_cost: vendor,
                unit_variance,
                extended_variance: unit_variance.map(|v| round_money(v * line.quantity, 2)),
            })
        })
        .collect();

    let new_material_master = lines.iter().filter(|line| !line.is_assign).cloned().collect();

    let internal_ids: HashMap<i64, Option<i64>> = catalog
        .iter()
        .map(|m| (m.assigned_product_id, m.internal_id))
        .collect();
    let netsuite_extract = lines
        .iter()
        .map(|line| NetsuiteLine {
            assigned_product_id: line.id,
            item_code: line.item_code.clone(),
            description: line.description.clone(),
            quantity: line.quantity,
            internal_id: internal_ids.get(&line.id).copied().flatten(),
        })
        .collect();

    FinalDocument {
        cost_variances,
        new_material_master,
        netsuite_extract,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::models::{TaskKind, TaskMapping};
    use crate::estimate::rollup::{rollup, EstimateSettings};
    use rust_decimal_macros::dec;

    fn task(id: i64) -> TaskMapping {
        TaskMapping {
            id,
            code: format!("T-{}", id),
            description: "Zone valves".to_string(),
            task_kind: TaskKind::Product,
            linked_task_id: None,
            labor_gp_percent: None,
            mat_gp_percent: Some(dec!(25)),
            s_and_h: None,
            sequence: 0,
        }
    }

    fn line(id: i64, task: i64, qty: Decimal, standard: Option<Decimal>, vendor: Option<Decimal>) -> AssignedProduct {
        AssignedProduct {
            id,
            task_mapping_id: task,
            item_code: Some(format!("ITEM-{}", id)),
            description: format!("line {}", id),
            quantity: qty,
            standard_cost: standard,
            vendor_quoted_cost: vendor,
            local_cost: None,
            is_select: id % 2 == 1,
            is_assign: id != 3,
            sequence: 0,
        }
    }

    fn proposal(id: i64, group: &str, task: i64) -> ProposalCreation {
        ProposalCreation {
            id,
            group_name: group.to_string(),
            task_mapping_id: task,
        }
    }

    #[test]
    fn test_group_proposals_counts_each_task_once() {
        let tasks = vec![task(1), task(2)];
        let lines = vec![
            line(1, 1, dec!(10), Some(dec!(5)), None),
            line(2, 1, dec!(1), Some(dec!(0)), None),
            line(3, 2, dec!(3), Some(dec!(25)), None),
        ];
        let estimate = rollup(&tasks, &lines, &EstimateSettings::default());
        let proposals = vec![proposal(10, "Base Bid", 1), proposal(11, "Alt 1", 2), proposal(12, "Base Bid", 2)];

        let groups = group_proposals(&proposals, &estimate, &lines);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].group_name, "Base Bid");
        assert_eq!(groups[0].proposal_ids, vec![10, 12]);
        // task 1: 50 / .75 = 66.67, +16.67 tax = 83.34; task 2: 75 / .75 = 100 + 25
        assert_eq!(groups[0].tasks[0].value, dec!(83.34));
        assert_eq!(groups[0].main_total, dec!(83.34) + dec!(125));
        assert_eq!(groups[1].main_total, dec!(125));
        assert_eq!(groups[0].tasks[0].selected_products, vec![lines[0].clone()]);
        assert!(groups[1].tasks[0].selected_products.iter().all(|l| l.task_mapping_id == 2));
    }

    #[test]
    fn test_group_proposals_values_folded_labor_with_its_row() {
        let mut labor = task(2);
        labor.code = "L-2".to_string();
        labor.task_kind = TaskKind::Labor;
        labor.linked_task_id = Some(1);
        let tasks = vec![task(1), labor];
        let lines = vec![
            line(1, 1, dec!(10), Some(dec!(5)), None),
            line(2, 2, dec!(1), Some(dec!(75)), None),
        ];
        let estimate = rollup(&tasks, &lines, &EstimateSettings::default());
        let product_value = estimate.row(1).unwrap().mat_tax_labor;
        // 83.34 material with tax + 75 labor at no margin
        assert_eq!(product_value, dec!(158.34));

        let proposals = vec![proposal(1, "Alt 2", 2), proposal(2, "Base", 1), proposal(3, "Base", 2)];
        let groups = group_proposals(&proposals, &estimate, &lines);

        assert_eq!(groups[0].tasks[0].value, product_value);
        assert_eq!(groups[0].tasks[0].code, "T-1");
        assert_eq!(groups[0].main_total, product_value);
        // Product and its labor share one row
        assert_eq!(groups[1].tasks.len(), 2);
        assert_eq!(groups[1].main_total, product_value);
    }

    #[test]
    fn test_group_proposals_unknown_task_is_zero() {
        let estimate = rollup(&[], &[], &EstimateSettings::default());
        let groups = group_proposals(&[proposal(1, "Base", 42)], &estimate, &[]);
        assert_eq!(groups[0].main_total, dec!(0));
        assert_eq!(groups[0].tasks[0].code, "");
    }

    #[test]
    fn test_proposal_totals_with_invoice() {
        let mut local = line(2, 1, dec!(2), Some(dec!(10)), None);
        local.local_cost = Some(dec!(5));
        let lines = vec![line(1, 1, dec!(10), Some(dec!(5)), Some(dec!(4))), local, line(3, 9, dec!(1), Some(dec!(1000)), None)];
        let invoice = Invoice {
            id: 1,
            sales_tax: dec!(12.50),
            other_tax: dec!(2.50),
            tax_rate: dec!(8),
        };

        let totals = proposal_totals(&[proposal(1, "Base", 1)], &lines, Some(&invoice));

        // 40 + 20 + 10 local
        assert_eq!(totals.grand_total_price, dec!(70));
        assert_eq!(totals.final_total_price, dec!(70) + dec!(15) + dec!(5.60));
    }

    #[test]
    fn test_proposal_totals_without_invoice() {
        let lines = vec![line(1, 1, dec!(3), Some(dec!(3.333)), None)];
        let totals = proposal_totals(&[proposal(1, "Base", 1)], &lines, None);
        assert_eq!(totals.grand_total_price, dec!(10.00));
        assert_eq!(totals.final_total_price, totals.grand_total_price);
    }

    #[test]
    fn test_final_document_reports() {
        let lines = vec![
            line(1, 1, dec!(10), Some(dec!(5)), Some(dec!(4.25))),
            line(2, 1, dec!(1), Some(dec!(9)), Some(dec!(0))),
            line(3, 1, dec!(2), None, Some(dec!(12))),
        ];
        let catalog = vec![CatalogMatch {
            assigned_product_id: 1,
            internal_id: Some(4417),
        }];

        let doc = final_document(&lines, &catalog);

        assert_eq!(doc.cost_variances.len(), 2);
        assert_eq!(doc.cost_variances[0].unit_variance, Some(dec!(-0.75)));
        assert_eq!(doc.cost_variances[0].extended_variance, Some(dec!(-7.50)));
        assert_eq!(doc.cost_variances[1].unit_variance, None);
        assert_eq!(doc.new_material_master.len(), 1);
        assert_eq!(doc.new_material_master[0].id, 3);
        assert_eq!(doc.netsuite_extract[0].internal_id, Some(4417));
        assert_eq!(doc.netsuite_extract[1].internal_id, None);
    }
}
