//! Project-wide rollup: grand totals, profit and the per-system breakdown.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use super::costing::{
    add, aggregate_composite, aggregate_module, amount, mul, percent_of, CompositeTotals,
    CostOverflow, LineSubtotals, ModuleTotals,
};
use crate::models::{CompositeAggregate, ModuleAggregate, ProjectRollup};

const PERCENT_DECIMAL_PLACES: u32 = 1;

/// Share of the standalone module cost taken by one system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemShare {
    pub system_name: String,
    pub system_total: Decimal,
    /// One decimal place.
    pub percentage: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupTotals {
    pub modules: Vec<ModuleTotals>,
    pub composites: Vec<CompositeTotals>,
    pub total_materials: Decimal,
    pub total_labor: Decimal,
    pub total_allowances: Decimal,
    pub total_handling_costs: Decimal,
    pub total_taxes: Decimal,
    pub profit_margin_percent: Decimal,
    pub total_profit: Decimal,
    pub grand_total: Decimal,
    pub systems: Vec<SystemShare>,
}

impl ProjectRollup {
    pub fn totals(&self) -> Result<RollupTotals, CostOverflow> {
        build_rollup(
            &self.modules,
            &self.modules_composite,
            amount(self.profit_margin_percent),
        )
    }
}

/// Aggregate standalone modules and bundles into project totals.
///
/// Standalone modules contribute `subtotal × module quantity`; bundles
/// contribute `subtotal × detail quantity × bundle quantity`.
pub fn build_rollup(
    modules: &[ModuleAggregate],
    composites: &[CompositeAggregate],
    profit_margin_percent: Decimal,
) -> Result<RollupTotals, CostOverflow> {
    let modules = modules
        .iter()
        .map(aggregate_module)
        .collect::<Result<Vec<_>, _>>()?;
    let composites = composites
        .iter()
        .map(aggregate_composite)
        .collect::<Result<Vec<_>, _>>()?;

    let mut project = LineSubtotals::default();
    for module in &modules {
        project.accumulate(&module.subtotals.scaled(module.quantity)?)?;
    }
    for composite in &composites {
        project.accumulate(&composite.subtotals)?;
    }

    let cost = project.unit_total()?;
    let total_profit = percent_of(cost, profit_margin_percent)?;
    let systems = system_breakdown(&modules)?;

    Ok(RollupTotals {
        total_materials: project.materials,
        total_labor: project.labor,
        total_allowances: project.allowances,
        total_handling_costs: project.handling_costs,
        total_taxes: project.taxes,
        profit_margin_percent,
        total_profit,
        grand_total: add(cost, total_profit)?,
        systems,
        modules,
        composites,
    })
}

/// Group standalone modules by system in first-seen order.
///
/// Each group's unit cost is expressed as a percentage of the summed group
/// cost (not of the grand total). Groups rounding to 0.0% are dropped.
pub fn system_breakdown(modules: &[ModuleTotals]) -> Result<Vec<SystemShare>, CostOverflow> {
    let mut groups: Vec<(String, Decimal)> = Vec::new();
    let mut overall = Decimal::ZERO;
    for module in modules {
        let cost = module.unit_total;
        overall = add(overall, cost)?;
        match groups.iter_mut().find(|(name, _)| *name == module.system_name) {
            Some((_, total)) => *total = add(*total, cost)?,
            None => groups.push((module.system_name.clone(), cost)),
        }
    }

    if overall.is_zero() {
        return Ok(Vec::new());
    }

    let mut shares = Vec::with_capacity(groups.len());
    for (system_name, system_total) in groups {
        let ratio = system_total.checked_div(overall).ok_or(CostOverflow)?;
        let percentage = mul(ratio, Decimal::ONE_HUNDRED)?
            .round_dp_with_strategy(PERCENT_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
        if !percentage.is_zero() {
            shares.push(SystemShare {
                system_name,
                system_total,
                percentage,
            });
        }
    }
    Ok(shares)
}
