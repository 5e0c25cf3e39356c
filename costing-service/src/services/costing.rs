//! Cost line evaluators and module/composite aggregation.
//!
//! Everything here is a pure function of the current line data. Totals are
//! never cached on the models, so recomputing after an edit or an adjustment
//! always reflects the latest values.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::models::{CompositeAggregate, LaborLine, MaterialLine, ModuleAggregate};

/// A product or sum left the range a `Decimal` can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Cost figures exceed the supported range")]
pub struct CostOverflow;

/// Missing numeric fields count as zero when pricing.
#[inline]
pub(crate) fn amount(value: Option<Decimal>) -> Decimal {
    value.unwrap_or(Decimal::ZERO)
}

#[inline]
pub(crate) fn mul(a: Decimal, b: Decimal) -> Result<Decimal, CostOverflow> {
    a.checked_mul(b).ok_or(CostOverflow)
}

#[inline]
pub(crate) fn add(a: Decimal, b: Decimal) -> Result<Decimal, CostOverflow> {
    a.checked_add(b).ok_or(CostOverflow)
}

/// `value × percent / 100`
pub(crate) fn percent_of(value: Decimal, percent: Decimal) -> Result<Decimal, CostOverflow> {
    mul(value, percent)?
        .checked_div(Decimal::ONE_HUNDRED)
        .ok_or(CostOverflow)
}

/// `unitPrice × quantity`
pub fn material_cost(line: &MaterialLine) -> Result<Decimal, CostOverflow> {
    mul(amount(line.unit_price), amount(line.quantity))
}

/// `unitPrice × quantity × taxRatePercent / 100`
pub fn tax_cost(line: &MaterialLine) -> Result<Decimal, CostOverflow> {
    percent_of(material_cost(line)?, amount(line.tax_rate_percent))
}

/// `handlingCost × quantity`
pub fn handling_cost(line: &MaterialLine) -> Result<Decimal, CostOverflow> {
    mul(amount(line.handling_cost), amount(line.quantity))
}

/// `(hourlyRate × hoursRequired + allowanceAmount × allowanceQuantity) × quantity`
pub fn labor_cost(line: &LaborLine) -> Result<Decimal, CostOverflow> {
    let per_unit = add(
        mul(amount(line.hourly_rate), amount(line.hours_required))?,
        mul(amount(line.allowance_amount), amount(line.allowance_quantity))?,
    )?;
    mul(per_unit, amount(line.quantity))
}

/// The allowance share of [`labor_cost`].
pub fn allowance_cost(line: &LaborLine) -> Result<Decimal, CostOverflow> {
    mul(
        mul(amount(line.allowance_amount), amount(line.allowance_quantity))?,
        amount(line.quantity),
    )
}

/// Per-unit sums over one module's lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSubtotals {
    pub materials: Decimal,
    pub labor: Decimal,
    pub allowances: Decimal,
    pub handling_costs: Decimal,
    pub taxes: Decimal,
}

impl LineSubtotals {
    pub fn of(module: &ModuleAggregate) -> Result<Self, CostOverflow> {
        let mut subtotals = Self::default();
        for line in &module.material_lines {
            subtotals.materials = add(subtotals.materials, material_cost(line)?)?;
            subtotals.handling_costs = add(subtotals.handling_costs, handling_cost(line)?)?;
            subtotals.taxes = add(subtotals.taxes, tax_cost(line)?)?;
        }
        for line in &module.labor_lines {
            subtotals.labor = add(subtotals.labor, labor_cost(line)?)?;
            subtotals.allowances = add(subtotals.allowances, allowance_cost(line)?)?;
        }
        Ok(subtotals)
    }

    /// Material plus labor for one unit of the module.
    pub fn unit_total(&self) -> Result<Decimal, CostOverflow> {
        add(self.materials, self.labor)
    }

    /// Every component multiplied by `factor`.
    pub fn scaled(&self, factor: Decimal) -> Result<Self, CostOverflow> {
        Ok(Self {
            materials: mul(self.materials, factor)?,
            labor: mul(self.labor, factor)?,
            allowances: mul(self.allowances, factor)?,
            handling_costs: mul(self.handling_costs, factor)?,
            taxes: mul(self.taxes, factor)?,
        })
    }

    pub fn accumulate(&mut self, other: &Self) -> Result<(), CostOverflow> {
        *self = Self {
            materials: add(self.materials, other.materials)?,
            labor: add(self.labor, other.labor)?,
            allowances: add(self.allowances, other.allowances)?,
            handling_costs: add(self.handling_costs, other.handling_costs)?,
            taxes: add(self.taxes, other.taxes)?,
        };
        Ok(())
    }
}

/// Derived figures for one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleTotals {
    pub module_id: i64,
    pub module_name: String,
    pub system_name: String,
    pub quantity: Decimal,
    pub material_subtotal: Decimal,
    pub labor_subtotal: Decimal,
    /// `(materialSubtotal + laborSubtotal) × quantity`
    pub total: Decimal,
    pub is_empty: bool,
    /// Material plus labor for a single unit, before the module quantity.
    #[serde(skip)]
    pub unit_total: Decimal,
    #[serde(skip)]
    pub(crate) subtotals: LineSubtotals,
}

pub fn aggregate_module(module: &ModuleAggregate) -> Result<ModuleTotals, CostOverflow> {
    let subtotals = LineSubtotals::of(module)?;
    let quantity = amount(module.quantity);
    let unit_total = subtotals.unit_total()?;

    Ok(ModuleTotals {
        module_id: module.module_id,
        module_name: module.module_name.clone(),
        system_name: module.system_name.clone(),
        quantity,
        material_subtotal: subtotals.materials,
        labor_subtotal: subtotals.labor,
        total: mul(unit_total, quantity)?,
        is_empty: module.is_empty(),
        unit_total,
        subtotals,
    })
}

/// Derived figures for one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeTotals {
    pub composite_id: i64,
    pub composite_name: String,
    pub quantity: Decimal,
    /// `Σ detail module unit total × detail quantity`: the price of one bundle.
    pub composite_total: Decimal,
    /// `compositeTotal × quantity`: what the bundle contributes to the project.
    pub extended_total: Decimal,
    pub modules: Vec<ModuleTotals>,
    #[serde(skip)]
    pub(crate) subtotals: LineSubtotals,
}

pub fn aggregate_composite(composite: &CompositeAggregate) -> Result<CompositeTotals, CostOverflow> {
    let mut composite_total = Decimal::ZERO;
    let mut per_bundle = LineSubtotals::default();
    let mut modules = Vec::with_capacity(composite.composite_details.len());

    for detail in &composite.composite_details {
        let detail_quantity = amount(detail.quantity);
        let mut totals = aggregate_module(&detail.module)?;

        // The detail quantity governs; the inner module quantity is not reapplied
        totals.quantity = detail_quantity;
        totals.total = mul(totals.unit_total, detail_quantity)?;

        composite_total = add(composite_total, totals.total)?;
        per_bundle.accumulate(&totals.subtotals.scaled(detail_quantity)?)?;
        modules.push(totals);
    }

    let quantity = amount(composite.quantity);

    Ok(CompositeTotals {
        composite_id: composite.composite_id,
        composite_name: composite.composite_name.clone(),
        quantity,
        composite_total,
        extended_total: mul(composite_total, quantity)?,
        modules,
        subtotals: per_bundle.scaled(quantity)?,
    })
}
