//! Bulk percentage adjustment of prices and rates.
//!
//! Adjustments compound: each one applies to the current, possibly already
//! adjusted, values. Undoing means refetching the rollup from the backend.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::costing::CostOverflow;
use crate::models::{LaborLine, MaterialLine, ModuleAggregate, ProjectRollup};

const MONEY_DECIMAL_PLACES: u32 = 2;

/// Which lines a bulk adjustment touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentScope {
    Materials,
    Labor,
    All,
}

impl AdjustmentScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentScope::Materials => "materials",
            AdjustmentScope::Labor => "labor",
            AdjustmentScope::All => "all",
        }
    }

    fn includes_materials(&self) -> bool {
        matches!(self, AdjustmentScope::Materials | AdjustmentScope::All)
    }

    fn includes_labor(&self) -> bool {
        matches!(self, AdjustmentScope::Labor | AdjustmentScope::All)
    }
}

impl std::fmt::Display for AdjustmentScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustmentPolicy {
    /// Scale `taxRatePercent` along with the material prices.
    pub scale_tax_rate: bool,
}

impl Default for AdjustmentPolicy {
    fn default() -> Self {
        Self {
            scale_tax_rate: true,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdjustmentError {
    #[error("Adjustment of {0}% would make prices negative")]
    BelowMinusHundred(Decimal),

    #[error("Adjustment takes prices or totals beyond the supported range")]
    Overflow,
}

impl From<CostOverflow> for AdjustmentError {
    fn from(_: CostOverflow) -> Self {
        AdjustmentError::Overflow
    }
}

/// Round half away from zero to cents.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Return a copy of `rollup` with every in-scope price scaled by `percent`.
///
/// Materials: unit price, CIF price, handling cost and (per policy) tax rate.
/// Labor: hourly rate and allowance amount. Hours and allowance quantities
/// never change. Each field is rounded to cents independently; `null` fields
/// stay `null`. A price that no longer fits a `Decimal` fails the whole
/// adjustment with [`AdjustmentError::Overflow`].
pub fn adjust(
    rollup: &ProjectRollup,
    scope: AdjustmentScope,
    percent: Decimal,
    policy: AdjustmentPolicy,
) -> Result<ProjectRollup, AdjustmentError> {
    if percent < -Decimal::ONE_HUNDRED {
        return Err(AdjustmentError::BelowMinusHundred(percent));
    }

    let factor = Decimal::ONE
        .checked_add(percent / Decimal::ONE_HUNDRED)
        .ok_or(AdjustmentError::Overflow)?;
    let mut adjusted = rollup.clone();

    for module in adjusted.modules.iter_mut() {
        adjust_module(module, scope, factor, policy)?;
    }
    for composite in adjusted.modules_composite.iter_mut() {
        for detail in composite.composite_details.iter_mut() {
            adjust_module(&mut detail.module, scope, factor, policy)?;
        }
    }

    Ok(adjusted)
}

fn adjust_module(
    module: &mut ModuleAggregate,
    scope: AdjustmentScope,
    factor: Decimal,
    policy: AdjustmentPolicy,
) -> Result<(), AdjustmentError> {
    if scope.includes_materials() {
        for line in module.material_lines.iter_mut() {
            adjust_material(line, factor, policy)?;
        }
    }
    if scope.includes_labor() {
        for line in module.labor_lines.iter_mut() {
            adjust_labor(line, factor)?;
        }
    }
    Ok(())
}

fn adjust_material(
    line: &mut MaterialLine,
    factor: Decimal,
    policy: AdjustmentPolicy,
) -> Result<(), AdjustmentError> {
    scale(&mut line.unit_price, factor)?;
    scale(&mut line.cif_price, factor)?;
    scale(&mut line.handling_cost, factor)?;
    if policy.scale_tax_rate {
        scale(&mut line.tax_rate_percent, factor)?;
    }
    Ok(())
}

fn adjust_labor(line: &mut LaborLine, factor: Decimal) -> Result<(), AdjustmentError> {
    scale(&mut line.hourly_rate, factor)?;
    scale(&mut line.allowance_amount, factor)
}

fn scale(field: &mut Option<Decimal>, factor: Decimal) -> Result<(), AdjustmentError> {
    if let Some(value) = field.as_mut() {
        let scaled = value.checked_mul(factor).ok_or(AdjustmentError::Overflow)?;
        *value = round2(scaled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompositeAggregate, CompositeDetail};
    use std::str::FromStr;

    fn d(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn sample_module() -> ModuleAggregate {
        ModuleAggregate {
            module_id: 1,
            quantity: Some(d("1")),
            material_lines: vec![MaterialLine {
                id: 11,
                quantity: Some(d("2")),
                unit_price: Some(d("100")),
                cif_price: Some(d("80")),
                handling_cost: Some(d("3.33")),
                tax_rate_percent: Some(d("10")),
                ..Default::default()
            }],
            labor_lines: vec![LaborLine {
                id: 21,
                quantity: Some(d("1")),
                hourly_rate: Some(d("40")),
                hours_required: Some(d("8")),
                allowance_amount: Some(d("12.5")),
                allowance_quantity: Some(d("2")),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn sample_rollup() -> ProjectRollup {
        ProjectRollup {
            modules: vec![sample_module()],
            modules_composite: vec![CompositeAggregate {
                composite_id: 9,
                quantity: Some(d("1")),
                composite_details: vec![CompositeDetail {
                    module_id: 1,
                    quantity: Some(d("1")),
                    module: sample_module(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            profit_margin_percent: Some(d("15")),
            ..Default::default()
        }
    }

    #[test]
    fn adjustments_compound_rather_than_revert() {
        let rollup = sample_rollup();
        let policy = AdjustmentPolicy::default();

        let up = adjust(&rollup, AdjustmentScope::All, d("5"), policy).unwrap();
        assert_eq!(up.modules[0].material_lines[0].unit_price, Some(d("105.00")));

        let down = adjust(&up, AdjustmentScope::All, d("-5"), policy).unwrap();
        assert_eq!(down.modules[0].material_lines[0].unit_price, Some(d("99.75")));
    }

    #[test]
    fn labor_scope_leaves_materials_untouched() {
        let rollup = sample_rollup();
        let adjusted =
            adjust(&rollup, AdjustmentScope::Labor, d("10"), AdjustmentPolicy::default()).unwrap();

        let before = &rollup.modules[0];
        let after = &adjusted.modules[0];
        assert_eq!(after.material_lines, before.material_lines);
        assert_eq!(after.labor_lines[0].hourly_rate, Some(d("44")));
        assert_eq!(after.labor_lines[0].allowance_amount, Some(d("13.75")));
        assert_eq!(after.labor_lines[0].hours_required, Some(d("8")));
        assert_eq!(after.labor_lines[0].allowance_quantity, Some(d("2")));

        let bundled = &adjusted.modules_composite[0].composite_details[0].module;
        assert_eq!(bundled.labor_lines[0].hourly_rate, Some(d("44")));
        assert_eq!(bundled.material_lines, before.material_lines);
    }

    #[test]
    fn material_scope_scales_all_price_fields_and_rounds_each() {
        let rollup = sample_rollup();
        let adjusted = adjust(
            &rollup,
            AdjustmentScope::Materials,
            d("1"),
            AdjustmentPolicy::default(),
        )
        .unwrap();

        let line = &adjusted.modules_composite[0].composite_details[0].module.material_lines[0];
        assert_eq!(line.unit_price, Some(d("101")));
        assert_eq!(line.cif_price, Some(d("80.8")));
        // 3.33 × 1.01 = 3.3633
        assert_eq!(line.handling_cost, Some(d("3.36")));
        assert_eq!(line.tax_rate_percent, Some(d("10.1")));
        assert_eq!(line.quantity, Some(d("2")));
        assert_eq!(adjusted.modules[0].labor_lines, rollup.modules[0].labor_lines);
    }

    #[test]
    fn policy_can_keep_tax_rate() {
        let policy = AdjustmentPolicy {
            scale_tax_rate: false,
        };
        let adjusted = adjust(&sample_rollup(), AdjustmentScope::All, d("5"), policy).unwrap();
        assert_eq!(
            adjusted.modules[0].material_lines[0].tax_rate_percent,
            Some(d("10"))
        );
    }

    #[test]
    fn totals_follow_adjusted_fields() {
        let rollup = sample_rollup();
        let adjusted =
            adjust(&rollup, AdjustmentScope::Materials, d("5"), AdjustmentPolicy::default())
                .unwrap();

        // 105 × 2 per module, once standalone and once bundled
        assert_eq!(adjusted.totals().unwrap().total_materials, d("420"));
        assert_eq!(rollup.totals().unwrap().total_materials, d("400"));
    }

    #[test]
    fn null_prices_stay_null() {
        let mut rollup = sample_rollup();
        rollup.modules[0].material_lines[0].cif_price = None;

        let adjusted =
            adjust(&rollup, AdjustmentScope::All, d("5"), AdjustmentPolicy::default()).unwrap();
        assert_eq!(adjusted.modules[0].material_lines[0].cif_price, None);
    }

    #[test]
    fn rejects_adjustment_below_minus_hundred() {
        let result = adjust(
            &sample_rollup(),
            AdjustmentScope::All,
            d("-101"),
            AdjustmentPolicy::default(),
        );
        assert_eq!(result, Err(AdjustmentError::BelowMinusHundred(d("-101"))));
    }

    #[test]
    fn round2_is_half_away_from_zero() {
        assert_eq!(round2(d("2.345")), d("2.35"));
        assert_eq!(round2(d("-2.345")), d("-2.35"));
        assert_eq!(round2(d("2.344")), d("2.34"));
    }

    #[test]
    fn price_beyond_decimal_range_fails_the_adjustment() {
        let mut rollup = sample_rollup();
        rollup.modules[0].material_lines[0].unit_price = Some(d("50000000000000000000000000000"));

        let result = adjust(
            &rollup,
            AdjustmentScope::Materials,
            d("100"),
            AdjustmentPolicy::default(),
        );
        assert_eq!(result, Err(AdjustmentError::Overflow));
    }

    #[test]
    fn repeated_doubling_stops_with_an_error() {
        let policy = AdjustmentPolicy::default();
        let mut rollup = sample_rollup();

        let mut doublings = 0;
        let err = loop {
            match adjust(&rollup, AdjustmentScope::All, d("100"), policy) {
                Ok(next) => {
                    rollup = next;
                    doublings += 1;
                }
                Err(err) => break err,
            }
            assert!(doublings < 200, "prices never overflowed");
        };

        assert_eq!(err, AdjustmentError::Overflow);
        assert!(doublings > 50);
    }
}
