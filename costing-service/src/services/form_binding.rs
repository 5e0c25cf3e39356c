//! Flat, editable view of a rollup's price fields.
//!
//! Every editable leaf field gets a [`FieldKey`]. Loading flattens the rollup
//! into [`FormValues`]; saving merges the (possibly edited) values back into a
//! copy of the rollup, falling back to the line's own value for absent keys.
//!
//! Keys of lines that belong to a bundle carry the bundle id, so a module used
//! both standalone and inside a bundle gets two distinct sets of keys.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::models::{LaborLine, MaterialLine, ModuleAggregate, ProjectRollup};

const PROFIT_MARGIN_KEY: &str = "profitMargin";
const COMPOSITE_PREFIX: &str = "composite";

/// The module (and bundle, if any) a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LineOwner {
    Module { module_id: i64 },
    Composite { composite_id: i64, module_id: i64 },
}

impl LineOwner {
    pub fn module_id(&self) -> i64 {
        match self {
            LineOwner::Module { module_id } | LineOwner::Composite { module_id, .. } => *module_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MaterialField {
    UnitPrice,
    CifPrice,
    HandlingCost,
    TaxRatePercent,
}

impl MaterialField {
    pub const ALL: [MaterialField; 4] = [
        MaterialField::UnitPrice,
        MaterialField::CifPrice,
        MaterialField::HandlingCost,
        MaterialField::TaxRatePercent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialField::UnitPrice => "unitPrice",
            MaterialField::CifPrice => "cifPrice",
            MaterialField::HandlingCost => "handlingCost",
            MaterialField::TaxRatePercent => "taxRatePercent",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            MaterialField::UnitPrice => "unit price",
            MaterialField::CifPrice => "CIF price",
            MaterialField::HandlingCost => "handling cost",
            MaterialField::TaxRatePercent => "tax rate",
        }
    }

    fn value(&self, line: &MaterialLine) -> Option<Decimal> {
        match self {
            MaterialField::UnitPrice => line.unit_price,
            MaterialField::CifPrice => line.cif_price,
            MaterialField::HandlingCost => line.handling_cost,
            MaterialField::TaxRatePercent => line.tax_rate_percent,
        }
    }

    fn slot<'a>(&self, line: &'a mut MaterialLine) -> &'a mut Option<Decimal> {
        match self {
            MaterialField::UnitPrice => &mut line.unit_price,
            MaterialField::CifPrice => &mut line.cif_price,
            MaterialField::HandlingCost => &mut line.handling_cost,
            MaterialField::TaxRatePercent => &mut line.tax_rate_percent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LaborField {
    HourlyRate,
    AllowanceAmount,
}

impl LaborField {
    pub const ALL: [LaborField; 2] = [LaborField::HourlyRate, LaborField::AllowanceAmount];

    pub fn as_str(&self) -> &'static str {
        match self {
            LaborField::HourlyRate => "hourlyRate",
            LaborField::AllowanceAmount => "allowanceAmount",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            LaborField::HourlyRate => "hourly rate",
            LaborField::AllowanceAmount => "allowance amount",
        }
    }

    fn value(&self, line: &LaborLine) -> Option<Decimal> {
        match self {
            LaborField::HourlyRate => line.hourly_rate,
            LaborField::AllowanceAmount => line.allowance_amount,
        }
    }

    fn slot<'a>(&self, line: &'a mut LaborLine) -> &'a mut Option<Decimal> {
        match self {
            LaborField::HourlyRate => &mut line.hourly_rate,
            LaborField::AllowanceAmount => &mut line.allowance_amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LineField {
    Material(MaterialField),
    Labor(LaborField),
}

impl LineField {
    fn kind(&self) -> &'static str {
        match self {
            LineField::Material(_) => "material",
            LineField::Labor(_) => "labor",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            LineField::Material(field) => field.as_str(),
            LineField::Labor(field) => field.as_str(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            LineField::Material(field) => field.label(),
            LineField::Labor(field) => field.label(),
        }
    }

    fn parse(kind: &str, name: &str) -> Option<Self> {
        match kind {
            "material" => MaterialField::ALL
                .into_iter()
                .find(|f| f.as_str() == name)
                .map(LineField::Material),
            "labor" => LaborField::ALL
                .into_iter()
                .find(|f| f.as_str() == name)
                .map(LineField::Labor),
            _ => None,
        }
    }
}

/// Address of one editable value.
///
/// String form: `profitMargin`, `material_{moduleId}_{lineId}_{field}_{index}`,
/// `labor_{moduleId}_{lineId}_{field}_{index}`, and the same line keys
/// prefixed with `composite_{compositeId}_` for lines inside a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKey {
    ProfitMargin,
    Line {
        owner: LineOwner,
        line_id: i64,
        /// Position of the line within its module's material or labor list.
        index: usize,
        field: LineField,
    },
}

impl FieldKey {
    fn label(&self) -> &'static str {
        match self {
            FieldKey::ProfitMargin => "profit margin",
            FieldKey::Line { field, .. } => field.label(),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::ProfitMargin => f.write_str(PROFIT_MARGIN_KEY),
            FieldKey::Line {
                owner,
                line_id,
                index,
                field,
            } => {
                if let LineOwner::Composite { composite_id, .. } = owner {
                    write!(f, "{}_{}_", COMPOSITE_PREFIX, composite_id)?;
                }
                write!(
                    f,
                    "{}_{}_{}_{}_{}",
                    field.kind(),
                    owner.module_id(),
                    line_id,
                    field.name(),
                    index
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognised form field key: {0}")]
pub struct FieldKeyParseError(pub String);

impl FromStr for FieldKey {
    type Err = FieldKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == PROFIT_MARGIN_KEY {
            return Ok(FieldKey::ProfitMargin);
        }

        let err = || FieldKeyParseError(s.to_string());
        let parts: Vec<&str> = s.split('_').collect();

        let (composite_id, rest) = match parts.as_slice() {
            [prefix, composite_id, rest @ ..] if *prefix == COMPOSITE_PREFIX => {
                (Some(composite_id.parse::<i64>().map_err(|_| err())?), rest)
            }
            rest => (None, rest),
        };

        let [kind, module_id, line_id, name, index] = rest else {
            return Err(err());
        };

        let module_id = module_id.parse::<i64>().map_err(|_| err())?;
        let owner = match composite_id {
            Some(composite_id) => LineOwner::Composite {
                composite_id,
                module_id,
            },
            None => LineOwner::Module { module_id },
        };

        Ok(FieldKey::Line {
            owner,
            line_id: line_id.parse().map_err(|_| err())?,
            index: index.parse().map_err(|_| err())?,
            field: LineField::parse(kind, name).ok_or_else(err)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    #[error("'{0}' is not a valid amount")]
    Malformed(String),

    #[error("'{0}' cannot be negative")]
    Negative(String),
}

/// Parse a currency-formatted amount such as `$ 1,234.50`.
///
/// Currency symbols, whitespace and thousands separators are stripped.
/// Returns `Ok(None)` for an empty input.
pub fn parse_amount(raw: &str) -> Result<Option<Decimal>, AmountParseError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Ok(None);
    }

    let value =
        Decimal::from_str(&cleaned).map_err(|_| AmountParseError::Malformed(raw.to_string()))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AmountParseError::Negative(raw.to_string()));
    }

    Ok(Some(value))
}

/// What the form currently holds for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldInput {
    Value(Decimal),
    Empty,
    Invalid(AmountParseError),
}

impl FieldInput {
    pub fn parse(raw: &str) -> Self {
        match parse_amount(raw) {
            Ok(Some(value)) => FieldInput::Value(value),
            Ok(None) => FieldInput::Empty,
            Err(e) => FieldInput::Invalid(e),
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        match self {
            FieldInput::Value(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<Option<Decimal>> for FieldInput {
    fn from(value: Option<Decimal>) -> Self {
        value.map(FieldInput::Value).unwrap_or(FieldInput::Empty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    Required,
    Invalid,
}

impl FieldErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldErrorKind::Required => "required",
            FieldErrorKind::Invalid => "invalid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub key: String,
    pub message: String,
    #[serde(skip)]
    pub kind: FieldErrorKind,
}

impl FieldError {
    fn required(key: &FieldKey) -> Self {
        Self {
            key: key.to_string(),
            message: format!("Please enter {}", key.label()),
            kind: FieldErrorKind::Required,
        }
    }

    fn invalid(key: &FieldKey, error: &AmountParseError) -> Self {
        Self {
            key: key.to_string(),
            message: format!("{}: {}", key.label(), error),
            kind: FieldErrorKind::Invalid,
        }
    }
}

/// Flat field values bound to a rollup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    fields: BTreeMap<FieldKey, FieldInput>,
}

impl FormValues {
    pub fn get(&self, key: &FieldKey) -> Option<&FieldInput> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &FieldKey) -> bool {
        self.fields.contains_key(key)
    }

    pub fn set(&mut self, key: FieldKey, input: FieldInput) {
        self.fields.insert(key, input);
    }

    /// Drop a field; saving then keeps the line's last-known value.
    pub fn remove(&mut self, key: &FieldKey) -> Option<FieldInput> {
        self.fields.remove(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &FieldInput)> {
        self.fields.iter()
    }

    /// String-keyed values for rendering; empty or invalid inputs are `null`.
    pub fn to_wire(&self) -> BTreeMap<String, Option<Decimal>> {
        self.fields
            .iter()
            .map(|(key, input)| (key.to_string(), input.value()))
            .collect()
    }
}

fn owned_modules(rollup: &ProjectRollup) -> impl Iterator<Item = (LineOwner, &ModuleAggregate)> {
    let standalone = rollup
        .modules
        .iter()
        .map(|m| (LineOwner::Module { module_id: m.module_id }, m));

    let bundled = rollup.modules_composite.iter().flat_map(|composite| {
        let composite_id = composite.composite_id;
        composite.composite_details.iter().map(move |detail| {
            let owner = LineOwner::Composite {
                composite_id,
                module_id: detail.module.module_id,
            };
            (owner, &detail.module)
        })
    });

    standalone.chain(bundled)
}

fn owned_modules_mut(
    rollup: &mut ProjectRollup,
) -> impl Iterator<Item = (LineOwner, &mut ModuleAggregate)> {
    let ProjectRollup {
        modules,
        modules_composite,
        ..
    } = rollup;

    let standalone = modules
        .iter_mut()
        .map(|m| (LineOwner::Module { module_id: m.module_id }, m));

    let bundled = modules_composite.iter_mut().flat_map(|composite| {
        let composite_id = composite.composite_id;
        composite.composite_details.iter_mut().map(move |detail| {
            let owner = LineOwner::Composite {
                composite_id,
                module_id: detail.module.module_id,
            };
            (owner, &mut detail.module)
        })
    });

    standalone.chain(bundled)
}

/// Project every editable value of `rollup` into the flat key space.
pub fn flatten(rollup: &ProjectRollup) -> FormValues {
    let mut form = FormValues::default();

    for (owner, module) in owned_modules(rollup) {
        for (index, line) in module.material_lines.iter().enumerate() {
            for field in MaterialField::ALL {
                let key = FieldKey::Line {
                    owner,
                    line_id: line.id,
                    index,
                    field: LineField::Material(field),
                };
                form.set(key, field.value(line).into());
            }
        }
        for (index, line) in module.labor_lines.iter().enumerate() {
            for field in LaborField::ALL {
                let key = FieldKey::Line {
                    owner,
                    line_id: line.id,
                    index,
                    field: LineField::Labor(field),
                };
                form.set(key, field.value(line).into());
            }
        }
    }

    form.set(FieldKey::ProfitMargin, rollup.profit_margin_percent.into());
    form
}

/// Merge `form` into a copy of `rollup`.
///
/// Absent keys keep the line's value. Empty or invalid inputs, and absent keys
/// over a missing line value, are reported together as field errors.
pub fn reconstitute(
    rollup: &ProjectRollup,
    form: &FormValues,
) -> Result<ProjectRollup, Vec<FieldError>> {
    let mut merged = rollup.clone();
    let mut errors = Vec::new();

    for (owner, module) in owned_modules_mut(&mut merged) {
        for (index, line) in module.material_lines.iter_mut().enumerate() {
            let line_id = line.id;
            for field in MaterialField::ALL {
                let key = FieldKey::Line {
                    owner,
                    line_id,
                    index,
                    field: LineField::Material(field),
                };
                merge_field(&key, field.slot(line), form, &mut errors);
            }
        }
        for (index, line) in module.labor_lines.iter_mut().enumerate() {
            let line_id = line.id;
            for field in LaborField::ALL {
                let key = FieldKey::Line {
                    owner,
                    line_id,
                    index,
                    field: LineField::Labor(field),
                };
                merge_field(&key, field.slot(line), form, &mut errors);
            }
        }
    }

    merge_field(
        &FieldKey::ProfitMargin,
        &mut merged.profit_margin_percent,
        form,
        &mut errors,
    );

    if errors.is_empty() {
        Ok(merged)
    } else {
        Err(errors)
    }
}

fn merge_field(
    key: &FieldKey,
    slot: &mut Option<Decimal>,
    form: &FormValues,
    errors: &mut Vec<FieldError>,
) {
    match form.get(key) {
        Some(FieldInput::Value(value)) => *slot = Some(*value),
        Some(FieldInput::Empty) => errors.push(FieldError::required(key)),
        Some(FieldInput::Invalid(e)) => errors.push(FieldError::invalid(key, e)),
        None if slot.is_none() => errors.push(FieldError::required(key)),
        None => {}
    }
}
