//! Priced lines of a module: materials and labor.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A material on a module's bill of quantities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialLine {
    #[serde(rename = "projectMaterialId", alias = "id")]
    pub id: i64,
    #[serde(default)]
    pub material_name: String,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    /// Cost-insurance-freight price, tracked alongside the unit price.
    pub cif_price: Option<Decimal>,
    pub handling_cost: Option<Decimal>,
    #[serde(rename = "taxRate", alias = "taxRatePercent")]
    pub tax_rate_percent: Option<Decimal>,
    /// Backend fields this service does not interpret, written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A labor line: hourly work plus a per-unit allowance (e.g. per diem).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaborLine {
    #[serde(rename = "moduleLaborId", alias = "id")]
    pub id: i64,
    #[serde(default)]
    pub labor_type: String,
    pub quantity: Option<Decimal>,
    pub hourly_rate: Option<Decimal>,
    pub hours_required: Option<Decimal>,
    pub allowance_amount: Option<Decimal>,
    pub allowance_quantity: Option<Decimal>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
