//! Module bundles ("composites") inside a project.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ModuleAggregate;

/// A module used as one ingredient of a bundle.
///
/// `quantity` is the bundle-level multiplier; the inner module's own quantity
/// is not applied on top of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeDetail {
    pub module_id: i64,
    pub quantity: Option<Decimal>,
    pub module: ModuleAggregate,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A bundle instance inside a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeAggregate {
    #[serde(rename = "moduleCompositeId", alias = "compositeId")]
    pub composite_id: i64,
    #[serde(default)]
    pub composite_name: String,
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub composite_details: Vec<CompositeDetail>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
