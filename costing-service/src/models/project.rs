//! The full cost tree of one project as exchanged with the costs backend.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{CompositeAggregate, ModuleAggregate};

/// Body of `GET`/`PUT /projectdetails/{projectId}/costs`.
///
/// Always fetched and saved whole; never partially persisted. Fields are
/// written back under the backend's names (`moduleMaterials`, `taxRate`,
/// `projectMaterialId` and so on); the plain model names are accepted on input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRollup {
    #[serde(default)]
    pub modules: Vec<ModuleAggregate>,
    #[serde(default)]
    pub modules_composite: Vec<CompositeAggregate>,
    #[serde(rename = "profitMargin", alias = "profitMarginPercent")]
    pub profit_margin_percent: Option<Decimal>,
    #[serde(rename = "distance", alias = "distanceKm")]
    pub distance_km: Option<Decimal>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
