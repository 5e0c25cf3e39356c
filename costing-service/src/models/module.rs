//! Module instances inside a project.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{LaborLine, MaterialLine};

/// One module used in a project, with its own material and labor lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleAggregate {
    pub module_id: i64,
    #[serde(default)]
    pub module_name: String,
    /// Categorical tag ("Electrical", "Plumbing") used for the system breakdown.
    #[serde(default)]
    pub system_name: String,
    pub quantity: Option<Decimal>,
    #[serde(default, rename = "moduleMaterials", alias = "materialLines")]
    pub material_lines: Vec<MaterialLine>,
    #[serde(default, rename = "moduleLabors", alias = "laborLines")]
    pub labor_lines: Vec<LaborLine>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModuleAggregate {
    /// A module with neither materials nor labor has nothing to review.
    pub fn is_empty(&self) -> bool {
        self.material_lines.is_empty() && self.labor_lines.is_empty()
    }
}
