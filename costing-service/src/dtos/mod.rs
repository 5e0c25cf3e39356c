use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

use crate::services::AdjustmentScope;

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustRequest {
    pub scope: AdjustmentScope,
    /// Signed percentage; `5` raises prices by 5%, `-5` lowers them.
    #[validate(custom(function = "validate_percent"))]
    pub percent: Decimal,
}

fn validate_percent(percent: &Decimal) -> Result<(), ValidationError> {
    if *percent < -Decimal::ONE_HUNDRED || *percent > Decimal::ONE_HUNDRED {
        let mut err = ValidationError::new("percent_range");
        err.message = Some("Percent must be between -100 and 100".into());
        return Err(err);
    }
    Ok(())
}

/// Raw form inputs keyed by field key. Strings are parsed as currency
/// amounts; numbers are taken as-is and `null` clears the field.
#[derive(Debug, Deserialize)]
pub struct EditFieldsRequest {
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl EditFieldsRequest {
    /// Normalize every input to the text a user would have typed.
    pub fn into_inputs(self) -> Result<BTreeMap<String, String>, String> {
        self.fields
            .into_iter()
            .map(|(key, value)| match value {
                serde_json::Value::String(raw) => Ok((key, raw)),
                serde_json::Value::Number(number) => Ok((key, number.to_string())),
                serde_json::Value::Null => Ok((key, String::new())),
                other => Err(format!("Field {} has an unsupported value: {}", key, other)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn percent_outside_range_is_rejected() {
        let request: AdjustRequest =
            serde_json::from_value(json!({ "scope": "materials", "percent": -101 })).unwrap();
        assert!(request.validate().is_err());

        let request: AdjustRequest =
            serde_json::from_value(json!({ "scope": "all", "percent": 7.5 })).unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.scope, AdjustmentScope::All);
    }

    #[test]
    fn edit_inputs_accept_strings_numbers_and_null() {
        let request: EditFieldsRequest = serde_json::from_value(json!({
            "fields": {
                "profitMargin": "$ 1,200.50",
                "material_1_2_unitPrice_0": 12.5,
                "labor_1_3_hourlyRate_0": null
            }
        }))
        .unwrap();

        let inputs = request.into_inputs().unwrap();
        assert_eq!(inputs["profitMargin"], "$ 1,200.50");
        assert_eq!(inputs["material_1_2_unitPrice_0"], "12.5");
        assert_eq!(inputs["labor_1_3_hourlyRate_0"], "");
    }

    #[test]
    fn edit_inputs_reject_objects() {
        let request: EditFieldsRequest =
            serde_json::from_value(json!({ "fields": { "profitMargin": { "v": 1 } } })).unwrap();
        assert!(request.into_inputs().is_err());
    }
}
