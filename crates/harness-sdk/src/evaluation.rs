use serde_json::Value;

use crate::{BucketedConfig, EvalReason, SdkError, Variable, VariableType};

const MISSING_CONFIG_DETAILS: &str = "Missing Config";
const USER_NOT_TARGETED_DETAILS: &str = "User Not Targeted";
const TYPE_MISMATCH_DETAILS: &str = "Variable Type Mismatch";

/// Evaluates `key` against a bucketed config, falling back to `default_value`.
///
/// The default is returned (with `is_defaulted = true`) when no config is
/// loaded, when the variable is absent, or when the configured value does not
/// share the default's type.
pub fn evaluate_variable(
    config: Option<&BucketedConfig>,
    key: &str,
    default_value: Value,
) -> Result<Variable, SdkError> {
    if key.trim().is_empty() {
        return Err(SdkError::MissingVariableKey);
    }
    let Some(variable_type) = VariableType::of(&default_value) else {
        return Err(SdkError::MissingDefaultValue(key.to_string()));
    };

    let defaulted = |details: &str| Variable {
        key: key.to_string(),
        variable_type,
        value: default_value.clone(),
        default_value: default_value.clone(),
        is_defaulted: true,
        eval: Some(EvalReason::defaulted(details)),
    };

    let Some(config) = config else {
        return Ok(defaulted(MISSING_CONFIG_DETAILS));
    };
    let Some(configured) = config.variables.get(key) else {
        return Ok(defaulted(USER_NOT_TARGETED_DETAILS));
    };
    if configured.variable_type != variable_type
        || VariableType::of(&configured.value) != Some(variable_type)
    {
        return Ok(defaulted(TYPE_MISMATCH_DETAILS));
    }

    Ok(Variable {
        key: key.to_string(),
        variable_type,
        value: configured.value.clone(),
        default_value,
        is_defaulted: false,
        eval: configured.eval.clone(),
    })
}
