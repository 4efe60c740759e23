use std::sync::Arc;

use serde_json::Value;

use crate::{CallOutcome, DispatchError, Returned};

/// Coarse type label reported in the location response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Variable,
    Object,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Variable => "Variable",
            Self::Object => "Object",
        }
    }
}

/// Normalized call result, ready to be stored and reported.
#[derive(Debug, Clone)]
pub struct Classified {
    pub kind: EntityKind,
    pub data: Value,
    pub entity: Arc<Returned>,
}

/// Labels and serializes a call outcome. A callee error downgrades the whole
/// outcome to a recoverable fault.
pub fn classify(outcome: CallOutcome) -> Result<Classified, DispatchError> {
    let returned = outcome?;
    let kind = match returned {
        Returned::Variable(_) => EntityKind::Variable,
        _ => EntityKind::Object,
    };
    let data = match &returned {
        Returned::Variable(variable) => serde_json::to_value(variable)?,
        Returned::ReadOnlyVariable(variable) => serde_json::to_value(variable)?,
        Returned::Feature(feature) => serde_json::to_value(feature)?,
        Returned::VariableMap(variables) if variables.is_empty() => Value::Null,
        Returned::VariableMap(variables) => serde_json::to_value(variables)?,
        Returned::FeatureMap(features) if features.is_empty() => Value::Null,
        Returned::FeatureMap(features) => serde_json::to_value(features)?,
        Returned::Value(value) => value.clone(),
        Returned::Void => Value::Null,
    };
    Ok(Classified {
        kind,
        data,
        entity: Arc::new(returned),
    })
}
