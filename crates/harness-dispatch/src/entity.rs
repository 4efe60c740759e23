use std::collections::BTreeMap;
use std::sync::Arc;

use harness_sdk::{Feature, ReadOnlyVariable, SdkClient, Variable};
use serde_json::Value;

use crate::DispatchError;

/// Capability surface an entity exposes to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityClass {
    Client,
    Variable,
    ReadOnlyVariable,
    Feature,
    VariableMap,
    FeatureMap,
    Value,
    Void,
}

impl EntityClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "Client",
            Self::Variable => "Variable",
            Self::ReadOnlyVariable => "ReadOnlyVariable",
            Self::Feature => "Feature",
            Self::VariableMap => "VariableMap",
            Self::FeatureMap => "FeatureMap",
            Self::Value => "Value",
            Self::Void => "Void",
        }
    }
}

/// Primary value produced by an invoked capability.
#[derive(Debug, Clone, PartialEq)]
pub enum Returned {
    Variable(Variable),
    ReadOnlyVariable(ReadOnlyVariable),
    Feature(Feature),
    VariableMap(BTreeMap<String, ReadOnlyVariable>),
    FeatureMap(BTreeMap<String, Feature>),
    Value(Value),
    Void,
}

impl Returned {
    pub fn class(&self) -> EntityClass {
        match self {
            Self::Variable(_) => EntityClass::Variable,
            Self::ReadOnlyVariable(_) => EntityClass::ReadOnlyVariable,
            Self::Feature(_) => EntityClass::Feature,
            Self::VariableMap(_) => EntityClass::VariableMap,
            Self::FeatureMap(_) => EntityClass::FeatureMap,
            Self::Value(_) => EntityClass::Value,
            Self::Void => EntityClass::Void,
        }
    }
}

/// Addressable server-side object owned by the entity store.
#[derive(Debug, Clone)]
pub enum Entity {
    Client(Arc<SdkClient>),
    Result(Arc<Returned>),
}

impl Entity {
    pub fn class(&self) -> EntityClass {
        match self {
            Self::Client(_) => EntityClass::Client,
            Self::Result(returned) => returned.class(),
        }
    }

    pub fn expect_client(&self) -> Result<Arc<SdkClient>, DispatchError> {
        match self {
            Self::Client(client) => Ok(Arc::clone(client)),
            Self::Result(returned) => Err(DispatchError::Invocation(format!(
                "expected a Client target, found {}",
                returned.class().as_str()
            ))),
        }
    }

    pub fn expect_returned(&self) -> Result<&Returned, DispatchError> {
        match self {
            Self::Result(returned) => Ok(returned.as_ref()),
            Self::Client(_) => Err(DispatchError::Invocation(
                "expected a result target, found Client".to_string(),
            )),
        }
    }
}
