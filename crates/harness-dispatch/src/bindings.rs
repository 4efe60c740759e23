//! Method surfaces of the SDK client and of the objects its calls return.

use std::collections::BTreeMap;

use futures_util::FutureExt;
use serde::Serialize;
use serde_json::Value;

use crate::{
    CallArgs, Capability, CapabilityTable, DispatchError, Entity, EntityClass, ParamKind,
    PreparedCall, Returned,
};

const NONE: &[ParamKind] = &[];
const USER: &[ParamKind] = &[ParamKind::User];
const USER_EVENT: &[ParamKind] = &[ParamKind::User, ParamKind::Event];
const VARIABLE: &[ParamKind] = &[ParamKind::User, ParamKind::String, ParamKind::Json];
const JSON: &[ParamKind] = &[ParamKind::Json];
const KEY: &[ParamKind] = &[ParamKind::String];

const CLIENT_METHODS: &[Capability] = &[
    Capability::new("Variable", VARIABLE, client_variable),
    Capability::new("VariableValue", VARIABLE, client_variable_value),
    Capability::new("AllVariables", USER, client_all_variables),
    Capability::new("AllFeatures", USER, client_all_features),
    Capability::new("Track", USER_EVENT, client_track),
    Capability::new("FlushEvents", NONE, client_flush_events),
    Capability::new("SetClientCustomData", JSON, client_set_custom_data),
    Capability::new("Close", NONE, client_close),
    Capability::new("IsInitialized", NONE, client_is_initialized),
];

const VARIABLE_METHODS: &[Capability] = &[
    Capability::new("Key", NONE, variable_key),
    Capability::new("Value", NONE, variable_value),
    Capability::new("DefaultValue", NONE, variable_default_value),
    Capability::new("Type", NONE, variable_type),
    Capability::new("IsDefaulted", NONE, variable_is_defaulted),
    Capability::new("Eval", NONE, variable_eval),
];

const READ_ONLY_VARIABLE_METHODS: &[Capability] = &[
    Capability::new("Key", NONE, read_only_key),
    Capability::new("Value", NONE, read_only_value),
    Capability::new("Type", NONE, read_only_type),
];

const FEATURE_METHODS: &[Capability] = &[
    Capability::new("Key", NONE, feature_key),
    Capability::new("Type", NONE, feature_type),
    Capability::new("VariationKey", NONE, feature_variation_key),
    Capability::new("VariationName", NONE, feature_variation_name),
];

const VARIABLE_MAP_METHODS: &[Capability] = &[
    Capability::new("Get", KEY, variable_map_get),
    Capability::new("Keys", NONE, variable_map_keys),
    Capability::new("Len", NONE, variable_map_len),
];

const FEATURE_MAP_METHODS: &[Capability] = &[
    Capability::new("Get", KEY, feature_map_get),
    Capability::new("Keys", NONE, feature_map_keys),
    Capability::new("Len", NONE, feature_map_len),
];

pub fn register_sdk_bindings(table: &mut CapabilityTable) {
    let surfaces = [
        (EntityClass::Client, CLIENT_METHODS),
        (EntityClass::Variable, VARIABLE_METHODS),
        (EntityClass::ReadOnlyVariable, READ_ONLY_VARIABLE_METHODS),
        (EntityClass::Feature, FEATURE_METHODS),
        (EntityClass::VariableMap, VARIABLE_MAP_METHODS),
        (EntityClass::FeatureMap, FEATURE_MAP_METHODS),
    ];
    for (class, methods) in surfaces {
        for capability in methods {
            table.register(class, *capability);
        }
    }
}

fn ready(returned: Returned) -> Result<PreparedCall, DispatchError> {
    Ok(futures_util::future::ready(Ok(returned)).boxed())
}

fn ready_value(value: impl Serialize) -> Result<PreparedCall, DispatchError> {
    ready(Returned::Value(serde_json::to_value(value)?))
}

fn client_variable(target: &Entity, args: CallArgs) -> Result<PreparedCall, DispatchError> {
    let client = target.expect_client()?;
    let (user, key, default_value) = (args.user(0)?, args.string(1)?, args.json(2)?);
    Ok(async move {
        client
            .variable(user, &key, default_value)
            .await
            .map(Returned::Variable)
    }
    .boxed())
}

fn client_variable_value(target: &Entity, args: CallArgs) -> Result<PreparedCall, DispatchError> {
    let client = target.expect_client()?;
    let (user, key, default_value) = (args.user(0)?, args.string(1)?, args.json(2)?);
    Ok(async move {
        client
            .variable_value(user, &key, default_value)
            .await
            .map(Returned::Value)
    }
    .boxed())
}

fn client_all_variables(target: &Entity, args: CallArgs) -> Result<PreparedCall, DispatchError> {
    let client = target.expect_client()?;
    let user = args.user(0)?;
    Ok(async move {
        client
            .all_variables(user)
            .await
            .map(Returned::VariableMap)
    }
    .boxed())
}

fn client_all_features(target: &Entity, args: CallArgs) -> Result<PreparedCall, DispatchError> {
    let client = target.expect_client()?;
    let user = args.user(0)?;
    Ok(async move { client.all_features(user).await.map(Returned::FeatureMap) }.boxed())
}

fn client_track(target: &Entity, args: CallArgs) -> Result<PreparedCall, DispatchError> {
    let client = target.expect_client()?;
    let (user, event) = (args.user(0)?, args.event(1)?);
    Ok(async move {
        client
            .track(user, event)
            .await
            .map(|accepted| Returned::Value(Value::Bool(accepted)))
    }
    .boxed())
}

fn client_flush_events(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    let client = target.expect_client()?;
    Ok(async move { client.flush_events().await.map(|()| Returned::Void) }.boxed())
}

fn client_set_custom_data(target: &Entity, args: CallArgs) -> Result<PreparedCall, DispatchError> {
    let client = target.expect_client()?;
    let data = args.json(0)?;
    Ok(async move {
        client
            .set_client_custom_data(data)
            .await
            .map(|()| Returned::Void)
    }
    .boxed())
}

fn client_close(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    let client = target.expect_client()?;
    Ok(async move { client.close().await.map(|()| Returned::Void) }.boxed())
}

fn client_is_initialized(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    let client = target.expect_client()?;
    Ok(async move { Ok(Returned::Value(Value::Bool(client.is_initialized().await))) }.boxed())
}

macro_rules! expect_variant {
    ($target:expr, $variant:ident) => {
        match $target.expect_returned()? {
            Returned::$variant(inner) => inner,
            other => {
                return Err(DispatchError::Invocation(format!(
                    "expected a {} target, found {}",
                    EntityClass::$variant.as_str(),
                    other.class().as_str()
                )))
            }
        }
    };
}

fn variable_key(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    ready_value(&expect_variant!(target, Variable).key)
}

fn variable_value(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    ready_value(&expect_variant!(target, Variable).value)
}

fn variable_default_value(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    ready_value(&expect_variant!(target, Variable).default_value)
}

fn variable_type(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    ready_value(expect_variant!(target, Variable).variable_type.as_str())
}

fn variable_is_defaulted(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    ready_value(expect_variant!(target, Variable).is_defaulted)
}

fn variable_eval(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    ready_value(&expect_variant!(target, Variable).eval)
}

fn read_only_key(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    ready_value(&expect_variant!(target, ReadOnlyVariable).key)
}

fn read_only_value(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    ready_value(&expect_variant!(target, ReadOnlyVariable).value)
}

fn read_only_type(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    ready_value(expect_variant!(target, ReadOnlyVariable).variable_type.as_str())
}

fn feature_key(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    ready_value(&expect_variant!(target, Feature).key)
}

fn feature_type(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    ready_value(&expect_variant!(target, Feature).feature_type)
}

fn feature_variation_key(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    ready_value(&expect_variant!(target, Feature).variation_key)
}

fn feature_variation_name(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    ready_value(&expect_variant!(target, Feature).variation_name)
}

fn map_keys<T>(map: &BTreeMap<String, T>) -> Result<PreparedCall, DispatchError> {
    ready_value(map.keys().collect::<Vec<_>>())
}

fn variable_map_get(target: &Entity, args: CallArgs) -> Result<PreparedCall, DispatchError> {
    let key = args.string(0)?;
    match expect_variant!(target, VariableMap).get(&key) {
        Some(variable) => ready(Returned::ReadOnlyVariable(variable.clone())),
        None => ready(Returned::Void),
    }
}

fn variable_map_keys(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    map_keys(expect_variant!(target, VariableMap))
}

fn variable_map_len(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    ready_value(expect_variant!(target, VariableMap).len())
}

fn feature_map_get(target: &Entity, args: CallArgs) -> Result<PreparedCall, DispatchError> {
    let key = args.string(0)?;
    match expect_variant!(target, FeatureMap).get(&key) {
        Some(feature) => ready(Returned::Feature(feature.clone())),
        None => ready(Returned::Void),
    }
}

fn feature_map_keys(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    map_keys(expect_variant!(target, FeatureMap))
}

fn feature_map_len(target: &Entity, _args: CallArgs) -> Result<PreparedCall, DispatchError> {
    ready_value(expect_variant!(target, FeatureMap).len())
}
