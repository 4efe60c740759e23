use serde_json::Value;

use crate::{
    Argument, CallArg, CallArgs, CallOutcome, Capability, CapabilityTable, DispatchError, Entity,
    EntityClass, ParamKind,
};

/// Resolves `command` on `target`, coerces `arguments` to its declared
/// parameters, and runs it.
///
/// The outer error is a dispatch fault (unknown method, argument mismatch);
/// the inner [`CallOutcome`] carries the callee's own result or error.
pub async fn invoke(
    table: &CapabilityTable,
    target: &Entity,
    target_is_client: bool,
    command: &str,
    arguments: Vec<Argument>,
) -> Result<CallOutcome, DispatchError> {
    let class = target.class();
    if target_is_client != (class == EntityClass::Client) {
        return Err(DispatchError::Invocation(format!(
            "address does not match target kind {}",
            class.as_str()
        )));
    }

    let capability = table.resolve(class, command)?;
    tracing::debug!(
        method = capability.name,
        class = class.as_str(),
        arguments = arguments.len(),
        "invoking capability"
    );
    let args = coerce_arguments(capability, arguments)?;
    let call = (capability.handler)(target, args)?;
    Ok(call.await)
}

/// Matches positional arguments against the capability's declared kinds,
/// replacing placeholders with the kind's zero value.
pub fn coerce_arguments(
    capability: &Capability,
    arguments: Vec<Argument>,
) -> Result<CallArgs, DispatchError> {
    if arguments.len() != capability.params.len() {
        return Err(DispatchError::Invocation(format!(
            "{} expects {} arguments, got {}",
            capability.name,
            capability.params.len(),
            arguments.len()
        )));
    }

    capability
        .params
        .iter()
        .zip(arguments)
        .enumerate()
        .map(|(index, (kind, argument))| {
            coerce(*kind, argument).map_err(|found| {
                DispatchError::Invocation(format!(
                    "{} argument {index}: expected {}, got {found}",
                    capability.name,
                    kind.as_str()
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(CallArgs::new)
}

fn coerce(kind: ParamKind, argument: Argument) -> Result<CallArg, &'static str> {
    match (kind, argument) {
        (kind, Argument::Placeholder) => Ok(kind.zero_value()),
        (ParamKind::User, Argument::User(user)) => Ok(CallArg::User(user)),
        (ParamKind::Event, Argument::Event(event)) => Ok(CallArg::Event(event)),
        (_, Argument::User(_)) => Err("user"),
        (_, Argument::Event(_)) => Err("event"),
        (ParamKind::Json, Argument::Value(value)) => Ok(CallArg::Json(value)),
        (ParamKind::String, Argument::Value(Value::String(text))) => Ok(CallArg::String(text)),
        (ParamKind::Bool, Argument::Value(Value::Bool(flag))) => Ok(CallArg::Bool(flag)),
        (ParamKind::Number, Argument::Value(Value::Number(number))) => {
            number.as_f64().map(CallArg::Number).ok_or("number")
        }
        (_, Argument::Value(value)) => Err(json_kind(&value)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
