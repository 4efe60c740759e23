use harness_sdk::{Event, User};
use serde::Deserialize;
use serde_json::Value;

use crate::{CommandEnvelope, DispatchError};

const USER_TAG: &str = "user";
const EVENT_TAG: &str = "event";

/// One positional parameter of a command envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawParameter")]
pub enum Parameter {
    /// No tag and no value: becomes the callee's zero value for that position.
    Null,
    Raw(Value),
    UserRef,
    EventRef,
}

#[derive(Deserialize)]
struct RawParameter {
    #[serde(rename = "type", default)]
    tag: Option<String>,
    #[serde(default)]
    value: Option<Value>,
}

impl TryFrom<RawParameter> for Parameter {
    type Error = String;

    fn try_from(raw: RawParameter) -> Result<Self, Self::Error> {
        match raw.tag.as_deref() {
            Some(USER_TAG) => Ok(Self::UserRef),
            Some(EVENT_TAG) => Ok(Self::EventRef),
            Some(other) => Err(format!("unsupported parameter type '{other}'")),
            None => Ok(raw.value.map_or(Self::Null, Self::Raw)),
        }
    }
}

/// Parameter after envelope substitution, not yet coerced to the callee.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Placeholder,
    Value(Value),
    User(User),
    Event(Event),
}

/// Turns the envelope's parameters into positional arguments, substituting
/// typed `user`/`event` references from the envelope itself.
pub fn materialize(envelope: &CommandEnvelope) -> Result<Vec<Argument>, DispatchError> {
    envelope
        .params()
        .iter()
        .enumerate()
        .map(|(position, parameter)| match parameter {
            Parameter::Null => Ok(Argument::Placeholder),
            Parameter::Raw(value) => Ok(Argument::Value(value.clone())),
            Parameter::UserRef => envelope.user.clone().map(Argument::User).ok_or(
                DispatchError::MissingParameterReference {
                    field: USER_TAG,
                    position,
                },
            ),
            Parameter::EventRef => envelope.event.clone().map(Argument::Event).ok_or(
                DispatchError::MissingParameterReference {
                    field: EVENT_TAG,
                    position,
                },
            ),
        })
        .collect()
}
