use harness_sdk::{Event, User};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DispatchError, Parameter};

/// Generic "invoke method X with these parameters" request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub event: Option<Event>,
    #[serde(default)]
    pub params: Option<Vec<Parameter>>,
}

impl CommandEnvelope {
    pub fn params(&self) -> &[Parameter] {
        self.params.as_deref().unwrap_or_default()
    }
}

/// Decodes a request body. The command comes back trimmed, so method lookup,
/// result storage and the `Location` header all see the same name.
pub fn decode_envelope(body: &[u8]) -> Result<CommandEnvelope, DispatchError> {
    let mut envelope = serde_json::from_slice::<CommandEnvelope>(body)
        .map_err(|error| DispatchError::Decode(error.to_string()))?;
    let command = envelope.command.trim();
    if command.is_empty() {
        return Err(DispatchError::Decode("missing command".to_string()));
    }
    if command.len() != envelope.command.len() {
        envelope.command = command.to_string();
    }
    Ok(envelope)
}

/// Reads `isAsync` from a body that may not decode as a full envelope.
pub fn declared_is_async(body: &[u8]) -> bool {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("isAsync").and_then(Value::as_bool))
        .unwrap_or(false)
}

/// Success body returned alongside a `Location` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
    pub entity_type: String,
    pub data: Value,
    pub logs: Vec<String>,
}

/// Failure body; exactly one of `async_error` and `exception` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub async_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(default)]
    pub stack: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, is_async: bool, stack: impl Into<String>) -> Self {
        let message = message.into();
        let (async_error, exception) = if is_async {
            (Some(message), None)
        } else {
            (None, Some(message))
        };
        Self {
            async_error,
            exception,
            stack: stack.into(),
        }
    }

    pub fn message(&self) -> &str {
        self.async_error
            .as_deref()
            .or(self.exception.as_deref())
            .unwrap_or_default()
    }
}
