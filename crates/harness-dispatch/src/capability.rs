//! Statically enumerable table of invocable methods per entity class.

use std::collections::HashMap;
use std::fmt;

use futures_util::future::BoxFuture;
use harness_sdk::{Event, SdkError, User};
use serde_json::Value;

use crate::{DispatchError, Entity, EntityClass, Returned};

/// Primary result of a capability call, or the callee's own error.
pub type CallOutcome = Result<Returned, SdkError>;
/// A call with its arguments already bound, ready to run.
pub type PreparedCall = BoxFuture<'static, CallOutcome>;
/// Binds a target and coerced arguments into a runnable call.
pub type Handler = fn(&Entity, CallArgs) -> Result<PreparedCall, DispatchError>;

/// Declared type of one positional parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Bool,
    Json,
    User,
    Event,
}

impl ParamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::Json => "json",
            Self::User => "user",
            Self::Event => "event",
        }
    }

    /// Value substituted when the driver passes an explicit null.
    pub fn zero_value(self) -> CallArg {
        match self {
            Self::String => CallArg::String(String::new()),
            Self::Number => CallArg::Number(0.0),
            Self::Bool => CallArg::Bool(false),
            Self::Json => CallArg::Json(Value::Null),
            Self::User => CallArg::User(User::default()),
            Self::Event => CallArg::Event(Event::default()),
        }
    }
}

/// Argument coerced to the callee's declared parameter kind.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArg {
    String(String),
    Number(f64),
    Bool(bool),
    Json(Value),
    User(User),
    Event(Event),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    args: Vec<CallArg>,
}

impl CallArgs {
    pub fn new(args: Vec<CallArg>) -> Self {
        Self { args }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn string(&self, index: usize) -> Result<String, DispatchError> {
        match self.args.get(index) {
            Some(CallArg::String(value)) => Ok(value.clone()),
            other => Err(unexpected_arg(index, ParamKind::String, other)),
        }
    }

    pub fn number(&self, index: usize) -> Result<f64, DispatchError> {
        match self.args.get(index) {
            Some(CallArg::Number(value)) => Ok(*value),
            other => Err(unexpected_arg(index, ParamKind::Number, other)),
        }
    }

    pub fn bool(&self, index: usize) -> Result<bool, DispatchError> {
        match self.args.get(index) {
            Some(CallArg::Bool(value)) => Ok(*value),
            other => Err(unexpected_arg(index, ParamKind::Bool, other)),
        }
    }

    pub fn json(&self, index: usize) -> Result<Value, DispatchError> {
        match self.args.get(index) {
            Some(CallArg::Json(value)) => Ok(value.clone()),
            other => Err(unexpected_arg(index, ParamKind::Json, other)),
        }
    }

    pub fn user(&self, index: usize) -> Result<User, DispatchError> {
        match self.args.get(index) {
            Some(CallArg::User(user)) => Ok(user.clone()),
            other => Err(unexpected_arg(index, ParamKind::User, other)),
        }
    }

    pub fn event(&self, index: usize) -> Result<Event, DispatchError> {
        match self.args.get(index) {
            Some(CallArg::Event(event)) => Ok(event.clone()),
            other => Err(unexpected_arg(index, ParamKind::Event, other)),
        }
    }
}

fn unexpected_arg(index: usize, expected: ParamKind, found: Option<&CallArg>) -> DispatchError {
    let found = match found {
        None => "nothing",
        Some(CallArg::String(_)) => "string",
        Some(CallArg::Number(_)) => "number",
        Some(CallArg::Bool(_)) => "bool",
        Some(CallArg::Json(_)) => "json",
        Some(CallArg::User(_)) => "user",
        Some(CallArg::Event(_)) => "event",
    };
    DispatchError::Invocation(format!(
        "argument {index}: expected {}, found {found}",
        expected.as_str()
    ))
}

/// One invocable method: canonical name, declared parameters, and binding.
#[derive(Clone, Copy)]
pub struct Capability {
    pub name: &'static str,
    pub params: &'static [ParamKind],
    pub handler: Handler,
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Capability {
    pub const fn new(name: &'static str, params: &'static [ParamKind], handler: Handler) -> Self {
        Self {
            name,
            params,
            handler,
        }
    }
}

/// Method surfaces keyed by entity class, then by lower-cased method name.
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    surfaces: HashMap<EntityClass, HashMap<String, Capability>>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table exposing the SDK client and result-object methods.
    pub fn with_sdk_bindings() -> Self {
        let mut table = Self::new();
        crate::bindings::register_sdk_bindings(&mut table);
        table
    }

    pub fn register(&mut self, class: EntityClass, capability: Capability) -> &mut Self {
        self.surfaces
            .entry(class)
            .or_default()
            .insert(capability.name.to_lowercase(), capability);
        self
    }

    /// Finds `command` on `class`, ignoring case.
    pub fn resolve(&self, class: EntityClass, command: &str) -> Result<&Capability, DispatchError> {
        self.surfaces
            .get(&class)
            .and_then(|surface| surface.get(&command.trim().to_lowercase()))
            .ok_or_else(|| DispatchError::MethodNotFound {
                method: canonical_method_name(command),
                class: class.as_str(),
            })
    }

    /// Canonical names exposed by `class`, sorted.
    pub fn methods(&self, class: EntityClass) -> Vec<&'static str> {
        let mut names = self
            .surfaces
            .get(&class)
            .map(|surface| surface.values().map(|capability| capability.name).collect())
            .unwrap_or_else(Vec::new);
        names.sort_unstable();
        names
    }
}

/// Capitalized form of a driver command, e.g. `allVariables` -> `AllVariables`.
pub fn canonical_method_name(command: &str) -> String {
    let command = command.trim();
    let mut chars = command.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
