//! Generic command dispatch over a registry of live SDK entities.
//!
//! A driver addresses an entity (`client/{id}` or `command/{name}/{seq}`),
//! sends a command envelope, and gets back either the address of the stored
//! result or an error envelope.

mod bindings;
mod capability;
mod classifier;
mod controller;
mod entity;
mod envelope;
mod error;
pub mod fault;
mod invoker;
mod params;
mod store;

pub use bindings::register_sdk_bindings;
pub use capability::{
    canonical_method_name, CallArg, CallArgs, CallOutcome, Capability, CapabilityTable, Handler,
    ParamKind, PreparedCall,
};
pub use classifier::{classify, Classified, EntityKind};
pub use controller::{DispatchOutcome, Dispatcher};
pub use entity::{Entity, EntityClass, Returned};
pub use envelope::{
    declared_is_async, decode_envelope, CommandEnvelope, ErrorResponse, LocationResponse,
};
pub use error::DispatchError;
pub use invoker::{coerce_arguments, invoke};
pub use params::{materialize, Argument, Parameter};
pub use store::{EntityStore, Location, TargetRef};
