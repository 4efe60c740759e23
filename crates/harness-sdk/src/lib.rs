//! In-process feature-flag SDK driven by the harness proxy.
//!
//! Provides the client object the proxy hands out to test drivers: variable
//! evaluation against a bucketed config (fetched from a config CDN or a cloud
//! bucketing API), feature listings, and event tracking with batch flushing.

mod client;
mod error;
mod evaluation;
mod events;
mod options;
mod types;

pub use client::{BucketingMode, SdkClient};
pub use error::SdkError;
pub use evaluation::evaluate_variable;
pub use events::current_unix_timestamp_ms;
pub use options::ClientOptions;
pub use types::{
    BucketedConfig, EvalReason, Event, Feature, ReadOnlyVariable, User, Variable, VariableType,
};
