use harness_sdk::SdkError;
use thiserror::Error;

/// Every way a single command dispatch can fail.
///
/// All variants are reported to the driver through the error envelope; the
/// transport status stays uniform.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid command body: {0}")]
    Decode(String),
    #[error("parameter {position} references the envelope's {field}, which is missing")]
    MissingParameterReference {
        field: &'static str,
        position: usize,
    },
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("method '{method}' not found on {class}")]
    MethodNotFound { method: String, class: &'static str },
    #[error("invocation failed: {0}")]
    Invocation(String),
    #[error(transparent)]
    Recoverable(#[from] SdkError),
    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("unhandled panic: {0}")]
    Panic(String),
}
