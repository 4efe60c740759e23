use thiserror::Error;

/// Errors returned by SDK client operations.
///
/// These are the recoverable errors a wrapped SDK method hands back to its
/// caller; the proxy reports them in its error envelope rather than failing
/// the request.
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("invalid sdk key '{0}': expected a server sdk key")]
    InvalidSdkKey(String),
    #[error("user_id is required")]
    MissingUserId,
    #[error("variable key is required")]
    MissingVariableKey,
    #[error("default value is required for variable '{0}'")]
    MissingDefaultValue(String),
    #[error("event type is required")]
    MissingEventType,
    #[error("client custom data must be a JSON object")]
    InvalidCustomData,
    #[error("client is closed")]
    Closed,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} returned non-success status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
