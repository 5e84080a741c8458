use thiserror::Error;

use crate::types::EventKind;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// The platform answered the call with `ok: false`.
    #[error("{method} rejected: {error}")]
    Api {
        method: String,
        error: String,
        response: serde_json::Value,
    },

    #[error("message parse error: {0}")]
    ParseError(String),

    #[error("{kind} event is missing required field `{field}`")]
    MissingField {
        kind: EventKind,
        field: &'static str,
    },

    #[error("no outbound handler registered for {0} events")]
    Unregistered(EventKind),

    #[error("outbound handler for {0} events already registered")]
    DuplicateHandler(EventKind),

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("event forwarding failed: {0}")]
    Forward(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConnectorError {
    /// Platform error code for `Api` failures (e.g. `invalid_name`).
    pub fn api_error_code(&self) -> Option<&str> {
        match self {
            ConnectorError::Api { error, .. } => Some(error.as_str()),
            _ => None,
        }
    }
}
