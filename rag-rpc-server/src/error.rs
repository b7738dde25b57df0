use crypto_core::RagError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    #[error("Upstream {stage} unavailable: {message}")]
    UpstreamUnavailable { stage: String, message: String },
}

impl RpcError {
    /// Get the JSON-RPC error code for this error
    pub fn code(&self) -> i32 {
        use crate::protocol::*;
        match self {
            RpcError::ParseError(_) => PARSE_ERROR,
            RpcError::InvalidRequest(_) => INVALID_REQUEST,
            RpcError::MethodNotFound(_) => METHOD_NOT_FOUND,
            RpcError::InvalidParams(_) => INVALID_PARAMS,
            RpcError::InternalError(_) => INTERNAL_ERROR,
            RpcError::MalformedQuery(_) => MALFORMED_QUERY,
            RpcError::UpstreamUnavailable { .. } => UPSTREAM_UNAVAILABLE,
        }
    }

    /// Get additional error data (optional)
    pub fn data(&self) -> Option<serde_json::Value> {
        match self {
            RpcError::UpstreamUnavailable { stage, .. } => Some(serde_json::json!({
                "stage": stage,
                "suggestion": "Check that Qdrant, LMDB and the language model endpoint are reachable"
            })),
            _ => None,
        }
    }
}

impl From<RagError> for RpcError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::MalformedInput(message) => RpcError::MalformedQuery(message),
            RagError::UpstreamUnavailable { stage, message } => RpcError::UpstreamUnavailable {
                stage: stage.to_string(),
                message,
            },
            other => RpcError::InternalError(other.to_string()),
        }
    }
}

// Convert anyhow errors to RpcError
impl From<anyhow::Error> for RpcError {
    fn from(err: anyhow::Error) -> Self {
        RpcError::InternalError(format!("{:#}", err))
    }
}
