use crypto_rag::BatchEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 Request
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 Success Response
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub result: Value,
}

/// JSON-RPC 2.0 Error Response
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub error: ErrorObject,
}

/// JSON-RPC Error Object
#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Either kind of response, written as one line
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum JsonRpcReply {
    Success(JsonRpcResponse),
    Error(JsonRpcError),
}

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Custom error codes for RAG operations
pub const MALFORMED_QUERY: i32 = -32001;
pub const UPSTREAM_UNAVAILABLE: i32 = -32003;

pub const METHOD_QUERY: &str = "rag.query";
pub const METHOD_BATCH: &str = "rag.batch";

/// Longest accepted request line, in bytes
pub const MAX_LINE_BYTES: usize = 64 * 1024;

pub const MAX_TOP_K: usize = 50;
pub const MAX_BATCH_QUERIES: usize = 100;

/// rag.query parameters
#[derive(Debug, Deserialize)]
pub struct RagQueryRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// rag.batch parameters
#[derive(Debug, Deserialize)]
pub struct RagBatchRequest {
    pub queries: Vec<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// rag.query result
#[derive(Debug, Serialize)]
pub struct RagQueryResponse {
    pub query: String,
    pub answer: String,
    pub metadata: Metadata,
}

/// rag.batch result, entries in request order
#[derive(Debug, Serialize)]
pub struct RagBatchResponse {
    pub entries: Vec<BatchEntry>,
    pub answered: usize,
    pub failed: usize,
}

/// Query metadata. Timings and the cache flag are omitted in mock mode.
#[derive(Debug, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_duration_ms: Option<u64>,
    pub market_symbol: Option<String>,
    pub posts_used: usize,
    pub similarity_max: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_cache_hit: Option<bool>,
    pub mode: String,
}
