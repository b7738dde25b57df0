use anyhow::{Context, Result};
use crypto_rag::CryptoAssistant;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use crate::config::ServerConfig;
use crate::error::RpcError;
use crate::handler::RagQueryHandler;
use crate::protocol::*;

/// JSON-RPC server for RAG queries
pub struct RpcServer {
    config: ServerConfig,
    handler: Arc<RagQueryHandler>,
}

impl RpcServer {
    /// Create a new RPC server
    pub async fn new(config: ServerConfig) -> Result<Self> {
        tracing::info!("Initializing RAG components (mode={})...", config.rag.mode);

        let assistant = CryptoAssistant::from_settings(&config.rag)
            .await
            .context("Failed to initialize assistant")?;

        let handler = Arc::new(RagQueryHandler::new(Arc::new(assistant)));

        tracing::info!("✅ RAG components initialized successfully");

        Ok(Self { config, handler })
    }

    /// Start the server and handle connections
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .context(format!("Failed to bind to {}", addr))?;

        tracing::info!("✅ RAG JSON-RPC Server listening on {}", addr);
        tracing::info!("Ready to accept connections");

        serve(listener, Arc::clone(&self.handler)).await
    }
}

/// Accept connections forever, one task per connection
pub async fn serve(listener: TcpListener, handler: Arc<RagQueryHandler>) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                tracing::debug!("New connection from {}", addr);
                let handler = Arc::clone(&handler);

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(socket, handler).await {
                        tracing::error!("Connection error from {}: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                tracing::error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Handle a single TCP connection: one request per line, one response per line
async fn handle_connection(socket: TcpStream, handler: Arc<RagQueryHandler>) -> Result<()> {
    let mut lines = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
    let mut recovering = false;

    loop {
        let frame = match lines.next().await {
            Some(frame) => frame,
            // The stream yields one None after a decode error, then resumes
            None if recovering => {
                recovering = false;
                continue;
            }
            None => break,
        };

        let reply = match frame {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => {
                tracing::debug!("Received request: {}", line.trim());
                process_request(&line, &handler).await
            }
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                tracing::warn!("Rejected request line over {} bytes", MAX_LINE_BYTES);
                recovering = true;
                error_reply(
                    None,
                    RpcError::InvalidRequest(format!(
                        "request line exceeds {} bytes",
                        MAX_LINE_BYTES
                    )),
                )
            }
            Err(LinesCodecError::Io(e)) => return Err(e.into()),
        };

        lines.send(serde_json::to_string(&reply)?).await?;
        tracing::debug!("Sent response");
    }

    // Connection closed
    Ok(())
}

/// Process a JSON-RPC request
async fn process_request(line: &str, handler: &RagQueryHandler) -> JsonRpcReply {
    // Parse JSON-RPC request
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(req) => req,
        Err(e) => return error_reply(None, RpcError::ParseError(e.to_string())),
    };

    // Validate JSON-RPC version
    if request.jsonrpc != "2.0" {
        return error_reply(
            request.id,
            RpcError::InvalidRequest("JSON-RPC version must be 2.0".to_string()),
        );
    }

    // Route to method handler
    let outcome = match request.method.as_str() {
        METHOD_QUERY => match parse_params::<RagQueryRequest>(request.params) {
            Ok(params) => to_result(handler.handle_query(params).await),
            Err(e) => Err(e),
        },
        METHOD_BATCH => match parse_params::<RagBatchRequest>(request.params) {
            Ok(params) => to_result(handler.handle_batch(params).await),
            Err(e) => Err(e),
        },
        other => Err(RpcError::MethodNotFound(other.to_string())),
    };

    match outcome {
        Ok(result) => JsonRpcReply::Success(JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: request.id,
            result,
        }),
        Err(e) => error_reply(request.id, e),
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    let params = params.ok_or_else(|| RpcError::InvalidParams("Missing params".to_string()))?;
    serde_json::from_value(params).map_err(|e| RpcError::InvalidParams(e.to_string()))
}

fn to_result<T: Serialize>(outcome: Result<T, RpcError>) -> Result<Value, RpcError> {
    let result = outcome?;
    serde_json::to_value(result).map_err(|e| RpcError::InternalError(e.to_string()))
}

/// Create an error response
fn error_reply(id: Option<Value>, error: RpcError) -> JsonRpcReply {
    if error.code() == UPSTREAM_UNAVAILABLE || error.code() == INTERNAL_ERROR {
        tracing::error!("Request failed: {}", error);
    } else {
        tracing::debug!("Request rejected: {}", error);
    }

    JsonRpcReply::Error(JsonRpcError {
        jsonrpc: "2.0".to_string(),
        id,
        error: ErrorObject {
            code: error.code(),
            message: error.to_string(),
            data: error.data(),
        },
    })
}
