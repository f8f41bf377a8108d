//! JSON-RPC 2.0 transport over stdio.
//!
//! Reads newline-delimited requests from stdin, routes them to method
//! handlers, and writes one response line per request to stdout.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use super::{handle_method, SharedState};
use crate::error::AppError;

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request identifier (None for notifications).
    pub id: Option<Value>,
    /// The method name to invoke.
    pub method: String,
    /// Optional parameters for the method.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request identifier (null when the request carried none).
    pub id: Value,
    /// The result on success (mutually exclusive with error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure (mutually exclusive with result).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// Error code (negative for predefined errors).
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Create an error response from an application error
    pub fn from_app_error(id: Option<Value>, err: &AppError) -> Self {
        let data = match err {
            AppError::RateLimited { retry_after_ms } => Some(serde_json::json!({
                "retryAfterMs": retry_after_ms,
            })),
            _ => None,
        };
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code: error_code(err),
                message: err.to_string(),
                data,
            }),
        }
    }
}

/// Map an application error to its JSON-RPC error code.
pub fn error_code(err: &AppError) -> i32 {
    match err {
        AppError::MethodNotFound { .. } => -32601,
        AppError::Validation { .. } => -32002,
        AppError::NotFound { .. } => -32004,
        AppError::Conflict { .. } => -32009,
        AppError::RateLimited { .. } => -32029,
        AppError::Generator(_) => -32010,
        AppError::Config { .. } | AppError::Storage(_) | AppError::Internal { .. } => -32603,
    }
}

/// RPC server running over stdio.
pub struct RpcServer {
    /// Shared application state.
    state: SharedState,
}

impl RpcServer {
    /// Create a new server
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Run the server using async stdio
    pub async fn run(&self) -> std::io::Result<()> {
        info!("FunnelForge server starting...");

        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            // EOF reached
            if bytes_read == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!(request = %trimmed, "Received request");

            let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    error!(error = %e, "Failed to parse request");
                    Some(JsonRpcResponse::error(
                        None,
                        -32700,
                        format!("Parse error: {}", e),
                    ))
                }
            };

            // Only send a response when the request carries an id
            if let Some(response) = response {
                let response_json = serde_json::to_string(&response)?;
                debug!(response = %response_json, "Sending response");

                stdout.write_all(response_json.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        Ok(())
    }

    /// Handle a single JSON-RPC request.
    /// Returns None for notifications (requests without id) per JSON-RPC 2.0.
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let is_notification = request.id.is_none();

        match request.method.as_str() {
            "ping" => Some(JsonRpcResponse::success(
                request.id,
                Value::Object(Default::default()),
            )),
            method => {
                let result = handle_method(&self.state, method, request.params).await;
                if is_notification {
                    if let Err(ref e) = result {
                        debug!(method = %method, error = %e, "Notification failed, no response sent");
                    }
                    return None;
                }
                match result {
                    Ok(value) => Some(JsonRpcResponse::success(request.id, value)),
                    Err(e) => {
                        error!(method = %method, error = %e, "Method failed");
                        Some(JsonRpcResponse::from_app_error(request.id, &e))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeneratorError;

    #[test]
    fn test_success_response_shape() {
        let resp = JsonRpcResponse::success(
            Some(Value::from(1)),
            serde_json::json!({"ok": true}),
        );
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 1);
        assert_eq!(json["result"]["ok"], true);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_error_response_shape() {
        let resp = JsonRpcResponse::error(None, -32601, "Method not found: bogus");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["id"], Value::Null);
        assert_eq!(json["error"]["code"], -32601);
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            error_code(&AppError::MethodNotFound {
                method: "bogus".to_string()
            }),
            -32601
        );
        assert_eq!(error_code(&AppError::validation("x", "bad")), -32002);
        assert_eq!(error_code(&AppError::not_found("funnel", "fn-1")), -32004);
        assert_eq!(error_code(&AppError::conflict("already running")), -32009);
        assert_eq!(error_code(&AppError::RateLimited { retry_after_ms: 5 }), -32029);
        assert_eq!(
            error_code(&AppError::Generator(GeneratorError::Timeout { timeout_ms: 1 })),
            -32010
        );
        assert_eq!(
            error_code(&AppError::Internal {
                message: "boom".to_string()
            }),
            -32603
        );
    }

    #[test]
    fn test_rate_limited_carries_retry_data() {
        let err = AppError::RateLimited {
            retry_after_ms: 12000,
        };
        let resp = JsonRpcResponse::from_app_error(Some(Value::from(7)), &err);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["error"]["code"], -32029);
        assert_eq!(json["error"]["data"]["retryAfterMs"], 12000);
    }

    #[test]
    fn test_request_parses_without_params() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":3,"method":"funnel.list"}"#).unwrap();
        assert_eq!(req.method, "funnel.list");
        assert!(req.params.is_none());
    }
}
