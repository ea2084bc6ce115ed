//! MCP Server implementation
//!
//! Newline-delimited JSON-RPC over any async byte stream; `run_stdio` wires
//! it to the process's stdin and stdout.

use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::Result;
use crate::gmail::client::GmailClient;
use crate::mcp::tools::ToolHandler;
use crate::mcp::types::*;

/// MCP Server info
const SERVER_NAME: &str = "gmail";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP Server for Gmail
pub struct McpServer {
    tool_handler: ToolHandler,

    /// Set once the host sends `notifications/initialized`
    initialized: bool,
}

impl McpServer {
    pub fn new(gmail_client: Arc<GmailClient>) -> Self {
        Self {
            tool_handler: ToolHandler::new(gmail_client),
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run the server on stdio until stdin closes
    pub async fn run_stdio(&mut self) -> Result<()> {
        self.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve one message per line until the reader reaches EOF
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_message(&line).await {
                let mut out = serde_json::to_vec(&response)?;
                out.push(b'\n');
                writer.write_all(&out).await?;
                writer.flush().await?;
            }
        }

        tracing::info!("Input closed, shutting down");
        Ok(())
    }

    /// Handle one JSON-RPC message; notifications never get a response
    pub async fn handle_message(&mut self, message: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(message) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable message");
                return Some(JsonRpcResponse::error(
                    None,
                    JsonRpcError::parse_error(e.to_string()),
                ));
            }
        };

        if request.is_notification() {
            if request.method == methods::INITIALIZED {
                self.initialized = true;
                tracing::info!("Client initialized");
            } else {
                tracing::debug!(method = %request.method, "Ignoring notification");
            }
            return None;
        }

        tracing::debug!(method = %request.method, "Request");
        let id = request.id.clone();
        let method = request.method.clone();

        let response = match method.as_str() {
            methods::INITIALIZE => respond(id, &self.initialize_result()),
            methods::PING => JsonRpcResponse::success(id, serde_json::json!({})),
            methods::LIST_TOOLS => respond(
                id,
                &ListToolsResult {
                    tools: self.tool_handler.list_tools(),
                },
            ),
            methods::CALL_TOOL => self.handle_call_tool(request).await,
            other => JsonRpcResponse::error(id, JsonRpcError::method_not_found(other)),
        };
        Some(response)
    }

    fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {}),
            },
        }
    }

    async fn handle_call_tool(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let params: CallToolParams =
            match serde_json::from_value(request.params.unwrap_or_default()) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        request.id,
                        JsonRpcError::invalid_params(format!("Invalid tool parameters: {}", e)),
                    )
                }
            };

        let result = self
            .tool_handler
            .call_tool(&params.name, params.arguments)
            .await;
        respond(request.id, &result)
    }
}

fn respond<T: Serialize>(id: Option<RequestId>, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialStore, OAuthKeys, Session};
    use serde_json::Value;

    fn server() -> McpServer {
        let keys = OAuthKeys {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            auth_uri: "http://127.0.0.1:9/auth".to_string(),
            token_uri: "http://127.0.0.1:9/token".to_string(),
        };
        let session = Session::new(
            keys,
            CredentialStore::new("/nonexistent/credentials.json"),
            "http://localhost:3000/oauth2callback",
        );
        McpServer::new(Arc::new(GmailClient::new(Arc::new(session))))
    }

    async fn exchange(server: &mut McpServer, input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        server.run(input.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_initialize_handshake() {
        let mut server = server();
        let responses = exchange(
            &mut server,
            concat!(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
                "\n",
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
                "\n",
            ),
        )
        .await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(responses[0]["result"]["protocolVersion"], MCP_VERSION);
        assert!(server.is_initialized());
    }

    #[tokio::test]
    async fn test_parse_error_and_unknown_method() {
        let mut server = server();
        let responses = exchange(
            &mut server,
            "not json\n\n{\"jsonrpc\":\"2.0\",\"id\":\"x\",\"method\":\"resources/list\"}\n",
        )
        .await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[0]["error"]["code"], JsonRpcError::PARSE_ERROR);
        assert_eq!(responses[1]["id"], "x");
        assert_eq!(responses[1]["error"]["code"], JsonRpcError::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_notification_is_silent() {
        let mut server = server();
        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/cancelled"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_call_tool_without_name() {
        let mut server = server();
        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{}}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, JsonRpcError::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_an_error_result() {
        let mut server = server();
        let response = server
            .handle_message(
                r#"{"jsonrpc":"2.0","id":8,"method":"tools/call","params":{"name":"nope"}}"#,
            )
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(response.error.is_none());
    }
}
