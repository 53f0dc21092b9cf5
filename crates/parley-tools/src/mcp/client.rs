// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streamable-HTTP MCP sessions built on rmcp.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parley_config::model::McpServerConfig;
use parley_core::ParleyError;
use reqwest::header::{HeaderName, HeaderValue};
use rmcp::model::{CallToolRequestParams, CallToolResult};
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::{McpClient, McpConnector, McpToolInfo};

/// Header identifying the user a session acts for.
const USER_HEADER: &str = "x-parley-user-id";

type McpSession = RunningService<RoleClient, ()>;

fn mcp_err(server: &str, message: impl std::fmt::Display) -> ParleyError {
    ParleyError::ToolResolve {
        name: format!("mcp:{server}"),
        message: message.to_string(),
    }
}

/// Configured headers plus the user header.
fn session_headers(
    server: &McpServerConfig,
    user_id: &str,
) -> Result<HashMap<HeaderName, HeaderValue>, ParleyError> {
    let mut headers = HashMap::new();
    for (name, value) in &server.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ParleyError::Config(format!("mcp server {}: header {name}: {e}", server.name)))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| ParleyError::Config(format!("mcp server {}: header value: {e}", server.name)))?;
        headers.insert(name, value);
    }
    let user = HeaderValue::from_str(user_id)
        .map_err(|e| ParleyError::InvalidInput(format!("user id: {e}")))?;
    headers.insert(HeaderName::from_static(USER_HEADER), user);
    Ok(headers)
}

/// Text blocks of a tool result, newline-joined.
fn result_text(result: &CallToolResult) -> String {
    let blocks = serde_json::to_value(&result.content).unwrap_or(Value::Null);
    blocks
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"] == "text")
                .filter_map(|b| b["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

/// Connects to MCP servers over streamable HTTP.
#[derive(Debug, Clone, Default)]
pub struct HttpMcpConnector;

impl HttpMcpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl McpConnector for HttpMcpConnector {
    async fn connect(
        &self,
        server: &McpServerConfig,
        user_id: &str,
    ) -> Result<Arc<dyn McpClient>, ParleyError> {
        let config = StreamableHttpClientTransportConfig::with_uri(server.url.clone())
            .custom_headers(session_headers(server, user_id)?);
        let transport = StreamableHttpClientTransport::from_config(config);
        let session = rmcp::serve_client((), transport)
            .await
            .map_err(|e| mcp_err(&server.name, format!("initialize failed: {e}")))?;
        debug!(server = %server.name, user_id = %user_id, "mcp session initialized");
        Ok(Arc::new(HttpMcpClient {
            server: server.name.clone(),
            session: Mutex::new(Some(session)),
        }))
    }
}

/// One user's session with one MCP server.
pub struct HttpMcpClient {
    server: String,
    session: Mutex<Option<McpSession>>,
}

impl std::fmt::Debug for HttpMcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMcpClient")
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl McpClient for HttpMcpClient {
    async fn list_tools(&self) -> Result<Vec<McpToolInfo>, ParleyError> {
        let guard = self.session.lock().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| mcp_err(&self.server, "session is closed"))?;
        let tools = session
            .list_all_tools()
            .await
            .map_err(|e| mcp_err(&self.server, e))?;
        drop(guard);

        let tools = serde_json::to_value(tools).map_err(|e| mcp_err(&self.server, e))?;
        serde_json::from_value(tools).map_err(|e| mcp_err(&self.server, e))
    }

    async fn call_tool(&self, name: &str, arguments: &Value) -> Result<String, ParleyError> {
        let arguments = match arguments {
            Value::Object(map) => Some(map.clone()),
            Value::Null => None,
            _ => return Err(mcp_err(&self.server, "tool arguments must be a JSON object")),
        };
        let mut params = CallToolRequestParams::new(Cow::Owned(name.to_string()));
        params.arguments = arguments;

        let guard = self.session.lock().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| mcp_err(&self.server, "session is closed"))?;
        let result = session
            .call_tool(params)
            .await
            .map_err(|e| mcp_err(&self.server, e))?;
        drop(guard);

        let text = result_text(&result);
        if result.is_error == Some(true) {
            return Err(mcp_err(&self.server, text));
        }
        Ok(text)
    }

    async fn close(&self) {
        let session = self.session.lock().await.take();
        if let Some(mut session) = session
            && let Err(e) = session.close().await
        {
            debug!(server = %self.server, error = %e, "mcp session close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn server_config() -> McpServerConfig {
        McpServerConfig {
            name: "docs".into(),
            url: "http://127.0.0.1:9/mcp".into(),
            headers: BTreeMap::from([("authorization".to_string(), "Bearer abc ".to_string())]),
        }
    }

    #[test]
    fn headers_carry_config_and_user() {
        let headers = session_headers(&server_config(), "u1").unwrap();
        assert_eq!(
            headers[&HeaderName::from_static("authorization")],
            HeaderValue::from_static("Bearer abc")
        );
        assert_eq!(
            headers[&HeaderName::from_static(USER_HEADER)],
            HeaderValue::from_static("u1")
        );
    }

    #[test]
    fn bad_header_names_are_config_errors() {
        let mut config = server_config();
        config.headers.insert("bad header".into(), "x".into());
        assert!(matches!(
            session_headers(&config, "u1"),
            Err(ParleyError::Config(_))
        ));
    }

    #[test]
    fn result_text_joins_text_blocks() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "image", "data": "aGk=", "mimeType": "image/png"},
                {"type": "text", "text": "second"}
            ],
            "isError": false
        }))
        .unwrap();
        assert_eq!(result_text(&result), "first\nsecond");
    }

    #[tokio::test]
    async fn unreachable_server_fails_to_connect() {
        let err = HttpMcpConnector::new()
            .connect(&server_config(), "u1")
            .await
            .err()
            .expect("connect should fail");
        assert!(matches!(err, ParleyError::ToolResolve { .. }));
    }
}
