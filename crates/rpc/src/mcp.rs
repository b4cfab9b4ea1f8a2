//! MCP tool bridge.
//!
//! Exposes a registry of methods as MCP tools (`initialize`, `tools/list`,
//! `tools/call`) so MCP clients can drive the same handlers that plain
//! JSON-RPC callers reach by method name.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::MethodError;
use crate::registry::{
    MethodDefinition, MethodHandler, MethodRegistry, ParamKind, Params, RegistryError,
};

/// The MCP protocol version this bridge implements.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Describes a single tool in MCP format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl From<MethodDefinition> for ToolInfo {
    fn from(def: MethodDefinition) -> Self {
        Self {
            input_schema: def.input_schema(),
            name: def.name,
            description: def.description,
        }
    }
}

/// Result of `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

/// Content block within a tool call result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    Text { text: String },
}

impl CallToolResult {
    fn text(text: String, is_error: bool) -> Self {
        Self {
            content: vec![ToolContent::Text { text }],
            is_error,
        }
    }
}

/// Render a method result as tool text: strings verbatim, objects with a
/// string `text` field as that field, anything else as pretty JSON.
fn render_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(obj) => match obj.get("text") {
            Some(Value::String(text)) => text.clone(),
            _ => serde_json::to_string_pretty(value).unwrap_or_default(),
        },
        other => other.to_string(),
    }
}

/// Register the MCP methods on `outer`, serving the tools in `tools`.
pub fn register_bridge(
    outer: &mut MethodRegistry,
    tools: Arc<MethodRegistry>,
    server_name: &str,
) -> Result<(), RegistryError> {
    outer.register(Initialize {
        server_name: server_name.to_string(),
    })?;
    outer.register(InitializedNotification)?;
    outer.register(ListTools {
        tools: Arc::clone(&tools),
    })?;
    outer.register(CallTool { tools })?;
    Ok(())
}

struct Initialize {
    server_name: String,
}

#[async_trait]
impl MethodHandler for Initialize {
    fn definition(&self) -> MethodDefinition {
        MethodDefinition::new("initialize", "MCP handshake")
            .optional(
                "protocolVersion",
                ParamKind::String,
                "Client protocol version",
                Value::Null,
            )
            .optional("capabilities", ParamKind::Object, "Client capabilities", Value::Null)
            .optional("clientInfo", ParamKind::Object, "Client name and version", Value::Null)
            .returns(json!({
                "protocolVersion": "string",
                "capabilities": "object",
                "serverInfo": "object",
            }))
    }

    async fn call(&self, params: Params) -> Result<Value, MethodError> {
        let client = params
            .opt_object("clientInfo")?
            .and_then(|info| info.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(client = %client, "Handling initialize");
        Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": {
                "name": self.server_name,
                "version": env!("CARGO_PKG_VERSION"),
            },
        }))
    }
}

struct InitializedNotification;

#[async_trait]
impl MethodHandler for InitializedNotification {
    fn definition(&self) -> MethodDefinition {
        MethodDefinition::new("notifications/initialized", "Client confirmed initialization")
    }

    async fn call(&self, _params: Params) -> Result<Value, MethodError> {
        info!("Client confirmed initialization");
        Ok(Value::Null)
    }
}

struct ListTools {
    tools: Arc<MethodRegistry>,
}

#[async_trait]
impl MethodHandler for ListTools {
    fn definition(&self) -> MethodDefinition {
        MethodDefinition::new("tools/list", "List available tools")
            .optional("cursor", ParamKind::String, "Pagination cursor (unused)", Value::Null)
            .returns(json!({"tools": "array"}))
    }

    async fn call(&self, _params: Params) -> Result<Value, MethodError> {
        debug!("Handling tools/list");
        let tools: Vec<ToolInfo> = self.tools.list().into_iter().map(ToolInfo::from).collect();
        Ok(json!({ "tools": tools }))
    }
}

struct CallTool {
    tools: Arc<MethodRegistry>,
}

#[async_trait]
impl MethodHandler for CallTool {
    fn definition(&self) -> MethodDefinition {
        MethodDefinition::new("tools/call", "Call a tool by name")
            .required("name", ParamKind::String, "Tool name")
            .optional("arguments", ParamKind::Object, "Tool arguments", json!({}))
            .returns(json!({"content": "array", "isError": "boolean"}))
    }

    async fn call(&self, params: Params) -> Result<Value, MethodError> {
        let name = params.str("name")?;
        if !self.tools.contains(name) {
            return Err(MethodError::invalid_params(format!("Tool not found: {name}")));
        }
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
        debug!(tool = %name, "Handling tools/call");

        let result = match self.tools.dispatch(name, arguments).await {
            Ok(value) => CallToolResult::text(render_text(&value), false),
            Err(MethodError::Internal(msg)) => return Err(MethodError::Internal(msg)),
            Err(e) => CallToolResult::text(e.to_string(), true),
        };
        serde_json::to_value(result).map_err(|e| MethodError::internal(e.to_string()))
    }
}
