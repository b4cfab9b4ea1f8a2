//! JSON-RPC 2.0 wire types and line classification.
//!
//! One message per line. A line is a request when it parses as a JSON
//! object carrying a string `method`; every other line is opaque.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

// ── JSON-RPC 2.0 Base Types ─────────────────────────────────────────

/// A JSON-RPC 2.0 request message.
///
/// `id` is `None` for notifications (absent or `null` on the wire).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RpcId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

/// A JSON-RPC 2.0 response message. Always exactly one of `result` or
/// `error` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RpcId,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// The payload half of a response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "result")]
    Result(Value),
    #[serde(rename = "error")]
    Error(JsonRpcError),
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC request ID, echoed back verbatim.
///
/// Numbers keep their original representation (integer or float); any
/// other non-null JSON value is carried opaquely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RpcId {
    Number(Number),
    String(String),
    Opaque(Value),
}

impl From<i64> for RpcId {
    fn from(n: i64) -> Self {
        RpcId::Number(n.into())
    }
}

impl From<&str> for RpcId {
    fn from(s: &str) -> Self {
        RpcId::String(s.to_string())
    }
}

impl RpcId {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Number(n) => Some(RpcId::Number(n)),
            Value::String(s) => Some(RpcId::String(s)),
            other => Some(RpcId::Opaque(other)),
        }
    }
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcId::Number(n) => write!(f, "{n}"),
            RpcId::String(s) => write!(f, "{s:?}"),
            RpcId::Opaque(v) => write!(f, "{v}"),
        }
    }
}

// ── Standard JSON-RPC error codes ───────────────────────────────────

/// JSON-RPC 2.0 error codes used by this server.
pub mod error_codes {
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Server-defined: the requested operation itself failed.
    pub const DOMAIN_ERROR: i64 = -32000;
}

// ── Line classification ─────────────────────────────────────────────

/// What a single input line turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Request(JsonRpcRequest),
    /// Not JSON, or JSON that is not a request object.
    Opaque { reason: String },
}

/// Classify one input line.
pub fn decode_line(line: &str) -> Incoming {
    let value: Value = match serde_json::from_str(line.trim()) {
        Ok(v) => v,
        Err(e) => {
            return Incoming::Opaque {
                reason: e.to_string(),
            }
        }
    };

    let mut obj = match value {
        Value::Object(obj) => obj,
        _ => {
            return Incoming::Opaque {
                reason: "not a JSON object".to_string(),
            }
        }
    };

    let method = match obj.remove("method") {
        Some(Value::String(m)) => m,
        Some(_) => {
            return Incoming::Opaque {
                reason: "method is not a string".to_string(),
            }
        }
        None => {
            return Incoming::Opaque {
                reason: "no method field".to_string(),
            }
        }
    };

    let jsonrpc = match obj.remove("jsonrpc") {
        Some(Value::String(v)) => v,
        _ => jsonrpc_version(),
    };

    Incoming::Request(JsonRpcRequest {
        jsonrpc,
        id: obj.remove("id").and_then(RpcId::from_value),
        method,
        params: obj.remove("params").unwrap_or(Value::Null),
    })
}

// ── Helpers ─────────────────────────────────────────────────────────

fn jsonrpc_version() -> String {
    "2.0".to_string()
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(id: impl Into<RpcId>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// Create a notification (no id, no response expected).
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

impl JsonRpcResponse {
    /// Create a successful response.
    pub fn success(id: RpcId, result: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            outcome: Outcome::Result(result),
        }
    }

    /// Create an error response.
    pub fn error(id: RpcId, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            outcome: Outcome::Error(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(v) => Some(v),
            Outcome::Error(_) => None,
        }
    }

    pub fn error_object(&self) -> Option<&JsonRpcError> {
        match &self.outcome {
            Outcome::Result(_) => None,
            Outcome::Error(e) => Some(e),
        }
    }
}

/// Request parameters after normalization: always a JSON object.
pub type ParamMap = Map<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_request() {
        let line = r#"{"jsonrpc":"2.0","id":7,"method":"database/query","params":{"sql":"SELECT 1"}}"#;
        match decode_line(line) {
            Incoming::Request(req) => {
                assert_eq!(req.method, "database/query");
                assert_eq!(req.id, Some(RpcId::from(7)));
                assert_eq!(req.params["sql"], "SELECT 1");
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_null_and_missing_id_are_notifications() {
        for line in [
            r#"{"method":"ping"}"#,
            r#"{"method":"ping","id":null}"#,
        ] {
            match decode_line(line) {
                Incoming::Request(req) => assert!(req.is_notification()),
                other => panic!("expected request, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_decode_opaque_lines() {
        for line in [
            "hello there",
            "{not json",
            "[1, 2, 3]",
            r#"{"id": 1}"#,
            r#"{"id": 1, "method": 42}"#,
        ] {
            assert!(
                matches!(decode_line(line), Incoming::Opaque { .. }),
                "{line} should be opaque"
            );
        }
    }

    #[test]
    fn test_ids_are_echoed_verbatim() {
        for raw in [json!(3), json!(2.5), json!("req-1"), json!({"k": [1]})] {
            let line = json!({"method": "m", "id": raw}).to_string();
            let Incoming::Request(req) = decode_line(&line) else {
                panic!("expected request");
            };
            let resp = JsonRpcResponse::success(req.id.unwrap(), json!(null));
            let out = serde_json::to_value(&resp).unwrap();
            assert_eq!(out["id"], raw);
        }
    }

    #[test]
    fn test_success_envelope_shape() {
        let resp = JsonRpcResponse::success(RpcId::from("abc"), json!({"status": "ok"}));
        let out = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            out,
            json!({"jsonrpc": "2.0", "id": "abc", "result": {"status": "ok"}})
        );
    }

    #[test]
    fn test_error_envelope_shape() {
        let resp = JsonRpcResponse::error(RpcId::from(2), error_codes::METHOD_NOT_FOUND, "nope");
        let out = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            out,
            json!({"jsonrpc": "2.0", "id": 2, "error": {"code": -32601, "message": "nope"}})
        );
        assert!(out.get("result").is_none());
    }

    #[test]
    fn test_null_result_still_present() {
        let resp = JsonRpcResponse::success(RpcId::from(1), Value::Null);
        let out = serde_json::to_value(&resp).unwrap();
        assert!(out.as_object().unwrap().contains_key("result"));
        assert!(out.get("error").is_none());
    }
}
