use async_trait::async_trait;
use linewire_rpc::{
    FallbackHandler, MethodDefinition, MethodError, MethodHandler, MethodRegistry, ParamKind,
    Params, RegistryError,
};
use serde_json::{json, Map, Value};
use tracing::debug;

/// Registry for the generic responder: `query` plus a catch-all.
pub fn registry(server_name: &str) -> Result<MethodRegistry, RegistryError> {
    let mut registry = MethodRegistry::new();
    registry.register(QueryEcho {
        server_name: server_name.to_string(),
    })?;
    registry.set_fallback(EchoFallback {
        server_name: server_name.to_string(),
    });
    Ok(registry)
}

struct QueryEcho {
    server_name: String,
}

#[async_trait]
impl MethodHandler for QueryEcho {
    fn definition(&self) -> MethodDefinition {
        MethodDefinition::new("query", "Acknowledge a query")
            .optional("sql", ParamKind::Any, "Query text", Value::Null)
            .returns(json!({"data": "string", "status": "string", "server": "string"}))
    }

    async fn call(&self, params: Params) -> Result<Value, MethodError> {
        debug!(has_sql = params.get("sql").is_some(), "Query acknowledged");
        Ok(json!({
            "data": "Query executed",
            "status": "success",
            "server": self.server_name,
        }))
    }
}

struct EchoFallback {
    server_name: String,
}

#[async_trait]
impl FallbackHandler for EchoFallback {
    async fn call(&self, method: &str, params: Value) -> Result<Value, MethodError> {
        let params = match params {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        Ok(json!({
            "status": "success",
            "server": self.server_name,
            "message": format!("Processed {method} method"),
            "params": params,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_acknowledged() {
        let registry = registry("echo-1").unwrap();
        let out = registry.dispatch("query", json!({"sql": "SELECT 1"})).await.unwrap();
        assert_eq!(
            out,
            json!({"data": "Query executed", "status": "success", "server": "echo-1"})
        );
    }

    #[tokio::test]
    async fn test_fallback_reports_method_and_params() {
        let registry = registry("echo-1").unwrap();
        let out = registry.dispatch("tools/anything", json!({"a": 1})).await.unwrap();
        assert_eq!(out["message"], "Processed tools/anything method");
        assert_eq!(out["params"], json!({"a": 1}));
        assert_eq!(out["server"], "echo-1");

        let out = registry.dispatch("ping", Value::Null).await.unwrap();
        assert_eq!(out["params"], json!({}));
    }
}
