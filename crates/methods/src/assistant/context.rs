use std::sync::Arc;

use async_trait::async_trait;
use linewire_rpc::{MethodDefinition, MethodError, MethodHandler, ParamKind, Params};
use serde_json::{json, Value};
use tracing::info;

use super::AssistantContext;
use crate::error::context_failure;

pub(super) struct StoreContext(pub(super) Arc<AssistantContext>);

#[async_trait]
impl MethodHandler for StoreContext {
    fn definition(&self) -> MethodDefinition {
        MethodDefinition::new("store_context", "Store content under a key for later use")
            .required("key", ParamKind::String, "Unique key for this context")
            .required("content", ParamKind::String, "Content to store")
            .optional("metadata", ParamKind::Object, "Optional metadata", Value::Null)
            .returns(json!({"text": "string", "key": "string", "stored_at": "string"}))
    }

    async fn call(&self, params: Params) -> Result<Value, MethodError> {
        let key = params.str("key")?;
        let content = params.str("content")?;
        let metadata = params.opt_object("metadata")?.cloned();

        let record = self
            .0
            .store
            .store(key, content, metadata)
            .await
            .map_err(context_failure)?;
        info!(key = %key, bytes = content.len(), "Context stored");
        Ok(json!({
            "text": format!("Context stored with key: {key}"),
            "key": record.key,
            "stored_at": record.stored_at.to_rfc3339(),
        }))
    }
}

pub(super) struct RecallContext(pub(super) Arc<AssistantContext>);

#[async_trait]
impl MethodHandler for RecallContext {
    fn definition(&self) -> MethodDefinition {
        MethodDefinition::new("recall_context", "Recall previously stored content")
            .required("key", ParamKind::String, "Key of the context to recall")
            .returns(json!({
                "key": "string",
                "found": "boolean",
                "content": "string",
                "metadata": "object",
                "stored_at": "string"
            }))
    }

    async fn call(&self, params: Params) -> Result<Value, MethodError> {
        let key = params.str("key")?;
        match self.0.store.recall(key).await.map_err(context_failure)? {
            Some(record) => Ok(json!({
                "key": record.key,
                "found": true,
                "content": record.content,
                "metadata": record.metadata,
                "stored_at": record.stored_at.to_rfc3339(),
            })),
            None => {
                info!(key = %key, "No context found");
                Ok(json!({ "key": key, "found": false }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{registry, test_support};
    use serde_json::json;

    #[tokio::test]
    async fn test_store_and_recall() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(test_support::echo_context(dir.path()), "t").unwrap();

        let stored = registry
            .dispatch(
                "store_context",
                json!({"key": "plan", "content": "step one", "metadata": {"author": "ops"}}),
            )
            .await
            .unwrap();
        assert_eq!(stored["text"], "Context stored with key: plan");
        assert_eq!(stored["key"], "plan");

        let recalled = registry.dispatch("recall_context", json!({"key": "plan"})).await.unwrap();
        assert_eq!(recalled["found"], true);
        assert_eq!(recalled["content"], "step one");
        assert_eq!(recalled["metadata"], json!({"author": "ops"}));
        assert_eq!(recalled["stored_at"], stored["stored_at"]);
    }

    #[tokio::test]
    async fn test_recall_unknown_key() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(test_support::echo_context(dir.path()), "t").unwrap();
        let out = registry.dispatch("recall_context", json!({"key": "ghost"})).await.unwrap();
        assert_eq!(out, json!({"key": "ghost", "found": false}));
    }

    #[tokio::test]
    async fn test_bad_key_is_invalid_params() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(test_support::echo_context(dir.path()), "t").unwrap();
        let err = registry
            .dispatch("store_context", json!({"key": "../up", "content": "x"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32602);
    }
}
