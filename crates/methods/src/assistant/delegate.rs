use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use linewire_rpc::{MethodDefinition, MethodError, MethodHandler, ParamKind, Params};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{reply_json, AssistantContext};
use crate::error::{context_failure, delegate_failure};

/// Record that accumulates everything passed to `delegate_remember`.
pub const MEMORY_KEY: &str = "persistent_memory";

pub(super) struct QueryDelegate(pub(super) Arc<AssistantContext>);

#[async_trait]
impl MethodHandler for QueryDelegate {
    fn definition(&self) -> MethodDefinition {
        MethodDefinition::new("query_delegate", "Send a prompt to the external assistant")
            .required("prompt", ParamKind::String, "The prompt to send")
            .optional(
                "context_key",
                ParamKind::String,
                "Stored context to include",
                Value::Null,
            )
            .optional(
                "store_response",
                ParamKind::Boolean,
                "Store the response for later",
                json!(false),
            )
            .returns(json!({"text": "string", "mock": "boolean", "stored_key": "string"}))
    }

    async fn call(&self, params: Params) -> Result<Value, MethodError> {
        let ctx = &self.0;
        let prompt = params.str("prompt")?;

        let context_file = match params.opt_str("context_key")? {
            Some(key) => {
                let path = ctx.store.existing_path(key).await.map_err(context_failure)?;
                if path.is_none() {
                    debug!(key = %key, "Context key not stored, invoking without context");
                }
                path
            }
            None => None,
        };

        let reply = ctx
            .invoker
            .invoke(prompt, context_file.as_deref())
            .await
            .map_err(delegate_failure)?;

        let stored_key = if params.bool_or("store_response", false)? {
            let key = format!("response_{}", Utc::now().format("%Y%m%d_%H%M%S"));
            let metadata = json!({ "prompt": prompt, "mock": reply.mock });
            ctx.store
                .store(&key, &reply.text, metadata.as_object().cloned())
                .await
                .map_err(context_failure)?;
            info!(key = %key, "Delegate response stored");
            Some(key)
        } else {
            None
        };

        let mut out = reply_json(reply);
        if let Some(key) = stored_key {
            out["stored_key"] = Value::String(key);
        }
        Ok(out)
    }
}

pub(super) struct DelegateRemember(pub(super) Arc<AssistantContext>);

#[async_trait]
impl MethodHandler for DelegateRemember {
    fn definition(&self) -> MethodDefinition {
        MethodDefinition::new("delegate_remember", "Add information to persistent memory")
            .required("topic", ParamKind::String, "Topic or category")
            .required("information", ParamKind::String, "Information to remember")
            .returns(json!({"text": "string", "mock": "boolean"}))
    }

    async fn call(&self, params: Params) -> Result<Value, MethodError> {
        let ctx = &self.0;
        let topic = params.str("topic")?;
        let information = params.str("information")?;

        ctx.store
            .append(MEMORY_KEY, &format!("{topic}:\n{information}"))
            .await
            .map_err(context_failure)?;
        info!(topic = %topic, "Memory appended");

        let memory_file = ctx.store.content_path(MEMORY_KEY).map_err(context_failure)?;
        let prompt = memory_prompt(topic, information);
        let reply = ctx
            .invoker
            .invoke(&prompt, Some(memory_file.as_path()))
            .await
            .map_err(delegate_failure)?;
        Ok(reply_json(reply))
    }
}

pub(super) struct DelegateRecall(pub(super) Arc<AssistantContext>);

#[async_trait]
impl MethodHandler for DelegateRecall {
    fn definition(&self) -> MethodDefinition {
        MethodDefinition::new(
            "delegate_recall",
            "Ask the assistant what it remembers about a topic",
        )
            .required("topic", ParamKind::String, "Topic to recall")
            .optional("specific_question", ParamKind::String, "A specific question", Value::Null)
            .returns(json!({"text": "string", "mock": "boolean"}))
    }

    async fn call(&self, params: Params) -> Result<Value, MethodError> {
        let ctx = &self.0;
        let topic = params.str("topic")?;
        let question = match params.opt_str("specific_question")? {
            Some(q) => q.to_string(),
            None => format!("What do you remember about {topic}?"),
        };
        let prompt = recall_prompt(topic, &question);

        let memory_file = ctx.store.existing_path(MEMORY_KEY).await.map_err(context_failure)?;
        let reply = ctx
            .invoker
            .invoke(&prompt, memory_file.as_deref())
            .await
            .map_err(delegate_failure)?;
        Ok(reply_json(reply))
    }
}

fn memory_prompt(topic: &str, information: &str) -> String {
    format!(
        "Remember this information for future reference:\n\n\
         Topic: {topic}\n\
         Information: {information}\n\n\
         Please acknowledge and summarize what you're remembering."
    )
}

fn recall_prompt(topic: &str, question: &str) -> String {
    format!(
        "Recall information about: {topic}\n\
         Specific question: {question}\n\n\
         Search your memory and provide relevant information."
    )
}

#[cfg(test)]
mod tests {
    use super::super::{registry, test_support};
    use super::MEMORY_KEY;
    use linewire_context::ContextStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_query_without_context() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(test_support::echo_context(dir.path()), "t").unwrap();
        let out = registry
            .dispatch("query_delegate", json!({"prompt": "hello", "context_key": "missing"}))
            .await
            .unwrap();
        assert_eq!(out, json!({"text": "--prompt hello\n", "mock": false}));
    }

    #[tokio::test]
    async fn test_query_with_context_and_stored_response() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(
            test_support::delegate_context(dir.path(), "cat \"$2\"; echo \" + $4\""),
            "t",
        )
        .unwrap();
        registry
            .dispatch("store_context", json!({"key": "facts", "content": "sky is blue"}))
            .await
            .unwrap();

        let out = registry
            .dispatch(
                "query_delegate",
                json!({"prompt": "why?", "context_key": "facts", "store_response": true}),
            )
            .await
            .unwrap();
        assert_eq!(out["text"], "sky is blue + why?\n");
        let key = out["stored_key"].as_str().unwrap();
        assert!(key.starts_with("response_"));

        let recalled = registry.dispatch("recall_context", json!({"key": key})).await.unwrap();
        assert_eq!(recalled["content"], "sky is blue + why?\n");
        assert_eq!(recalled["metadata"]["prompt"], "why?");
    }

    #[tokio::test]
    async fn test_missing_delegate_is_mock() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_support::echo_context(dir.path());
        ctx.invoker = linewire_delegate::DelegateInvoker::new(&linewire_core::DelegateSettings {
            program: "linewire-absent-assistant".to_string(),
            ..Default::default()
        });
        let registry = registry(ctx, "t").unwrap();
        let out = registry.dispatch("query_delegate", json!({"prompt": "p"})).await.unwrap();
        assert_eq!(out["mock"], true);
        assert!(out["text"].as_str().unwrap().contains("Mock"));
    }

    #[tokio::test]
    async fn test_remember_appends_and_recall_uses_memory() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(
            test_support::delegate_context(dir.path(), "cat \"$2\""),
            "t",
        )
        .unwrap();

        registry
            .dispatch("delegate_remember", json!({"topic": "rust", "information": "borrowck"}))
            .await
            .unwrap();
        registry
            .dispatch("delegate_remember", json!({"topic": "tokio", "information": "runtime"}))
            .await
            .unwrap();

        let store = ContextStore::open(dir.path().join("ctx")).unwrap();
        let memory = store.recall(MEMORY_KEY).await.unwrap().unwrap().content;
        assert!(memory.contains("rust:\nborrowck"));
        assert!(memory.contains("tokio:\nruntime"));

        let out = registry.dispatch("delegate_recall", json!({"topic": "rust"})).await.unwrap();
        assert_eq!(out["mock"], false);
        assert!(out["text"].as_str().unwrap().contains("tokio:\nruntime"));
    }

    #[tokio::test]
    async fn test_recall_default_question() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(test_support::echo_context(dir.path()), "t").unwrap();
        let out = registry.dispatch("delegate_recall", json!({"topic": "go"})).await.unwrap();
        assert_eq!(
            out["text"],
            "--prompt Recall information about: go\n\
             Specific question: What do you remember about go?\n\n\
             Search your memory and provide relevant information.\n"
        );
    }

    #[tokio::test]
    async fn test_recall_question_keeps_topic() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(
            test_support::delegate_context(dir.path(), "printf '%s' \"$2\""),
            "t",
        )
        .unwrap();
        let out = registry
            .dispatch(
                "delegate_recall",
                json!({"topic": "rust", "specific_question": "what is it?"}),
            )
            .await
            .unwrap();
        let prompt = out["text"].as_str().unwrap();
        assert!(prompt.starts_with("Recall information about: rust\n"), "{prompt}");
        assert!(prompt.contains("Specific question: what is it?\n"), "{prompt}");
    }

    #[tokio::test]
    async fn test_remember_prompt_names_topic_and_information() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(
            test_support::delegate_context(dir.path(), "printf '%s' \"$4\""),
            "t",
        )
        .unwrap();
        let out = registry
            .dispatch(
                "delegate_remember",
                json!({"topic": "serde", "information": "derives codecs"}),
            )
            .await
            .unwrap();
        assert_eq!(
            out["text"],
            "Remember this information for future reference:\n\n\
             Topic: serde\n\
             Information: derives codecs\n\n\
             Please acknowledge and summarize what you're remembering."
        );
    }
}
