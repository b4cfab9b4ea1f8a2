//! Assistant profile: the external delegate plus keyed context.
//!
//! Each method is registered twice: as a plain JSON-RPC method and as an
//! MCP tool behind `tools/call`.

mod codebase;
mod context;
mod delegate;

use std::sync::Arc;

use linewire_context::ContextStore;
use linewire_delegate::{DelegateInvoker, DelegateReply};
use linewire_rpc::{mcp, MethodHandler, MethodRegistry, RegistryError};
use serde_json::{json, Value};

pub use codebase::{collect_files, CodebaseSnapshot, CODEBASE_KEY};
pub use delegate::MEMORY_KEY;

/// Shared state for the assistant handlers.
pub struct AssistantContext {
    pub store: ContextStore,
    pub invoker: DelegateInvoker,
}

impl AssistantContext {
    pub fn new(store: ContextStore, invoker: DelegateInvoker) -> Self {
        Self { store, invoker }
    }
}

fn handlers(ctx: &Arc<AssistantContext>) -> Vec<Arc<dyn MethodHandler>> {
    vec![
        Arc::new(delegate::QueryDelegate(Arc::clone(ctx))),
        Arc::new(codebase::AnalyzeCodebase(Arc::clone(ctx))),
        Arc::new(context::StoreContext(Arc::clone(ctx))),
        Arc::new(context::RecallContext(Arc::clone(ctx))),
        Arc::new(delegate::DelegateRemember(Arc::clone(ctx))),
        Arc::new(delegate::DelegateRecall(Arc::clone(ctx))),
    ]
}

pub fn registry(ctx: AssistantContext, server_name: &str) -> Result<MethodRegistry, RegistryError> {
    let ctx = Arc::new(ctx);
    let mut tools = MethodRegistry::new();
    let mut outer = MethodRegistry::new();
    for handler in handlers(&ctx) {
        tools.register_arc(Arc::clone(&handler))?;
        outer.register_arc(handler)?;
    }
    mcp::register_bridge(&mut outer, Arc::new(tools), server_name)?;
    Ok(outer)
}

fn reply_json(reply: DelegateReply) -> Value {
    json!({ "text": reply.text, "mock": reply.mock })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use linewire_core::DelegateSettings;

    /// Context over a temp dir with a delegate that echoes its arguments.
    pub fn echo_context(dir: &std::path::Path) -> AssistantContext {
        delegate_context(dir, "echo \"$@\"")
    }

    pub fn delegate_context(dir: &std::path::Path, script: &str) -> AssistantContext {
        let store = ContextStore::open(dir.join("ctx")).unwrap();
        let invoker = DelegateInvoker::new(&DelegateSettings {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            ..DelegateSettings::default()
        });
        AssistantContext::new(store, invoker)
    }
}
