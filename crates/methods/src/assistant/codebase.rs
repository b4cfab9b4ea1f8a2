use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use linewire_rpc::{MethodDefinition, MethodError, MethodHandler, ParamKind, Params};
use serde_json::{json, Value};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::AssistantContext;
use crate::error::{context_failure, delegate_failure};

/// Record that holds the most recent codebase snapshot.
pub const CODEBASE_KEY: &str = "codebase_analysis";

const DEFAULT_PATTERNS: [&str; 3] = ["*.go", "*.py", "*.md"];

/// Concatenated contents of every file under a root matching the patterns.
#[derive(Debug, Default)]
pub struct CodebaseSnapshot {
    pub content: String,
    pub files: Vec<PathBuf>,
}

/// Walk `root` and collect files whose name matches any of `patterns`.
/// Unreadable files are skipped.
pub fn collect_files(root: &Path, patterns: &GlobSet) -> CodebaseSnapshot {
    let mut snapshot = CodebaseSnapshot::default();
    let entries = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file());

    for entry in entries {
        if !patterns.is_match(entry.file_name()) {
            continue;
        }
        let path = entry.path();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                snapshot
                    .content
                    .push_str(&format!("\n=== File: {} ===\n{}", path.display(), text));
                snapshot.files.push(path.to_path_buf());
            }
            Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable file"),
        }
    }
    snapshot
}

fn build_globs(patterns: &[String]) -> Result<GlobSet, MethodError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            MethodError::invalid_params(format!("bad include pattern '{pattern}': {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| MethodError::invalid_params(e.to_string()))
}

pub(super) struct AnalyzeCodebase(pub(super) Arc<AssistantContext>);

#[async_trait]
impl MethodHandler for AnalyzeCodebase {
    fn definition(&self) -> MethodDefinition {
        MethodDefinition::new(
            "analyze_codebase",
            "Ask the assistant about the files under a directory",
        )
            .required("path", ParamKind::String, "Directory to analyze")
            .required("query", ParamKind::String, "What to ask about the codebase")
            .optional(
                "include_patterns",
                ParamKind::Array,
                "File name globs to include",
                json!(DEFAULT_PATTERNS),
            )
            .returns(json!({"text": "string", "mock": "boolean", "files": "integer"}))
    }

    async fn call(&self, params: Params) -> Result<Value, MethodError> {
        let ctx = &self.0;
        let root = PathBuf::from(params.str("path")?);
        let query = params.str("query")?;
        let globs = build_globs(&params.str_list("include_patterns")?)?;

        if !tokio::fs::try_exists(&root).await.unwrap_or(false) {
            return Err(MethodError::domain(format!("Path does not exist: {}", root.display())));
        }

        let walk_root = root.clone();
        let snapshot = tokio::task::spawn_blocking(move || collect_files(&walk_root, &globs))
            .await
            .map_err(|e| MethodError::internal(e.to_string()))?;
        info!(
            path = %root.display(),
            files = snapshot.files.len(),
            "Collected codebase for analysis"
        );

        let metadata = json!({
            "path": root.display().to_string(),
            "query": query,
            "files": snapshot.files.len(),
        });
        ctx.store
            .store(CODEBASE_KEY, &snapshot.content, metadata.as_object().cloned())
            .await
            .map_err(context_failure)?;

        let context_file = ctx.store.content_path(CODEBASE_KEY).map_err(context_failure)?;
        let prompt = analysis_prompt(query);
        let reply = ctx
            .invoker
            .invoke(&prompt, Some(context_file.as_path()))
            .await
            .map_err(delegate_failure)?;

        Ok(json!({
            "text": reply.text,
            "mock": reply.mock,
            "files": snapshot.files.len(),
        }))
    }
}

fn analysis_prompt(query: &str) -> String {
    format!(
        "Analyze the provided codebase with the following query:\n\
         {query}\n\n\
         Please provide:\n\
         1. Direct answer to the query\n\
         2. Supporting evidence from the code\n\
         3. Potential concerns or improvements\n\
         4. Architectural insights\n\
         5. Cybernetic ecology observations (feedback loops, system relationships, etc.)\n"
    )
}
