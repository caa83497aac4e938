//! The tool execution boundary.
//!
//! `ToolExecutor::execute` maps a `ToolCall` to a `ToolResult` regardless of
//! which provider asked for it. Nothing escapes: unknown tools, missing
//! arguments, filesystem and collaborator failures all come back as
//! `{error}` payloads the model can react to.
//!
//! Paths are resolved inside the agent's workspace scope and reported back
//! relative to it.

use serde_json::json;
use std::sync::Arc;
use tessera_core::error::ToolError;
use tessera_core::tool::{ToolArguments, ToolCall, ToolResult};
use tessera_index::CodeIndex;
use tessera_vfs::{FileSystemNode, VirtualFileSystem, path};
use tracing::{debug, warn};

use crate::fetch::UrlFetcher;
use crate::preview::PreviewRenderer;
use crate::registry::ToolName;
use crate::shell::ShellSession;
use crate::validator::{TreeSitterValidator, SyntaxValidator, needs_validation};

/// Dispatches tool calls against the workspace and external collaborators.
#[derive(Clone)]
pub struct ToolExecutor {
    vfs: Arc<VirtualFileSystem>,
    index: Arc<CodeIndex>,
    scope: String,
    validator: Arc<dyn SyntaxValidator>,
    shell: Option<Arc<ShellSession>>,
    preview: Option<Arc<dyn PreviewRenderer>>,
    fetcher: Option<Arc<dyn UrlFetcher>>,
}

impl ToolExecutor {
    /// An executor over `vfs` and `index` with the tree-sitter validator and
    /// no shell, preview or network access.
    pub fn new(vfs: Arc<VirtualFileSystem>, index: Arc<CodeIndex>) -> Self {
        Self {
            vfs,
            index,
            scope: String::new(),
            validator: Arc::new(TreeSitterValidator),
            shell: None,
            preview: None,
            fetcher: None,
        }
    }

    /// Restrict every path to the subtree `root` (an agent's workspace root).
    pub fn scoped_to(&self, root: &str) -> Result<Self, ToolError> {
        let mut scoped = self.clone();
        scoped.scope = path::canonical(root)?;
        Ok(scoped)
    }

    pub fn with_validator(mut self, validator: Arc<dyn SyntaxValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_shell(mut self, shell: Arc<ShellSession>) -> Self {
        self.shell = Some(shell);
        self
    }

    pub fn with_preview(mut self, preview: Arc<dyn PreviewRenderer>) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn UrlFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn vfs(&self) -> &Arc<VirtualFileSystem> {
        &self.vfs
    }

    /// Run one tool call. Never fails.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        match self.dispatch(call).await {
            Ok(payload) => ToolResult::ok(payload),
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool call failed");
                ToolResult::error(e.to_string())
            }
        }
    }

    async fn dispatch(&self, call: &ToolCall) -> Result<serde_json::Value, ToolError> {
        let tool: ToolName = call
            .name
            .parse()
            .map_err(|_| ToolError::NotFound(call.name.clone()))?;
        let args = &call.arguments;
        debug!(tool = %tool, call_id = %call.id, "Executing tool");

        match tool {
            ToolName::ListFiles => self.list_files(args).await,
            ToolName::ReadFile => {
                let path = self.resolve(required(args, "path")?)?;
                let content = self.vfs.read(&path).await?;
                Ok(json!({ "content": content }))
            }
            ToolName::WriteFile => self.write_file(args).await,
            ToolName::DeleteFile => {
                let rel = required(args, "path")?;
                let path = self.resolve_non_root(rel)?;
                self.vfs.delete(&path).await?;
                Ok(json!({ "success": true, "path": self.relative(&path) }))
            }
            ToolName::CreateDirectory => {
                let rel = required(args, "path")?;
                let path = self.resolve_non_root(rel)?;
                self.vfs.create_dir(&path).await?;
                Ok(json!({ "success": true, "path": self.relative(&path) }))
            }
            ToolName::SearchFiles => {
                let query = required(args, "query")?;
                let matches: Vec<String> = self
                    .vfs
                    .search_by_name(query)
                    .await
                    .iter()
                    .filter_map(|p| self.within_scope(p))
                    .collect();
                Ok(json!({ "matches": matches }))
            }
            ToolName::SearchCode => {
                let query = required(args, "query")?;
                let results: Vec<String> = self
                    .index
                    .search_hits(query)
                    .into_iter()
                    .filter_map(|mut hit| {
                        hit.path = self.within_scope(&hit.path)?;
                        Some(hit.to_line())
                    })
                    .collect();
                Ok(json!({ "results": results }))
            }
            ToolName::RunCommand => {
                let command = required(args, "command")?;
                let shell = self
                    .shell
                    .as_ref()
                    .ok_or_else(|| ToolError::Unavailable("no shell executor configured".into()))?;
                let run = shell.run(command).await?;
                Ok(json!({
                    "exit_code": run.output.exit_code,
                    "stdout": run.output.stdout,
                    "stderr": run.output.stderr,
                    "cwd": run.cwd,
                }))
            }
            ToolName::RenderPreview => {
                let preview = self
                    .preview
                    .as_ref()
                    .ok_or_else(|| ToolError::Unavailable("no preview renderer configured".into()))?;
                let entry = match args.str("entry") {
                    Some(e) if !e.trim().is_empty() => self.resolve(e)?,
                    _ => String::new(),
                };
                let url = preview.render(&entry).await?;
                Ok(json!({ "url": url }))
            }
            ToolName::FetchUrl => {
                let url = required(args, "url")?;
                let fetcher = self
                    .fetcher
                    .as_ref()
                    .ok_or_else(|| ToolError::Unavailable("no URL fetcher configured".into()))?;
                let content = fetcher.fetch(url).await?;
                Ok(json!({ "content": content }))
            }
        }
    }

    async fn list_files(&self, args: &ToolArguments) -> Result<serde_json::Value, ToolError> {
        let path = self.resolve(args.str("path").unwrap_or(""))?;
        let recursive = args
            .str("recursive")
            .is_some_and(|r| r.eq_ignore_ascii_case("true"));

        let nodes = if recursive {
            let mut exclude = self.vfs.excluded_dirs().to_vec();
            exclude.extend(args.list("exclude").unwrap_or_default());
            self.vfs.list_recursive(&path, &exclude).await?
        } else {
            self.vfs.list(&path).await?
        };

        let mut entries = Vec::new();
        self.flatten(&nodes, &mut entries);
        Ok(json!({ "entries": entries }))
    }

    fn flatten(&self, nodes: &[FileSystemNode], out: &mut Vec<serde_json::Value>) {
        for node in nodes {
            out.push(json!({
                "name": node.name,
                "path": self.relative(&node.path),
                "kind": node.kind,
            }));
            if let Some(children) = &node.children {
                self.flatten(children, out);
            }
        }
    }

    async fn write_file(&self, args: &ToolArguments) -> Result<serde_json::Value, ToolError> {
        let rel = required(args, "path")?;
        let content = required(args, "content")?;
        let path = self.resolve_non_root(rel)?;

        if needs_validation(&path)
            && let Err(message) = self.validator.validate(&path, content).await
        {
            return Err(ToolError::Syntax {
                path: self.relative(&path),
                message,
            });
        }

        self.vfs.write(&path, content).await?;
        Ok(json!({ "success": true, "path": self.relative(&path) }))
    }

    fn resolve(&self, rel: &str) -> Result<String, ToolError> {
        Ok(path::scoped(&self.scope, rel)?)
    }

    // Mutations of the scope root itself are refused
    fn resolve_non_root(&self, rel: &str) -> Result<String, ToolError> {
        if path::normalize(rel)?.is_empty() {
            return Err(ToolError::InvalidArguments(format!(
                "'{rel}' does not name a file or directory"
            )));
        }
        self.resolve(rel)
    }

    /// `path` relative to the scope; paths outside it map to themselves.
    fn relative(&self, path: &str) -> String {
        self.within_scope(path).unwrap_or_else(|| path.to_string())
    }

    fn within_scope(&self, path: &str) -> Option<String> {
        if self.scope.is_empty() {
            return Some(path.to_string());
        }
        if path == self.scope {
            return Some(String::new());
        }
        path.strip_prefix(&self.scope)?
            .strip_prefix('/')
            .map(str::to_string)
    }
}

fn required<'a>(args: &'a ToolArguments, key: &str) -> Result<&'a str, ToolError> {
    args.str(key)
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}
