//! Live preview hand-off for `render_preview`.
//!
//! Bundling is out of scope for the core: a renderer receives the entry
//! file and answers with a URL the user can open.

use async_trait::async_trait;
use std::path::PathBuf;
use tessera_core::error::ToolError;

/// Turns the workspace into a viewable URL.
#[async_trait]
pub trait PreviewRenderer: Send + Sync {
    async fn render(&self, entry: &str) -> Result<String, ToolError>;
}

/// Serves the entry file straight from a native workspace as a `file://`
/// URL. Suitable for static pages only.
pub struct FilePreview {
    root: PathBuf,
}

impl FilePreview {
    pub const DEFAULT_ENTRY: &'static str = "index.html";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl PreviewRenderer for FilePreview {
    async fn render(&self, entry: &str) -> Result<String, ToolError> {
        let entry = if entry.trim().is_empty() {
            Self::DEFAULT_ENTRY.to_string()
        } else {
            tessera_vfs::path::canonical(entry)?
        };
        let file = self.root.join(&entry);
        if !tokio::fs::try_exists(&file).await.unwrap_or(false) {
            return Err(ToolError::ExecutionFailed {
                tool_name: "render_preview".into(),
                reason: format!("Entry file '{entry}' does not exist"),
            });
        }
        Ok(format!("file://{}", file.display()))
    }
}
