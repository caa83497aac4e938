//! Shared command plumbing: config loading, session wiring, console output.

use anyhow::{Context, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_agent::{Orchestrator, Session, Workspace};
use tessera_config::AppConfig;
use tessera_core::event::ToolObserver;
use tessera_core::message::ContentPart;
use tessera_core::tool::{ToolArguments, ToolResult};
use tokio::task::JoinHandle;
use tracing::warn;

/// Path of the config file in use.
pub fn config_file(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load the config, applying environment overrides for the default file.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    config.with_context(|| format!("Failed to load config from {}", config_file(path).display()))
}

/// Load the config and mount its workspace, or `workspace` when given.
pub async fn open_workspace(
    path: Option<&Path>,
    workspace: Option<PathBuf>,
) -> anyhow::Result<(AppConfig, Workspace)> {
    let mut config = load_config(path)?;
    if let Some(dir) = workspace {
        if !dir.is_dir() {
            bail!("Workspace directory not found: {}", dir.display());
        }
        config.workspace.root = Some(dir);
    }
    let workspace = Workspace::open(&config.workspace).await;
    Ok((config, workspace))
}

/// A session over `workspace` that reports tool activity on stderr.
pub fn build_session(config: &AppConfig, workspace: &Workspace) -> Session {
    let orchestrator = Orchestrator::new(workspace.executor(config.orchestrator.command_timeout_secs))
        .with_config(&config.orchestrator)
        .with_max_tokens(config.default_max_tokens)
        .with_observer(Arc::new(ConsoleObserver));
    Session::from_config(config, orchestrator)
}

/// Cancel the session's active action on Ctrl-C. Abort the handle once the
/// command is done.
pub fn cancel_on_ctrl_c(session: Arc<Session>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            session.cancel();
        }
    })
}

/// Prints one line per tool start and end.
pub struct ConsoleObserver;

impl ToolObserver for ConsoleObserver {
    fn on_tool_start(&self, agent_id: &str, tool_name: &str, arguments: &ToolArguments) {
        eprintln!("  [{agent_id}] → {tool_name} {}", arguments.to_json());
    }

    fn on_tool_end(&self, agent_id: &str, tool_name: &str, result: &ToolResult) {
        let status = if result.is_error() { "failed" } else { "ok" };
        eprintln!("  [{agent_id}] ← {tool_name} {status}");
    }
}

pub fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "png",
    }
}

/// Read an image file into an inline base64 content part.
pub fn load_image(path: &Path) -> anyhow::Result<ContentPart> {
    let Some(mime_type) = mime_for(path) else {
        bail!("Unsupported image type: {}", path.display());
    };
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(ContentPart::image(mime_type, STANDARD.encode(bytes)))
}

/// Decode inline images into `dir`, returning the written paths.
pub fn save_media(dir: &Path, prefix: &str, media: &[ContentPart]) -> anyhow::Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (i, part) in media.iter().enumerate() {
        let ContentPart::Image { mime_type, data } = part else {
            continue;
        };
        let bytes = STANDARD
            .decode(data)
            .with_context(|| format!("Image {} is not valid base64", i + 1))?;
        let path = dir.join(format!("{prefix}-{}.{}", i + 1, extension_for(mime_type)));
        std::fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
