//! Workspace wiring: one filesystem, its code index, and the tool executor
//! built on top of them.

use std::path::PathBuf;
use std::sync::Arc;
use tessera_config::WorkspaceConfig;
use tessera_index::CodeIndex;
use tessera_tools::{FilePreview, HttpFetcher, ProcessShell, ShellSession, ToolExecutor};
use tessera_vfs::{BackendKind, Subscription, VirtualFileSystem};
use tracing::info;

/// A mounted workspace. The index follows the filesystem for as long as
/// the workspace lives.
pub struct Workspace {
    vfs: Arc<VirtualFileSystem>,
    index: Arc<CodeIndex>,
    root: Option<PathBuf>,
    _subscription: Subscription,
}

impl Workspace {
    /// Mount the configured directory (or an in-memory tree) and index it.
    pub async fn open(config: &WorkspaceConfig) -> Self {
        let vfs = VirtualFileSystem::open(config.root.clone())
            .await
            .with_excluded_dirs(config.excluded_dirs.clone());
        let root = match vfs.backend_kind() {
            BackendKind::Native => config.root.clone(),
            BackendKind::Memory => None,
        };
        Self::mount(vfs, root, config.excluded_dirs.clone()).await
    }

    /// An empty in-memory workspace.
    pub async fn in_memory() -> Self {
        let vfs = VirtualFileSystem::in_memory();
        let excluded = vfs.excluded_dirs().to_vec();
        Self::mount(vfs, None, excluded).await
    }

    async fn mount(vfs: VirtualFileSystem, root: Option<PathBuf>, excluded: Vec<String>) -> Self {
        let index = Arc::new(CodeIndex::with_excluded_dirs(excluded));
        let indexed = index.rebuild(&vfs).await;
        let vfs = Arc::new(vfs);
        let subscription = index.attach(&vfs);
        info!(backend = ?vfs.backend_kind(), files = indexed, "Workspace ready");
        Self {
            vfs,
            index,
            root,
            _subscription: subscription,
        }
    }

    pub fn vfs(&self) -> &Arc<VirtualFileSystem> {
        &self.vfs
    }

    pub fn index(&self) -> &Arc<CodeIndex> {
        &self.index
    }

    /// Host directory backing the workspace, if it is on disk.
    pub fn root(&self) -> Option<&PathBuf> {
        self.root.as_ref()
    }

    /// A tool executor with a shell and URL fetcher, plus a file preview
    /// when the workspace is on disk.
    pub fn executor(&self, command_timeout_secs: u64) -> ToolExecutor {
        let mut shell = ProcessShell::new(command_timeout_secs);
        let mut cwd = String::new();
        if let Some(root) = &self.root {
            shell = shell.with_default_dir(root);
            cwd = root.to_string_lossy().into_owned();
        }

        let mut executor = ToolExecutor::new(self.vfs.clone(), self.index.clone())
            .with_shell(Arc::new(ShellSession::new(Arc::new(shell)).with_cwd(cwd)))
            .with_fetcher(Arc::new(HttpFetcher::default()));
        if let Some(root) = &self.root {
            executor = executor.with_preview(Arc::new(FilePreview::new(root)));
        }
        executor
    }
}
