//! The `VirtualFileSystem` facade.
//!
//! Owns the active backend and the listener collection. All traversal
//! (`list_recursive`, `search_by_name`) is generic over the backend's
//! `entries`, so both backends share one implementation.

use std::path::PathBuf;
use std::sync::Arc;
use tessera_core::error::VfsError;
use tracing::{debug, info, warn};

use crate::backend::{BackendKind, StorageBackend};
use crate::events::{FsEvent, FsEventKind, FsListener, ListenerSet, Subscription};
use crate::memory::MemoryBackend;
use crate::native::NativeBackend;
use crate::node::{FileSystemNode, NodeKind, sort_nodes};
use crate::path::{join, normalize};

/// Directory names skipped by recursive listing, name search and indexing.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "target",
    ".next",
    "__pycache__",
    ".venv",
];

pub struct VirtualFileSystem {
    backend: Box<dyn StorageBackend>,
    listeners: Arc<ListenerSet>,
    excluded: Vec<String>,
}

impl VirtualFileSystem {
    /// Open a workspace. Uses the native backend when `root` is a readable
    /// directory, otherwise falls back to an in-memory tree.
    pub async fn open(root: Option<PathBuf>) -> Self {
        let Some(root) = root else {
            info!("No workspace directory given, using in-memory workspace");
            return Self::in_memory();
        };
        match NativeBackend::open(&root).await {
            Ok(native) => {
                info!(root = %root.display(), "Workspace opened on disk");
                Self::with_backend(Box::new(native))
            }
            Err(e) => {
                warn!(
                    root = %root.display(),
                    error = %e,
                    "Workspace directory not accessible, falling back to in-memory workspace"
                );
                Self::in_memory()
            }
        }
    }

    pub fn in_memory() -> Self {
        Self::with_backend(Box::new(MemoryBackend::new()))
    }

    pub fn with_backend(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            listeners: Arc::new(ListenerSet::default()),
            excluded: DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the excluded directory names.
    pub fn with_excluded_dirs(mut self, dirs: Vec<String>) -> Self {
        self.excluded = dirs;
        self
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn excluded_dirs(&self) -> &[String] {
        &self.excluded
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|d| d == name)
    }

    /// Register a change listener. Events arrive synchronously after each
    /// committed write or delete.
    pub fn subscribe(&self, listener: Arc<dyn FsListener>) -> Subscription {
        self.listeners.add(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub async fn read(&self, path: &str) -> Result<String, VfsError> {
        let segments = normalize(path)?;
        self.backend.read(&segments).await
    }

    pub async fn write(&self, path: &str, content: &str) -> Result<(), VfsError> {
        let segments = normalize(path)?;
        self.backend.write(&segments, content).await?;
        let path = join(&segments);
        debug!(path = %path, bytes = content.len(), "File written");
        self.listeners.emit(&FsEvent {
            kind: FsEventKind::Write,
            path,
            content: Some(content.to_string()),
        });
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<(), VfsError> {
        let segments = normalize(path)?;
        self.backend.delete(&segments).await?;
        let path = join(&segments);
        debug!(path = %path, "Path deleted");
        self.listeners.emit(&FsEvent {
            kind: FsEventKind::Delete,
            path,
            content: None,
        });
        Ok(())
    }

    pub async fn create_dir(&self, path: &str) -> Result<(), VfsError> {
        let segments = normalize(path)?;
        self.backend.create_dir(&segments).await
    }

    /// Direct children of a directory, directories first.
    pub async fn list(&self, path: &str) -> Result<Vec<FileSystemNode>, VfsError> {
        let segments = normalize(path)?;
        let mut nodes: Vec<FileSystemNode> = self
            .backend
            .entries(&segments)
            .await?
            .into_iter()
            .map(|entry| node_at(&segments, entry.name, entry.kind))
            .collect();
        sort_nodes(&mut nodes);
        Ok(nodes)
    }

    /// The whole tree below `path`, skipping directories named in `exclude`.
    /// A subtree that cannot be read is reported as empty.
    pub async fn list_recursive(
        &self,
        path: &str,
        exclude: &[String],
    ) -> Result<Vec<FileSystemNode>, VfsError> {
        let segments = normalize(path)?;
        let mut top = self.list(path).await?;
        top.retain(|n| !(n.is_dir() && exclude.contains(&n.name)));

        // Iterative fill: pending holds index paths into the tree
        let mut stack: Vec<(Vec<usize>, Vec<String>)> = top
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_dir())
            .map(|(i, n)| (vec![i], child_segments(&segments, &n.name)))
            .collect();

        while let Some((index_path, dir_segments)) = stack.pop() {
            let mut children = match self.backend.entries(&dir_segments).await {
                Ok(entries) => entries
                    .into_iter()
                    .filter(|e| !(e.kind == NodeKind::Directory && exclude.contains(&e.name)))
                    .map(|e| node_at(&dir_segments, e.name, e.kind))
                    .collect::<Vec<_>>(),
                Err(e) => {
                    warn!(path = %join(&dir_segments), error = %e, "Unreadable directory treated as empty");
                    Vec::new()
                }
            };
            sort_nodes(&mut children);

            for (i, child) in children.iter().enumerate() {
                if child.is_dir() {
                    let mut p = index_path.clone();
                    p.push(i);
                    stack.push((p, child_segments(&dir_segments, &child.name)));
                }
            }

            if let Some(node) = node_mut(&mut top, &index_path) {
                node.children = Some(children);
            }
        }
        Ok(top)
    }

    /// Case-insensitive substring search over file names (not directories).
    pub async fn search_by_name(&self, query: &str) -> Vec<String> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let mut matches = Vec::new();
        for path in self.walk_files().await {
            if crate::path::file_name(&path).to_lowercase().contains(&needle) {
                matches.push(path);
            }
        }
        matches
    }

    /// Every file path in the workspace outside excluded directories, in
    /// depth-first name order.
    pub async fn walk_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        let mut stack: Vec<Vec<String>> = vec![Vec::new()];
        while let Some(dir) = stack.pop() {
            let mut entries = match self.backend.entries(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %join(&dir), error = %e, "Unreadable directory treated as empty");
                    continue;
                }
            };
            // Reverse so the stack pops in name order
            entries.sort_by(|a, b| b.name.cmp(&a.name));
            let mut subdirs = Vec::new();
            let mut here = Vec::new();
            for entry in entries {
                match entry.kind {
                    NodeKind::Directory if self.is_excluded(&entry.name) => {}
                    NodeKind::Directory => subdirs.push(child_segments(&dir, &entry.name)),
                    NodeKind::File => here.push(join(&child_segments(&dir, &entry.name))),
                }
            }
            here.reverse();
            files.extend(here);
            stack.extend(subdirs);
        }
        files
    }
}

fn child_segments(parent: &[String], name: &str) -> Vec<String> {
    let mut segments = parent.to_vec();
    segments.push(name.to_string());
    segments
}

fn node_at(parent: &[String], name: String, kind: NodeKind) -> FileSystemNode {
    FileSystemNode {
        path: join(&child_segments(parent, &name)),
        name,
        kind,
        children: None,
    }
}

fn node_mut<'a>(nodes: &'a mut [FileSystemNode], index_path: &[usize]) -> Option<&'a mut FileSystemNode> {
    let (first, rest) = index_path.split_first()?;
    let mut node = nodes.get_mut(*first)?;
    for i in rest {
        node = node.children.as_mut()?.get_mut(*i)?;
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(vfs: &VirtualFileSystem) -> (Arc<Mutex<Vec<FsEvent>>>, Subscription) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let sub = vfs.subscribe(Arc::new(move |e: &FsEvent| sink.lock().unwrap().push(e.clone())));
        (events, sub)
    }

    async fn round_trip(vfs: &VirtualFileSystem) {
        vfs.write("/src/app.ts", "export const x = 1;").await.unwrap();
        assert_eq!(vfs.read("src/app.ts").await.unwrap(), "export const x = 1;");
        vfs.delete("src/app.ts").await.unwrap();
        assert!(vfs.read("src/app.ts").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn round_trip_in_memory() {
        let vfs = VirtualFileSystem::in_memory();
        assert_eq!(vfs.backend_kind(), BackendKind::Memory);
        round_trip(&vfs).await;
    }

    #[tokio::test]
    async fn round_trip_native() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = VirtualFileSystem::open(Some(dir.path().to_path_buf())).await;
        assert_eq!(vfs.backend_kind(), BackendKind::Native);
        round_trip(&vfs).await;
    }

    #[tokio::test]
    async fn unreadable_root_falls_back_to_memory() {
        let vfs = VirtualFileSystem::open(Some(PathBuf::from("/no/such/workspace"))).await;
        assert_eq!(vfs.backend_kind(), BackendKind::Memory);
        assert!(vfs.read("README.md").await.is_ok());
    }

    #[tokio::test]
    async fn one_event_per_mutation() {
        let vfs = VirtualFileSystem::in_memory();
        let (events, _sub) = recorder(&vfs);

        vfs.write("a.py", "def f(): pass").await.unwrap();
        vfs.read("a.py").await.unwrap();
        vfs.list("").await.unwrap();
        vfs.create_dir("lib").await.unwrap();
        vfs.delete("a.py").await.unwrap();
        // Failed mutations are silent
        assert!(vfs.delete("a.py").await.is_err());
        assert!(vfs.write("../escape", "x").await.is_err());

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, FsEventKind::Write);
        assert_eq!(events[0].content.as_deref(), Some("def f(): pass"));
        assert_eq!(events[1].kind, FsEventKind::Delete);
        assert_eq!(events[1].path, "a.py");
    }

    #[tokio::test]
    async fn dropping_subscription_stops_events() {
        let vfs = VirtualFileSystem::in_memory();
        let (events, sub) = recorder(&vfs);
        vfs.write("one.txt", "1").await.unwrap();
        drop(sub);
        vfs.write("two.txt", "2").await.unwrap();
        assert_eq!(events.lock().unwrap().len(), 1);
        assert_eq!(vfs.listener_count(), 0);
    }

    #[tokio::test]
    async fn list_sorts_directories_first() {
        let vfs = VirtualFileSystem::in_memory();
        vfs.write("b.txt", "").await.unwrap();
        vfs.create_dir("zeta").await.unwrap();
        let names: Vec<_> = vfs.list("").await.unwrap().into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["zeta", "README.md", "b.txt"]);
    }

    #[tokio::test]
    async fn list_recursive_populates_and_excludes() {
        let vfs = VirtualFileSystem::in_memory();
        vfs.write("src/components/Button.tsx", "").await.unwrap();
        vfs.write("node_modules/react/index.js", "").await.unwrap();

        let exclude = vec!["node_modules".to_string()];
        let tree = vfs.list_recursive("", &exclude).await.unwrap();
        let names: Vec<_> = tree.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["src", "README.md"]);

        let src = &tree[0];
        let components = &src.children.as_ref().unwrap()[0];
        assert_eq!(components.path, "src/components");
        let button = &components.children.as_ref().unwrap()[0];
        assert_eq!(button.path, "src/components/Button.tsx");
        assert!(button.children.is_none());
    }

    #[tokio::test]
    async fn search_by_name_ignores_directories_and_case() {
        let vfs = VirtualFileSystem::in_memory();
        vfs.write("login/LoginForm.tsx", "").await.unwrap();
        vfs.write("api/login.py", "").await.unwrap();
        vfs.write("node_modules/login-lib/login.js", "").await.unwrap();

        let mut found = vfs.search_by_name("LOGIN").await;
        found.sort();
        assert_eq!(found, vec!["api/login.py", "login/LoginForm.tsx"]);
        assert!(vfs.search_by_name("  ").await.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn locked_native_subtree_is_listed_as_empty() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("locked")).unwrap();
        std::fs::create_dir_all(dir.path().join("open")).unwrap();
        std::fs::write(dir.path().join("locked/secret.txt"), "s").unwrap();
        std::fs::write(dir.path().join("open/notes.txt"), "n").unwrap();
        std::fs::write(dir.path().join("app.js"), "").unwrap();

        let locked = dir.path().join("locked");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        if std::fs::read_dir(&locked).is_ok() {
            // Permissions are not enforced for root
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let vfs = VirtualFileSystem::open(Some(dir.path().to_path_buf())).await;
        let tree = vfs.list_recursive("", &[]).await;
        let found = vfs.search_by_name("notes").await;
        let hidden = vfs.search_by_name("secret").await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        let tree = tree.unwrap();
        let names: Vec<_> = tree.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["locked", "open", "app.js"]);
        assert_eq!(tree[0].children, Some(vec![]));
        assert_eq!(tree[1].children.as_ref().unwrap()[0].path, "open/notes.txt");
        assert_eq!(found, vec!["open/notes.txt"]);
        assert!(hidden.is_empty());
    }
}
