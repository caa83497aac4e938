//! In-memory backend: used when the host denies directory access or no
//! directory was given. Nothing touches the disk.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tessera_core::error::VfsError;
use tokio::sync::RwLock;

use crate::backend::{BackendKind, StorageBackend};
use crate::node::{DirEntry, NodeKind};
use crate::path::join;

/// Name and content of the file every fresh memory workspace starts with.
pub const WELCOME_FILE: &str = "README.md";
pub const WELCOME_CONTENT: &str = "# In-memory workspace\n\n\
No project directory is mounted, so files live in memory for this session only.\n\
Anything the agents create here disappears when the session ends.\n";

#[derive(Debug, Clone)]
enum MemNode {
    File(String),
    Dir(BTreeMap<String, MemNode>),
}

/// An ownership tree of nodes held in process memory.
pub struct MemoryBackend {
    root: RwLock<BTreeMap<String, MemNode>>,
}

impl MemoryBackend {
    /// An empty tree.
    pub fn empty() -> Self {
        Self {
            root: RwLock::new(BTreeMap::new()),
        }
    }

    /// A tree seeded with the explanatory welcome file.
    pub fn new() -> Self {
        let mut root = BTreeMap::new();
        root.insert(WELCOME_FILE.to_string(), MemNode::File(WELCOME_CONTENT.to_string()));
        Self {
            root: RwLock::new(root),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk to the directory map at `path`, creating directories if `create`.
fn dir_mut<'a>(
    mut dir: &'a mut BTreeMap<String, MemNode>,
    path: &[String],
    create: bool,
) -> Result<&'a mut BTreeMap<String, MemNode>, VfsError> {
    for (i, seg) in path.iter().enumerate() {
        if create && !dir.contains_key(seg) {
            dir.insert(seg.clone(), MemNode::Dir(BTreeMap::new()));
        }
        dir = match dir.get_mut(seg) {
            Some(MemNode::Dir(children)) => children,
            Some(MemNode::File(_)) if create => {
                return Err(VfsError::PathCollision {
                    path: join(path),
                    segment: join(&path[..=i]),
                });
            }
            Some(MemNode::File(_)) => return Err(VfsError::NotADirectory(join(&path[..=i]))),
            None => return Err(VfsError::NotFound(join(path))),
        };
    }
    Ok(dir)
}

fn dir_ref<'a>(
    mut dir: &'a BTreeMap<String, MemNode>,
    path: &[String],
) -> Result<&'a BTreeMap<String, MemNode>, VfsError> {
    for (i, seg) in path.iter().enumerate() {
        dir = match dir.get(seg) {
            Some(MemNode::Dir(children)) => children,
            Some(MemNode::File(_)) => return Err(VfsError::NotADirectory(join(&path[..=i]))),
            None => return Err(VfsError::NotFound(join(path))),
        };
    }
    Ok(dir)
}

fn split_last(path: &[String]) -> Result<(&[String], &String), VfsError> {
    match path.split_last() {
        Some((name, parent)) => Ok((parent, name)),
        None => Err(VfsError::InvalidPath {
            path: "/".into(),
            reason: "the workspace root cannot be used here".into(),
        }),
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn read(&self, path: &[String]) -> Result<String, VfsError> {
        let (parent, name) = split_last(path)?;
        let root = self.root.read().await;
        let dir = dir_ref(&root, parent).map_err(|_| VfsError::NotFound(join(path)))?;
        match dir.get(name) {
            Some(MemNode::File(content)) => Ok(content.clone()),
            Some(MemNode::Dir(_)) => Err(VfsError::IsDirectory(join(path))),
            None => Err(VfsError::NotFound(join(path))),
        }
    }

    async fn write(&self, path: &[String], content: &str) -> Result<(), VfsError> {
        let (parent, name) = split_last(path)?;
        let mut root = self.root.write().await;
        let dir = dir_mut(&mut root, parent, true)?;
        if let Some(MemNode::Dir(_)) = dir.get(name) {
            return Err(VfsError::IsDirectory(join(path)));
        }
        dir.insert(name.clone(), MemNode::File(content.to_string()));
        Ok(())
    }

    async fn delete(&self, path: &[String]) -> Result<(), VfsError> {
        let (parent, name) = split_last(path)?;
        let mut root = self.root.write().await;
        let dir = dir_mut(&mut root, parent, false).map_err(|_| VfsError::NotFound(join(path)))?;
        dir.remove(name)
            .map(|_| ())
            .ok_or_else(|| VfsError::NotFound(join(path)))
    }

    async fn create_dir(&self, path: &[String]) -> Result<(), VfsError> {
        let mut root = self.root.write().await;
        dir_mut(&mut root, path, true).map(|_| ())
    }

    async fn entries(&self, path: &[String]) -> Result<Vec<DirEntry>, VfsError> {
        let root = self.root.read().await;
        let dir = dir_ref(&root, path)?;
        Ok(dir
            .iter()
            .map(|(name, node)| DirEntry {
                name: name.clone(),
                kind: match node {
                    MemNode::Dir(_) => NodeKind::Directory,
                    MemNode::File(_) => NodeKind::File,
                },
            })
            .collect())
    }
}
