//! Storage backend trait.
//!
//! A workspace has exactly one active backend, chosen when it is opened.
//! Backends receive already-normalized segments and never emit events;
//! notification is the job of `VirtualFileSystem`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tessera_core::error::VfsError;

use crate::node::DirEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// A real directory tree on the host
    Native,
    /// A tree held entirely in process memory
    Memory,
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Read a file's content.
    async fn read(&self, path: &[String]) -> Result<String, VfsError>;

    /// Write a file, creating intermediate directories.
    async fn write(&self, path: &[String], content: &str) -> Result<(), VfsError>;

    /// Delete a file, or a directory recursively.
    async fn delete(&self, path: &[String]) -> Result<(), VfsError>;

    /// Create a directory and any missing parents.
    async fn create_dir(&self, path: &[String]) -> Result<(), VfsError>;

    /// Entries directly inside a directory, in no particular order.
    async fn entries(&self, path: &[String]) -> Result<Vec<DirEntry>, VfsError>;
}
