//! Virtual filesystem for Tessera workspaces.
//!
//! One facade, two interchangeable backends: a mounted host directory or an
//! in-memory tree. Agents see the same contract either way.

pub mod backend;
pub mod events;
pub mod memory;
pub mod native;
pub mod node;
pub mod path;
pub mod vfs;

pub use backend::{BackendKind, StorageBackend};
pub use events::{FsEvent, FsEventKind, FsListener, Subscription};
pub use memory::MemoryBackend;
pub use native::NativeBackend;
pub use node::{FileSystemNode, NodeKind};
pub use vfs::{DEFAULT_EXCLUDED_DIRS, VirtualFileSystem};
