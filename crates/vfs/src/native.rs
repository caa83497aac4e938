//! Native backend: a real directory tree on the host, via `tokio::fs`.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tessera_core::error::VfsError;
use tracing::{debug, warn};

use crate::backend::{BackendKind, StorageBackend};
use crate::node::{DirEntry, NodeKind};
use crate::path::join;

/// Maps workspace paths onto a mounted directory.
pub struct NativeBackend {
    root: PathBuf,
}

impl NativeBackend {
    /// Mount `root`. Fails if it is not a readable directory.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, VfsError> {
        let root = root.into();
        let shown = root.display().to_string();
        let meta = tokio::fs::metadata(&root)
            .await
            .map_err(|e| map_io(&shown, e))?;
        if !meta.is_dir() {
            return Err(VfsError::NotADirectory(shown));
        }
        // Probe that we may actually list it
        tokio::fs::read_dir(&root)
            .await
            .map_err(|e| map_io(&shown, e))?;
        debug!(root = %shown, "Native workspace mounted");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &[String]) -> PathBuf {
        let mut full = self.root.clone();
        for seg in path {
            full.push(seg);
        }
        full
    }

    /// Ensure no proper prefix of `path` is an existing file.
    async fn check_collisions(&self, path: &[String], upto: usize) -> Result<(), VfsError> {
        let mut full = self.root.clone();
        for i in 0..upto {
            full.push(&path[i]);
            match tokio::fs::metadata(&full).await {
                Ok(meta) if !meta.is_dir() => {
                    return Err(VfsError::PathCollision {
                        path: join(path),
                        segment: join(&path[..=i]),
                    });
                }
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(map_io(&join(path), e)),
            }
        }
        Ok(())
    }
}

fn map_io(path: &str, e: std::io::Error) -> VfsError {
    match e.kind() {
        ErrorKind::NotFound => VfsError::NotFound(path.into()),
        ErrorKind::PermissionDenied => VfsError::PermissionDenied(path.into()),
        _ => VfsError::Io {
            path: path.into(),
            reason: e.to_string(),
        },
    }
}

fn reject_root(path: &[String]) -> Result<(), VfsError> {
    if path.is_empty() {
        return Err(VfsError::InvalidPath {
            path: "/".into(),
            reason: "the workspace root cannot be used here".into(),
        });
    }
    Ok(())
}

#[async_trait]
impl StorageBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    async fn read(&self, path: &[String]) -> Result<String, VfsError> {
        reject_root(path)?;
        let shown = join(path);
        let full = self.resolve(path);
        let meta = tokio::fs::metadata(&full).await.map_err(|e| map_io(&shown, e))?;
        if meta.is_dir() {
            return Err(VfsError::IsDirectory(shown));
        }
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| map_io(&shown, e))
    }

    async fn write(&self, path: &[String], content: &str) -> Result<(), VfsError> {
        reject_root(path)?;
        let shown = join(path);
        self.check_collisions(path, path.len() - 1).await?;
        let full = self.resolve(path);
        if let Ok(meta) = tokio::fs::metadata(&full).await
            && meta.is_dir()
        {
            return Err(VfsError::IsDirectory(shown));
        }
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io(&shown, e))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| map_io(&shown, e))
    }

    async fn delete(&self, path: &[String]) -> Result<(), VfsError> {
        reject_root(path)?;
        let shown = join(path);
        let full = self.resolve(path);
        let meta = tokio::fs::symlink_metadata(&full)
            .await
            .map_err(|e| map_io(&shown, e))?;
        let removed = if meta.is_dir() {
            tokio::fs::remove_dir_all(&full).await
        } else {
            tokio::fs::remove_file(&full).await
        };
        removed.map_err(|e| map_io(&shown, e))
    }

    async fn create_dir(&self, path: &[String]) -> Result<(), VfsError> {
        self.check_collisions(path, path.len()).await?;
        tokio::fs::create_dir_all(self.resolve(path))
            .await
            .map_err(|e| map_io(&join(path), e))
    }

    async fn entries(&self, path: &[String]) -> Result<Vec<DirEntry>, VfsError> {
        let shown = join(path);
        let mut reader = tokio::fs::read_dir(self.resolve(path))
            .await
            .map_err(|e| map_io(&shown, e))?;
        let mut entries = Vec::new();
        loop {
            let entry = match reader.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    // Handle went stale mid-listing: keep what we have
                    warn!(path = %shown, error = %e, "Directory listing interrupted");
                    break;
                }
            };
            let Ok(name) = entry.file_name().into_string() else {
                debug!(path = %shown, "Skipping non UTF-8 file name");
                continue;
            };
            // Follows symlinks; dangling links are skipped
            let kind = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_dir() => NodeKind::Directory,
                Ok(_) => NodeKind::File,
                Err(_) => continue,
            };
            entries.push(DirEntry { name, kind });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::normalize;

    fn p(s: &str) -> Vec<String> {
        normalize(s).unwrap()
    }

    #[tokio::test]
    async fn open_rejects_missing_dir() {
        let err = NativeBackend::open("/definitely/not/here").await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn open_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, "x").unwrap();
        let err = NativeBackend::open(&file).await.err().unwrap();
        assert!(matches!(err, VfsError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn write_read_delete_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let backend = NativeBackend::open(dir.path()).await.unwrap();

        backend.write(&p("src/main.py"), "print('hi')").await.unwrap();
        assert!(dir.path().join("src/main.py").exists());
        assert_eq!(backend.read(&p("src/main.py")).await.unwrap(), "print('hi')");

        backend.delete(&p("src")).await.unwrap();
        assert!(!dir.path().join("src").exists());
    }

    #[tokio::test]
    async fn collision_with_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data"), "file").unwrap();
        let backend = NativeBackend::open(dir.path()).await.unwrap();

        let err = backend.write(&p("data/x.json"), "{}").await.unwrap_err();
        assert!(matches!(err, VfsError::PathCollision { .. }));
        let err = backend.create_dir(&p("data/sub")).await.unwrap_err();
        assert!(matches!(err, VfsError::PathCollision { .. }));
        assert_eq!(std::fs::read_to_string(dir.path().join("data")).unwrap(), "file");
    }

    #[tokio::test]
    async fn entries_reports_kinds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("lib")).unwrap();
        std::fs::write(dir.path().join("a.ts"), "").unwrap();
        let backend = NativeBackend::open(dir.path()).await.unwrap();

        let mut entries = backend.entries(&[]).await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            entries,
            vec![
                DirEntry { name: "a.ts".into(), kind: NodeKind::File },
                DirEntry { name: "lib".into(), kind: NodeKind::Directory },
            ]
        );
    }
}
