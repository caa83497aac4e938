//! Workspace path normalization.
//!
//! Workspace paths are slash-separated and relative to the workspace root.
//! Empty and `.` segments are discarded; `..` is rejected so no path can
//! leave the workspace, whichever backend is active.

use tessera_core::error::VfsError;

/// A normalized workspace path: a list of non-empty segments.
/// The empty list is the workspace root.
pub type Segments = Vec<String>;

/// Split a raw path into normalized segments.
pub fn normalize(path: &str) -> Result<Segments, VfsError> {
    let mut segments = Vec::new();
    for seg in path.split(['/', '\\']) {
        match seg {
            "" | "." => continue,
            ".." => {
                return Err(VfsError::InvalidPath {
                    path: path.into(),
                    reason: "parent traversal ('..') is not allowed".into(),
                });
            }
            s if s.contains('\0') => {
                return Err(VfsError::InvalidPath {
                    path: path.into(),
                    reason: "NUL byte in path".into(),
                });
            }
            s => segments.push(s.to_string()),
        }
    }
    Ok(segments)
}

/// Join segments back into a slash path.
pub fn join(segments: &[String]) -> String {
    segments.join("/")
}

/// Normalize a path to its canonical slash form.
pub fn canonical(path: &str) -> Result<String, VfsError> {
    normalize(path).map(|s| join(&s))
}

/// Resolve `path` inside an agent's scope `root`.
pub fn scoped(root: &str, path: &str) -> Result<String, VfsError> {
    let mut segments = normalize(root)?;
    segments.extend(normalize(path)?);
    Ok(join(&segments))
}

/// Last segment of a path (its name), or "" for the root.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

/// Lower-cased extension of the final segment, if any.
pub fn extension(path: &str) -> Option<String> {
    let name = file_name(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
