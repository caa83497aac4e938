//! Filesystem node types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

/// A raw directory entry as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: NodeKind,
}

/// A file or directory in the workspace tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemNode {
    pub name: String,

    /// Slash path relative to the workspace root
    pub path: String,

    pub kind: NodeKind,

    /// Children of a directory; `None` until populated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileSystemNode>>,
}

impl FileSystemNode {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// Directories first, then files; each group by name.
pub fn sort_nodes(nodes: &mut [FileSystemNode]) {
    nodes.sort_by(|a, b| {
        let rank = |n: &FileSystemNode| if n.is_dir() { 0 } else { 1 };
        rank(a).cmp(&rank(b)).then_with(|| a.name.cmp(&b.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, kind: NodeKind) -> FileSystemNode {
        FileSystemNode {
            name: name.into(),
            path: name.into(),
            kind,
            children: None,
        }
    }

    #[test]
    fn directories_sort_before_files() {
        let mut nodes = vec![
            node("b.ts", NodeKind::File),
            node("src", NodeKind::Directory),
            node("a.ts", NodeKind::File),
            node("assets", NodeKind::Directory),
        ];
        sort_nodes(&mut nodes);
        let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["assets", "src", "a.ts", "b.ts"]);
    }
}
