//! The in-memory code index.
//!
//! Kept current by listening to the virtual filesystem: every committed
//! write re-indexes one file, every delete drops a path and its
//! descendants. Search is keyword scoring over path, symbols and snippet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tessera_vfs::path::extension;
use tessera_vfs::{DEFAULT_EXCLUDED_DIRS, FsEvent, FsEventKind, FsListener, Subscription, VirtualFileSystem};
use tracing::{debug, info, warn};

use crate::symbols::{Language, extract_symbols, snippet, summarize};

const MAX_RESULTS: usize = 10;
const PATH_SCORE: u32 = 10;
const SYMBOL_SCORE: u32 = 5;
const SNIPPET_SCORE: u32 = 1;

/// What the index knows about one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: String,
    pub symbols: Vec<String>,
    pub summary: String,
    pub snippet: String,
    pub indexed_at: DateTime<Utc>,
}

impl IndexEntry {
    pub fn build(path: &str, content: &str) -> Self {
        let ext = extension(path);
        let lang = Language::from_extension(ext.as_deref());
        let symbols = extract_symbols(lang, content);
        let summary = summarize(lang, ext.as_deref(), &symbols);
        Self {
            path: path.to_string(),
            symbols,
            summary,
            snippet: snippet(content),
            indexed_at: Utc::now(),
        }
    }
}

/// A scored search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub path: String,
    pub score: u32,
    pub reasons: Vec<String>,
    pub summary: String,
}

impl SearchHit {
    /// `<path> — matched <first two reasons> — <summary>`
    pub fn to_line(&self) -> String {
        let reasons: Vec<&str> = self.reasons.iter().take(2).map(String::as_str).collect();
        format!("{} — matched {} — {}", self.path, reasons.join(", "), self.summary)
    }
}

pub struct CodeIndex {
    entries: RwLock<Vec<IndexEntry>>,
    excluded: Vec<String>,
}

impl CodeIndex {
    pub fn new() -> Self {
        Self::with_excluded_dirs(DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_excluded_dirs(excluded: Vec<String>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            excluded,
        }
    }

    /// Subscribe to `vfs`. The index follows the filesystem until the
    /// returned subscription is dropped.
    pub fn attach(self: &Arc<Self>, vfs: &VirtualFileSystem) -> Subscription {
        vfs.subscribe(self.clone())
    }

    /// Index every file currently in the workspace.
    pub async fn rebuild(&self, vfs: &VirtualFileSystem) -> usize {
        let mut indexed = 0;
        for path in vfs.walk_files().await {
            if self.is_ignored(&path) {
                continue;
            }
            match vfs.read(&path).await {
                Ok(content) => {
                    self.upsert(IndexEntry::build(&path, &content));
                    indexed += 1;
                }
                Err(e) => warn!(path = %path, error = %e, "Skipping unreadable file"),
            }
        }
        info!(files = indexed, "Code index rebuilt");
        indexed
    }

    /// Apply one filesystem change.
    pub fn on_file_changed(&self, kind: FsEventKind, path: &str, content: Option<&str>) {
        match kind {
            FsEventKind::Write => {
                if self.is_ignored(path) {
                    return;
                }
                self.upsert(IndexEntry::build(path, content.unwrap_or_default()));
                debug!(path = %path, "Indexed");
            }
            FsEventKind::Delete => {
                let prefix = format!("{path}/");
                let mut entries = self.write_entries();
                entries.retain(|e| e.path != path && !e.path.starts_with(&prefix));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, path: &str) -> Option<IndexEntry> {
        self.read_entries().iter().find(|e| e.path == path).cloned()
    }

    /// Ranked hits for a free-text query, best first, at most ten.
    pub fn search_hits(&self, query: &str) -> Vec<SearchHit> {
        let query_lower = query.trim().to_lowercase();
        let tokens: Vec<&str> = query_lower.split_whitespace().collect();
        if tokens.is_empty() {
            return Vec::new();
        }

        let entries = self.read_entries();
        let mut hits: Vec<SearchHit> = entries
            .iter()
            .filter_map(|entry| score_entry(entry, &query_lower, &tokens))
            .collect();
        drop(entries);

        // Stable: equal scores keep insertion order
        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits.truncate(MAX_RESULTS);
        hits
    }

    /// Ranked hits rendered one per line.
    pub fn search(&self, query: &str) -> Vec<String> {
        self.search_hits(query).iter().map(SearchHit::to_line).collect()
    }

    fn is_ignored(&self, path: &str) -> bool {
        path.split('/')
            .any(|seg| seg.starts_with('.') || self.excluded.iter().any(|d| d == seg))
    }

    /// Replace in place, or append when new.
    fn upsert(&self, entry: IndexEntry) {
        let mut entries = self.write_entries();
        match entries.iter_mut().find(|e| e.path == entry.path) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, Vec<IndexEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, Vec<IndexEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for CodeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl FsListener for CodeIndex {
    fn on_fs_event(&self, event: &FsEvent) {
        self.on_file_changed(event.kind, &event.path, event.content.as_deref());
    }
}

fn score_entry(entry: &IndexEntry, query_lower: &str, tokens: &[&str]) -> Option<SearchHit> {
    let mut score = 0;
    let mut reasons = Vec::new();

    if entry.path.to_lowercase().contains(query_lower) {
        score += PATH_SCORE;
        reasons.push("path".to_string());
    }

    let symbols_lower: Vec<String> = entry.symbols.iter().map(|s| s.to_lowercase()).collect();
    for token in tokens {
        if let Some(i) = symbols_lower.iter().position(|s| s.contains(token)) {
            score += SYMBOL_SCORE;
            let reason = format!("symbol {}", entry.symbols[i]);
            if !reasons.contains(&reason) {
                reasons.push(reason);
            }
        }
    }

    let snippet_lower = entry.snippet.to_lowercase();
    if tokens.iter().any(|t| snippet_lower.contains(t)) {
        score += SNIPPET_SCORE;
        reasons.push("content".to_string());
    }

    (score > 0).then(|| SearchHit {
        path: entry.path.clone(),
        score,
        reasons,
        summary: entry.summary.clone(),
    })
}
