//! Change notification for the virtual filesystem.
//!
//! The listener collection is owned by the filesystem instance. Subscribing
//! returns a `Subscription` disposer; dropping it (or calling
//! `unsubscribe`) removes the listener.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsEventKind {
    Write,
    Delete,
}

/// A committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: String,
    /// New content for writes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Receives filesystem change events synchronously, in the mutating task.
pub trait FsListener: Send + Sync {
    fn on_fs_event(&self, event: &FsEvent);
}

impl<F> FsListener for F
where
    F: Fn(&FsEvent) + Send + Sync,
{
    fn on_fs_event(&self, event: &FsEvent) {
        self(event)
    }
}

#[derive(Default)]
pub(crate) struct ListenerSet {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(u64, Arc<dyn FsListener>)>>,
}

impl ListenerSet {
    pub(crate) fn add(self: &Arc<Self>, listener: Arc<dyn FsListener>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, listener));
        Subscription {
            id,
            set: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|(lid, _)| *lid != id);
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Deliver to every listener. The list is snapshotted first so a
    /// listener may unsubscribe itself without deadlocking.
    pub(crate) fn emit(&self, event: &FsEvent) {
        let snapshot: Vec<Arc<dyn FsListener>> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in snapshot {
            listener.on_fs_event(event);
        }
    }
}

/// Disposer for a registered listener.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    set: Weak<ListenerSet>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(set) = self.set.upgrade() {
            set.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
