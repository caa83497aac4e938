//! Context window management.
//!
//! Histories are trimmed in two steps before every request: a fixed
//! message-count window per agent (`history_depth`), then a size budget in
//! serialized characters that depends on the provider.

pub mod pruner;

pub use pruner::{apply_history_depth, prune, prune_for};
