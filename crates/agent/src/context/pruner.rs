//! History pruning.
//!
//! The first message (usually the one that set up the task) and the latest
//! one are always kept. Interior messages are kept newest-first while the
//! running serialized size stays within the budget; the first message that
//! does not fit ends the walk, so the kept interior is always a contiguous
//! recent run.

use tessera_core::agent::ProviderKind;
use tessera_core::message::ConversationMessage;
use tracing::debug;

/// The last `depth` messages of `history`. A depth of 0 means unlimited.
pub fn apply_history_depth(history: &[ConversationMessage], depth: usize) -> &[ConversationMessage] {
    if depth == 0 || history.len() <= depth {
        history
    } else {
        &history[history.len() - depth..]
    }
}

/// Trim `history` to `budget_chars`, keeping first and last messages.
pub fn prune(history: &[ConversationMessage], budget_chars: usize) -> Vec<ConversationMessage> {
    if history.len() <= 2 {
        return history.to_vec();
    }

    let first = &history[0];
    let last = &history[history.len() - 1];
    let interior = &history[1..history.len() - 1];

    let mut used = first.serialized_len() + last.serialized_len();
    let mut kept = 0;
    for msg in interior.iter().rev() {
        let size = msg.serialized_len();
        if used + size > budget_chars {
            break;
        }
        used += size;
        kept += 1;
    }

    if kept < interior.len() {
        debug!(
            dropped = interior.len() - kept,
            kept,
            chars = used,
            budget = budget_chars,
            "Pruned conversation history"
        );
    }

    let mut pruned = Vec::with_capacity(kept + 2);
    pruned.push(first.clone());
    pruned.extend_from_slice(&interior[interior.len() - kept..]);
    pruned.push(last.clone());
    pruned
}

/// Depth window, then the provider's budget (or `budget_override`).
pub fn prune_for(
    history: &[ConversationMessage],
    depth: usize,
    kind: ProviderKind,
    budget_override: Option<usize>,
) -> Vec<ConversationMessage> {
    let budget = budget_override.unwrap_or_else(|| kind.context_budget_chars());
    prune(apply_history_depth(history, depth), budget)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(n: usize, text_len: usize) -> Vec<ConversationMessage> {
        (0..n)
            .map(|i| {
                let mut m = ConversationMessage::user(format!("{i:03}{}", "x".repeat(text_len)));
                m.timestamp = None;
                m
            })
            .collect()
    }

    fn texts(msgs: &[ConversationMessage]) -> Vec<String> {
        msgs.iter().map(|m| m.text()[..3].to_string()).collect()
    }

    #[test]
    fn short_histories_are_untouched() {
        let h = history(2, 10_000);
        assert_eq!(prune(&h, 10), h);
        assert!(prune(&[], 10).is_empty());
    }

    #[test]
    fn tiny_budget_keeps_first_and_last() {
        let h = history(6, 100);
        let pruned = prune(&h, 1);
        assert_eq!(texts(&pruned), vec!["000", "005"]);
    }

    #[test]
    fn keeps_newest_interior_that_fits() {
        let h = history(6, 100);
        let size = h[0].serialized_len();
        // first + last + two interior messages
        let pruned = prune(&h, size * 4 + size / 2);
        assert_eq!(texts(&pruned), vec!["000", "003", "004", "005"]);
    }

    #[test]
    fn stops_at_first_overflow() {
        let mut h = history(5, 10);
        // A large message in the middle blocks everything older
        h[2] = ConversationMessage::user(format!("002{}", "y".repeat(5_000)));
        let budget = h[0].serialized_len() * 4 + 100;
        let pruned = prune(&h, budget);
        assert_eq!(texts(&pruned), vec!["000", "003", "004"]);
    }

    #[test]
    fn pruning_is_idempotent() {
        let h = history(12, 50);
        let budget = h[0].serialized_len() * 6;
        let once = prune(&h, budget);
        let twice = prune(&once, budget);
        assert_eq!(once, twice);
        assert!(once.len() < h.len());
    }

    #[test]
    fn generous_budget_keeps_everything() {
        let h = history(8, 20);
        assert_eq!(prune(&h, usize::MAX / 2), h);
    }

    #[test]
    fn history_depth_takes_the_tail() {
        let h = history(10, 1);
        assert_eq!(texts(apply_history_depth(&h, 3)), vec!["007", "008", "009"]);
        assert_eq!(apply_history_depth(&h, 0).len(), 10);
        assert_eq!(apply_history_depth(&h, 50).len(), 10);
    }

    #[test]
    fn prune_for_uses_override() {
        let h = history(6, 100);
        let pruned = prune_for(&h, 0, ProviderKind::Gemini, Some(1));
        assert_eq!(pruned.len(), 2);
        let pruned = prune_for(&h, 4, ProviderKind::Gemini, None);
        assert_eq!(texts(&pruned), vec!["002", "003", "004", "005"]);
    }
}
