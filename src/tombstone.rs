//! Deletion tracking.
//!
//! A record removed from a collection leaves no trace in the document
//! itself, so a stale replica would happily merge it back. Before a
//! mutation is applied, the ids that are about to disappear are diffed
//! out and appended to `deleted_item_ids`; the merge resolver treats
//! that ledger as the authoritative signal that removal was
//! intentional.

use std::collections::BTreeSet;

use crate::model::{BoardState, DocumentPatch, Record};

/// Ids present in `previous` but absent from `next`.
pub fn missing_ids(previous: &[Record], next: &[Record]) -> BTreeSet<String> {
    let kept: BTreeSet<&str> = next.iter().filter_map(Record::id).collect();
    previous
        .iter()
        .filter_map(Record::id)
        .filter(|id| !kept.contains(id))
        .map(str::to_string)
        .collect()
}

/// Ids that `patch` would remove from `state`, across every collection
/// the patch touches. Must be computed against the pre-mutation state.
pub fn patch_deletions(state: &BoardState, patch: &DocumentPatch) -> BTreeSet<String> {
    let mut deleted = BTreeSet::new();
    for (name, next) in patch.collections() {
        let previous = state
            .collections()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| c);
        if let Some(previous) = previous {
            deleted.extend(missing_ids(previous, next));
        }
    }
    deleted
}

/// Ids that vanished between two full documents. The general form of
/// the per-patch diff; note that import deliberately bypasses this
/// (restoring a backup must be able to revive records).
pub fn diff_deletions(previous: &BoardState, next: &BoardState) -> BTreeSet<String> {
    let mut deleted = BTreeSet::new();
    for ((_, prev), (_, new)) in previous.collections().iter().zip(next.collections().iter()) {
        deleted.extend(missing_ids(prev, new));
    }
    deleted
}

#[cfg(test)]
#[path = "tests/tombstone_tests.rs"]
mod tests;
