//! The merge resolver.
//!
//! Pure function of two documents, no IO and no clock. Every pull and
//! every push funnels through [`merge`], so convergence depends only
//! on these rules:
//!
//! - Tombstones union first and filter last; a deleted id never
//!   reappears no matter which side still carries the record.
//! - Collections resolve per record id, last writer wins with the
//!   local copy winning a collision. The winner takes the whole
//!   record; concurrent edits to different fields of one record do
//!   not combine. The merged order is the remote order with
//!   local-only records appended, so two replicas that saw the same
//!   sets agree on positions.
//! - `safety_log` is a key union, local wins per key.
//! - The singleton blobs (`users`, `categories`, `daily_agenda`) are
//!   taken from the remote side wholesale; they are owned by whichever
//!   replica pushed last.
//! - `last_backup_date` stays local. Backups are per-replica, and
//!   inheriting a remote date would silently skip a day here.

use std::collections::BTreeSet;
use std::collections::HashMap;

use crate::model::{BoardState, Record};

/// Merge the remote document into the local one, producing the new
/// local state. Commutative over record sets (not positions),
/// idempotent, and associative enough for a leaderless loop: any
/// interleaving of pulls and pushes converges once traffic stops.
pub fn merge(local: &BoardState, remote: &BoardState) -> BoardState {
    let mut tombstones: BTreeSet<String> = remote.deleted_item_ids.clone();
    tombstones.extend(local.deleted_item_ids.iter().cloned());

    let mut safety_log = remote.safety_log.clone();
    safety_log.extend(local.safety_log.clone());

    BoardState {
        tasks: merge_records(&remote.tasks, &local.tasks, &tombstones),
        projects: merge_records(&remote.projects, &local.projects, &tombstones),
        ideas: merge_records(&remote.ideas, &local.ideas, &tombstones),
        kudos: merge_records(&remote.kudos, &local.kudos, &tombstones),
        okrs: merge_records(&remote.okrs, &local.okrs, &tombstones),
        bookings: merge_records(&remote.bookings, &local.bookings, &tombstones),
        safety_log,
        users: remote.users.clone(),
        categories: remote.categories.clone(),
        daily_agenda: remote.daily_agenda.clone(),
        deleted_item_ids: tombstones,
        last_backup_date: local.last_backup_date.clone(),
    }
}

/// Union one collection by id. Remote records are inserted first, then
/// local records; a local record with a colliding id replaces the
/// remote one in place, keeping the remote's position. Records without
/// an id cannot collide and pass straight through. Tombstoned ids are
/// dropped after the union so the filter beats both sides.
fn merge_records(remote: &[Record], local: &[Record], tombstones: &BTreeSet<String>) -> Vec<Record> {
    let mut merged: Vec<Record> = Vec::with_capacity(remote.len() + local.len());
    let mut slot_by_id: HashMap<String, usize> = HashMap::new();

    for record in remote.iter().chain(local.iter()) {
        match record.id() {
            Some(id) => match slot_by_id.get(id) {
                Some(&slot) => merged[slot] = record.clone(),
                None => {
                    slot_by_id.insert(id.to_string(), merged.len());
                    merged.push(record.clone());
                }
            },
            None => merged.push(record.clone()),
        }
    }

    merged.retain(|record| match record.id() {
        Some(id) => !tombstones.contains(id),
        None => true,
    });
    merged
}

#[cfg(test)]
#[path = "tests/merge_tests.rs"]
mod tests;
