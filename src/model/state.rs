use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::defaults::{default_categories, default_daily_agenda, default_users};
use super::patch::DocumentPatch;
use super::record::Record;

/// The full board document. This is the single interchange format:
/// the local cache on disk, the remote blob content, and the
/// export/backup file are all exactly this JSON shape.
///
/// Collections hold opaque [`Record`]s keyed by their `id`. The
/// singleton fields (`users`, `categories`, `daily_agenda`) are opaque
/// JSON blobs owned by whichever client wrote them last.
/// `deleted_item_ids` is the tombstone ledger and `last_backup_date`
/// belongs to the backup scheduler; neither is part of a normal
/// mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardState {
    #[serde(default)]
    pub tasks: Vec<Record>,

    #[serde(default)]
    pub projects: Vec<Record>,

    #[serde(default)]
    pub ideas: Vec<Record>,

    #[serde(default)]
    pub kudos: Vec<Record>,

    #[serde(default)]
    pub okrs: Vec<Record>,

    #[serde(default)]
    pub bookings: Vec<Record>,

    /// Keyed by calendar date, one entry per day.
    #[serde(default)]
    pub safety_log: BTreeMap<String, Value>,

    #[serde(default = "default_users")]
    pub users: Value,

    #[serde(default = "default_categories")]
    pub categories: Value,

    #[serde(default = "default_daily_agenda")]
    pub daily_agenda: Value,

    /// Ids of records deleted on this replica or learned from merges.
    /// Never pruned; a tombstone must out-survive every stale copy of
    /// the record it deletes.
    #[serde(default)]
    pub deleted_item_ids: BTreeSet<String>,

    /// Date stamp (`YYYY-MM-DD`) of the last local backup. Absent
    /// until the first backup runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_backup_date: Option<String>,
}

impl Default for BoardState {
    fn default() -> Self {
        BoardState {
            tasks: Vec::new(),
            projects: Vec::new(),
            ideas: Vec::new(),
            kudos: Vec::new(),
            okrs: Vec::new(),
            bookings: Vec::new(),
            safety_log: BTreeMap::new(),
            users: default_users(),
            categories: default_categories(),
            daily_agenda: default_daily_agenda(),
            deleted_item_ids: BTreeSet::new(),
            last_backup_date: None,
        }
    }
}

impl BoardState {
    /// Apply a partial update. Absent patch fields leave the current
    /// value untouched. Tombstones and the backup date are managed by
    /// the engine, not by patches.
    pub fn apply(&mut self, patch: DocumentPatch) {
        if let Some(tasks) = patch.tasks {
            self.tasks = tasks;
        }
        if let Some(projects) = patch.projects {
            self.projects = projects;
        }
        if let Some(ideas) = patch.ideas {
            self.ideas = ideas;
        }
        if let Some(kudos) = patch.kudos {
            self.kudos = kudos;
        }
        if let Some(okrs) = patch.okrs {
            self.okrs = okrs;
        }
        if let Some(bookings) = patch.bookings {
            self.bookings = bookings;
        }
        if let Some(safety_log) = patch.safety_log {
            self.safety_log = safety_log;
        }
        if let Some(users) = patch.users {
            self.users = users;
        }
        if let Some(categories) = patch.categories {
            self.categories = categories;
        }
        if let Some(daily_agenda) = patch.daily_agenda {
            self.daily_agenda = daily_agenda;
        }
    }

    /// Record collections in a fixed order, paired with their wire
    /// names. Merge and deletion-diff walk these.
    pub(crate) fn collections(&self) -> [(&'static str, &Vec<Record>); 6] {
        [
            ("tasks", &self.tasks),
            ("projects", &self.projects),
            ("ideas", &self.ideas),
            ("kudos", &self.kudos),
            ("okrs", &self.okrs),
            ("bookings", &self.bookings),
        ]
    }

    /// Total record count across all collections.
    pub fn record_count(&self) -> usize {
        self.collections().iter().map(|(_, c)| c.len()).sum()
    }
}
