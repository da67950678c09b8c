use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::Record;

/// A partial board update. `None` means "leave this field alone";
/// `Some` replaces the field wholesale, which is how every local
/// mutation (add, edit, delete within a collection) arrives.
///
/// Deliberately excludes `deleted_item_ids` and `last_backup_date`:
/// the tombstone ledger is derived by diffing, and the backup date is
/// written only by the scheduler.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Record>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<Record>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ideas: Option<Vec<Record>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kudos: Option<Vec<Record>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub okrs: Option<Vec<Record>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookings: Option<Vec<Record>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_log: Option<BTreeMap<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_agenda: Option<Value>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_none()
            && self.projects.is_none()
            && self.ideas.is_none()
            && self.kudos.is_none()
            && self.okrs.is_none()
            && self.bookings.is_none()
            && self.safety_log.is_none()
            && self.users.is_none()
            && self.categories.is_none()
            && self.daily_agenda.is_none()
    }

    /// Collection fields actually present in this patch, paired with
    /// their wire names. Used to diff deletions before applying.
    pub(crate) fn collections(&self) -> Vec<(&'static str, &Vec<Record>)> {
        let mut present = Vec::new();
        if let Some(tasks) = &self.tasks {
            present.push(("tasks", tasks));
        }
        if let Some(projects) = &self.projects {
            present.push(("projects", projects));
        }
        if let Some(ideas) = &self.ideas {
            present.push(("ideas", ideas));
        }
        if let Some(kudos) = &self.kudos {
            present.push(("kudos", kudos));
        }
        if let Some(okrs) = &self.okrs {
            present.push(("okrs", okrs));
        }
        if let Some(bookings) = &self.bookings {
            present.push(("bookings", bookings));
        }
        present
    }
}
