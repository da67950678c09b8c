use serde::Serialize;

use crate::model::BoardState;

/// Whether the engine is serving the live, mutable board or a
/// historical snapshot loaded for inspection.
///
/// Read-only sessions are strictly isolated: every mutation entry
/// point is rejected, both sync timers and the backup scheduler stop,
/// and the transport is dropped. Leaving the session reloads the live
/// store and stays disconnected; reconnecting is a separate explicit
/// step so a user cannot fall out of a historical view straight into
/// a push.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionMode {
    #[default]
    Live,
    ReadOnly,
}

impl SessionMode {
    pub fn is_live(self) -> bool {
        matches!(self, SessionMode::Live)
    }

    pub fn is_read_only(self) -> bool {
        matches!(self, SessionMode::ReadOnly)
    }
}

/// Collection counts for status output and snapshot inspection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BoardSummary {
    pub tasks: usize,
    pub projects: usize,
    pub ideas: usize,
    pub kudos: usize,
    pub okrs: usize,
    pub bookings: usize,
    pub safety_days: usize,
    pub deleted: usize,
    pub last_backup_date: Option<String>,
}

pub fn summarize(state: &BoardState) -> BoardSummary {
    BoardSummary {
        tasks: state.tasks.len(),
        projects: state.projects.len(),
        ideas: state.ideas.len(),
        kudos: state.kudos.len(),
        okrs: state.okrs.len(),
        bookings: state.bookings.len(),
        safety_days: state.safety_log.len(),
        deleted: state.deleted_item_ids.len(),
        last_backup_date: state.last_backup_date.clone(),
    }
}
