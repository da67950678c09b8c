mod defaults;
mod patch;
mod record;
mod settings;
mod state;

pub use patch::DocumentPatch;
pub use record::Record;
pub use settings::{BackupSettings, RemoteTarget, SyncSettings};
pub use state::BoardState;
