use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tracing::{debug, info, warn};

use crate::backup::{self, BackupPlan, BackupTarget};
use crate::error::SyncError;
use crate::merge::merge;
use crate::model::{BackupSettings, BoardState, DocumentPatch, RemoteTarget};
use crate::session::SessionMode;
use crate::tombstone;
use crate::transport::Transport;

use super::command::Command;
use super::status::{ConnectionState, EngineStatus};
use super::{SyncEngine, content_digest};

// Placeholder deadline while the push arm is disabled.
const FAR_FUTURE: Duration = Duration::from_secs(86_400);

impl SyncEngine {
    pub(super) async fn run(mut self) {
        let mut poll = interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut backup_tick = interval(self.config.backup_check_interval);
        backup_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let push_at = self
                .push_deadline
                .unwrap_or_else(|| Instant::now() + FAR_FUTURE);

            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => {
                        if !self.handle_command(cmd).await {
                            break;
                        }
                    }
                    None => break,
                },
                _ = poll.tick(), if self.polling_active() => {
                    self.poll_remote().await;
                }
                _ = sleep_until(push_at), if self.push_deadline.is_some() => {
                    self.flush_push().await;
                }
                _ = backup_tick.tick(), if self.backup_active() => {
                    self.run_backup();
                }
            }
        }
        debug!("engine loop stopped");
    }

    fn polling_active(&self) -> bool {
        self.mode.is_live() && self.transport.is_some()
    }

    fn backup_active(&self) -> bool {
        self.mode.is_live() && self.backup.is_some()
    }

    /// Returns false when the engine should stop.
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Update(patch, reply) => {
                let _ = reply.send(self.apply_update(patch));
            }
            Command::Import(state, reply) => {
                let _ = reply.send(self.apply_import(state));
            }
            Command::Connect {
                transport,
                target,
                reply,
            } => {
                let _ = reply.send(self.connect(transport, target).await);
            }
            Command::Disconnect(reply) => {
                self.disconnect();
                let _ = reply.send(());
            }
            Command::EnterReadOnly(snapshot, reply) => {
                self.enter_read_only(snapshot);
                let _ = reply.send(());
            }
            Command::ExitReadOnly(reply) => {
                let _ = reply.send(self.exit_read_only());
            }
            Command::LinkBackup(target, reply) => {
                let _ = reply.send(self.link_backup(target));
            }
            Command::Reauthorize(reply) => {
                let _ = reply.send(self.reauthorize().await);
            }
            Command::Shutdown(reply) => {
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    // Local mutations

    fn apply_update(&mut self, patch: DocumentPatch) -> Result<(), SyncError> {
        if self.mode.is_read_only() {
            return Err(SyncError::ReadOnly);
        }
        if patch.is_empty() {
            return Ok(());
        }

        // Diff against the pre-mutation state; ids the patch removes
        // become tombstones so the deletion survives future merges.
        let deleted = tombstone::patch_deletions(&self.state, &patch);
        if !deleted.is_empty() {
            debug!(count = deleted.len(), "recording tombstones");
        }
        self.state.apply(patch);
        self.state.deleted_item_ids.extend(deleted);

        self.persist_and_publish()?;
        self.mark_dirty();
        Ok(())
    }

    fn apply_import(&mut self, state: BoardState) -> Result<(), SyncError> {
        // Wholesale replacement, tombstone ledger included: restoring
        // a backup must be able to revive records, so nothing is
        // diffed or unioned here.
        self.state = state;
        if self.mode.is_read_only() {
            self.mode = SessionMode::Live;
            info!("import replaced the board; historical session closed");
        }
        self.persist_and_publish()?;
        self.mark_dirty();
        Ok(())
    }

    // Connection lifecycle

    async fn connect(
        &mut self,
        mut transport: Box<dyn Transport>,
        target: Option<RemoteTarget>,
    ) -> Result<(), SyncError> {
        if self.mode.is_read_only() {
            return Err(SyncError::ReadOnly);
        }
        let remote = transport.describe();
        self.connection = ConnectionState::Connecting;
        self.publish_status();

        match self.establish(transport.as_mut(), target).await {
            Ok(()) => {
                self.transport = Some(transport);
                self.connection = ConnectionState::Connected;
                self.connected = true;
                self.last_error = None;
                if self.dirty {
                    self.schedule_push();
                }
                self.publish_status();
                info!(%remote, "connected");
                Ok(())
            }
            Err(err) => {
                self.connection = ConnectionState::Disconnected;
                self.connected = false;
                self.last_error = Some(err.to_string());
                self.publish_status();
                Err(err)
            }
        }
    }

    /// First contact: adopt and merge the remote document if it
    /// exists, create it from local state if it does not.
    async fn establish(
        &mut self,
        transport: &mut dyn Transport,
        target: Option<RemoteTarget>,
    ) -> Result<(), SyncError> {
        match transport.pull().await? {
            Some(body) => {
                let remote: BoardState = serde_json::from_str(&body)?;
                let merged = merge(&self.state, &remote);
                let merged_body = serde_json::to_string(&merged)?;
                let pulled_digest = content_digest(&body);
                let merged_digest = content_digest(&merged_body);

                self.state = merged;
                self.persist_and_publish()?;
                self.last_seen = Some(pulled_digest.clone());
                if merged_digest == pulled_digest {
                    self.last_pushed = Some(pulled_digest);
                    self.dirty = false;
                } else {
                    // Local content the remote lacks; push it once the
                    // debounce fires.
                    self.dirty = true;
                }

                if let Some(target) = target {
                    self.persist_target(target)?;
                }
                Ok(())
            }
            None => {
                let body = serde_json::to_string(&self.state)?;
                let id = transport.create(&body).await?;
                let digest = content_digest(&body);
                self.last_seen = Some(digest.clone());
                self.last_pushed = Some(digest);
                self.dirty = false;
                info!(%id, "created remote document");

                if let Some(mut target) = target {
                    target.set_identifier(id);
                    self.persist_target(target)?;
                }
                Ok(())
            }
        }
    }

    fn persist_target(&mut self, target: RemoteTarget) -> Result<(), SyncError> {
        let mut settings = self.store.load_settings()?;
        settings.remote = Some(target);
        self.store.save_settings(&settings)?;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.transport = None;
        self.connection = ConnectionState::Disconnected;
        self.connected = false;
        self.push_deadline = None;
        self.suppress_until = None;
        self.last_seen = None;
        self.last_pushed = None;
        self.publish_status();
    }

    // Sessions

    fn enter_read_only(&mut self, snapshot: BoardState) {
        // A historical view must not leak to the remote or into
        // board.json; drop the transport and leave the store alone.
        self.disconnect();
        self.mode = SessionMode::ReadOnly;
        self.state = snapshot;
        self.snapshot_tx.send_replace(self.state.clone());
        self.publish_status();
        info!("entered read-only session");
    }

    fn exit_read_only(&mut self) -> Result<(), SyncError> {
        if self.mode.is_live() {
            return Ok(());
        }
        self.state = self.store.load_board()?;
        self.mode = SessionMode::Live;
        self.snapshot_tx.send_replace(self.state.clone());
        // Still disconnected on purpose; reconnecting is explicit.
        self.publish_status();
        info!("exited read-only session");
        Ok(())
    }

    // Backup

    fn link_backup(&mut self, target: BackupTarget) -> Result<(), SyncError> {
        if self.mode.is_read_only() {
            return Err(SyncError::ReadOnly);
        }
        let mut settings = self.store.load_settings()?;
        settings.backup = Some(BackupSettings {
            dir: target.dir.clone(),
            prefix: target.prefix.clone(),
        });
        self.store.save_settings(&settings)?;
        self.backup = Some(target);
        self.needs_reauthorization = false;
        self.publish_status();
        Ok(())
    }

    fn run_backup(&mut self) {
        let Some(backup) = self.backup.as_mut() else {
            return;
        };
        let today = backup::today_stamp();
        match backup.plan(self.state.last_backup_date.as_deref(), &today) {
            BackupPlan::AlreadyDone => {}
            BackupPlan::NeedsReauthorization => {
                if !self.needs_reauthorization {
                    warn!("backup folder permission lost; waiting for reauthorization");
                    self.needs_reauthorization = true;
                    self.publish_status();
                }
            }
            BackupPlan::Write { path } => match backup.write_snapshot(&self.state, &path) {
                Ok(()) => {
                    info!(path = %path.display(), "wrote daily backup");
                    self.state.last_backup_date = Some(today);
                    if let Err(err) = self.persist_and_publish() {
                        warn!(error = %err, "persist backup date");
                    }
                    self.mark_dirty();
                }
                Err(SyncError::Permission(_)) => {
                    warn!("backup folder permission lost; waiting for reauthorization");
                    self.needs_reauthorization = true;
                    self.publish_status();
                }
                Err(err) => {
                    warn!(error = %err, "backup failed");
                }
            },
        }
    }

    async fn reauthorize(&mut self) -> Result<(), SyncError> {
        if let Some(backup) = self.backup.as_mut() {
            backup.reauthorize()?;
        }
        if let Some(transport) = self.transport.as_mut() {
            transport.reauthorize().await?;
        }
        self.needs_reauthorization = false;
        if self.dirty {
            // The pending change gets its next attempt now.
            self.schedule_push();
        }
        self.publish_status();
        Ok(())
    }

    // Poll side

    async fn poll_remote(&mut self) {
        let pulled = match self.transport.as_mut() {
            Some(transport) => transport.pull().await,
            None => return,
        };
        match pulled {
            Ok(Some(body)) => {
                self.note_online();
                let digest = content_digest(&body);
                if self.last_seen.as_deref() == Some(digest.as_str()) {
                    return;
                }
                // Mute the push side before the merge lands so the
                // debounce cannot echo this change straight back.
                self.suppress_until = Some(Instant::now() + self.config.suppression_window);
                self.absorb_remote(&body, digest);
            }
            Ok(None) => {
                self.note_online();
                debug!("remote document missing");
                self.last_seen = None;
            }
            Err(err) => self.note_offline("pull", err),
        }
    }

    /// Merge a pulled remote body into local state and settle the
    /// cursors. Does not touch the suppression window; the poll path
    /// opens it before calling, the push path deliberately does not.
    fn absorb_remote(&mut self, body: &str, digest: String) {
        let remote: BoardState = match serde_json::from_str(body) {
            Ok(remote) => remote,
            Err(err) => {
                // Malformed remote content. Leave the cursor behind so
                // the next tick retries, flag the trouble, keep going.
                warn!(error = %err, "remote document is malformed");
                self.connected = false;
                self.last_error = Some(format!("malformed remote document: {}", err));
                self.publish_status();
                return;
            }
        };

        let merged = merge(&self.state, &remote);
        let merged_body = match serde_json::to_string(&merged) {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "serialize merged board");
                return;
            }
        };
        let merged_digest = content_digest(&merged_body);
        let changed = merged != self.state;

        self.state = merged;
        if changed {
            if let Err(err) = self.persist_and_publish() {
                warn!(error = %err, "persist merged board");
            }
        }

        self.last_seen = Some(digest.clone());
        if merged_digest == digest {
            // The merge reproduced the remote exactly; nothing of ours
            // is missing over there.
            self.last_pushed = Some(digest);
            self.dirty = false;
        } else {
            self.dirty = true;
            self.schedule_push();
        }
        self.publish_status();
    }

    // Push side

    async fn flush_push(&mut self) {
        self.push_deadline = None;
        if !self.mode.is_live() || self.transport.is_none() {
            return;
        }

        // Inside the suppression window: come back right after it.
        if let Some(until) = self.suppress_until {
            if Instant::now() < until {
                self.push_deadline = Some(until);
                return;
            }
            self.suppress_until = None;
        }

        // Read-merge-write: someone may have pushed since our last
        // poll, and replacing their write wholesale would lose it.
        let pulled = match self.transport.as_mut() {
            Some(transport) => transport.pull().await,
            None => return,
        };
        match pulled {
            Ok(Some(remote_body)) => {
                let remote_digest = content_digest(&remote_body);
                if self.last_seen.as_deref() != Some(remote_digest.as_str()) {
                    debug!("remote changed since last poll; merging before push");
                    self.absorb_remote(&remote_body, remote_digest);
                }
            }
            Ok(None) => {}
            Err(err) => {
                self.note_offline("pre-push pull", err);
                return;
            }
        }

        let body = match serde_json::to_string(&self.state) {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "serialize board for push");
                return;
            }
        };
        let digest = content_digest(&body);
        if self.last_pushed.as_deref() == Some(digest.as_str()) {
            self.dirty = false;
            self.publish_status();
            return;
        }

        let pushed = match self.transport.as_mut() {
            Some(transport) => transport.push(&body).await,
            None => return,
        };
        match pushed {
            Ok(()) => {
                self.last_pushed = Some(digest.clone());
                self.last_seen = Some(digest);
                self.dirty = false;
                self.connected = true;
                self.last_error = None;
                self.publish_status();
                info!(bytes = body.len(), "pushed board");
            }
            // The change stays dirty and pending; the next successful
            // poll or reauthorization re-arms the push.
            Err(err) => self.note_offline("push", err),
        }
    }

    // Shared plumbing

    fn persist_and_publish(&mut self) -> Result<(), SyncError> {
        self.store.save_board(&self.state)?;
        self.snapshot_tx.send_replace(self.state.clone());
        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
        self.schedule_push();
        self.publish_status();
    }

    fn schedule_push(&mut self) {
        if self.mode.is_live() && self.transport.is_some() {
            self.push_deadline = Some(Instant::now() + self.config.push_debounce);
        }
    }

    fn note_online(&mut self) {
        if !self.connected {
            info!("remote reachable again");
            self.connected = true;
            self.last_error = None;
            if self.dirty {
                self.schedule_push();
            }
            self.publish_status();
        }
    }

    fn note_offline(&mut self, op: &str, err: SyncError) {
        warn!(error = %err, "{} failed; retrying on the next tick", op);
        if matches!(err, SyncError::Permission(_)) {
            self.needs_reauthorization = true;
        }
        self.connected = false;
        self.last_error = Some(err.to_string());
        self.publish_status();
    }

    fn publish_status(&mut self) {
        let status = EngineStatus {
            connection: self.connection,
            connected: self.connected,
            mode: self.mode,
            needs_reauthorization: self.needs_reauthorization,
            dirty: self.dirty,
            last_error: self.last_error.clone(),
        };
        self.status_tx.send_if_modified(|current| {
            if *current != status {
                *current = status;
                true
            } else {
                false
            }
        });
    }
}
