use euclid::default::{Point2D, Size2D};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::{PointerButton, StrokeCapture};
use crate::codec::{self, WireFormat};
use crate::materialize::{Materialize, StrokeMaterial};
use crate::message::{RoomCommand, RoomEvent};
use crate::room_replica::{ReplicaSnapshot, RoomReplica};
use crate::stroke::{Action, Stroke};
use crate::traits::ReplicaReadable;
use crate::types::{RoomName, UserIdentity};
use crate::user_timeline::UserTimeline;
use crate::viewport::Viewport;

/// Supplied by the provisioning collaborator before a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub room_name: RoomName,
    pub user_identity: UserIdentity,
    pub is_owner: bool,
}

/// Fatal at session start. There is no anonymous fallback.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("room name must not be empty")]
    EmptyRoomName,
    #[error("user identity must not be empty")]
    EmptyUserIdentity,
    #[error("malformed provisioning payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, ProvisioningError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ProvisioningError> {
        if self.room_name.trim().is_empty() {
            return Err(ProvisioningError::EmptyRoomName);
        }
        if self.user_identity.trim().is_empty() {
            return Err(ProvisioningError::EmptyUserIdentity);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Joining,
    CatchingUp,
    Live,
}

/// Local view of one room for one user.
///
/// All mutation goes through this object: pointer input, inbound relay events
/// and local undo/redo. Methods that change the local user's history return
/// the command to broadcast; the caller owns the transport.
pub struct RoomSession {
    config: SessionConfig,
    phase: SessionPhase,
    replica: RoomReplica,
    capture: StrokeCapture,
    viewport: Viewport,
    pending_bootstrap: bool,
}

impl Materialize<RoomReplica> for RoomSession {
    fn readable(&self) -> &RoomReplica {
        &self.replica
    }
}

impl ReplicaReadable for RoomSession {
    fn timeline(&self, user_identity: &str) -> Option<&UserTimeline> {
        self.replica.timeline(user_identity)
    }

    fn users(&self) -> Box<dyn Iterator<Item = &UserIdentity> + '_> {
        self.replica.users()
    }
}

impl RoomSession {
    pub fn new(config: SessionConfig) -> Result<Self, ProvisioningError> {
        config.validate()?;
        log::debug!(
            "RoomSession created: {} as {} (owner: {})",
            config.room_name,
            config.user_identity,
            config.is_owner
        );
        Ok(Self {
            config,
            phase: SessionPhase::Joining,
            replica: RoomReplica::new(),
            capture: StrokeCapture::new(),
            viewport: Viewport::default(),
            pending_bootstrap: false,
        })
    }

    pub fn room_name(&self) -> &str {
        &self.config.room_name
    }

    pub fn user_identity(&self) -> &str {
        &self.config.user_identity
    }

    pub fn is_owner(&self) -> bool {
        self.config.is_owner
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn replica(&self) -> &RoomReplica {
        &self.replica
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    /// Every joiner starts catching up. The relay's `Joined` reply says whether
    /// anyone was asked for a snapshot; if not, the session goes live at once.
    pub fn join(&mut self) -> RoomCommand {
        self.phase = SessionPhase::CatchingUp;
        log::info!(
            "Joining room {} as {} ({:?})",
            self.config.room_name,
            self.config.user_identity,
            self.phase
        );
        RoomCommand::Join {
            room: self.config.room_name.clone(),
            user_identity: self.config.user_identity.clone(),
        }
    }

    pub fn commit_local_action(&mut self, action: Action) -> RoomCommand {
        log::debug!(
            "Commit local action with {} strokes",
            action.strokes().len()
        );
        self.replica
            .commit(&self.config.user_identity, action.clone());
        RoomCommand::ActionCommit {
            room: self.config.room_name.clone(),
            user_identity: self.config.user_identity.clone(),
            action,
        }
    }

    pub fn apply_remote_action(&mut self, user_identity: &str, action: Action) {
        if self.is_me(user_identity) {
            log::debug!("Ignoring echo of own action");
            return;
        }
        self.replica.commit(user_identity, action);
        self.mark_live();
    }

    /// Silent no-op with nothing to broadcast when the undo stack source is empty.
    pub fn undo(&mut self) -> Option<RoomCommand> {
        if self.replica.undo(&self.config.user_identity) {
            Some(RoomCommand::Undo {
                room: self.config.room_name.clone(),
                user_identity: self.config.user_identity.clone(),
            })
        } else {
            None
        }
    }

    pub fn redo(&mut self) -> Option<RoomCommand> {
        if self.replica.redo(&self.config.user_identity) {
            Some(RoomCommand::Redo {
                room: self.config.room_name.clone(),
                user_identity: self.config.user_identity.clone(),
            })
        } else {
            None
        }
    }

    pub fn apply_remote_undo(&mut self, user_identity: &str) {
        if self.is_me(user_identity) {
            return;
        }
        if !self.replica.undo(user_identity) {
            log::debug!("Remote undo of {} had nothing to undo", user_identity);
        }
        self.mark_live();
    }

    pub fn apply_remote_redo(&mut self, user_identity: &str) {
        if self.is_me(user_identity) {
            return;
        }
        if !self.replica.redo(user_identity) {
            log::debug!("Remote redo of {} had nothing to redo", user_identity);
        }
        self.mark_live();
    }

    // NOTE: full overwrite. Local work committed before the snapshot arrives is lost.
    pub fn apply_snapshot(&mut self, snapshot: ReplicaSnapshot) {
        log::info!("Applying {:?} to room {}", snapshot, self.config.room_name);
        self.replica = RoomReplica::from(snapshot);
        self.phase = SessionPhase::Live;
    }

    pub fn snapshot(&self) -> ReplicaSnapshot {
        self.replica.snapshot()
    }

    /// A snapshot is only ever sent from a live replica. An owner asked while it
    /// is still catching up answers as soon as it goes live.
    pub fn handle_event(&mut self, event: RoomEvent) -> Option<RoomCommand> {
        log::debug!("Handle room event: {:?}", event);
        let reply = match event {
            RoomEvent::Joined {
                is_owner,
                catching_up,
            } => {
                self.apply_joined(is_owner, catching_up);
                None
            }
            RoomEvent::BootstrapRequest => {
                if self.phase == SessionPhase::Live {
                    Some(self.full_snapshot_command())
                } else if self.config.is_owner {
                    log::info!("Bootstrap request deferred until this replica is live");
                    self.pending_bootstrap = true;
                    None
                } else {
                    log::warn!("Bootstrap request received before going live");
                    None
                }
            }
            RoomEvent::FullSnapshot(snapshot) => {
                self.apply_snapshot(snapshot);
                None
            }
            RoomEvent::ActionCommitted {
                user_identity,
                action,
            } => {
                self.apply_remote_action(&user_identity, action);
                None
            }
            RoomEvent::UndoNotify { user_identity } => {
                self.apply_remote_undo(&user_identity);
                None
            }
            RoomEvent::RedoNotify { user_identity } => {
                self.apply_remote_redo(&user_identity);
                None
            }
            RoomEvent::MemberJoined { user_identity } => {
                log::info!("{} joined {}", user_identity, self.config.room_name);
                None
            }
            RoomEvent::MemberLeft { user_identity } => {
                log::info!("{} left {}", user_identity, self.config.room_name);
                None
            }
        };
        reply.or_else(|| self.take_pending_bootstrap())
    }

    /// Malformed frames are dropped; the replica is left untouched.
    pub fn handle_frame(&mut self, format: WireFormat, bytes: &[u8]) -> Option<RoomCommand> {
        match codec::decode::<RoomEvent>(format, bytes) {
            Ok(event) => self.handle_event(event),
            Err(err) => {
                log::warn!("Dropping inbound frame: {}", err);
                None
            }
        }
    }

    pub fn pointer_down(&mut self, button: PointerButton, screen_pos: Point2D<f32>) {
        self.capture.pointer_down(button, screen_pos);
    }

    pub fn pointer_move(&mut self, screen_pos: Point2D<f32>) -> Option<Stroke> {
        self.capture.pointer_move(screen_pos, &mut self.viewport)
    }

    pub fn pointer_up(&mut self) -> Option<RoomCommand> {
        self.capture
            .pointer_up()
            .map(|action| self.commit_local_action(action))
    }

    pub fn wheel(&mut self, pointer: Point2D<f32>, client_size: Size2D<f32>, delta: f32) {
        self.viewport.zoom_at(pointer, client_size, delta);
    }

    pub fn in_progress(&self) -> &[Stroke] {
        self.capture.in_progress()
    }

    pub fn render(&self) -> Vec<StrokeMaterial> {
        self.materialize_strokes()
    }

    pub fn render_screen(&self) -> Vec<StrokeMaterial> {
        self.materialize_screen(&self.viewport)
    }

    fn apply_joined(&mut self, is_owner: bool, catching_up: bool) {
        if is_owner != self.config.is_owner {
            log::warn!(
                "Provisioned as {} but the relay says {}; following the relay",
                if self.config.is_owner { "owner" } else { "member" },
                if is_owner { "owner" } else { "member" }
            );
            self.config.is_owner = is_owner;
        }
        if catching_up {
            log::info!("Waiting for a snapshot of {}", self.config.room_name);
        } else if self.phase != SessionPhase::Live {
            log::info!("Nobody to catch up from; {} is live", self.config.room_name);
            self.phase = SessionPhase::Live;
        }
    }

    fn full_snapshot_command(&self) -> RoomCommand {
        RoomCommand::FullSnapshot {
            room: self.config.room_name.clone(),
            replica: self.snapshot(),
        }
    }

    fn take_pending_bootstrap(&mut self) -> Option<RoomCommand> {
        if self.pending_bootstrap && self.phase == SessionPhase::Live {
            self.pending_bootstrap = false;
            Some(self.full_snapshot_command())
        } else {
            None
        }
    }

    fn is_me(&self, user_identity: &str) -> bool {
        user_identity == self.config.user_identity
    }

    fn mark_live(&mut self) {
        if self.phase == SessionPhase::CatchingUp {
            log::info!("No snapshot before first delta; going live with partial replica");
            self.phase = SessionPhase::Live;
        }
    }
}
