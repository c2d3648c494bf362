use serde::{Deserialize, Serialize};

use crate::room_replica::ReplicaSnapshot;
use crate::stroke::Action;
use crate::types::{RoomName, UserIdentity};

/// Client to relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoomCommand {
    Join {
        room: RoomName,
        user_identity: UserIdentity,
    },
    FullSnapshot {
        room: RoomName,
        replica: ReplicaSnapshot,
    },
    ActionCommit {
        room: RoomName,
        user_identity: UserIdentity,
        action: Action,
    },
    Undo {
        room: RoomName,
        user_identity: UserIdentity,
    },
    Redo {
        room: RoomName,
        user_identity: UserIdentity,
    },
}

/// Relay to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoomEvent {
    /// Reply to `Join`. The relay decides ownership; `catching_up` tells
    /// whether a snapshot has been requested on the joiner's behalf.
    Joined { is_owner: bool, catching_up: bool },
    /// Sent to the owner when someone else joins, or to an online member
    /// when the owner rejoins and has to catch up first.
    BootstrapRequest,
    FullSnapshot(ReplicaSnapshot),
    ActionCommitted {
        user_identity: UserIdentity,
        action: Action,
    },
    UndoNotify {
        user_identity: UserIdentity,
    },
    RedoNotify {
        user_identity: UserIdentity,
    },
    MemberJoined {
        user_identity: UserIdentity,
    },
    MemberLeft {
        user_identity: UserIdentity,
    },
}
