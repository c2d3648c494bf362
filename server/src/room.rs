use serde::Serialize;
use sketchroom_system::{ConnectionId, RoomName, UserIdentity};

#[derive(Debug, Clone)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub user_identity: UserIdentity,
}

/// Membership of one room. The owner is fixed when the room is created.
pub struct Room {
    pub name: RoomName,
    pub owner: UserIdentity,
    pub members: Vec<Member>,
    /// Member asked for a snapshot on behalf of a rejoining owner.
    pub catch_up_source: Option<ConnectionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomDescription {
    pub name: RoomName,
    pub owner: UserIdentity,
    pub owner_online: bool,
    pub members: Vec<UserIdentity>,
}

impl Room {
    pub fn new(name: &str, owner: &str) -> Self {
        Self {
            name: name.to_owned(),
            owner: owner.to_owned(),
            members: Vec::new(),
            catch_up_source: None,
        }
    }

    pub fn is_owner(&self, user_identity: &str) -> bool {
        self.owner == user_identity
    }

    /// The owner may be offline; ownership never moves to someone else.
    pub fn owner_connection(&self) -> Option<ConnectionId> {
        self.members
            .iter()
            .find(|m| self.is_owner(&m.user_identity))
            .map(|m| m.connection_id)
    }

    /// Any online member other than the owner can serve the owner's catch-up.
    pub fn catch_up_candidate(&self) -> Option<ConnectionId> {
        self.members
            .iter()
            .find(|m| !self.is_owner(&m.user_identity))
            .map(|m| m.connection_id)
    }

    pub fn has_identity(&self, user_identity: &str) -> bool {
        self.members.iter().any(|m| m.user_identity == user_identity)
    }

    pub fn member(&self, connection_id: ConnectionId) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.connection_id == connection_id)
    }

    pub fn describe(&self) -> RoomDescription {
        RoomDescription {
            name: self.name.clone(),
            owner: self.owner.clone(),
            owner_online: self.owner_connection().is_some(),
            members: self
                .members
                .iter()
                .map(|m| m.user_identity.clone())
                .collect(),
        }
    }
}
