use crate::room::{Member, Room, RoomDescription};
use sketchroom_system::{ConnectionId, RoomName, UserIdentity};
use std::collections::HashMap;
use std::num::Wrapping;
use thiserror::Error;

pub struct ServerState {
    pub connection_id_source: Wrapping<ConnectionId>,
    pub connection_locations: HashMap<ConnectionId, RoomName>,
    pub rooms: HashMap<RoomName, Room>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ServerError {
    #[error("room name and user identity must not be empty")]
    InvalidJoin,
    #[error("connection {0} already joined room {1}")]
    AlreadyJoined(ConnectionId, RoomName),
    #[error("connection {0} is not in room {1}")]
    NotInRoom(ConnectionId, RoomName),
    #[error("connection {0} cannot act as {1}")]
    IdentityMismatch(ConnectionId, UserIdentity),
    #[error("only the owner of room {0} may send snapshots")]
    NotOwner(RoomName),
    #[error("{1} is already connected to room {0}")]
    IdentityInUse(RoomName, UserIdentity),
}

impl ServerError {
    /// A connection whose join was refused has nothing else to do.
    pub fn closes_connection(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidJoin
                | ServerError::AlreadyJoined(..)
                | ServerError::IdentityInUse(..)
        )
    }
}

#[derive(Debug, PartialEq)]
pub struct JoinOutcome {
    pub created: bool,
    pub is_owner: bool,
}

#[derive(Debug, PartialEq)]
pub struct Departure {
    pub room: RoomName,
    pub user_identity: UserIdentity,
    /// The leaving connection was serving a snapshot to the owner.
    pub interrupted_catch_up: bool,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            connection_id_source: Wrapping(0),
            connection_locations: HashMap::new(),
            rooms: HashMap::new(),
        }
    }

    pub fn create_connection(&mut self) -> ConnectionId {
        self.connection_id_source += Wrapping(1);
        self.connection_id_source.0
    }

    /// Creates the room on first join; its first member becomes the owner.
    pub fn join_room(
        &mut self,
        connection_id: ConnectionId,
        room_name: &str,
        user_identity: &str,
    ) -> Result<JoinOutcome, ServerError> {
        if room_name.trim().is_empty() || user_identity.trim().is_empty() {
            return Err(ServerError::InvalidJoin);
        }
        if let Some(current) = self.connection_locations.get(&connection_id) {
            return Err(ServerError::AlreadyJoined(connection_id, current.clone()));
        }

        if let Some(room) = self.rooms.get(room_name) {
            if room.has_identity(user_identity) {
                return Err(ServerError::IdentityInUse(
                    room_name.to_owned(),
                    user_identity.to_owned(),
                ));
            }
        }

        let created = !self.rooms.contains_key(room_name);
        let room = self
            .rooms
            .entry(room_name.to_owned())
            .or_insert_with(|| Room::new(room_name, user_identity));
        room.members.push(Member {
            connection_id,
            user_identity: user_identity.to_owned(),
        });
        let is_owner = room.is_owner(user_identity);
        self.connection_locations
            .insert(connection_id, room_name.to_owned());
        log::info!(
            "Connection {} joined room {} as {} (owner: {})",
            connection_id,
            room_name,
            user_identity,
            is_owner
        );
        Ok(JoinOutcome { created, is_owner })
    }

    /// Drops the room once its last member has left.
    pub fn leave_room(&mut self, connection_id: ConnectionId) -> Option<Departure> {
        let room_name = self.connection_locations.remove(&connection_id)?;
        let room = self.rooms.get_mut(&room_name)?;
        let position = room
            .members
            .iter()
            .position(|m| m.connection_id == connection_id)?;
        let member = room.members.remove(position);

        let mut interrupted_catch_up = false;
        if room.is_owner(&member.user_identity) {
            room.catch_up_source = None;
        } else if room.catch_up_source == Some(connection_id) {
            room.catch_up_source = None;
            interrupted_catch_up = true;
        }

        if room.members.is_empty() {
            log::info!("Room {} is empty, dropping it", room_name);
            self.rooms.remove(&room_name);
        }
        Some(Departure {
            room: room_name,
            user_identity: member.user_identity,
            interrupted_catch_up,
        })
    }

    /// Picks a member to snapshot the room for its owner, or none if nobody is left.
    pub fn begin_catch_up(&mut self, room_name: &str) -> Option<ConnectionId> {
        let room = self.rooms.get_mut(room_name)?;
        room.catch_up_source = room.catch_up_candidate();
        room.catch_up_source
    }

    /// True exactly once for the member that was asked to catch the owner up.
    pub fn finish_catch_up(&mut self, room_name: &str, from: ConnectionId) -> bool {
        match self.rooms.get_mut(room_name) {
            Some(room) if room.catch_up_source == Some(from) => {
                room.catch_up_source = None;
                true
            }
            _ => false,
        }
    }

    /// Checks that the connection joined `room_name` and returns its membership.
    pub fn member(
        &self,
        connection_id: ConnectionId,
        room_name: &str,
    ) -> Result<&Member, ServerError> {
        self.rooms
            .get(room_name)
            .and_then(|room| room.member(connection_id))
            .ok_or_else(|| ServerError::NotInRoom(connection_id, room_name.to_owned()))
    }

    pub fn is_owner(&self, room_name: &str, user_identity: &str) -> bool {
        self.rooms
            .get(room_name)
            .map_or(false, |room| room.is_owner(user_identity))
    }

    pub fn owner_connection(&self, room_name: &str) -> Option<ConnectionId> {
        self.rooms
            .get(room_name)
            .and_then(|room| room.owner_connection())
    }

    pub fn connection_ids_in_room(&self, room_name: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room_name)
            .map(|room| room.members.iter().map(|m| m.connection_id).collect())
            .unwrap_or_default()
    }

    pub fn describe_rooms(&self) -> Vec<RoomDescription> {
        let mut result: Vec<_> = self.rooms.values().map(|room| room.describe()).collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        result
    }
}
