use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stroke::Action;
use crate::traits::ReplicaReadable;
use crate::types::UserIdentity;
use crate::user_timeline::UserTimeline;

// Entries are never removed. A user who left keeps their history for late joiners.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomReplica {
    timelines: BTreeMap<UserIdentity, UserTimeline>,
}

impl RoomReplica {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lazily creates an empty timeline on first reference.
    pub fn timeline_mut(&mut self, user_identity: &str) -> &mut UserTimeline {
        self.timelines
            .entry(user_identity.to_owned())
            .or_insert_with(|| {
                log::debug!("New timeline for {}", user_identity);
                UserTimeline::new()
            })
    }

    pub fn commit(&mut self, user_identity: &str, action: Action) {
        self.timeline_mut(user_identity).commit(action);
    }

    /// Unknown users have nothing to undo, so no timeline is created for them.
    pub fn undo(&mut self, user_identity: &str) -> bool {
        self.timelines
            .get_mut(user_identity)
            .map_or(false, |timeline| timeline.undo())
    }

    pub fn redo(&mut self, user_identity: &str) -> bool {
        self.timelines
            .get_mut(user_identity)
            .map_or(false, |timeline| timeline.redo())
    }

    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    pub fn snapshot(&self) -> ReplicaSnapshot {
        self.into()
    }
}

impl ReplicaReadable for RoomReplica {
    fn timeline(&self, user_identity: &str) -> Option<&UserTimeline> {
        self.timelines.get(user_identity)
    }

    fn users(&self) -> Box<dyn Iterator<Item = &UserIdentity> + '_> {
        Box::new(self.timelines.keys())
    }
}

/// Committed actions of every user, keyed by identity. Undone stacks are not carried.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicaSnapshot {
    content: BTreeMap<UserIdentity, Vec<Action>>,
}

impl ReplicaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_identity: &str, actions: Vec<Action>) -> Self {
        self.content.insert(user_identity.to_owned(), actions);
        self
    }

    pub fn actions_of(&self, user_identity: &str) -> Option<&[Action]> {
        self.content.get(user_identity).map(|v| v.as_slice())
    }

    pub fn user_count(&self) -> usize {
        self.content.len()
    }
}

impl std::fmt::Debug for ReplicaSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaSnapshot")
            .field("users", &self.content.len())
            .field(
                "actions",
                &self.content.values().map(|v| v.len()).sum::<usize>(),
            )
            .finish()
    }
}

impl From<&RoomReplica> for ReplicaSnapshot {
    fn from(replica: &RoomReplica) -> Self {
        ReplicaSnapshot {
            content: replica
                .timelines
                .iter()
                .map(|(user_identity, timeline)| {
                    (user_identity.clone(), timeline.committed().to_vec())
                })
                .collect(),
        }
    }
}

impl From<ReplicaSnapshot> for RoomReplica {
    fn from(snapshot: ReplicaSnapshot) -> Self {
        RoomReplica {
            timelines: snapshot
                .content
                .into_iter()
                .map(|(user_identity, actions)| {
                    (user_identity, UserTimeline::from_committed(actions))
                })
                .collect(),
        }
    }
}
