use serde::Serialize;

use crate::stroke::Stroke;
use crate::traits::ReplicaReadable;
use crate::types::UserIdentity;
use crate::viewport::Viewport;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrokeMaterial {
    pub user_identity: UserIdentity,
    pub stroke: Stroke,
}

/// Read-only projection of a replica into drawable strokes.
///
/// Only committed actions are projected, in insertion order per user.
/// Projecting never mutates the replica, so it can be re-derived at any time.
pub trait Materialize<R: ReplicaReadable> {
    fn readable(&self) -> &R;

    fn materialize_user(&self, user_identity: &str) -> Vec<Stroke> {
        self.readable()
            .committed_actions(user_identity)
            .iter()
            .flat_map(|action| action.strokes().iter().copied())
            .collect()
    }

    fn materialize_strokes(&self) -> Vec<StrokeMaterial> {
        let readable = self.readable();
        readable
            .users()
            .flat_map(|user_identity| {
                self.materialize_user(user_identity)
                    .into_iter()
                    .map(move |stroke| StrokeMaterial {
                        user_identity: user_identity.clone(),
                        stroke,
                    })
            })
            .collect()
    }

    fn materialize_screen(&self, viewport: &Viewport) -> Vec<StrokeMaterial> {
        self.materialize_strokes()
            .into_iter()
            .map(|material| {
                let start = viewport.to_screen(material.stroke.start());
                let end = viewport.to_screen(material.stroke.end());
                StrokeMaterial {
                    user_identity: material.user_identity,
                    stroke: Stroke::between(start, end),
                }
            })
            .collect()
    }
}
