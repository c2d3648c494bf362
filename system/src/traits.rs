use crate::stroke::Action;
use crate::types::UserIdentity;
use crate::user_timeline::UserTimeline;

pub trait ReplicaReadable {
    fn timeline(&self, user_identity: &str) -> Option<&UserTimeline>;

    /// Users known to the replica, in a stable order.
    fn users(&self) -> Box<dyn Iterator<Item = &UserIdentity> + '_>;

    fn committed_actions(&self, user_identity: &str) -> &[Action] {
        self.timeline(user_identity)
            .map(|timeline| timeline.committed())
            .unwrap_or(&[])
    }

    fn undone_actions(&self, user_identity: &str) -> &[Action] {
        self.timeline(user_identity)
            .map(|timeline| timeline.undone())
            .unwrap_or(&[])
    }
}
