use crate::stroke::Action;

/// One user's history within a room. An action lives in exactly one of the two stacks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserTimeline {
    committed: Vec<Action>,
    undone: Vec<Action>,
}

impl UserTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_committed(committed: Vec<Action>) -> Self {
        Self {
            committed,
            undone: Vec::new(),
        }
    }

    pub fn committed(&self) -> &[Action] {
        &self.committed
    }

    pub fn undone(&self) -> &[Action] {
        &self.undone
    }

    // NOTE: the undone stack is kept on commit, so an old undone action stays redoable.
    pub fn commit(&mut self, action: Action) {
        self.committed.push(action);
    }

    /// Returns false when there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.committed.pop() {
            Some(action) => {
                self.undone.push(action);
                true
            }
            None => false,
        }
    }

    /// Returns false when there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        match self.undone.pop() {
            Some(action) => {
                self.committed.push(action);
                true
            }
            None => false,
        }
    }
}
