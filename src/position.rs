use std::fmt;

use crate::model::{Session, SessionSet};

/// Address of one set inside a session: block, exercise and set index, all 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetPosition {
    pub block: usize,
    pub exercise: usize,
    pub set: usize,
}

impl SetPosition {
    pub fn new(block: usize, exercise: usize, set: usize) -> Self {
        Self {
            block,
            exercise,
            set,
        }
    }
}

impl fmt::Display for SetPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block {}, exercise {}, set {}",
            self.block + 1,
            self.exercise + 1,
            self.set + 1
        )
    }
}

/// First set, in plan order, that is neither completed nor skipped.
pub fn find_next_incomplete_set(session: &Session) -> Option<SetPosition> {
    for (bi, block) in session.blocks.iter().enumerate() {
        for (ei, exercise) in block.exercises.iter().enumerate() {
            if let Some(si) = exercise.sets.iter().position(|s| !s.is_resolved()) {
                return Some(SetPosition::new(bi, ei, si));
            }
        }
    }
    None
}

pub fn is_session_complete(session: &Session) -> bool {
    find_next_incomplete_set(session).is_none()
}

pub fn set_at(session: &Session, pos: SetPosition) -> Option<&SessionSet> {
    session
        .blocks
        .get(pos.block)?
        .exercises
        .get(pos.exercise)?
        .sets
        .get(pos.set)
}

/// Returns a new session with the set at `pos` replaced by `update(set)`.
///
/// The input is left untouched; `None` when `pos` addresses no set.
pub fn update_session_set<F>(session: &Session, pos: SetPosition, update: F) -> Option<Session>
where
    F: FnOnce(&SessionSet) -> SessionSet,
{
    let current = set_at(session, pos)?;
    let replacement = update(current);

    let mut next = session.clone();
    next.blocks[pos.block].exercises[pos.exercise].sets[pos.set] = replacement;
    Some(next)
}
