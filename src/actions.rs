use chrono::{DateTime, Utc};
use tracing::debug;

use crate::model::{Session, SessionSet, SessionStatus};
use crate::position::{is_session_complete, update_session_set, SetPosition};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("session {0} is no longer active")]
    NotActive(String),

    #[error("no set at {0}")]
    InvalidPosition(SetPosition),
}

/// Completes (`mark_completed`) or skips the set at `pos`.
///
/// Both stamp `completed_at`, so the set is never offered again. Only a
/// completion records actuals, falling back to the targets when no value was
/// given. Resolving the last open set completes the session.
pub fn resolve_set(
    session: &Session,
    pos: SetPosition,
    mark_completed: bool,
    completed_at: DateTime<Utc>,
    actual_reps: Option<u32>,
    actual_time_seconds: Option<u32>,
) -> Result<Session, ActionError> {
    if !session.is_active() {
        return Err(ActionError::NotActive(session.id.clone()));
    }

    let mut next = update_session_set(session, pos, |set| {
        let (actual_reps, actual_time_seconds) = if mark_completed {
            (
                actual_reps.or(set.target_reps),
                actual_time_seconds.or(set.target_time_seconds),
            )
        } else {
            (set.actual_reps, set.actual_time_seconds)
        };
        SessionSet {
            completed: mark_completed,
            completed_at: Some(completed_at),
            actual_reps,
            actual_time_seconds,
            ..set.clone()
        }
    })
    .ok_or(ActionError::InvalidPosition(pos))?;

    if is_session_complete(&next) {
        debug!(session_id = %next.id, "last set resolved");
        next.status = SessionStatus::Completed;
        next.ended_at = Some(completed_at);
    }
    Ok(next)
}

/// Stamps a user-chosen final status regardless of open sets.
pub fn end_session(session: &Session, status: SessionStatus, ended_at: DateTime<Utc>) -> Session {
    Session {
        status,
        ended_at: Some(ended_at),
        ..session.clone()
    }
}
