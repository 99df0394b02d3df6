//! Best-effort backup of plans and finished sessions.
//!
//! Nothing here may fail an operation: every error is logged and turned into
//! `false`. Sessions are recorded as mirrored only after a successful write,
//! and [`mirror_pending`] is the retry job for whatever did not go through.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::model::{Session, SessionStatus, WorkoutPlan};
use crate::storage::{Repository, Store};

pub trait RemoteMirror {
    fn write_plan_snapshot(&self, plan: &WorkoutPlan) -> bool;
    fn write_session_summary(&self, session: &Session) -> bool;
}

/// No linked account: nothing is ever mirrored.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMirror;

impl RemoteMirror for NoopMirror {
    fn write_plan_snapshot(&self, _plan: &WorkoutPlan) -> bool {
        false
    }

    fn write_session_summary(&self, _session: &Session) -> bool {
        false
    }
}

/// Mirrors documents into a directory (e.g. a synced folder):
/// `plans/<id>.json` and `sessions/<id>.json`.
#[derive(Debug, Clone)]
pub struct DirectoryMirror {
    root: PathBuf,
}

#[derive(Debug, thiserror::Error)]
enum MirrorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl DirectoryMirror {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn write_doc<T: Serialize>(&self, collection: &str, id: &str, doc: &T) -> Result<(), MirrorError> {
        let dir = self.root.join(collection);
        fs::create_dir_all(&dir)?;
        let data = serde_json::to_vec_pretty(doc)?;
        fs::write(dir.join(format!("{id}.json")), data)?;
        Ok(())
    }
}

impl RemoteMirror for DirectoryMirror {
    fn write_plan_snapshot(&self, plan: &WorkoutPlan) -> bool {
        match self.write_doc("plans", &plan.id, plan) {
            Ok(()) => true,
            Err(err) => {
                warn!(plan_id = %plan.id, error = %err, "plan mirror failed");
                false
            }
        }
    }

    fn write_session_summary(&self, session: &Session) -> bool {
        match self.write_doc("sessions", &session.id, session) {
            Ok(()) => true,
            Err(err) => {
                warn!(session_id = %session.id, error = %err, "session mirror failed");
                false
            }
        }
    }
}

/// Sends a completed session once. Returns whether it is now mirrored.
pub fn mirror_session<S: Store>(
    repo: &Repository<S>,
    mirror: &dyn RemoteMirror,
    session: &Session,
) -> bool {
    if session.status != SessionStatus::Completed {
        return false;
    }
    if repo.load_mirrored_sessions().contains(&session.id) {
        debug!(session_id = %session.id, "already mirrored");
        return true;
    }
    if !mirror.write_session_summary(session) {
        return false;
    }
    if let Err(err) = repo.mark_session_mirrored(&session.id) {
        warn!(session_id = %session.id, error = %err, "could not record mirrored session");
    }
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub sessions_sent: usize,
    pub plans_sent: usize,
    pub failed: usize,
}

/// Sends every dirty plan and clears the flag on the ones that went through.
pub fn mirror_dirty_plans<S: Store>(repo: &Repository<S>, mirror: &dyn RemoteMirror) -> MirrorReport {
    let mut report = MirrorReport::default();
    let mut plans = repo.load_plans();
    for plan in plans.iter_mut().filter(|p| p.dirty) {
        if mirror.write_plan_snapshot(plan) {
            plan.dirty = false;
            report.plans_sent += 1;
        } else {
            report.failed += 1;
        }
    }
    if report.plans_sent > 0 {
        if let Err(err) = repo.save_plans(&plans) {
            warn!(error = %err, "could not clear dirty flags");
        }
    }
    report
}

/// Retries every completed session that was never mirrored and every dirty plan.
pub fn mirror_pending<S: Store>(repo: &Repository<S>, mirror: &dyn RemoteMirror) -> MirrorReport {
    let mut report = MirrorReport::default();

    let mirrored = repo.load_mirrored_sessions();
    for session in repo
        .load_sessions()
        .iter()
        .filter(|s| s.status == SessionStatus::Completed && !mirrored.contains(&s.id))
    {
        if mirror_session(repo, mirror, session) {
            report.sessions_sent += 1;
        } else {
            report.failed += 1;
        }
    }

    let plans = mirror_dirty_plans(repo, mirror);
    report.plans_sent = plans.plans_sent;
    report.failed += plans.failed;

    info!(
        sessions = report.sessions_sent,
        plans = report.plans_sent,
        failed = report.failed,
        "mirror pass finished"
    );
    report
}
