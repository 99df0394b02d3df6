//! Rest countdown anchored to an absolute deadline.
//!
//! `remaining` is always recomputed from `ends_at - now`, never decremented,
//! so a process that was suspended for any length of time shows the real
//! wall-clock remainder as soon as it resynchronizes from storage.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::model::RestState;
use crate::storage::{Repository, Store, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestSnapshot {
    pub session_id: Option<String>,
    pub ends_at: Option<DateTime<Utc>>,
    pub remaining: u64,
    pub resting: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing scheduled (not resting, or suspended in the background).
    Idle,
    Running(u64),
    /// The deadline passed on this tick; the timer has stopped itself.
    Finished,
}

#[derive(Debug)]
pub struct RestTimer<C> {
    clock: C,
    session_id: Option<String>,
    ends_at: Option<DateTime<Utc>>,
    remaining: u64,
    resting: bool,
    ticking: bool,
}

/// Whole seconds left until `ends_at`, rounded up, never negative.
pub fn remaining_secs(ends_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let ms = (ends_at - now).num_milliseconds();
    if ms <= 0 {
        0
    } else {
        ((ms + 999) / 1000) as u64
    }
}

impl<C: Clock> RestTimer<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            session_id: None,
            ends_at: None,
            remaining: 0,
            resting: false,
            ticking: false,
        }
    }

    pub fn is_resting(&self) -> bool {
        self.resting
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn snapshot(&self) -> RestSnapshot {
        RestSnapshot {
            session_id: self.session_id.clone(),
            ends_at: self.ends_at,
            remaining: self.remaining,
            resting: self.resting,
        }
    }

    /// Starts a rest of `seconds` for `session_id`, replacing any running one.
    /// Zero seconds or a missing session id is a no-op; returns whether a rest started.
    pub fn start<S: Store>(
        &mut self,
        repo: &Repository<S>,
        seconds: u32,
        session_id: Option<&str>,
    ) -> StoreResult<bool> {
        let session_id = match session_id {
            Some(id) if seconds > 0 && !id.is_empty() => id,
            _ => return Ok(false),
        };
        if self.resting {
            self.stop(repo)?;
        }

        let ends_at = self.clock.now() + Duration::seconds(i64::from(seconds));
        repo.save_rest_state(&RestState {
            session_id: session_id.to_string(),
            ends_at,
        })?;

        self.session_id = Some(session_id.to_string());
        self.ends_at = Some(ends_at);
        self.resting = true;
        self.ticking = true;
        self.recompute(ends_at);
        info!(session_id, seconds, %ends_at, "rest started");
        Ok(true)
    }

    pub fn stop<S: Store>(&mut self, repo: &Repository<S>) -> StoreResult<()> {
        if self.resting {
            debug!(session_id = ?self.session_id, "rest stopped");
        }
        self.clear_in_memory();
        repo.clear_rest_state()
    }

    /// Continues counting towards an existing deadline. A deadline already in
    /// the past stops the timer instead, and removes the stored record only
    /// if it still names that deadline.
    pub fn resume<S: Store>(
        &mut self,
        repo: &Repository<S>,
        session_id: &str,
        ends_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if remaining_secs(ends_at, self.clock.now()) == 0 {
            debug!(session_id, %ends_at, "rest deadline already passed");
            self.clear_in_memory();
            return clear_if_owned(repo, session_id, ends_at);
        }
        self.session_id = Some(session_id.to_string());
        self.ends_at = Some(ends_at);
        self.resting = true;
        self.ticking = true;
        self.recompute(ends_at);
        debug!(session_id, remaining = self.remaining, "rest resumed");
        Ok(())
    }

    pub fn on_tick<S: Store>(&mut self, repo: &Repository<S>) -> StoreResult<TickOutcome> {
        let ends_at = match self.ends_at {
            Some(ends_at) if self.resting && self.ticking => ends_at,
            _ => return Ok(TickOutcome::Idle),
        };
        if self.recompute(ends_at) == 0 {
            info!(session_id = ?self.session_id, "rest finished");
            let session_id = self.session_id.take();
            self.clear_in_memory();
            if let Some(session_id) = session_id {
                clear_if_owned(repo, &session_id, ends_at)?;
            }
            return Ok(TickOutcome::Finished);
        }
        Ok(TickOutcome::Running(self.remaining))
    }

    /// Suspends recomputation; the in-memory remainder goes stale until the
    /// next foreground transition.
    pub fn on_background(&mut self) {
        self.ticking = false;
    }

    pub fn on_foreground<S: Store>(
        &mut self,
        repo: &Repository<S>,
        current_session_id: Option<&str>,
    ) -> StoreResult<()> {
        match current_session_id {
            Some(session_id) => self.sync_from_store(repo, session_id),
            None => {
                if self.resting {
                    debug!(session_id = ?self.session_id, "no current session, dropping rest");
                    self.clear_in_memory();
                }
                Ok(())
            }
        }
    }

    /// Picks up a persisted rest for `session_id`, e.g. after a restart.
    pub fn mount<S: Store>(&mut self, repo: &Repository<S>, session_id: &str) -> StoreResult<()> {
        self.sync_from_store(repo, session_id)
    }

    fn sync_from_store<S: Store>(
        &mut self,
        repo: &Repository<S>,
        session_id: &str,
    ) -> StoreResult<()> {
        match repo.load_rest_state() {
            Some(state) if state.session_id == session_id => {
                self.resume(repo, &state.session_id, state.ends_at)
            }
            Some(state) => {
                debug!(stored = %state.session_id, current = session_id, "ignoring rest of another session");
                Ok(())
            }
            None => {
                if self.resting && self.session_id.as_deref() == Some(session_id) {
                    self.clear_in_memory();
                }
                Ok(())
            }
        }
    }

    fn recompute(&mut self, ends_at: DateTime<Utc>) -> u64 {
        self.remaining = remaining_secs(ends_at, self.clock.now());
        self.remaining
    }

    fn clear_in_memory(&mut self) {
        self.ticking = false;
        self.resting = false;
        self.remaining = 0;
        self.session_id = None;
        self.ends_at = None;
    }
}

/// Removes the stored rest only while it is still the one that just ran out.
/// Another process may have replaced it with a newer rest meanwhile.
fn clear_if_owned<S: Store>(
    repo: &Repository<S>,
    session_id: &str,
    ends_at: DateTime<Utc>,
) -> StoreResult<()> {
    match repo.load_rest_state() {
        Some(state) if state.session_id == session_id && state.ends_at == ends_at => {
            repo.clear_rest_state()
        }
        Some(state) => {
            debug!(stored = %state.session_id, stored_ends_at = %state.ends_at, "keeping newer rest record");
            Ok(())
        }
        None => Ok(()),
    }
}
