//! Caller side of the session actions.
//!
//! [`SessionEngine`] owns the store, the clock and the rest timer, and runs
//! every user-level operation as a sequence of whole-value writes. Within one
//! operation the writes happen in a fixed order: the session record first,
//! then the records that point at it, and mirroring last.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::actions::{end_session, resolve_set, ActionError};
use crate::builder::{abandon_active_sessions, build_session, normalize_day_order};
use crate::clock::Clock;
use crate::history::{self, SessionSummary};
use crate::identity::{IdentityProvider, LocalIdentity};
use crate::mirror::{
    mirror_dirty_plans, mirror_pending, mirror_session, MirrorReport, NoopMirror, RemoteMirror,
};
use crate::model::{
    find_plan, Block, Exercise, Session, SessionSet, SessionStatus, Target, WorkoutDay, WorkoutPlan,
};
use crate::position::{find_next_incomplete_set, set_at, SetPosition};
use crate::rest_timer::{RestSnapshot, RestTimer, TickOutcome};
use crate::storage::{Repository, Store, StoreError};
use crate::util::parse_count;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no plan matches '{0}'")]
    PlanNotFound(String),

    #[error("plan '{plan}' has no day matching '{day}'")]
    DayNotFound { plan: String, day: String },

    #[error("no active session")]
    NoActiveSession,

    #[error("session {0} has no open sets left; end it instead")]
    NoOpenSet(String),

    #[error(transparent)]
    Action(#[from] ActionError),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Raw values as typed by the user. Blank or non-numeric means "use the target".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetInput {
    pub reps: Option<String>,
    pub time_seconds: Option<String>,
}

impl SetInput {
    pub fn reps(reps: impl Into<String>) -> Self {
        Self {
            reps: Some(reps.into()),
            time_seconds: None,
        }
    }
}

/// Plan data behind a set position. Every field is `None` when the session
/// refers to something that no longer exists in the plans.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetContext {
    pub plan_name: Option<String>,
    pub day_name: Option<String>,
    pub block_title: Option<String>,
    pub exercise_name: Option<String>,
    pub target: Option<Target>,
    pub rest_seconds: u32,
    pub sets_in_exercise: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentSet {
    pub session_id: String,
    pub position: SetPosition,
    pub set: SessionSet,
    pub context: SetContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetOutcome {
    pub session: Session,
    pub position: SetPosition,
    /// The resolved set was the last open one.
    pub completed: bool,
    /// Length of the rest that started, if any.
    pub rest_seconds: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum EndAction {
    Complete,
    Abandon,
}

impl EndAction {
    fn status(self) -> SessionStatus {
        match self {
            EndAction::Complete => SessionStatus::Completed,
            EndAction::Abandon => SessionStatus::Abandoned,
        }
    }
}

/// Resolves the plan, day, block and exercise a position points at.
pub fn describe_position(plans: &[WorkoutPlan], session: &Session, pos: SetPosition) -> SetContext {
    let plan = find_plan(plans, &session.plan_id);
    let day = plan.and_then(|p| p.day(&session.day_id));
    let session_block = session.blocks.get(pos.block);
    let session_exercise = session_block.and_then(|b| b.exercises.get(pos.exercise));
    let block: Option<&Block> = day
        .zip(session_block)
        .and_then(|(d, sb)| d.block(&sb.block_id));
    let exercise: Option<&Exercise> = block
        .zip(session_exercise)
        .and_then(|(b, se)| b.exercise(&se.exercise_id));

    SetContext {
        plan_name: plan.map(|p| p.name.clone()),
        day_name: day.map(|d| d.name.clone()),
        block_title: block.map(|b| b.title.clone()),
        exercise_name: exercise.map(|e| e.name.clone()),
        target: exercise.map(Exercise::target),
        rest_seconds: exercise.map_or(0, |e| e.rest_seconds),
        sets_in_exercise: session_exercise.map_or(0, |e| e.sets.len()),
    }
}

/// Finds an item by id, then by case-insensitive name, then by number.
fn find_by_ref<'a, T>(
    items: &'a [T],
    reference: &str,
    id: impl Fn(&T) -> &str,
    name: impl Fn(&T) -> &str,
    number: impl Fn(usize, &T) -> u32,
) -> Option<&'a T> {
    let reference = reference.trim();
    if let Some(item) = items.iter().find(|item| id(*item) == reference) {
        return Some(item);
    }
    if let Some(item) = items
        .iter()
        .find(|item| name(*item).eq_ignore_ascii_case(reference))
    {
        return Some(item);
    }
    let n = parse_count(Some(reference))?;
    items
        .iter()
        .enumerate()
        .find(|(i, item)| number(*i, *item) == n)
        .map(|(_, item)| item)
}

pub fn find_plan_by_ref<'a>(plans: &'a [WorkoutPlan], reference: &str) -> Option<&'a WorkoutPlan> {
    find_by_ref(
        plans,
        reference,
        |p| p.id.as_str(),
        |p| p.name.as_str(),
        |i, _| i as u32 + 1,
    )
}

pub fn find_day_by_ref<'a>(plan: &'a WorkoutPlan, reference: &str) -> Option<&'a WorkoutDay> {
    find_by_ref(
        &plan.days,
        reference,
        |d| d.id.as_str(),
        |d| d.name.as_str(),
        |_, d| d.order,
    )
}

pub struct SessionEngine<S: Store, C: Clock + Clone> {
    repo: Repository<S>,
    clock: C,
    timer: RestTimer<C>,
    mirror: Box<dyn RemoteMirror>,
    identity: Box<dyn IdentityProvider>,
}

impl<S: Store, C: Clock + Clone> SessionEngine<S, C> {
    /// Engine with no mirror and the device's anonymous identity.
    pub fn new(store: S, clock: C) -> Self {
        let repo = Repository::new(store);
        let identity = LocalIdentity::load_or_create(&repo, None);
        Self {
            timer: RestTimer::new(clock.clone()),
            clock,
            repo,
            mirror: Box::new(NoopMirror),
            identity: Box::new(identity),
        }
    }

    pub fn with_mirror(mut self, mirror: Box<dyn RemoteMirror>) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn with_identity(mut self, identity: Box<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    pub fn repo(&self) -> &Repository<S> {
        &self.repo
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Adds or replaces plans by id. Imported plans are dirty until mirrored.
    pub fn import_plans(&self, incoming: Vec<WorkoutPlan>) -> EngineResult<usize> {
        let mut plans = self.repo.load_plans();
        let count = incoming.len();
        for mut plan in incoming {
            normalize_day_order(&mut plan);
            plan.dirty = true;
            match plans.iter_mut().find(|p| p.id == plan.id) {
                Some(existing) => *existing = plan,
                None => plans.push(plan),
            }
        }
        self.repo.save_plans(&plans)?;
        info!(count, "plans imported");

        mirror_dirty_plans(&self.repo, &*self.mirror);
        Ok(count)
    }

    pub fn plans(&self) -> Vec<WorkoutPlan> {
        self.repo.load_plans()
    }

    pub fn find_plan(&self, reference: &str) -> Option<WorkoutPlan> {
        find_plan_by_ref(&self.repo.load_plans(), reference).cloned()
    }

    /// Snapshots the day into a new active session and abandons any other.
    pub fn start_session(&mut self, plan_ref: &str, day_ref: &str) -> EngineResult<Session> {
        let plans = self.repo.load_plans();
        let plan = find_plan_by_ref(&plans, plan_ref)
            .ok_or_else(|| EngineError::PlanNotFound(plan_ref.to_string()))?;
        let day = find_day_by_ref(plan, day_ref).ok_or_else(|| EngineError::DayNotFound {
            plan: plan.name.clone(),
            day: day_ref.to_string(),
        })?;

        let now = self.now();
        let session = build_session(plan, day, &self.identity.resolve_owner_id(), now);

        let mut sessions = self.repo.load_sessions();
        let abandoned = abandon_active_sessions(&mut sessions, &session.id, now);
        let stale_rest = self
            .repo
            .load_rest_state()
            .is_some_and(|rest| rest.session_id != session.id);
        if !abandoned.is_empty() || stale_rest || self.timer.is_resting() {
            self.timer.stop(&self.repo)?;
        }
        sessions.push(session.clone());
        self.repo.save_sessions(&sessions)?;
        self.repo.save_active_session_id(&session.id)?;

        info!(
            session_id = %session.id,
            plan = %plan.name,
            day = %day.name,
            sets = session.total_sets(),
            "session started"
        );
        Ok(session)
    }

    /// The session the pointer names, or else the newest one still active.
    pub fn active_session(&self) -> Option<Session> {
        let sessions = self.repo.load_sessions();
        if let Some(id) = self.repo.load_active_session_id() {
            if let Some(session) = sessions.iter().find(|s| s.id == id && s.is_active()) {
                return Some(session.clone());
            }
            debug!(session_id = %id, "clearing stale active-session pointer");
            if let Err(err) = self.repo.clear_active_session_id() {
                warn!(error = %err, "could not clear active-session pointer");
            }
        }
        sessions
            .into_iter()
            .filter(Session::is_active)
            .max_by_key(|s| s.started_at)
    }

    pub fn session(&self, id: &str) -> Option<Session> {
        self.repo.load_sessions().into_iter().find(|s| s.id == id)
    }

    pub fn current_set(&self) -> Option<CurrentSet> {
        let session = self.active_session()?;
        let position = find_next_incomplete_set(&session)?;
        let set = set_at(&session, position)?.clone();
        let context = describe_position(&self.repo.load_plans(), &session, position);
        Some(CurrentSet {
            session_id: session.id,
            position,
            set,
            context,
        })
    }

    pub fn complete_set(&mut self, input: SetInput) -> EngineResult<SetOutcome> {
        self.resolve_next(true, input)
    }

    pub fn skip_set(&mut self) -> EngineResult<SetOutcome> {
        self.resolve_next(false, SetInput::default())
    }

    fn resolve_next(&mut self, mark_completed: bool, input: SetInput) -> EngineResult<SetOutcome> {
        let session = self.active_session().ok_or(EngineError::NoActiveSession)?;
        let position = find_next_incomplete_set(&session)
            .ok_or_else(|| EngineError::NoOpenSet(session.id.clone()))?;

        let (reps, time) = if mark_completed {
            (
                parse_count(input.reps.as_deref()),
                parse_count(input.time_seconds.as_deref()),
            )
        } else {
            (None, None)
        };
        let next = resolve_set(&session, position, mark_completed, self.now(), reps, time)?;
        self.repo.upsert_session(&next)?;
        debug!(session_id = %next.id, %position, mark_completed, "set resolved");

        if next.status == SessionStatus::Completed {
            self.finish_completed(&next)?;
            return Ok(SetOutcome {
                session: next,
                position,
                completed: true,
                rest_seconds: None,
            });
        }

        let rest = describe_position(&self.repo.load_plans(), &next, position).rest_seconds;
        // The set is already saved; a rest that cannot be recorded is skipped.
        let rest_seconds = match self.timer.start(&self.repo, rest, Some(&next.id)) {
            Ok(started) => started.then_some(rest),
            Err(err) => {
                warn!(session_id = %next.id, error = %err, "could not start rest");
                None
            }
        };
        Ok(SetOutcome {
            session: next,
            position,
            completed: false,
            rest_seconds,
        })
    }

    /// Ends the active session at the user's request, open sets or not.
    pub fn end_active_session(&mut self, action: EndAction) -> EngineResult<Session> {
        let session = self.active_session().ok_or(EngineError::NoActiveSession)?;
        let ended = end_session(&session, action.status(), self.now());

        self.timer.stop(&self.repo)?;
        self.repo.clear_active_session_id()?;
        self.repo.upsert_session(&ended)?;
        info!(session_id = %ended.id, status = %ended.status, "session ended");

        if ended.status == SessionStatus::Completed {
            self.repo.save_last_completed(&ended.id)?;
            mirror_session(&self.repo, &*self.mirror, &ended);
        }
        Ok(ended)
    }

    /// Writes that follow a session reaching Completed after it was saved.
    fn finish_completed(&mut self, session: &Session) -> EngineResult<()> {
        self.timer.stop(&self.repo)?;
        self.repo.clear_active_session_id()?;
        self.repo.save_last_completed(&session.id)?;
        info!(session_id = %session.id, "session completed");
        mirror_session(&self.repo, &*self.mirror, session);
        Ok(())
    }

    pub fn mount(&mut self) -> EngineResult<RestSnapshot> {
        if let Some(session) = self.active_session() {
            self.timer.mount(&self.repo, &session.id)?;
        }
        Ok(self.timer.snapshot())
    }

    pub fn on_foreground(&mut self) -> EngineResult<()> {
        let active_id = self.active_session().map(|s| s.id);
        self.timer.on_foreground(&self.repo, active_id.as_deref())?;
        Ok(())
    }

    pub fn on_background(&mut self) {
        self.timer.on_background();
    }

    pub fn tick(&mut self) -> EngineResult<TickOutcome> {
        Ok(self.timer.on_tick(&self.repo)?)
    }

    /// Cuts the running rest short.
    pub fn dismiss_rest(&mut self) -> EngineResult<()> {
        self.timer.stop(&self.repo)?;
        Ok(())
    }

    pub fn rest(&self) -> RestSnapshot {
        self.timer.snapshot()
    }

    pub fn history(&self) -> Vec<SessionSummary> {
        history::history(&self.repo.load_sessions(), &self.repo.load_plans())
    }

    pub fn last_completed_summary(&self) -> Option<SessionSummary> {
        let id = self.repo.load_last_completed()?;
        let session = self.session(&id)?;
        Some(history::summarize(&session, &self.repo.load_plans()))
    }

    /// Retry pass for everything that was never mirrored.
    pub fn sync_pending(&self) -> MirrorReport {
        mirror_pending(&self.repo, &*self.mirror)
    }
}
