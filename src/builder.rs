use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::model::{
    Session, SessionBlock, SessionExercise, SessionSet, SessionStatus, WorkoutDay, WorkoutPlan,
};

/// Snapshots a plan day into a fresh active session.
///
/// Blocks and exercises keep their stored (plan) order; every exercise gets
/// `sets` entries numbered from 1, targets copied from the plan.
pub fn build_session(
    plan: &WorkoutPlan,
    day: &WorkoutDay,
    owner_id: &str,
    now: DateTime<Utc>,
) -> Session {
    let blocks = day
        .blocks
        .iter()
        .map(|block| SessionBlock {
            block_id: block.id.clone(),
            started_at: now,
            ended_at: None,
            exercises: block
                .exercises
                .iter()
                .map(|exercise| SessionExercise {
                    exercise_id: exercise.id.clone(),
                    sets: (1..=exercise.sets)
                        .map(|set_number| SessionSet {
                            set_number,
                            target_reps: exercise.default_target_reps(),
                            target_time_seconds: exercise.time_seconds,
                            actual_reps: None,
                            actual_time_seconds: None,
                            completed: false,
                            completed_at: None,
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    Session {
        id: Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        plan_id: plan.id.clone(),
        day_id: day.id.clone(),
        started_at: now,
        ended_at: None,
        status: SessionStatus::Active,
        blocks,
    }
}

/// Moves every active session except `keep_id` to Abandoned, ended at `at`.
/// Returns the ids that were abandoned.
pub fn abandon_active_sessions(
    sessions: &mut [Session],
    keep_id: &str,
    at: DateTime<Utc>,
) -> Vec<String> {
    let mut abandoned = Vec::new();
    for session in sessions
        .iter_mut()
        .filter(|s| s.is_active() && s.id != keep_id)
    {
        session.status = SessionStatus::Abandoned;
        session.ended_at = Some(at);
        info!(session_id = %session.id, "abandoned by newer session");
        abandoned.push(session.id.clone());
    }
    abandoned
}

/// Sorts days by `order` and renumbers them 1..=n.
pub fn normalize_day_order(plan: &mut WorkoutPlan) {
    plan.days.sort_by_key(|d| d.order);
    for (i, day) in plan.days.iter_mut().enumerate() {
        day.order = i as u32 + 1;
    }
}
