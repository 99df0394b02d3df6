use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// A reusable workout template. Read-only to the session engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutPlan {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub gym_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub days: Vec<WorkoutDay>,
    /// Set when the latest edit has not been mirrored yet.
    #[serde(default)]
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutDay {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub weekday: Option<Weekday>,
    pub order: u32,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    pub title: String,
    pub order: u32,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub order: u32,
    #[serde(default)]
    pub reps_min: Option<u32>,
    #[serde(default)]
    pub reps_max: Option<u32>,
    #[serde(default)]
    pub time_seconds: Option<u32>,
    pub sets: u32,
    #[serde(default)]
    pub rest_seconds: u32,
}

/// What a single set of an exercise aims for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Reps { min: Option<u32>, max: Option<u32> },
    Time(u32),
    Unspecified,
}

impl Exercise {
    pub fn target(&self) -> Target {
        match (self.reps_min, self.reps_max, self.time_seconds) {
            (None, None, Some(secs)) => Target::Time(secs),
            (None, None, None) => Target::Unspecified,
            (min, max, _) => Target::Reps { min, max },
        }
    }

    /// Per-set rep target: the lower bound of the range when there is one.
    pub fn default_target_reps(&self) -> Option<u32> {
        self.reps_min.or(self.reps_max)
    }
}

impl WorkoutPlan {
    pub fn day(&self, day_id: &str) -> Option<&WorkoutDay> {
        self.days.iter().find(|d| d.id == day_id)
    }
}

impl WorkoutDay {
    pub fn block(&self, block_id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == block_id)
    }
}

impl Block {
    pub fn exercise(&self, exercise_id: &str) -> Option<&Exercise> {
        self.exercises.iter().find(|e| e.id == exercise_id)
    }
}

pub fn find_plan<'a>(plans: &'a [WorkoutPlan], plan_id: &str) -> Option<&'a WorkoutPlan> {
    plans.iter().find(|p| p.id == plan_id)
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

/// A live or finished execution of one plan day. Everything needed to run
/// it is snapshotted at creation; only set results and status change later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub owner_id: String,
    pub plan_id: String,
    pub day_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    #[serde(default)]
    pub blocks: Vec<SessionBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBlock {
    pub block_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exercises: Vec<SessionExercise>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExercise {
    pub exercise_id: String,
    #[serde(default)]
    pub sets: Vec<SessionSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSet {
    pub set_number: u32,
    #[serde(default)]
    pub target_reps: Option<u32>,
    #[serde(default)]
    pub target_time_seconds: Option<u32>,
    #[serde(default)]
    pub actual_reps: Option<u32>,
    #[serde(default)]
    pub actual_time_seconds: Option<u32>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionSet {
    /// Completed or skipped. Skips stamp `completed_at` without `completed`.
    pub fn is_resolved(&self) -> bool {
        self.completed || self.completed_at.is_some()
    }

    pub fn is_skipped(&self) -> bool {
        !self.completed && self.completed_at.is_some()
    }
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn total_sets(&self) -> usize {
        self.sets().count()
    }

    pub fn sets(&self) -> impl Iterator<Item = &SessionSet> {
        self.blocks
            .iter()
            .flat_map(|b| b.exercises.iter())
            .flat_map(|e| e.sets.iter())
    }
}

/// Persisted deadline of the running rest period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestState {
    pub session_id: String,
    pub ends_at: DateTime<Utc>,
}
