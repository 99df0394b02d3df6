use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use std::io;

use crate::model::{find_plan, Session, SessionStatus, WorkoutPlan};

/// One row of the history view. Plan and day names are looked up in the
/// current plans and are `None` when those were edited away.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub plan_id: String,
    pub day_id: String,
    pub plan_name: Option<String>,
    pub day_name: Option<String>,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub total_sets: usize,
    pub completed_sets: usize,
    pub skipped_sets: usize,
    pub total_reps: u32,
    pub total_time_seconds: u32,
}

pub fn summarize(session: &Session, plans: &[WorkoutPlan]) -> SessionSummary {
    let plan = find_plan(plans, &session.plan_id);
    let day = plan.and_then(|p| p.day(&session.day_id));

    let completed: Vec<_> = session.sets().filter(|s| s.completed).collect();

    SessionSummary {
        id: session.id.clone(),
        plan_id: session.plan_id.clone(),
        day_id: session.day_id.clone(),
        plan_name: plan.map(|p| p.name.clone()),
        day_name: day.map(|d| d.name.clone()),
        status: session.status,
        started_at: session.started_at,
        ended_at: session.ended_at,
        duration_secs: session
            .ended_at
            .map(|end| (end - session.started_at).num_seconds().max(0)),
        total_sets: session.total_sets(),
        completed_sets: completed.len(),
        skipped_sets: session.sets().filter(|s| s.is_skipped()).count(),
        total_reps: completed.iter().filter_map(|s| s.actual_reps).sum(),
        total_time_seconds: completed.iter().filter_map(|s| s.actual_time_seconds).sum(),
    }
}

/// Finished sessions, newest first.
pub fn history(sessions: &[Session], plans: &[WorkoutPlan]) -> Vec<SessionSummary> {
    sessions
        .iter()
        .filter(|s| s.status.is_terminal())
        .sorted_by(|a, b| b.started_at.cmp(&a.started_at))
        .map(|s| summarize(s, plans))
        .collect()
}

pub fn export_csv<W: io::Write>(summaries: &[SessionSummary], writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for summary in summaries {
        wtr.serialize(summary)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SessionBlock, SessionExercise, SessionSet, WorkoutDay};
    use chrono::{Duration, TimeZone};

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, h, 0, 0).unwrap()
    }

    fn set(completed: bool, skipped: bool, reps: Option<u32>) -> SessionSet {
        SessionSet {
            set_number: 1,
            target_reps: Some(8),
            target_time_seconds: None,
            actual_reps: reps,
            actual_time_seconds: None,
            completed,
            completed_at: (completed || skipped).then(|| t(9)),
        }
    }

    fn session(id: &str, start: u32, status: SessionStatus) -> Session {
        Session {
            id: id.into(),
            owner_id: "me".into(),
            plan_id: "p1".into(),
            day_id: "d1".into(),
            started_at: t(start),
            ended_at: status.is_terminal().then(|| t(start) + Duration::minutes(45)),
            status,
            blocks: vec![SessionBlock {
                block_id: "b".into(),
                started_at: t(start),
                ended_at: None,
                exercises: vec![SessionExercise {
                    exercise_id: "e".into(),
                    sets: vec![
                        set(true, false, Some(8)),
                        set(true, false, Some(6)),
                        set(false, true, None),
                        set(false, false, None),
                    ],
                }],
            }],
        }
    }

    fn plans() -> Vec<WorkoutPlan> {
        vec![WorkoutPlan {
            id: "p1".into(),
            owner_id: "me".into(),
            name: "Push Pull".into(),
            gym_type: None,
            created_at: t(0),
            updated_at: t(0),
            dirty: false,
            days: vec![WorkoutDay {
                id: "d1".into(),
                name: "Push".into(),
                weekday: None,
                order: 1,
                blocks: Vec::new(),
            }],
        }]
    }

    #[test]
    fn summary_counts_sets_and_reps() {
        let s = summarize(&session("a", 8, SessionStatus::Completed), &plans());
        assert_eq!(s.plan_name.as_deref(), Some("Push Pull"));
        assert_eq!(s.day_name.as_deref(), Some("Push"));
        assert_eq!(s.total_sets, 4);
        assert_eq!(s.completed_sets, 2);
        assert_eq!(s.skipped_sets, 1);
        assert_eq!(s.total_reps, 14);
        assert_eq!(s.duration_secs, Some(45 * 60));
    }

    #[test]
    fn missing_plan_leaves_names_empty() {
        let s = summarize(&session("a", 8, SessionStatus::Abandoned), &[]);
        assert_eq!(s.plan_name, None);
        assert_eq!(s.day_name, None);
        assert_eq!(s.total_sets, 4);
    }

    #[test]
    fn history_is_terminal_sessions_newest_first() {
        let sessions = vec![
            session("old", 6, SessionStatus::Completed),
            session("live", 12, SessionStatus::Active),
            session("new", 10, SessionStatus::Abandoned),
        ];
        let ids: Vec<_> = history(&sessions, &plans()).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, ["new", "old"]);
    }

    #[test]
    fn csv_has_header_and_one_row_per_session() {
        let sessions = vec![session("a", 8, SessionStatus::Completed)];
        let mut out = Vec::new();
        export_csv(&history(&sessions, &plans()), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("id,plan_id,day_id,plan_name"));
        assert!(lines[1].starts_with("a,p1,d1,Push Pull,Push,completed,"));
    }
}
