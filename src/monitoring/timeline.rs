//! Session Timeline
//!
//! Records what happened during a session from its snapshot stream and
//! summarizes time spent per exercise.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::execution::SessionManager;
use crate::session::{SessionState, SessionStatus};
use crate::workout::WorkoutDefinition;

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Started,
    SetCompleted,
    RestStarted,
    RestFinished,
    Paused,
    Resumed,
    Completed,
    Abandoned,
}

/// A single event in the session timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    pub event_type: EventType,
    /// Exercise the event refers to
    pub exercise_index: usize,
    pub set_number: u32,
    /// Session clock at the event
    pub elapsed_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// Per-exercise totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExerciseStats {
    pub sets_completed: u32,
    pub active_seconds: u64,
    pub rest_seconds: u64,
}

/// Tracks the timeline of one session.
///
/// Feed it every snapshot in emission order, either by hand with
/// [`observe`](Self::observe) or by subscribing with [`attach`](Self::attach).
#[derive(Debug, Clone, Default)]
pub struct SessionTimeline {
    events: Vec<TimelineEvent>,
    stats: Vec<ExerciseStats>,
    last: Option<SessionState>,
}

impl SessionTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a new timeline to a manager's snapshot stream.
    pub fn attach(manager: &SessionManager) -> Arc<Mutex<SessionTimeline>> {
        let timeline = Arc::new(Mutex::new(SessionTimeline::new()));
        let sink = Arc::clone(&timeline);
        manager.on_state_change(move |state| {
            sink.lock()
                .unwrap_or_else(|p| p.into_inner())
                .observe(state);
        });
        timeline
    }

    /// Records the differences between the previous snapshot and `state`.
    ///
    /// A snapshot from a different session resets the timeline.
    pub fn observe(&mut self, state: &SessionState) {
        let previous = match self.last.take() {
            Some(last) if last.session_id == state.session_id => last,
            _ => {
                self.events.clear();
                self.stats.clear();
                self.push(EventType::Started, state);
                self.last = Some(state.clone());
                return;
            }
        };

        let delta = state
            .total_elapsed_seconds
            .saturating_sub(previous.total_elapsed_seconds);
        if delta > 0 {
            let stats = self.stats_mut(previous.current_exercise_index);
            match previous.status {
                SessionStatus::Resting => stats.rest_seconds += delta,
                _ => stats.active_seconds += delta,
            }
        }

        let advanced = state.current_exercise_index != previous.current_exercise_index
            || state.current_set_number != previous.current_set_number
            || state.status == SessionStatus::Completed;
        if advanced {
            self.stats_mut(previous.current_exercise_index).sets_completed += 1;
            self.push(EventType::SetCompleted, &previous);
        }

        match (previous.status, state.status) {
            (SessionStatus::Paused, SessionStatus::Paused) => {}
            (_, SessionStatus::Paused) => self.push(EventType::Paused, state),
            (SessionStatus::Paused, _) if !state.is_terminal() => {
                self.push(EventType::Resumed, state)
            }
            _ => {}
        }

        if state.status == SessionStatus::Resting && previous.status != SessionStatus::Resting
            && previous.status != SessionStatus::Paused
        {
            self.push(EventType::RestStarted, state);
        }
        if previous.status == SessionStatus::Resting && state.status == SessionStatus::Active {
            self.push(EventType::RestFinished, state);
        }

        match state.status {
            SessionStatus::Completed => self.push(EventType::Completed, state),
            SessionStatus::Abandoned => self.push(EventType::Abandoned, state),
            _ => {}
        }

        self.last = Some(state.clone());
    }

    fn push(&mut self, event_type: EventType, state: &SessionState) {
        self.events.push(TimelineEvent {
            event_type,
            exercise_index: state.current_exercise_index,
            set_number: state.current_set_number,
            elapsed_seconds: state.total_elapsed_seconds,
            timestamp: Utc::now(),
        });
    }

    fn stats_mut(&mut self, index: usize) -> &mut ExerciseStats {
        if self.stats.len() <= index {
            self.stats.resize(index + 1, ExerciseStats::default());
        }
        &mut self.stats[index]
    }

    /// Returns all recorded events.
    pub fn get_events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Totals for one exercise.
    pub fn exercise_stats(&self, index: usize) -> ExerciseStats {
        self.stats.get(index).cloned().unwrap_or_default()
    }

    /// Session clock at the last observed snapshot.
    pub fn elapsed_seconds(&self) -> u64 {
        self.last.as_ref().map_or(0, |s| s.total_elapsed_seconds)
    }

    /// Renders a per-exercise table.
    pub fn summary(&self, workout: &WorkoutDefinition) -> String {
        let mut output = String::from("\nSession Summary:\n\n");

        for (index, plan) in workout.exercises.iter().enumerate() {
            let stats = self.exercise_stats(index);
            output.push_str(&format!(
                "{:16} | sets {:>2}/{:<2} | active {:>6} | rest {:>6}\n",
                truncate(&plan.exercise_id, 16),
                stats.sets_completed,
                plan.target_sets,
                format_seconds(stats.active_seconds),
                format_seconds(stats.rest_seconds),
            ));
        }

        let outcome = match self.last.as_ref().map(|s| s.status) {
            Some(SessionStatus::Completed) => "completed",
            Some(SessionStatus::Abandoned) => "abandoned",
            Some(_) => "in progress",
            None => "not started",
        };
        output.push_str(&format!(
            "\nTotal: {} ({})\n",
            format_seconds(self.elapsed_seconds()),
            outcome
        ));
        output
    }
}

/// Formats seconds as `m:ss`.
pub fn format_seconds(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Truncates a string to a maximum length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{transition, Event, RestPolicy, SessionId};
    use crate::workout::ExercisePlan;

    fn workout() -> WorkoutDefinition {
        WorkoutDefinition::from_exercises(
            "pair",
            vec![
                ExercisePlan::new("squat", 1, 2).with_rest(3),
                ExercisePlan::new("bench", 2, 1).with_rest(3),
            ],
        )
    }

    /// Runs events through the state machine, observing every new snapshot.
    fn run(events: &[Event]) -> SessionTimeline {
        let workout = workout();
        let mut timeline = SessionTimeline::new();
        let mut state = SessionState::new(SessionId::new(), "pair", "alice");
        for event in events {
            let next = transition(&state, *event, &workout, RestPolicy::default(), Utc::now())
                .unwrap();
            if next != state {
                timeline.observe(&next);
            }
            state = next;
        }
        timeline
    }

    fn kinds(timeline: &SessionTimeline) -> Vec<EventType> {
        timeline.get_events().iter().map(|e| e.event_type).collect()
    }

    #[test]
    fn test_timeline_creation() {
        let timeline = SessionTimeline::new();
        assert!(timeline.get_events().is_empty());
        assert_eq!(timeline.elapsed_seconds(), 0);
    }

    #[test]
    fn test_full_session_events() {
        use Event::*;
        let timeline = run(&[Start, Tick, CompleteSet, Tick, Tick, Tick, Tick, CompleteSet, CompleteSet]);

        assert_eq!(
            kinds(&timeline),
            vec![
                EventType::Started,
                EventType::SetCompleted,
                EventType::RestStarted,
                EventType::RestFinished,
                EventType::SetCompleted,
                EventType::SetCompleted,
                EventType::Completed,
            ]
        );
    }

    #[test]
    fn test_stats_split_active_and_rest() {
        use Event::*;
        let timeline = run(&[Start, Tick, Tick, CompleteSet, Tick, Tick, Tick, Tick, CompleteSet]);

        let squat = timeline.exercise_stats(0);
        assert_eq!(squat.sets_completed, 2);
        assert_eq!(squat.rest_seconds, 3);
        assert_eq!(squat.active_seconds, 3);
        assert_eq!(timeline.elapsed_seconds(), 6);
        assert_eq!(timeline.exercise_stats(1), ExerciseStats::default());
    }

    #[test]
    fn test_pause_and_resume_events() {
        use Event::*;
        let timeline = run(&[Start, CompleteSet, Pause, Tick, Resume, SkipRest, Stop]);

        assert_eq!(
            kinds(&timeline),
            vec![
                EventType::Started,
                EventType::SetCompleted,
                EventType::RestStarted,
                EventType::Paused,
                EventType::Resumed,
                EventType::RestFinished,
                EventType::Abandoned,
            ]
        );
    }

    #[test]
    fn test_new_session_resets() {
        use Event::*;
        let mut timeline = run(&[Start, CompleteSet]);
        let other = SessionState::new(SessionId::new(), "pair", "alice");
        timeline.observe(&other);

        assert_eq!(kinds(&timeline), vec![EventType::Started]);
    }

    #[test]
    fn test_summary_contents() {
        use Event::*;
        let timeline = run(&[Start, Tick, CompleteSet, SkipRest, CompleteSet, CompleteSet]);
        let summary = timeline.summary(&workout());

        assert!(summary.contains("squat"));
        assert!(summary.contains("bench"));
        assert!(summary.contains("sets  2/2"));
        assert!(summary.contains("completed"));
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0), "0:00");
        assert_eq!(format_seconds(75), "1:15");
        assert_eq!(format_seconds(3600), "60:00");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("row", 6), "row   ");
        assert_eq!(truncate("romanian_deadlift", 10), "romania...");
    }
}
