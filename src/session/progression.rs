//! Progression State Machine
//!
//! Pure transition function folding discrete events into session snapshots.
//! Knows nothing about real time: a [`Event::Tick`] is one second, however it
//! was produced.
//!
//! # Rules
//!
//! - `Start` moves a fresh session to `Active` on the first set of the first
//!   exercise.
//! - `CompleteSet` on a non-final set moves to `Resting` for the exercise's
//!   rest period. On the final set it advances to the next exercise (no rest
//!   unless [`RestPolicy::rest_between_exercises`] is set) or completes the
//!   workout.
//! - `Tick` counts elapsed time while `Active` or `Resting` and drives the
//!   rest countdown; at zero the session returns to `Active` on its own.
//! - Every event on a terminal session is rejected.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::workout::WorkoutDefinition;

use super::state::{SessionState, SessionStatus};

/// Events accepted by [`transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Start,
    Tick,
    CompleteSet,
    SkipRest,
    Pause,
    Resume,
    Stop,
}

/// Where rest periods are inserted.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestPolicy {
    /// Also rest after the last set of an exercise before the next one
    #[serde(default)]
    pub rest_between_exercises: bool,
}

/// Applies one event to a snapshot and returns the next snapshot.
///
/// `now` stamps `started_at` and `completed_at`; it is taken as a parameter so
/// the function stays deterministic.
pub fn transition(
    state: &SessionState,
    event: Event,
    workout: &WorkoutDefinition,
    policy: RestPolicy,
    now: DateTime<Utc>,
) -> Result<SessionState, EngineError> {
    if state.is_terminal() {
        return Err(EngineError::finished());
    }

    let mut next = state.clone();

    match event {
        Event::Start => {
            if state.status != SessionStatus::NotStarted {
                return Err(EngineError::state("session already started"));
            }
            if workout.is_empty() {
                return Err(EngineError::Validation("workout has no exercises".to_string()));
            }
            next.status = SessionStatus::Active;
            next.current_exercise_index = 0;
            next.current_set_number = 1;
            next.rest_remaining_seconds = 0;
            next.started_at = Some(now);
        }

        Event::Tick => match state.status {
            SessionStatus::NotStarted => {
                return Err(EngineError::state("session not started"));
            }
            SessionStatus::Paused => {}
            SessionStatus::Active => {
                next.total_elapsed_seconds += 1;
            }
            SessionStatus::Resting => {
                next.total_elapsed_seconds += 1;
                next.rest_remaining_seconds = state.rest_remaining_seconds.saturating_sub(1);
                if next.rest_remaining_seconds == 0 {
                    next.status = SessionStatus::Active;
                }
            }
            SessionStatus::Completed | SessionStatus::Abandoned => {
                return Err(EngineError::finished());
            }
        },

        Event::CompleteSet => {
            if state.status != SessionStatus::Active {
                return Err(EngineError::state(format!(
                    "cannot complete a set while {}",
                    state.status
                )));
            }
            complete_set(&mut next, workout, policy, now)?;
        }

        Event::SkipRest => {
            if state.status != SessionStatus::Resting {
                return Err(EngineError::state(format!(
                    "cannot skip rest while {}",
                    state.status
                )));
            }
            next.rest_remaining_seconds = 0;
            next.status = SessionStatus::Active;
        }

        Event::Pause => {
            if !state.status.is_running() {
                return Err(EngineError::state(format!("cannot pause while {}", state.status)));
            }
            next.status = SessionStatus::Paused;
        }

        Event::Resume => {
            if state.status != SessionStatus::Paused {
                return Err(EngineError::state(format!("cannot resume while {}", state.status)));
            }
            next.status = state.resume_status();
        }

        Event::Stop => {
            next.status = SessionStatus::Abandoned;
            next.rest_remaining_seconds = 0;
            next.completed_at = Some(now);
        }
    }

    if next.status != state.status {
        debug!(
            "Session {}: {:?} + {:?} -> {:?}",
            state.session_id, state.status, event, next.status
        );
    }
    Ok(next)
}

fn complete_set(
    next: &mut SessionState,
    workout: &WorkoutDefinition,
    policy: RestPolicy,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    let exercise = workout.exercise(next.current_exercise_index).ok_or_else(|| {
        EngineError::state(format!(
            "exercise index {} out of range",
            next.current_exercise_index
        ))
    })?;

    if next.current_set_number < exercise.target_sets {
        next.current_set_number += 1;
        enter_rest(next, exercise.rest_seconds);
    } else if next.current_exercise_index + 1 < workout.len() {
        next.current_exercise_index += 1;
        next.current_set_number = 1;
        if policy.rest_between_exercises {
            enter_rest(next, exercise.rest_seconds);
        }
    } else {
        next.status = SessionStatus::Completed;
        next.rest_remaining_seconds = 0;
        next.completed_at = Some(now);
    }
    Ok(())
}

/// A zero-length rest leaves the session active.
fn enter_rest(next: &mut SessionState, seconds: u32) {
    next.rest_remaining_seconds = seconds;
    next.status = if seconds > 0 {
        SessionStatus::Resting
    } else {
        SessionStatus::Active
    };
}

/// Fraction of the workout done, for display.
///
/// `(exercise_index + set_number / target_sets) / exercise_count`, and `1.0`
/// once the session has completed.
pub fn progress_fraction(state: &SessionState, workout: &WorkoutDefinition) -> f64 {
    if state.status == SessionStatus::Completed {
        return 1.0;
    }
    let Some(exercise) = workout.exercise(state.current_exercise_index) else {
        return 0.0;
    };
    if exercise.target_sets == 0 {
        return 0.0;
    }

    let within = state.current_set_number as f64 / exercise.target_sets as f64;
    (state.current_exercise_index as f64 + within) / workout.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SESSION_FINISHED;
    use crate::session::SessionId;
    use crate::workout::ExercisePlan;

    fn two_by_three() -> WorkoutDefinition {
        WorkoutDefinition::from_exercises(
            "full_body",
            vec![
                ExercisePlan::new("squat", 1, 3).with_rest(90),
                ExercisePlan::new("bench", 2, 3).with_rest(60),
            ],
        )
    }

    fn apply(state: &SessionState, event: Event, workout: &WorkoutDefinition) -> SessionState {
        transition(state, event, workout, RestPolicy::default(), Utc::now()).unwrap()
    }

    fn started(workout: &WorkoutDefinition) -> SessionState {
        let fresh = SessionState::new(SessionId::new(), &workout.id, "alice");
        apply(&fresh, Event::Start, workout)
    }

    #[test]
    fn test_start_activates_first_set() {
        let workout = two_by_three();
        let state = started(&workout);

        assert_eq!(state.status, SessionStatus::Active);
        assert_eq!(state.current_exercise_index, 0);
        assert_eq!(state.current_set_number, 1);
        assert!(state.started_at.is_some());
    }

    #[test]
    fn test_start_empty_workout_fails() {
        let workout = WorkoutDefinition::new("empty");
        let fresh = SessionState::new(SessionId::new(), "empty", "alice");
        let err = transition(&fresh, Event::Start, &workout, RestPolicy::default(), Utc::now())
            .unwrap_err();

        assert!(matches!(err, EngineError::Validation(ref m) if m == "workout has no exercises"));
    }

    #[test]
    fn test_start_twice_fails() {
        let workout = two_by_three();
        let state = started(&workout);
        let err = transition(&state, Event::Start, &workout, RestPolicy::default(), Utc::now());
        assert!(matches!(err, Err(EngineError::State(_))));
    }

    #[test]
    fn test_complete_set_enters_rest() {
        let workout = two_by_three();
        let state = apply(&started(&workout), Event::CompleteSet, &workout);

        assert_eq!(state.status, SessionStatus::Resting);
        assert_eq!(state.current_set_number, 2);
        assert_eq!(state.rest_remaining_seconds, 90);
    }

    #[test]
    fn test_rest_counts_down_to_active() {
        let workout = two_by_three();
        let mut state = apply(&started(&workout), Event::CompleteSet, &workout);

        for _ in 0..89 {
            state = apply(&state, Event::Tick, &workout);
            assert_eq!(state.status, SessionStatus::Resting);
        }
        state = apply(&state, Event::Tick, &workout);

        assert_eq!(state.status, SessionStatus::Active);
        assert_eq!(state.rest_remaining_seconds, 0);
        assert_eq!(state.current_set_number, 2);
        assert_eq!(state.total_elapsed_seconds, 90);
    }

    #[test]
    fn test_tick_counts_while_active() {
        let workout = two_by_three();
        let state = apply(&started(&workout), Event::Tick, &workout);
        assert_eq!(state.total_elapsed_seconds, 1);
        assert_eq!(state.status, SessionStatus::Active);
    }

    #[test]
    fn test_tick_before_start_fails() {
        let workout = two_by_three();
        let fresh = SessionState::new(SessionId::new(), "full_body", "alice");
        assert!(transition(&fresh, Event::Tick, &workout, RestPolicy::default(), Utc::now()).is_err());
    }

    #[test]
    fn test_skip_rest() {
        let workout = two_by_three();
        let resting = apply(&started(&workout), Event::CompleteSet, &workout);
        let state = apply(&resting, Event::SkipRest, &workout);

        assert_eq!(state.status, SessionStatus::Active);
        assert_eq!(state.rest_remaining_seconds, 0);
        assert_eq!(state.current_set_number, 2);
    }

    #[test]
    fn test_skip_rest_while_active_fails() {
        let workout = two_by_three();
        let err = transition(
            &started(&workout),
            Event::SkipRest,
            &workout,
            RestPolicy::default(),
            Utc::now(),
        );
        assert!(matches!(err, Err(EngineError::State(_))));
    }

    #[test]
    fn test_complete_set_while_resting_fails() {
        let workout = two_by_three();
        let resting = apply(&started(&workout), Event::CompleteSet, &workout);
        let err = transition(&resting, Event::CompleteSet, &workout, RestPolicy::default(), Utc::now());
        assert!(matches!(err, Err(EngineError::State(_))));
    }

    #[test]
    fn test_last_set_advances_without_rest() {
        let workout = two_by_three();
        let mut state = started(&workout);
        for _ in 0..2 {
            state = apply(&state, Event::CompleteSet, &workout);
            state = apply(&state, Event::SkipRest, &workout);
        }
        state = apply(&state, Event::CompleteSet, &workout);

        assert_eq!(state.status, SessionStatus::Active);
        assert_eq!(state.current_exercise_index, 1);
        assert_eq!(state.current_set_number, 1);
        assert_eq!(state.rest_remaining_seconds, 0);
    }

    #[test]
    fn test_rest_between_exercises_policy() {
        let workout = two_by_three();
        let policy = RestPolicy {
            rest_between_exercises: true,
        };
        let mut state = started(&workout);
        for _ in 0..2 {
            state = transition(&state, Event::CompleteSet, &workout, policy, Utc::now()).unwrap();
            state = transition(&state, Event::SkipRest, &workout, policy, Utc::now()).unwrap();
        }
        state = transition(&state, Event::CompleteSet, &workout, policy, Utc::now()).unwrap();

        assert_eq!(state.status, SessionStatus::Resting);
        assert_eq!(state.current_exercise_index, 1);
        assert_eq!(state.current_set_number, 1);
        assert_eq!(state.rest_remaining_seconds, 90);
    }

    #[test]
    fn test_zero_rest_stays_active() {
        let workout = WorkoutDefinition::from_exercises(
            "circuit",
            vec![ExercisePlan::new("burpee", 1, 3).with_rest(0)],
        );
        let state = apply(&started(&workout), Event::CompleteSet, &workout);

        assert_eq!(state.status, SessionStatus::Active);
        assert_eq!(state.current_set_number, 2);
    }

    #[test]
    fn test_final_set_completes() {
        let workout = WorkoutDefinition::from_exercises(
            "single",
            vec![ExercisePlan::new("plank", 1, 1)],
        );
        let now = Utc::now();
        let state = transition(
            &started(&workout),
            Event::CompleteSet,
            &workout,
            RestPolicy::default(),
            now,
        )
        .unwrap();

        assert_eq!(state.status, SessionStatus::Completed);
        assert_eq!(state.completed_at, Some(now));
    }

    #[test]
    fn test_events_after_finish_fail() {
        let workout = WorkoutDefinition::from_exercises(
            "single",
            vec![ExercisePlan::new("plank", 1, 1)],
        );
        let done = apply(&started(&workout), Event::CompleteSet, &workout);

        for event in [
            Event::Tick,
            Event::CompleteSet,
            Event::SkipRest,
            Event::Pause,
            Event::Resume,
            Event::Stop,
        ] {
            let err = transition(&done, event, &workout, RestPolicy::default(), Utc::now())
                .unwrap_err();
            assert!(matches!(err, EngineError::State(ref m) if m == SESSION_FINISHED));
        }
    }

    #[test]
    fn test_pause_freezes_rest_and_elapsed() {
        let workout = two_by_three();
        let resting = apply(&started(&workout), Event::CompleteSet, &workout);
        let resting = apply(&resting, Event::Tick, &workout);
        let mut paused = apply(&resting, Event::Pause, &workout);

        for _ in 0..10 {
            paused = apply(&paused, Event::Tick, &workout);
        }
        assert_eq!(paused.status, SessionStatus::Paused);
        assert_eq!(paused.rest_remaining_seconds, 89);
        assert_eq!(paused.total_elapsed_seconds, 1);

        let resumed = apply(&paused, Event::Resume, &workout);
        assert_eq!(resumed.status, SessionStatus::Resting);
        let resumed = apply(&resumed, Event::Tick, &workout);
        assert_eq!(resumed.rest_remaining_seconds, 88);
    }

    #[test]
    fn test_pause_from_active_resumes_active() {
        let workout = two_by_three();
        let paused = apply(&started(&workout), Event::Pause, &workout);
        assert_eq!(apply(&paused, Event::Resume, &workout).status, SessionStatus::Active);
    }

    #[test]
    fn test_stop_abandons_from_rest() {
        let workout = two_by_three();
        let resting = apply(&started(&workout), Event::CompleteSet, &workout);
        let stopped = apply(&resting, Event::Stop, &workout);

        assert_eq!(stopped.status, SessionStatus::Abandoned);
        assert_eq!(stopped.rest_remaining_seconds, 0);
        assert!(stopped.completed_at.is_some());
    }

    #[test]
    fn test_progress_fraction() {
        let workout = two_by_three();
        let state = started(&workout);
        assert!((progress_fraction(&state, &workout) - 1.0 / 6.0).abs() < 1e-9);

        let state = apply(&state, Event::CompleteSet, &workout);
        assert!((progress_fraction(&state, &workout) - 2.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_progress_fraction_completed() {
        let workout = WorkoutDefinition::from_exercises(
            "single",
            vec![ExercisePlan::new("plank", 1, 1)],
        );
        let done = apply(&started(&workout), Event::CompleteSet, &workout);
        assert_eq!(progress_fraction(&done, &workout), 1.0);
    }
}
