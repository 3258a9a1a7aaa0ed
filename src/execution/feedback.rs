//! Feedback Cues
//!
//! Haptic/audio notifications sent when a set is completed or a rest period
//! ends. Delivery is fire-and-forget: the engine never looks at the outcome.

use log::info;

use crate::session::{Event, SessionState, SessionStatus};

/// A moment worth signalling to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cue {
    SetCompleted {
        exercise_index: usize,
        set_number: u32,
    },
    RestFinished,
    ExerciseAdvanced {
        exercise_index: usize,
    },
    WorkoutCompleted,
}

/// Receiver of feedback cues.
pub trait FeedbackSink: Send + Sync {
    fn notify(&self, cue: &Cue, state: &SessionState);
}

/// Writes cues to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFeedbackSink;

impl FeedbackSink for LogFeedbackSink {
    fn notify(&self, cue: &Cue, state: &SessionState) {
        info!("Session {}: {:?}", state.session_id, cue);
    }
}

/// Discards cues.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFeedbackSink;

impl FeedbackSink for NullFeedbackSink {
    fn notify(&self, _cue: &Cue, _state: &SessionState) {}
}

/// Derives the cues produced by one transition.
pub fn cues_for(previous: &SessionState, next: &SessionState, event: Event) -> Vec<Cue> {
    let mut cues = Vec::new();

    if event == Event::CompleteSet {
        cues.push(Cue::SetCompleted {
            exercise_index: previous.current_exercise_index,
            set_number: previous.current_set_number,
        });
        if next.status == SessionStatus::Completed {
            cues.push(Cue::WorkoutCompleted);
        } else if next.current_exercise_index != previous.current_exercise_index {
            cues.push(Cue::ExerciseAdvanced {
                exercise_index: next.current_exercise_index,
            });
        }
    }

    if previous.status == SessionStatus::Resting && next.status == SessionStatus::Active {
        cues.push(Cue::RestFinished);
    }

    cues
}
