//! Session State
//!
//! The immutable snapshot value emitted after every transition. Snapshots are
//! what subscribers render and what the repository persists.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque session identifier, created once at session start.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Macro status of a session.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    NotStarted,
    /// Performing the current set
    Active,
    /// Counting down the rest period
    Resting,
    /// Clock frozen; resumes to Active or Resting
    Paused,
    Completed,
    Abandoned,
}

impl SessionStatus {
    /// Returns true for `Completed` and `Abandoned`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    /// Returns true while the clock should be counting.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Active | Self::Resting)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "not started",
            Self::Active => "active",
            Self::Resting => "resting",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        };
        f.write_str(label)
    }
}

/// Snapshot of one workout session.
///
/// Only the progression state machine produces new values; everything else
/// treats snapshots as read-only.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub session_id: SessionId,
    pub workout_id: String,
    pub user_id: String,
    pub status: SessionStatus,

    /// 0-based index into the workout's exercises
    pub current_exercise_index: usize,

    /// 1-based set number within the current exercise
    pub current_set_number: u32,

    /// Nonzero only while resting (or paused from resting)
    pub rest_remaining_seconds: u32,

    /// Seconds counted while Active or Resting
    pub total_elapsed_seconds: u64,

    pub started_at: Option<DateTime<Utc>>,

    /// Set once, on transition to Completed or Abandoned
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Creates a not-yet-started session.
    pub fn new(
        session_id: SessionId,
        workout_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            session_id,
            workout_id: workout_id.into(),
            user_id: user_id.into(),
            status: SessionStatus::NotStarted,
            current_exercise_index: 0,
            current_set_number: 1,
            rest_remaining_seconds: 0,
            total_elapsed_seconds: 0,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Status to return to when a paused session resumes.
    pub fn resume_status(&self) -> SessionStatus {
        if self.rest_remaining_seconds > 0 {
            SessionStatus::Resting
        } else {
            SessionStatus::Active
        }
    }
}
