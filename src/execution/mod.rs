//! Session Execution Module
//!
//! Runs workout sessions in real time: lifecycle commands, the clock, and
//! feedback cues.
//!
//! # Architecture
//!
//! - [`manager`]: Session lifecycle manager orchestrating clock, state
//!   machine, guard and persistence
//! - [`feedback`]: Haptic/audio cue sink

pub mod feedback;
pub mod manager;

pub use feedback::{Cue, FeedbackSink, LogFeedbackSink, NullFeedbackSink};
pub use manager::{SessionManager, SessionManagerBuilder, StateListener};
