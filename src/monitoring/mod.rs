//! Session Monitoring Module
//!
//! Observers of the snapshot stream.
//!
//! # Components
//!
//! - [`SessionTimeline`]: Event log and per-exercise time summary

pub mod timeline;

pub use timeline::{format_seconds, EventType, ExerciseStats, SessionTimeline, TimelineEvent};
