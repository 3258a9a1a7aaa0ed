//! LiftRunner - Workout Execution Engine
//!
//! Runs a previously authored workout plan in real time: steps through
//! exercises and sets, counts down rest periods between sets, accumulates
//! session time, and guarantees a user never has two sessions in flight.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`workout`]: Read-only workout definitions and catalogs
//! - [`session`]: Snapshots, the progression state machine, persistence and
//!   the active-session guard
//! - [`clock`]: 1 Hz tick sources
//! - [`execution`]: Session lifecycle manager and feedback cues
//! - [`monitoring`]: Timeline and summaries built from the snapshot stream
//! - [`config`]: Engine settings
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use liftrunner::execution::SessionManager;
//! use liftrunner::session::FileSessionRepository;
//! use liftrunner::load_workout;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let workout = load_workout("push_day.yaml")?;
//!     let repository = Arc::new(FileSessionRepository::open(".liftrunner")?);
//!
//!     let manager = SessionManager::builder("alice", repository).build();
//!     manager.start(&workout)?;
//!     manager.complete_set()?;
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod execution;
pub mod monitoring;
pub mod session;
pub mod workout;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::EngineError;
pub use execution::manager::SessionManager;
pub use session::{SessionState, SessionStatus};
pub use workout::catalog::load_workout;
pub use workout::model::{ExercisePlan, WorkoutDefinition};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "LiftRunner";
