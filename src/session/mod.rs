//! Session Module
//!
//! Session snapshots, the progression state machine, persistence and the
//! single-active-session guard.
//!
//! # Structure
//!
//! - [`state`]: SessionState snapshot and status
//! - [`progression`]: Pure transition function and progress fraction
//! - [`repository`]: Persistence trait and implementations
//! - [`guard`]: Per-user active-session slot

pub mod guard;
pub mod progression;
pub mod repository;
pub mod state;

pub use guard::ActiveSessionGuard;
pub use progression::{progress_fraction, transition, Event, RestPolicy};
pub use repository::{
    ActiveSessionRecord, FileSessionRepository, InMemorySessionRepository, SessionRepository,
};
pub use state::{SessionId, SessionState, SessionStatus};
