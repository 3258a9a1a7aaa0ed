//! Active-Session Guard
//!
//! Enforces at most one non-terminal session per user. The guard is the only
//! writer of active-session records; the repository just stores them.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::error::{EngineError, RepositoryError};

use super::repository::SessionRepository;
use super::state::SessionId;

/// Acquires and releases the per-user active-session slot.
#[derive(Clone)]
pub struct ActiveSessionGuard {
    repository: Arc<dyn SessionRepository>,
}

impl ActiveSessionGuard {
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self { repository }
    }

    /// Claims the slot for `user_id`.
    ///
    /// Relies on the repository's conditional insert, so concurrent callers
    /// for the same user see exactly one success.
    pub fn acquire(&self, user_id: &str, session_id: SessionId) -> Result<(), EngineError> {
        match self.repository.create_active_record(user_id, session_id) {
            Ok(()) => {
                info!("User '{}' acquired active session {}", user_id, session_id);
                Ok(())
            }
            Err(RepositoryError::Conflict { existing }) => {
                match existing {
                    Some(holder) => warn!(
                        "User '{}' already has active session {}; refusing {}",
                        user_id, holder, session_id
                    ),
                    None => warn!(
                        "User '{}' has an unreadable active record; refusing {}",
                        user_id, session_id
                    ),
                }
                Err(EngineError::Conflict {
                    user_id: user_id.to_string(),
                    session_id: existing,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Claims the slot, or accepts an existing claim by the same session.
    ///
    /// Used when a persisted session is restored after a restart.
    pub fn adopt(&self, user_id: &str, session_id: SessionId) -> Result<(), EngineError> {
        match self.acquire(user_id, session_id) {
            Err(EngineError::Conflict {
                session_id: existing,
                ..
            }) if existing == Some(session_id) => {
                info!("User '{}' re-adopted active session {}", user_id, session_id);
                Ok(())
            }
            other => other,
        }
    }

    /// Frees the slot if `session_id` holds it.
    ///
    /// A slot that is empty or held by another session is left untouched, so
    /// a stale release from a finished session cannot free a newer claim.
    pub fn release(&self, user_id: &str, session_id: SessionId) -> Result<(), EngineError> {
        if self.repository.delete_active_record(user_id, session_id)? {
            info!("User '{}' released active session {}", user_id, session_id);
        } else {
            debug!(
                "User '{}' slot not held by {}; nothing to release",
                user_id, session_id
            );
        }
        Ok(())
    }

    /// Returns the session currently holding the user's slot.
    pub fn holder(&self, user_id: &str) -> Result<Option<SessionId>, EngineError> {
        Ok(self
            .repository
            .find_active_record(user_id)?
            .map(|record| record.session_id))
    }
}
