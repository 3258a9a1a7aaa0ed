//! Session Persistence
//!
//! The repository stores session snapshots and the per-user active-session
//! records. Two implementations are provided:
//!
//! - [`InMemorySessionRepository`]: process-local maps, used by tests and
//!   embedders that persist elsewhere.
//! - [`FileSessionRepository`]: JSON files under a state directory, layout
//!   `sessions/{session_id}.json` and `active/{user_id}.json`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::RepositoryError;

use super::state::{SessionId, SessionState};

/// Marks a user as having a session in flight.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ActiveSessionRecord {
    pub user_id: String,
    pub session_id: SessionId,
}

/// Persistence boundary used by the engine.
///
/// `create_active_record` must be a single conditional insert: two
/// concurrent calls for the same user must never both succeed. A record is
/// only ever removed on behalf of the session it names.
pub trait SessionRepository: Send + Sync {
    /// Inserts the active record, or fails with `RepositoryError::Conflict`.
    fn create_active_record(&self, user_id: &str, session_id: SessionId)
        -> Result<(), RepositoryError>;

    /// Removes the user's record if it names `session_id`.
    ///
    /// Returns whether a record was removed. A missing record, or one held
    /// by another session, is left alone and is not an error.
    fn delete_active_record(&self, user_id: &str, session_id: SessionId)
        -> Result<bool, RepositoryError>;

    /// Returns the user's active record, if any.
    fn find_active_record(&self, user_id: &str)
        -> Result<Option<ActiveSessionRecord>, RepositoryError>;

    /// Stores a snapshot, replacing any earlier one for the same session.
    fn save_snapshot(&self, state: &SessionState) -> Result<(), RepositoryError>;

    /// Returns the most recently saved snapshot for a session.
    fn load_latest_snapshot(&self, session_id: SessionId) -> Result<SessionState, RepositoryError>;
}

/// Locks a mutex, recovering the data if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Repository held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    active: Mutex<HashMap<String, ActiveSessionRecord>>,
    snapshots: Mutex<HashMap<SessionId, SessionState>>,
    writes: Mutex<usize>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active records currently held.
    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }

    /// Number of successful `save_snapshot` calls.
    pub fn snapshot_writes(&self) -> usize {
        *lock(&self.writes)
    }
}

impl SessionRepository for InMemorySessionRepository {
    fn create_active_record(
        &self,
        user_id: &str,
        session_id: SessionId,
    ) -> Result<(), RepositoryError> {
        match lock(&self.active).entry(user_id.to_string()) {
            Entry::Occupied(existing) => Err(RepositoryError::Conflict {
                existing: Some(existing.get().session_id),
            }),
            Entry::Vacant(slot) => {
                slot.insert(ActiveSessionRecord {
                    user_id: user_id.to_string(),
                    session_id,
                });
                Ok(())
            }
        }
    }

    fn delete_active_record(
        &self,
        user_id: &str,
        session_id: SessionId,
    ) -> Result<bool, RepositoryError> {
        match lock(&self.active).entry(user_id.to_string()) {
            Entry::Occupied(record) if record.get().session_id == session_id => {
                record.remove();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn find_active_record(
        &self,
        user_id: &str,
    ) -> Result<Option<ActiveSessionRecord>, RepositoryError> {
        Ok(lock(&self.active).get(user_id).cloned())
    }

    fn save_snapshot(&self, state: &SessionState) -> Result<(), RepositoryError> {
        lock(&self.snapshots).insert(state.session_id, state.clone());
        *lock(&self.writes) += 1;
        Ok(())
    }

    fn load_latest_snapshot(&self, session_id: SessionId) -> Result<SessionState, RepositoryError> {
        lock(&self.snapshots)
            .get(&session_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(session_id.to_string()))
    }
}

/// Attempts at reading an active record that another writer may still be
/// filling in.
const ACTIVE_READ_ATTEMPTS: u32 = 5;
const ACTIVE_READ_BACKOFF: Duration = Duration::from_millis(10);

/// Repository storing JSON files under a state directory.
///
/// An active record is written in full to a private temp file and then
/// hard-linked into place. The link fails if the target exists, so the claim
/// is exclusive across threads and processes and a visible record is never
/// partially written.
#[derive(Debug, Clone)]
pub struct FileSessionRepository {
    root: PathBuf,
}

impl FileSessionRepository {
    /// Opens (and creates if needed) a repository rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let root = root.into();
        fs::create_dir_all(root.join("sessions"))?;
        fs::create_dir_all(root.join("active"))?;
        info!("Session repository at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot_path(&self, session_id: SessionId) -> PathBuf {
        self.root.join("sessions").join(format!("{}.json", session_id))
    }

    fn active_path(&self, user_id: &str) -> PathBuf {
        self.root
            .join("active")
            .join(format!("{}.json", file_safe(user_id)))
    }

    fn claim_path(&self, user_id: &str, session_id: SessionId) -> PathBuf {
        self.root
            .join("active")
            .join(format!(".{}.{}.claim", file_safe(user_id), session_id))
    }

    fn read_active(path: &Path) -> Result<ActiveSessionRecord, RepositoryError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Links a fully written claim file into place as the active record.
    fn link_claim(claim: &Path, path: &Path) -> Result<(), RepositoryError> {
        for _ in 0..ACTIVE_READ_ATTEMPTS {
            match fs::hard_link(claim, path) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => match Self::holder(path)? {
                    Holder::Session(id) => {
                        return Err(RepositoryError::Conflict { existing: Some(id) })
                    }
                    Holder::Unreadable => return Err(RepositoryError::Conflict { existing: None }),
                    Holder::Released => continue,
                },
                Err(e) => return Err(e.into()),
            }
        }
        Err(RepositoryError::Conflict { existing: None })
    }

    /// Reads the holder of an existing record.
    ///
    /// Retries briefly on unparseable content; a record that stays unreadable
    /// still blocks the slot.
    fn holder(path: &Path) -> Result<Holder, RepositoryError> {
        for attempt in 1..=ACTIVE_READ_ATTEMPTS {
            match Self::read_active(path) {
                Ok(record) => return Ok(Holder::Session(record.session_id)),
                Err(RepositoryError::Serialization(e)) => {
                    debug!(
                        "Active record {} unreadable ({}), attempt {}",
                        path.display(),
                        e,
                        attempt
                    );
                    thread::sleep(ACTIVE_READ_BACKOFF);
                }
                Err(RepositoryError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                    return Ok(Holder::Released)
                }
                Err(e) => return Err(e),
            }
        }
        warn!(
            "Active record {} is unreadable; treating the slot as held",
            path.display()
        );
        Ok(Holder::Unreadable)
    }
}

/// Who holds an active record that blocked a claim.
enum Holder {
    Session(SessionId),
    Unreadable,
    /// Removed between the failed link and the read
    Released,
}

/// Maps a user id onto a portable file name.
fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl SessionRepository for FileSessionRepository {
    fn create_active_record(
        &self,
        user_id: &str,
        session_id: SessionId,
    ) -> Result<(), RepositoryError> {
        let path = self.active_path(user_id);
        let record = ActiveSessionRecord {
            user_id: user_id.to_string(),
            session_id,
        };

        let claim = self.claim_path(user_id, session_id);
        {
            let mut file = File::create(&claim)?;
            file.write_all(serde_json::to_string_pretty(&record)?.as_bytes())?;
            file.sync_all()?;
        }

        let linked = Self::link_claim(&claim, &path);
        if let Err(e) = fs::remove_file(&claim) {
            warn!("Failed to remove claim file {}: {}", claim.display(), e);
        }

        linked?;
        debug!("Created active record {}", path.display());
        Ok(())
    }

    // Read-then-remove is safe: a record is only removed for the session it
    // names, and no other record can appear until it is gone.
    fn delete_active_record(
        &self,
        user_id: &str,
        session_id: SessionId,
    ) -> Result<bool, RepositoryError> {
        let path = self.active_path(user_id);
        let record = match Self::read_active(&path) {
            Ok(record) => record,
            Err(RepositoryError::Io(e)) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        if record.session_id != session_id {
            debug!(
                "Active record {} held by {}, not {}; leaving it",
                path.display(),
                record.session_id,
                session_id
            );
            return Ok(false);
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted active record {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn find_active_record(
        &self,
        user_id: &str,
    ) -> Result<Option<ActiveSessionRecord>, RepositoryError> {
        let path = self.active_path(user_id);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_active(&path).map(Some)
    }

    fn save_snapshot(&self, state: &SessionState) -> Result<(), RepositoryError> {
        let path = self.snapshot_path(state.session_id);
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        fs::rename(&tmp, &path)?;

        debug!("Saved snapshot to {}", path.display());
        Ok(())
    }

    fn load_latest_snapshot(&self, session_id: SessionId) -> Result<SessionState, RepositoryError> {
        let path = self.snapshot_path(session_id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RepositoryError::NotFound(session_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;
    use chrono::Utc;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn sample_state() -> SessionState {
        let mut state = SessionState::new(SessionId::new(), "push_day", "alice");
        state.status = SessionStatus::Resting;
        state.current_exercise_index = 1;
        state.current_set_number = 2;
        state.rest_remaining_seconds = 30;
        state.total_elapsed_seconds = 412;
        state.started_at = Some(Utc::now());
        state
    }

    #[test]
    fn test_in_memory_conflict() {
        let repo = InMemorySessionRepository::new();
        let first = SessionId::new();

        repo.create_active_record("alice", first).unwrap();
        let err = repo.create_active_record("alice", SessionId::new()).unwrap_err();

        assert!(matches!(err, RepositoryError::Conflict { existing } if existing == Some(first)));
        assert_eq!(repo.active_count(), 1);
    }

    #[test]
    fn test_in_memory_delete_idempotent() {
        let repo = InMemorySessionRepository::new();
        let id = SessionId::new();
        repo.create_active_record("alice", id).unwrap();

        assert!(repo.delete_active_record("alice", id).unwrap());
        assert!(!repo.delete_active_record("alice", id).unwrap());
        assert!(repo.find_active_record("alice").unwrap().is_none());
    }

    #[test]
    fn test_in_memory_delete_keeps_other_session() {
        let repo = InMemorySessionRepository::new();
        let holder = SessionId::new();
        repo.create_active_record("alice", holder).unwrap();

        assert!(!repo.delete_active_record("alice", SessionId::new()).unwrap());
        let record = repo.find_active_record("alice").unwrap().unwrap();
        assert_eq!(record.session_id, holder);
    }

    #[test]
    fn test_in_memory_snapshot_roundtrip() {
        let repo = InMemorySessionRepository::new();
        let state = sample_state();

        repo.save_snapshot(&state).unwrap();
        assert_eq!(repo.load_latest_snapshot(state.session_id).unwrap(), state);
        assert_eq!(repo.snapshot_writes(), 1);
    }

    #[test]
    fn test_in_memory_concurrent_acquire() {
        let repo = Arc::new(InMemorySessionRepository::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                thread::spawn(move || repo.create_active_record("alice", SessionId::new()).is_ok())
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(repo.active_count(), 1);
    }

    #[test]
    fn test_file_snapshot_roundtrip() {
        let dir = tempdir().unwrap();
        let repo = FileSessionRepository::open(dir.path()).unwrap();
        let state = sample_state();

        repo.save_snapshot(&state).unwrap();
        let loaded = repo.load_latest_snapshot(state.session_id).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_file_snapshot_latest_wins() {
        let dir = tempdir().unwrap();
        let repo = FileSessionRepository::open(dir.path()).unwrap();
        let mut state = sample_state();

        repo.save_snapshot(&state).unwrap();
        state.total_elapsed_seconds += 1;
        state.rest_remaining_seconds -= 1;
        repo.save_snapshot(&state).unwrap();

        assert_eq!(repo.load_latest_snapshot(state.session_id).unwrap(), state);
    }

    #[test]
    fn test_file_missing_snapshot() {
        let dir = tempdir().unwrap();
        let repo = FileSessionRepository::open(dir.path()).unwrap();
        assert!(matches!(
            repo.load_latest_snapshot(SessionId::new()),
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[test]
    fn test_file_active_record_conflict() {
        let dir = tempdir().unwrap();
        let repo = FileSessionRepository::open(dir.path()).unwrap();
        let first = SessionId::new();

        repo.create_active_record("bob@example.com", first).unwrap();
        let err = repo
            .create_active_record("bob@example.com", SessionId::new())
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict { existing } if existing == Some(first)));

        let record = repo.find_active_record("bob@example.com").unwrap().unwrap();
        assert_eq!(record.session_id, first);
        assert_eq!(record.user_id, "bob@example.com");

        assert!(!repo.delete_active_record("bob@example.com", SessionId::new()).unwrap());
        assert!(repo.find_active_record("bob@example.com").unwrap().is_some());

        assert!(repo.delete_active_record("bob@example.com", first).unwrap());
        assert!(!repo.delete_active_record("bob@example.com", first).unwrap());
        assert!(repo.find_active_record("bob@example.com").unwrap().is_none());
    }

    #[test]
    fn test_file_claim_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let repo = FileSessionRepository::open(dir.path()).unwrap();

        repo.create_active_record("alice", SessionId::new()).unwrap();
        assert!(repo.create_active_record("alice", SessionId::new()).is_err());

        let names: Vec<_> = fs::read_dir(dir.path().join("active"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["alice.json".to_string()]);
    }

    #[test]
    fn test_file_unreadable_record_is_conflict() {
        let dir = tempdir().unwrap();
        let repo = FileSessionRepository::open(dir.path()).unwrap();
        fs::write(dir.path().join("active").join("alice.json"), "").unwrap();

        let err = repo.create_active_record("alice", SessionId::new()).unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict { existing: None }));

        // Not ours to remove.
        assert!(repo.delete_active_record("alice", SessionId::new()).is_err());
        assert!(dir.path().join("active").join("alice.json").exists());
    }

    #[test]
    fn test_file_concurrent_acquire() {
        let dir = tempdir().unwrap();
        let repo = Arc::new(FileSessionRepository::open(dir.path()).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                thread::spawn(move || repo.create_active_record("alice", SessionId::new()))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winner = repo.find_active_record("alice").unwrap().unwrap().session_id;

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for result in results.iter().filter(|r| r.is_err()) {
            assert!(matches!(
                result,
                Err(RepositoryError::Conflict { existing }) if *existing == Some(winner)
            ));
        }
    }

    #[test]
    fn test_file_safe_names() {
        assert_eq!(file_safe("bob@example.com"), "bob_example_com");
        assert_eq!(file_safe("user-42_a"), "user-42_a");
    }
}
