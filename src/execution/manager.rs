//! Session Lifecycle Manager
//!
//! Orchestrates one user's workout sessions:
//! - Claims the user's active-session slot on start
//! - Drives a clock and folds its ticks into the progression state machine
//! - Serializes commands and ticks through a single lock
//! - Persists and publishes one snapshot per transition
//! - Releases the clock and the slot when the session ends

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::Utc;
use log::{debug, error, info, warn};

use crate::clock::{Clock, ClockFactory, IntervalClockFactory, TickHandler};
use crate::config::EngineConfig;
use crate::error::{EngineError, RepositoryError};
use crate::session::{
    progress_fraction, transition, ActiveSessionGuard, Event, RestPolicy, SessionId,
    SessionRepository, SessionState, SessionStatus,
};
use crate::workout::{validate_workout, ExercisePlan, WorkoutCatalog, WorkoutDefinition};

use super::feedback::{cues_for, FeedbackSink, NullFeedbackSink};

/// Callback receiving every emitted snapshot.
pub type StateListener = Box<dyn Fn(&SessionState) + Send>;

/// The session currently owned by the manager.
struct RunningSession {
    state: SessionState,
    workout: Arc<WorkoutDefinition>,
    clock: Option<Box<dyn Clock>>,
}

#[derive(Default)]
struct Inner {
    session: Option<RunningSession>,
    listeners: Vec<StateListener>,
}

struct Shared {
    user_id: String,
    inner: Mutex<Inner>,
    guard: ActiveSessionGuard,
    repository: Arc<dyn SessionRepository>,
    catalog: Option<Arc<dyn WorkoutCatalog>>,
    feedback: Arc<dyn FeedbackSink>,
    clocks: Arc<dyn ClockFactory>,
    policy: RestPolicy,
}

/// Runs workout sessions for a single user.
///
/// Every operation takes the same lock, so commands and clock ticks reach the
/// state machine one at a time, in arrival order. Listeners registered with
/// [`on_state_change`](Self::on_state_change) run under that lock and must
/// not call back into the manager.
///
/// Dropping the manager stops the clock but keeps the active-session record,
/// so the session can be picked up again with [`restore`](Self::restore).
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use liftrunner::execution::SessionManager;
/// use liftrunner::session::InMemorySessionRepository;
/// use liftrunner::workout::load_workout;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let workout = load_workout("push_day.yaml")?;
///     let manager = SessionManager::builder("alice", Arc::new(InMemorySessionRepository::new()))
///         .build();
///
///     manager.on_state_change(|state| println!("{:?}", state.status));
///     manager.start(&workout)?;
///     manager.complete_set()?;
///     manager.stop()?;
///     Ok(())
/// }
/// ```
pub struct SessionManager {
    shared: Arc<Shared>,
}

/// Configures a [`SessionManager`].
pub struct SessionManagerBuilder {
    user_id: String,
    repository: Arc<dyn SessionRepository>,
    catalog: Option<Arc<dyn WorkoutCatalog>>,
    feedback: Arc<dyn FeedbackSink>,
    clocks: Arc<dyn ClockFactory>,
    policy: RestPolicy,
}

impl SessionManagerBuilder {
    /// Sets the catalog used by [`SessionManager::start_by_id`].
    pub fn with_catalog(mut self, catalog: Arc<dyn WorkoutCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_feedback(mut self, feedback: Arc<dyn FeedbackSink>) -> Self {
        self.feedback = feedback;
        self
    }

    /// Replaces the default 1 Hz interval clock.
    pub fn with_clock_factory(mut self, clocks: Arc<dyn ClockFactory>) -> Self {
        self.clocks = clocks;
        self
    }

    pub fn with_rest_policy(mut self, policy: RestPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Applies tick interval and rest policy from a config.
    pub fn with_config(self, config: &EngineConfig) -> Self {
        self.with_clock_factory(Arc::new(IntervalClockFactory::new(config.tick_interval())))
            .with_rest_policy(config.rest_policy())
    }

    pub fn build(self) -> SessionManager {
        SessionManager {
            shared: Arc::new(Shared {
                guard: ActiveSessionGuard::new(Arc::clone(&self.repository)),
                user_id: self.user_id,
                inner: Mutex::new(Inner::default()),
                repository: self.repository,
                catalog: self.catalog,
                feedback: self.feedback,
                clocks: self.clocks,
                policy: self.policy,
            }),
        }
    }
}

impl SessionManager {
    /// Starts configuring a manager for `user_id`.
    pub fn builder(
        user_id: impl Into<String>,
        repository: Arc<dyn SessionRepository>,
    ) -> SessionManagerBuilder {
        SessionManagerBuilder {
            user_id: user_id.into(),
            repository,
            catalog: None,
            feedback: Arc::new(NullFeedbackSink),
            clocks: Arc::new(IntervalClockFactory::default()),
            policy: RestPolicy::default(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.shared.user_id
    }

    /// Starts a new session on `workout`.
    ///
    /// Fails with `Validation` for an unplayable workout and with `Conflict`
    /// when the user already has a session in flight; in both cases no state
    /// is created and no clock is started.
    pub fn start(&self, workout: &WorkoutDefinition) -> Result<SessionState, EngineError> {
        validate_workout(workout).map_err(EngineError::Validation)?;

        let shared = &self.shared;
        let mut inner = shared.lock();

        if let Some(ref running) = inner.session {
            if !running.state.is_terminal() {
                return Err(EngineError::Conflict {
                    user_id: shared.user_id.clone(),
                    session_id: Some(running.state.session_id),
                });
            }
        }

        let session_id = SessionId::new();
        shared.guard.acquire(&shared.user_id, session_id)?;

        let fresh = SessionState::new(session_id, &workout.id, &shared.user_id);
        let state = match transition(&fresh, Event::Start, workout, shared.policy, Utc::now()) {
            Ok(state) => state,
            Err(e) => {
                shared.release_slot(session_id);
                return Err(e);
            }
        };

        let mut clock = shared.clocks.create(shared.tick_handler(session_id));
        clock.start();

        info!(
            "Session {} started: workout '{}' ({} exercises) for user '{}'",
            session_id,
            workout.id,
            workout.len(),
            shared.user_id
        );

        inner.session = Some(RunningSession {
            state: state.clone(),
            workout: Arc::new(workout.clone()),
            clock: Some(clock),
        });
        shared.publish(&inner, &state);
        Ok(state)
    }

    /// Looks the workout up in the catalog, then [`start`](Self::start)s it.
    pub fn start_by_id(&self, workout_id: &str) -> Result<SessionState, EngineError> {
        let catalog = self
            .shared
            .catalog
            .as_ref()
            .ok_or_else(|| EngineError::NotFound(format!("no catalog to look up '{}'", workout_id)))?;
        let workout = catalog.get_workout_definition(workout_id)?;
        self.start(&workout)
    }

    /// Resumes a persisted session after a restart.
    ///
    /// The snapshot must belong to this user, match `workout` and not be
    /// terminal. A paused snapshot comes back paused.
    pub fn restore(
        &self,
        session_id: SessionId,
        workout: &WorkoutDefinition,
    ) -> Result<SessionState, EngineError> {
        let shared = &self.shared;
        let mut inner = shared.lock();

        if let Some(ref running) = inner.session {
            if !running.state.is_terminal() {
                return Err(EngineError::Conflict {
                    user_id: shared.user_id.clone(),
                    session_id: Some(running.state.session_id),
                });
            }
        }

        let state = shared
            .repository
            .load_latest_snapshot(session_id)
            .map_err(|e| match e {
                RepositoryError::NotFound(id) => EngineError::NotFound(format!("session {}", id)),
                other => other.into(),
            })?;

        if state.user_id != shared.user_id {
            return Err(EngineError::Validation(format!(
                "session {} belongs to another user",
                session_id
            )));
        }
        if state.workout_id != workout.id {
            return Err(EngineError::Validation(format!(
                "session {} ran workout '{}', not '{}'",
                session_id, state.workout_id, workout.id
            )));
        }
        if state.is_terminal() {
            return Err(EngineError::finished());
        }
        if workout.exercise(state.current_exercise_index).is_none() {
            return Err(EngineError::Validation(format!(
                "session {} is past the end of workout '{}'",
                session_id, workout.id
            )));
        }

        shared.guard.adopt(&shared.user_id, session_id)?;

        let mut clock = shared.clocks.create(shared.tick_handler(session_id));
        clock.start();
        if state.status == SessionStatus::Paused {
            clock.pause();
        }

        info!(
            "Session {} restored ({}, {}s elapsed)",
            session_id, state.status, state.total_elapsed_seconds
        );

        inner.session = Some(RunningSession {
            state: state.clone(),
            workout: Arc::new(workout.clone()),
            clock: Some(clock),
        });
        shared.publish(&inner, &state);
        Ok(state)
    }

    /// Toggles between `Paused` and the pre-pause status.
    pub fn pause_resume(&self) -> Result<SessionState, EngineError> {
        self.shared.dispatch(|state| {
            if state.status == SessionStatus::Paused {
                Event::Resume
            } else {
                Event::Pause
            }
        })
    }

    /// Marks the current set done.
    pub fn complete_set(&self) -> Result<SessionState, EngineError> {
        self.shared.dispatch(|_| Event::CompleteSet)
    }

    /// Ends the current rest period early.
    pub fn skip_rest(&self) -> Result<SessionState, EngineError> {
        self.shared.dispatch(|_| Event::SkipRest)
    }

    /// Abandons the session from any state.
    ///
    /// On an already finished session this only re-releases the slot and
    /// returns the final snapshot.
    pub fn stop(&self) -> Result<SessionState, EngineError> {
        self.shared.dispatch(|_| Event::Stop)
    }

    /// Latest snapshot. Read-only.
    pub fn snapshot(&self) -> Result<SessionState, EngineError> {
        self.shared
            .lock()
            .session
            .as_ref()
            .map(|running| running.state.clone())
            .ok_or_else(no_session)
    }

    /// Progress fraction of the current session.
    pub fn progress(&self) -> Result<f64, EngineError> {
        let inner = self.shared.lock();
        let running = inner.session.as_ref().ok_or_else(no_session)?;
        Ok(progress_fraction(&running.state, &running.workout))
    }

    /// The exercise the session is positioned on.
    pub fn current_exercise(&self) -> Option<ExercisePlan> {
        let inner = self.shared.lock();
        let running = inner.session.as_ref()?;
        running
            .workout
            .exercise(running.state.current_exercise_index)
            .cloned()
    }

    /// Registers a listener for every emitted snapshot.
    pub fn on_state_change<F>(&self, listener: F)
    where
        F: Fn(&SessionState) + Send + 'static,
    {
        self.shared.lock().listeners.push(Box::new(listener));
    }
}

fn no_session() -> EngineError {
    EngineError::state("no session started")
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Tick callback bound to one session.
    ///
    /// Holds only a weak reference, so a live clock never keeps the manager
    /// alive.
    fn tick_handler(self: &Arc<Self>, session_id: SessionId) -> TickHandler {
        let weak: Weak<Shared> = Arc::downgrade(self);
        Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_tick(session_id);
            }
        })
    }

    fn on_tick(&self, session_id: SessionId) {
        let mut inner = self.lock();
        let Some(running) = inner.session.as_mut() else {
            return;
        };
        if running.state.session_id != session_id || running.state.is_terminal() {
            debug!("Dropping tick for finished session {}", session_id);
            return;
        }

        let previous = running.state.clone();
        let next = match transition(&previous, Event::Tick, &running.workout, self.policy, Utc::now()) {
            Ok(next) => next,
            Err(e) => {
                warn!("Tick rejected for session {}: {}", session_id, e);
                return;
            }
        };
        if next == previous {
            return;
        }

        running.state = next.clone();
        self.signal(&previous, &next, Event::Tick);
        self.publish(&inner, &next);
    }

    /// Applies a command event under the lock.
    ///
    /// `choose` picks the event from the current snapshot, so toggles are
    /// decided atomically with their application.
    fn dispatch<F>(&self, choose: F) -> Result<SessionState, EngineError>
    where
        F: FnOnce(&SessionState) -> Event,
    {
        let retired_clock;
        let next = {
            let mut inner = self.lock();
            let running = inner.session.as_mut().ok_or_else(no_session)?;
            let event = choose(&running.state);

            if event == Event::Stop && running.state.is_terminal() {
                debug!("Session {} already finished", running.state.session_id);
                let state = running.state.clone();
                drop(inner);
                self.release_slot(state.session_id);
                return Ok(state);
            }

            let previous = running.state.clone();
            let next = transition(&previous, event, &running.workout, self.policy, Utc::now())
                .map_err(|e| {
                    warn!(
                        "Session {}: {:?} rejected while {}: {}",
                        previous.session_id, event, previous.status, e
                    );
                    e
                })?;
            running.state = next.clone();

            if let Some(ref mut clock) = running.clock {
                match (previous.status, next.status) {
                    (_, SessionStatus::Paused) => clock.pause(),
                    (SessionStatus::Paused, status) if status.is_running() => clock.resume(),
                    _ => {}
                }
            }

            retired_clock = if next.is_terminal() {
                running.clock.take()
            } else {
                None
            };

            self.signal(&previous, &next, event);
            if next.is_terminal() {
                info!(
                    "Session {} {} after {}s",
                    next.session_id, next.status, next.total_elapsed_seconds
                );
                self.release_slot(next.session_id);
            }
            self.publish(&inner, &next);
            next
        };

        // Joined outside the lock: a tick waiting on the lock would deadlock.
        drop(retired_clock);
        Ok(next)
    }

    fn signal(&self, previous: &SessionState, next: &SessionState, event: Event) {
        for cue in cues_for(previous, next, event) {
            self.feedback.notify(&cue, next);
        }
    }

    /// Persists the snapshot, then hands it to every listener.
    fn publish(&self, inner: &Inner, state: &SessionState) {
        if let Err(e) = self.repository.save_snapshot(state) {
            error!(
                "Failed to persist snapshot for session {}: {}",
                state.session_id, e
            );
        }
        for listener in &inner.listeners {
            listener(state);
        }
    }

    /// Frees the user's slot if `session_id` still holds it.
    fn release_slot(&self, session_id: SessionId) {
        if let Err(e) = self.guard.release(&self.user_id, session_id) {
            error!(
                "Failed to release active session {} for '{}': {}",
                session_id, self.user_id, e
            );
        }
    }
}
