//! Workout Data Model
//!
//! Read-only workout definitions consumed by the execution engine.
//!
//! # Example YAML Format
//!
//! ```yaml
//! id: push_day
//! name: Push Day
//! exercises:
//!   - exercise_id: bench_press
//!     order: 1
//!     target_sets: 4
//!     target_reps: 8
//!     rest_seconds: 120
//!
//!   - exercise_id: overhead_press
//!     order: 2
//!     target_sets: 3
//!     target_reps: 10
//!     rest_seconds: 90
//! ```

use serde::{Deserialize, Serialize};

/// One exercise entry of a workout plan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExercisePlan {
    /// Identifier of the exercise in the exercise library
    pub exercise_id: String,

    /// Position within the workout; strictly increasing across entries
    pub order: u32,

    /// Number of sets to perform
    pub target_sets: u32,

    /// Repetitions per set (informational for the engine)
    #[serde(default)]
    pub target_reps: u32,

    /// Rest period inserted between sets of this exercise
    #[serde(default = "default_rest_seconds")]
    pub rest_seconds: u32,
}

/// Default rest period for entries that don't specify one
fn default_rest_seconds() -> u32 {
    60
}

impl ExercisePlan {
    /// Creates a new exercise entry.
    ///
    /// # Example
    ///
    /// ```
    /// use liftrunner::workout::ExercisePlan;
    ///
    /// let plan = ExercisePlan::new("squat", 1, 5)
    ///     .with_reps(5)
    ///     .with_rest(180);
    /// assert_eq!(plan.rest_seconds, 180);
    /// ```
    pub fn new(exercise_id: impl Into<String>, order: u32, target_sets: u32) -> Self {
        Self {
            exercise_id: exercise_id.into().trim().to_string(),
            order,
            target_sets,
            target_reps: 0,
            rest_seconds: default_rest_seconds(),
        }
    }

    /// Sets the target repetitions.
    pub fn with_reps(mut self, reps: u32) -> Self {
        self.target_reps = reps;
        self
    }

    /// Sets the rest period in seconds.
    pub fn with_rest(mut self, seconds: u32) -> Self {
        self.rest_seconds = seconds;
        self
    }
}

/// A complete workout plan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WorkoutDefinition {
    /// Catalog identifier of the workout
    pub id: String,

    /// Human-readable name
    #[serde(default)]
    pub name: String,

    /// Exercises in execution order
    #[serde(default)]
    pub exercises: Vec<ExercisePlan>,
}

impl WorkoutDefinition {
    /// Creates an empty workout.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            exercises: Vec::new(),
        }
    }

    /// Creates a workout from a list of exercises.
    pub fn from_exercises(id: impl Into<String>, exercises: Vec<ExercisePlan>) -> Self {
        let mut workout = Self::new(id);
        workout.exercises = exercises;
        workout
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Appends an exercise, assigning the next `order` value.
    pub fn push_exercise(&mut self, exercise_id: impl Into<String>, sets: u32, rest: u32) {
        let order = self.exercises.last().map_or(1, |e| e.order + 1);
        self.exercises
            .push(ExercisePlan::new(exercise_id, order, sets).with_rest(rest));
    }

    /// Gets an exercise by position.
    pub fn exercise(&self, index: usize) -> Option<&ExercisePlan> {
        self.exercises.get(index)
    }

    /// Total number of sets across all exercises.
    pub fn total_sets(&self) -> u32 {
        self.exercises.iter().map(|e| e.target_sets).sum()
    }

    /// Returns the number of exercises.
    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    /// Returns true if the workout has no exercises.
    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }
}
