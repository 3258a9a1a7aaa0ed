//! Workout Validation
//!
//! Checks that a workout definition is playable:
//! - At least one exercise
//! - Strictly increasing `order`
//! - Every exercise has at least one set

use std::collections::HashSet;

use log::{debug, warn};

use super::model::{ExercisePlan, WorkoutDefinition};

/// Validation error types for user-friendly error messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    NoExercises,
    EmptyExerciseId { position: usize },
    ZeroSets(String),
    OrderNotIncreasing { exercise: String, order: u32, previous: u32 },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoExercises => write!(f, "workout has no exercises"),
            Self::EmptyExerciseId { position } => {
                write!(f, "exercise at position {} has an empty ID", position)
            }
            Self::ZeroSets(id) => write!(f, "exercise '{}' has no target sets", id),
            Self::OrderNotIncreasing {
                exercise,
                order,
                previous,
            } => write!(
                f,
                "exercise '{}' has order {} which does not follow {}",
                exercise, order, previous
            ),
        }
    }
}

/// Validates a single exercise entry.
fn validate_exercise(position: usize, plan: &ExercisePlan) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if plan.exercise_id.trim().is_empty() {
        errors.push(ValidationError::EmptyExerciseId { position });
        return errors;
    }

    if plan.target_sets == 0 {
        errors.push(ValidationError::ZeroSets(plan.exercise_id.clone()));
    }

    if plan.rest_seconds == 0 && plan.target_sets > 1 {
        debug!("Exercise '{}' has no rest between sets", plan.exercise_id);
    }

    errors
}

/// Validates the whole workout.
///
/// Returns the first error message, or all of them joined by newlines when
/// several exercises are malformed.
pub fn validate_workout(workout: &WorkoutDefinition) -> Result<(), String> {
    if workout.exercises.is_empty() {
        return Err(ValidationError::NoExercises.to_string());
    }

    let mut errors = Vec::new();
    let mut previous_order: Option<u32> = None;

    for (position, plan) in workout.exercises.iter().enumerate() {
        errors.extend(validate_exercise(position, plan));

        if let Some(previous) = previous_order {
            if plan.order <= previous {
                errors.push(ValidationError::OrderNotIncreasing {
                    exercise: plan.exercise_id.clone(),
                    order: plan.order,
                    previous,
                });
            }
        }
        previous_order = Some(plan.order);
    }

    let mut seen = HashSet::new();
    for plan in &workout.exercises {
        if !seen.insert(plan.exercise_id.as_str()) {
            warn!(
                "Workout '{}' lists exercise '{}' more than once",
                workout.id, plan.exercise_id
            );
        }
    }

    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(messages.join("\n"));
    }

    debug!(
        "Workout '{}' validated: {} exercises, {} sets",
        workout.id,
        workout.len(),
        workout.total_sets()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_workout() {
        let workout = WorkoutDefinition::from_exercises(
            "upper",
            vec![ExercisePlan::new("row", 1, 3), ExercisePlan::new("curl", 2, 2)],
        );
        assert!(validate_workout(&workout).is_ok());
    }

    #[test]
    fn test_empty_workout() {
        let workout = WorkoutDefinition::new("empty");
        assert_eq!(
            validate_workout(&workout).unwrap_err(),
            "workout has no exercises"
        );
    }

    #[test]
    fn test_order_must_increase() {
        let workout = WorkoutDefinition::from_exercises(
            "bad",
            vec![ExercisePlan::new("a", 2, 3), ExercisePlan::new("b", 2, 3)],
        );
        let err = validate_workout(&workout).unwrap_err();
        assert!(err.contains("does not follow"));
    }

    #[test]
    fn test_zero_sets_rejected() {
        let workout =
            WorkoutDefinition::from_exercises("bad", vec![ExercisePlan::new("plank", 1, 0)]);
        assert!(validate_workout(&workout).unwrap_err().contains("no target sets"));
    }

    #[test]
    fn test_empty_exercise_id() {
        let errors = validate_exercise(3, &ExercisePlan::new("  ", 1, 2));
        assert_eq!(errors, vec![ValidationError::EmptyExerciseId { position: 3 }]);
    }

    #[test]
    fn test_multiple_errors_joined() {
        let workout = WorkoutDefinition::from_exercises(
            "bad",
            vec![ExercisePlan::new("a", 5, 0), ExercisePlan::new("b", 1, 3)],
        );
        let err = validate_workout(&workout).unwrap_err();
        assert_eq!(err.lines().count(), 2);
    }
}
