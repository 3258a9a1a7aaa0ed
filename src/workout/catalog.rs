//! Workout Catalog
//!
//! Read-only lookup of workout definitions. The engine queries the catalog
//! once per session start.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::CatalogError;

use super::model::WorkoutDefinition;
use super::validator::validate_workout;

/// Source of workout definitions.
pub trait WorkoutCatalog: Send + Sync {
    /// Returns the definition for `workout_id`, or `CatalogError::NotFound`.
    fn get_workout_definition(&self, workout_id: &str) -> Result<WorkoutDefinition, CatalogError>;
}

/// Catalog held entirely in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    workouts: HashMap<String, WorkoutDefinition>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a workout.
    pub fn insert(&mut self, workout: WorkoutDefinition) {
        self.workouts.insert(workout.id.clone(), workout);
    }

    pub fn len(&self) -> usize {
        self.workouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workouts.is_empty()
    }
}

impl WorkoutCatalog for InMemoryCatalog {
    fn get_workout_definition(&self, workout_id: &str) -> Result<WorkoutDefinition, CatalogError> {
        self.workouts
            .get(workout_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(workout_id.to_string()))
    }
}

/// Catalog backed by a directory of `<workout_id>.yaml` files.
///
/// Files are parsed on every lookup and are not validated here; the engine
/// validates when a session starts.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, workout_id: &str) -> PathBuf {
        self.root.join(format!("{}.yaml", workout_id))
    }
}

impl WorkoutCatalog for DirectoryCatalog {
    fn get_workout_definition(&self, workout_id: &str) -> Result<WorkoutDefinition, CatalogError> {
        let path = self.path_for(workout_id);
        if !path.exists() {
            return Err(CatalogError::NotFound(workout_id.to_string()));
        }

        let mut workout = parse_workout(&fs::read_to_string(&path)?)?;
        if workout.id.is_empty() {
            workout.id = workout_id.to_string();
        }
        debug!("Catalog loaded '{}' from {}", workout_id, path.display());
        Ok(workout)
    }
}

/// Parses a workout definition from YAML text.
pub fn parse_workout(yaml: &str) -> Result<WorkoutDefinition, CatalogError> {
    Ok(serde_yaml::from_str(yaml)?)
}

/// Loads and validates a workout from a YAML file.
///
/// When the file omits `id`, the file stem is used.
///
/// # Example
///
/// ```rust,no_run
/// use liftrunner::workout::load_workout;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let workout = load_workout("push_day.yaml")?;
///     println!("Loaded {} exercises", workout.len());
///     Ok(())
/// }
/// ```
pub fn load_workout(path: impl AsRef<Path>) -> Result<WorkoutDefinition, CatalogError> {
    let path = path.as_ref();
    info!("Loading workout from: {}", path.display());

    let content = fs::read_to_string(path)?;
    let mut workout = parse_workout(&content)?;

    if workout.id.is_empty() {
        workout.id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("workout")
            .to_string();
    }
    if workout.name.is_empty() {
        workout.name = workout.id.clone();
    }

    validate_workout(&workout).map_err(CatalogError::Invalid)?;

    info!(
        "Parsed workout '{}': {} exercises, {} sets",
        workout.id,
        workout.len(),
        workout.total_sets()
    );
    Ok(workout)
}
