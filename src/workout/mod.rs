//! Workout Definition Module
//!
//! Read-only workout plans and the catalog they are looked up from.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (ExercisePlan, WorkoutDefinition)
//! - [`validator`]: Playability checks
//! - [`catalog`]: Catalog trait, in-memory and YAML directory catalogs

pub mod catalog;
pub mod model;
pub mod validator;

pub use catalog::{load_workout, parse_workout, DirectoryCatalog, InMemoryCatalog, WorkoutCatalog};
pub use model::{ExercisePlan, WorkoutDefinition};
pub use validator::validate_workout;
