//! Default catalog of exercises and template workouts.
//!
//! The templates are what an empty `templates/` namespace is seeded with;
//! the exercises let front ends resolve an exercise by id.

use crate::title::is_valid_title;
use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Built-in exercises and templates
#[derive(Clone, Debug)]
pub struct Catalog {
    pub exercises: BTreeMap<String, Exercise>,
    pub templates: Vec<Workout>,
}

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// Build the default catalog from scratch.
///
/// Prefer `get_default_catalog()`; this is kept for tests and for building
/// custom catalogs on top of the defaults.
pub fn build_default_catalog() -> Catalog {
    let exercises: BTreeMap<String, Exercise> = [
        Exercise::new("back_squat", "Back Squat")
            .with_media("https://www.youtube.com/watch?v=ultWZbUMPL8")
            .with_tags(["legs", "barbell", "compound"]),
        Exercise::new("bench_press", "Bench Press")
            .with_media("https://www.youtube.com/watch?v=rT7DgCr-3pg")
            .with_tags(["chest", "barbell", "compound"]),
        Exercise::new("barbell_row", "Barbell Row")
            .with_media("https://www.youtube.com/watch?v=FWJR5Ve8bnQ")
            .with_tags(["back", "barbell", "compound"]),
        Exercise::new("overhead_press", "Overhead Press")
            .with_media("https://www.youtube.com/watch?v=2yjwXTZQDDI")
            .with_tags(["shoulders", "barbell", "compound"]),
        Exercise::new("deadlift", "Deadlift")
            .with_media("https://www.youtube.com/watch?v=op9kVnSso6Q")
            .with_tags(["back", "legs", "barbell", "compound"]),
        Exercise::new("pull_up", "Pull-up")
            .with_description("Full hang to chin over the bar")
            .with_tags(["back", "bodyweight"]),
        Exercise::new("push_up", "Push-up")
            .with_tags(["chest", "bodyweight"]),
        Exercise::new("dip", "Dip")
            .with_tags(["chest", "triceps", "bodyweight"]),
        Exercise::new("lunge", "Walking Lunge")
            .with_tags(["legs", "bodyweight"]),
        Exercise::new("romanian_deadlift", "Romanian Deadlift")
            .with_tags(["legs", "barbell"]),
        Exercise::new("calf_raise", "Calf Raise")
            .with_tags(["legs", "bodyweight"]),
        Exercise::new("plank", "Plank")
            .with_description("Hold a straight line from head to heels")
            .with_tags(["core", "bodyweight"]),
    ]
    .into_iter()
    .map(|e| (e.id().to_string(), e))
    .collect();

    let pick = |ids: &[&str]| -> Vec<Exercise> {
        ids.iter()
            .filter_map(|id| exercises.get(*id).cloned())
            .collect()
    };

    let templates = vec![
        Workout::new(
            "5x5",
            pick(&[
                "back_squat",
                "bench_press",
                "barbell_row",
                "overhead_press",
                "deadlift",
            ]),
        ),
        Workout::new(
            "Full Body",
            pick(&[
                "back_squat",
                "push_up",
                "pull_up",
                "lunge",
                "dip",
                "plank",
            ]),
        ),
        Workout::new(
            "Upper Body",
            pick(&["bench_press", "pull_up", "overhead_press", "dip", "push_up"]),
        ),
        Workout::new(
            "Lower Body",
            pick(&[
                "back_squat",
                "romanian_deadlift",
                "lunge",
                "calf_raise",
            ]),
        ),
    ];

    Catalog {
        exercises,
        templates,
    }
}

impl Catalog {
    pub fn exercise(&self, id: &str) -> Option<&Exercise> {
        self.exercises.get(id)
    }

    pub fn template(&self, name: &str) -> Option<&Workout> {
        self.templates.iter().find(|t| t.title == name)
    }

    /// Validate the catalog for internal consistency.
    ///
    /// Returns a list of validation errors (empty if valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (id, exercise) in &self.exercises {
            if id != exercise.id() {
                errors.push(format!(
                    "Exercise keyed {} has id {}",
                    id,
                    exercise.id()
                ));
            }
        }

        for template in &self.templates {
            if !is_valid_title(&template.title) {
                errors.push(format!("Template {:?} has an invalid title", template.title));
            }
            if template.is_empty() {
                errors.push(format!("Template {} has no exercises", template.title));
            }
            for exercise in &template.exercises {
                if self.exercises.get(exercise.id()) != Some(exercise) {
                    errors.push(format!(
                        "Template {} references unknown exercise {}",
                        template.title,
                        exercise.id()
                    ));
                }
            }
        }

        errors
    }

    /// Fail with `CatalogValidation` if `validate` finds anything
    pub fn ensure_valid(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            return Ok(());
        }
        for error in &errors {
            tracing::debug!("Catalog: {}", error);
        }
        Err(Error::CatalogValidation(format!(
            "{} problems, first: {}",
            errors.len(),
            errors[0]
        )))
    }
}
