//! The workout being created or edited.
//!
//! `WorkoutDraft` is a plain value: every edit returns a new draft, and the
//! save workflow owns the current one.

use crate::store::DocumentStore;
use crate::templates::TemplateStore;
use crate::{Error, Exercise, Result, Workout};
use std::ops::RangeInclusive;

/// Template applied to a draft and how many of its exercises were taken
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedTemplate {
    pub name: String,
    pub length: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkoutDraft {
    title: String,
    exercises: Vec<Exercise>,
    template: Option<AppliedTemplate>,
}

impl WorkoutDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start editing a stored workout
    pub fn from_workout(workout: &Workout) -> Self {
        Self {
            title: workout.title.clone(),
            exercises: workout.exercises.clone(),
            template: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    pub fn applied_template(&self) -> Option<&AppliedTemplate> {
        self.template.as_ref()
    }

    /// Raw title as typed; validated only on save
    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self
        }
    }

    pub fn with_exercise(mut self, exercise: Exercise) -> Self {
        self.exercises.push(exercise);
        self
    }

    /// Drop the first exercise equal to `exercise`, if any
    pub fn without_exercise(mut self, exercise: &Exercise) -> Self {
        if let Some(pos) = self.exercises.iter().position(|e| e == exercise) {
            self.exercises.remove(pos);
        }
        self
    }

    /// Replace the exercises with the first `length` of `template`.
    ///
    /// `length` must lie in `1..=template.len()`.
    pub fn with_template(&self, template: &Workout, length: usize) -> Result<Self> {
        if !template_length_range(template).contains(&length) {
            return Err(Error::OutOfRange {
                requested: length,
                available: template.len(),
            });
        }

        Ok(Self {
            title: self.title.clone(),
            exercises: template.exercises[..length].to_vec(),
            template: Some(AppliedTemplate {
                name: template.title.clone(),
                length,
            }),
        })
    }

    /// Fetch `name` from the template store and apply it with `length`.
    ///
    /// The draft records `name` as the applied template, whatever title the
    /// stored template carries.
    ///
    /// On error `self` is still the caller's unchanged draft.
    pub fn apply_template<S: DocumentStore>(
        &self,
        templates: &TemplateStore<'_, S>,
        name: &str,
        length: usize,
    ) -> Result<Self> {
        let template = templates.fetch(name)?;
        let mut applied = self.with_template(&template, length)?;
        applied.template = Some(AppliedTemplate {
            name: name.to_string(),
            length,
        });
        tracing::debug!(
            "Applied template {:?} with {} of {} exercises",
            name,
            length,
            template.len()
        );
        Ok(applied)
    }

    /// The workout to persist
    pub fn into_workout(self) -> Workout {
        Workout::new(self.title, self.exercises)
    }
}

/// Lengths a template accepts
pub fn template_length_range(template: &Workout) -> RangeInclusive<usize> {
    1..=template.len()
}

/// Clamp a requested length (e.g. a slider position) into what `template` accepts
pub fn clamp_length(length: usize, template: &Workout) -> usize {
    length.min(template.len()).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{encode, DocPath, MemoryStore};

    fn five_by_five() -> Workout {
        Workout::new(
            "5x5",
            vec![
                Exercise::new("back_squat", "Back Squat"),
                Exercise::new("bench_press", "Bench Press"),
                Exercise::new("barbell_row", "Barbell Row"),
                Exercise::new("overhead_press", "Overhead Press"),
                Exercise::new("deadlift", "Deadlift"),
            ],
        )
    }

    #[test]
    fn test_add_and_remove_first_match() {
        let squat = Exercise::new("back_squat", "Back Squat");
        let plank = Exercise::new("plank", "Plank");

        let draft = WorkoutDraft::new()
            .with_exercise(squat.clone())
            .with_exercise(plank.clone())
            .with_exercise(squat.clone())
            .without_exercise(&squat);

        assert_eq!(draft.exercises(), &[plank, squat]);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let draft = WorkoutDraft::new().with_exercise(Exercise::new("plank", "Plank"));
        let same = draft.clone().without_exercise(&Exercise::new("dip", "Dip"));
        assert_eq!(draft, same);
    }

    #[test]
    fn test_title_is_stored_raw() {
        let draft = WorkoutDraft::new().with_title("leg-day!");
        assert_eq!(draft.title(), "leg-day!");
    }

    #[test]
    fn test_apply_template_takes_prefix_in_order() {
        let store = MemoryStore::new();
        let templates = TemplateStore::new(&store);
        templates.seed(&[five_by_five()]).unwrap();

        let draft = WorkoutDraft::new()
            .with_title("Monday")
            .with_exercise(Exercise::new("plank", "Plank"));
        let applied = draft.apply_template(&templates, "5x5", 3).unwrap();

        assert_eq!(applied.title(), "Monday");
        assert_eq!(applied.exercises(), &five_by_five().exercises[..3]);
        assert_eq!(
            applied.applied_template(),
            Some(&AppliedTemplate {
                name: "5x5".into(),
                length: 3
            })
        );
    }

    #[test]
    fn test_apply_template_records_requested_key() {
        let store = MemoryStore::new();
        let path = DocPath::root().child("templates").child("Quick");
        store.write(&path, encode(&path, &five_by_five()).unwrap()).unwrap();
        let templates = TemplateStore::new(&store);

        let applied = WorkoutDraft::new()
            .apply_template(&templates, "Quick", 2)
            .unwrap();

        assert_eq!(applied.applied_template().unwrap().name, "Quick");
        assert_eq!(applied.exercises().len(), 2);
    }

    #[test]
    fn test_apply_template_out_of_range() {
        let store = MemoryStore::new();
        let templates = TemplateStore::new(&store);
        templates.seed(&[five_by_five()]).unwrap();
        let draft = WorkoutDraft::new().with_exercise(Exercise::new("plank", "Plank"));

        let err = draft.apply_template(&templates, "5x5", 6).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfRange {
                requested: 6,
                available: 5
            }
        ));
        assert!(matches!(
            draft.apply_template(&templates, "5x5", 0),
            Err(Error::OutOfRange { requested: 0, .. })
        ));
        assert_eq!(draft.exercises().len(), 1);
    }

    #[test]
    fn test_apply_unknown_template_reports_error() {
        let store = MemoryStore::new();
        let templates = TemplateStore::new(&store);
        let draft = WorkoutDraft::new();

        assert!(matches!(
            draft.apply_template(&templates, "Unknown", 1),
            Err(Error::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_clamp_length() {
        let template = five_by_five();
        assert_eq!(clamp_length(0, &template), 1);
        assert_eq!(clamp_length(3, &template), 3);
        assert_eq!(clamp_length(9, &template), 5);
        assert_eq!(template_length_range(&template), 1..=5);
    }
}
