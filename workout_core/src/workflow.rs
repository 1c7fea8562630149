//! Saving a new or edited workout.
//!
//! ## Save steps
//!
//! 1. **Validating**: the draft needs at least one exercise, then a valid
//!    title. Nothing is read from the store if either check fails.
//! 2. **CheckingUniqueness**: one read of whether the title is in use. A
//!    title is free if nobody has it or it is the title being edited.
//! 3. **Committing**: one transaction that deletes the old title on rename,
//!    writes the workout, and rewrites planner slots holding the old title.
//!
//! The caller handles navigation once `save` returns `Ok`.

use crate::draft::WorkoutDraft;
use crate::error::RejectReason;
use crate::repository::WorkoutRepository;
use crate::store::DocumentStore;
use crate::templates::TemplateStore;
use crate::title::is_valid_title;
use crate::{Error, Exercise, Result, SlotKey, Workout};

/// Whether the workflow creates a workout or edits an existing one
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveMode {
    Create,
    Edit { original_title: String },
}

impl SaveMode {
    pub fn original_title(&self) -> Option<&str> {
        match self {
            SaveMode::Create => None,
            SaveMode::Edit { original_title } => Some(original_title.as_str()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveState {
    Editing,
    Validating,
    CheckingUniqueness,
    Committing,
    Saved,
    Rejected(RejectReason),
}

/// Result of a successful save
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveOutcome {
    pub workout: Workout,
    pub renamed_from: Option<String>,
    pub planner_slots: Vec<SlotKey>,
}

pub struct SaveWorkflow<'s, S: DocumentStore> {
    repo: WorkoutRepository<'s, S>,
    mode: SaveMode,
    draft: WorkoutDraft,
    state: SaveState,
    transitions: Vec<SaveState>,
}

/// Check a draft can be saved without touching the store.
///
/// The exercise list is checked first, so an empty draft reports
/// `EmptyExerciseList` whatever its title.
pub fn validate_draft(draft: &WorkoutDraft) -> Result<()> {
    if draft.exercises().is_empty() {
        return Err(Error::EmptyExerciseList);
    }
    if !is_valid_title(draft.title()) {
        return Err(Error::InvalidTitle(draft.title().to_string()));
    }
    Ok(())
}

impl<'s, S: DocumentStore> SaveWorkflow<'s, S> {
    /// Workflow for a brand new workout
    pub fn create(repo: WorkoutRepository<'s, S>) -> Self {
        Self::with_mode(repo, SaveMode::Create, WorkoutDraft::new())
    }

    /// Workflow editing `workout`, starting from its title and exercises
    pub fn edit(repo: WorkoutRepository<'s, S>, workout: &Workout) -> Self {
        Self::with_mode(
            repo,
            SaveMode::Edit {
                original_title: workout.title.clone(),
            },
            WorkoutDraft::from_workout(workout),
        )
    }

    fn with_mode(repo: WorkoutRepository<'s, S>, mode: SaveMode, draft: WorkoutDraft) -> Self {
        Self {
            repo,
            mode,
            draft,
            state: SaveState::Editing,
            transitions: Vec::new(),
        }
    }

    pub fn draft(&self) -> &WorkoutDraft {
        &self.draft
    }

    pub fn mode(&self) -> &SaveMode {
        &self.mode
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    /// States entered by the most recent `save`
    pub fn transitions(&self) -> &[SaveState] {
        &self.transitions
    }

    pub fn repository(&self) -> &WorkoutRepository<'s, S> {
        &self.repo
    }

    /// Replace the draft with `f(draft)`
    pub fn update(&mut self, f: impl FnOnce(WorkoutDraft) -> WorkoutDraft) {
        let draft = std::mem::take(&mut self.draft);
        self.draft = f(draft);
        self.state = SaveState::Editing;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        self.update(|draft| draft.with_title(title));
    }

    pub fn add_exercise(&mut self, exercise: Exercise) {
        self.update(|draft| draft.with_exercise(exercise));
    }

    pub fn remove_exercise(&mut self, exercise: &Exercise) {
        self.update(|draft| draft.without_exercise(exercise));
    }

    /// Apply a template to the draft; on error the draft is unchanged
    pub fn apply_template(
        &mut self,
        templates: &TemplateStore<'_, S>,
        name: &str,
        length: usize,
    ) -> Result<()> {
        let applied = self.draft.apply_template(templates, name, length)?;
        self.update(|_| applied);
        Ok(())
    }

    /// Validate, check uniqueness and commit the draft.
    ///
    /// On success the workflow continues in edit mode for the saved title.
    /// On failure the state records why, and `save` can be called again.
    pub fn save(&mut self) -> Result<SaveOutcome> {
        self.transitions.clear();
        self.enter(SaveState::Validating);

        match self.run_save() {
            Ok(outcome) => {
                self.enter(SaveState::Saved);
                Ok(outcome)
            }
            Err(e) => {
                let reason = e.reject_reason();
                if reason == RejectReason::StorageUnavailable {
                    tracing::warn!("Saving workout {:?} failed: {}", self.draft.title(), e);
                } else {
                    tracing::debug!("Save rejected: {}", e);
                }
                self.enter(SaveState::Rejected(reason));
                Err(e)
            }
        }
    }

    fn run_save(&mut self) -> Result<SaveOutcome> {
        validate_draft(&self.draft)?;

        self.enter(SaveState::CheckingUniqueness);
        let title = self.draft.title().to_string();
        let original = self.mode.original_title().map(str::to_string);
        if self.repo.exists(&title)? && original.as_deref() != Some(title.as_str()) {
            return Err(Error::DuplicateTitle(title));
        }

        self.enter(SaveState::Committing);
        let workout = self.draft.clone().into_workout();
        let report = self.repo.commit(&workout, original.as_deref())?;

        self.mode = SaveMode::Edit {
            original_title: workout.title.clone(),
        };
        Ok(SaveOutcome {
            workout,
            renamed_from: report.renamed_from,
            planner_slots: report.planner_slots,
        })
    }

    fn enter(&mut self, state: SaveState) {
        tracing::debug!("Save workflow: {:?} -> {:?}", self.state, state);
        self.state = state;
        self.transitions.push(state);
    }
}
