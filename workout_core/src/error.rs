//! Error types for the workout_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for workout_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog validation error
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// Title is empty or contains something other than letters, digits and spaces
    #[error("Invalid workout title: {0:?}")]
    InvalidTitle(String),

    /// A workout needs at least one exercise
    #[error("Workout has no exercises")]
    EmptyExerciseList,

    /// Another workout of this user already has the title
    #[error("Workout title already in use: {0}")]
    DuplicateTitle(String),

    /// Template length request outside `1..=available`
    #[error("Requested {requested} exercises but the template has {available}")]
    OutOfRange { requested: usize, available: usize },

    /// No template stored under the name
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// Reading from or writing to the document store failed
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Document path or key is not usable as a store key
    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    /// No user is signed in
    #[error("No user is signed in")]
    NotSignedIn,
}

/// Why a save was refused, as tracked by the save workflow state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    InvalidTitle,
    EmptyExerciseList,
    DuplicateTitle,
    StorageUnavailable,
}

impl Error {
    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            Error::EmptyExerciseList => "Please select at least one exercise".into(),
            Error::InvalidTitle(_) => "Please enter a valid title".into(),
            Error::DuplicateTitle(_) => "That title is already used".into(),
            Error::TemplateNotFound(name) => format!("Template \"{}\" does not exist", name),
            Error::OutOfRange { available, .. } => {
                format!("Please choose a length between 1 and {}", available)
            }
            Error::NotSignedIn => "Please sign in first".into(),
            Error::StorageUnavailable(_) | Error::Io(_) | Error::Json(_) => {
                "Could not reach your workouts, please try again".into()
            }
            other => other.to_string(),
        }
    }

    /// Map this error onto the reason a save was rejected.
    ///
    /// Anything that is not a validation failure counts as a storage failure.
    pub fn reject_reason(&self) -> RejectReason {
        match self {
            Error::InvalidTitle(_) => RejectReason::InvalidTitle,
            Error::EmptyExerciseList => RejectReason::EmptyExerciseList,
            Error::DuplicateTitle(_) => RejectReason::DuplicateTitle,
            _ => RejectReason::StorageUnavailable,
        }
    }

    pub(crate) fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        Error::StorageUnavailable(format!("{}: {}", context, err))
    }
}
