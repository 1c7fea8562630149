#![forbid(unsafe_code)]

//! Core domain model and business logic for Work-Out.
//!
//! This crate provides:
//! - Domain types (exercises, workouts, planner slots)
//! - The workout draft and title rules
//! - Templates and the default catalog
//! - Per-user workout and planner storage
//! - The save/edit workflow
//! - Document stores (in-memory, JSON file)

pub mod types;
pub mod error;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod store;
pub mod title;
pub mod draft;
pub mod templates;
pub mod repository;
pub mod workflow;

// Re-export commonly used types
pub use error::{Error, RejectReason, Result};
pub use types::*;
pub use auth::{AuthProvider, StaticAuth};
pub use catalog::{build_default_catalog, get_default_catalog, Catalog};
pub use config::Config;
pub use store::{DocPath, DocumentStore, JsonFileStore, MemoryStore};
pub use title::is_valid_title;
pub use draft::{clamp_length, WorkoutDraft};
pub use templates::TemplateStore;
pub use repository::{CommitReport, WorkoutRepository};
pub use workflow::{SaveMode, SaveOutcome, SaveState, SaveWorkflow};
