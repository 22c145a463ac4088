//! Core 3-D space-colonization tree growth library.
//!
//! Main components:
//! - [`attractor`] — attractor points and the cloud that owns them.
//! - [`cone`] — the conical perception volume used by the search.
//! - [`tree`] — branch arena, maturation, search and colonization.
//! - [`phases`] — the ordered phases of one growth step.
//! - [`plant`] — [`plant::TreePlant`], which drives steps and tracks age.
//! - [`config`] — growth tunables.
//! - [`error`] — construction errors.
//! - [`types`] — shared type aliases and IDs.

pub mod attractor;
pub mod config;
pub mod cone;
pub mod error;
pub mod phases;
pub mod plant;
pub mod tree;
pub mod types;

pub use attractor::{AttractorCloud, AttractorPoint};
pub use config::Config;
pub use error::{GrowthError, Result};
pub use plant::TreePlant;
pub use tree::{Branch, BranchKind, Tree};
