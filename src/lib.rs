//! Symptom triage service.
//!
//! Free-text symptoms are normalised, encoded as TF-IDF features and classified
//! by a voting forest of decision trees. The winning disease is then given a
//! risk tier, advisory content and a short list of practitioners, and the
//! prediction is handed to history and notification collaborators in the
//! background.

pub mod api;
pub mod catalogue;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ml;
pub mod models;
pub mod pipeline;
pub mod triage;

pub use error::{AppError, Result};
