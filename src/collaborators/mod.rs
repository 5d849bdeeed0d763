//! Contracts with the systems the pipeline hands work to after answering:
//! prediction history / EHR and user notifications.
//!
//! The core only ever talks to these through the outbound dispatcher, so a
//! slow or failing collaborator never affects the prediction response.

mod memory;

pub use memory::{InMemoryHistory, InMemoryNotifier, SentNotification};

use crate::error::Result;
use crate::models::{EhrEntry, NotificationKind, NotificationPayload, PredictionRecord, RecordId};
use async_trait::async_trait;

/// Prediction history and the health record
#[async_trait]
pub trait HistoryCollaborator: Send + Sync {
    /// Persist one prediction and return its record id
    async fn record_prediction(&self, record: &PredictionRecord) -> Result<RecordId>;

    /// Add a system-generated entry to the user's health record
    async fn create_ehr_entry(&self, entry: &EhrEntry) -> Result<RecordId>;

    /// Diseases of the user's most recent predictions, newest first
    async fn recent_diseases(&self, user_id: &str, limit: usize) -> Result<Vec<String>>;
}

/// User-facing notifications
#[async_trait]
pub trait NotificationCollaborator: Send + Sync {
    async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<()>;
}
