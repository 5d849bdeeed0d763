use crate::collaborators::{HistoryCollaborator, NotificationCollaborator};
use crate::error::{AppError, Result};
use crate::models::{EhrEntry, NotificationKind, NotificationPayload, PredictionRecord, RecordId};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Take one injected failure if any are pending
fn take_failure(pending: &AtomicU32) -> bool {
    pending
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// In-memory history store (for local runs and testing)
#[derive(Clone, Default)]
pub struct InMemoryHistory {
    predictions: Arc<DashMap<String, Vec<PredictionRecord>>>,
    ehr_entries: Arc<DashMap<Uuid, EhrEntry>>,
    pending_failures: Arc<AtomicU32>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls fail with a collaborator error
    pub fn fail_next(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    pub fn predictions_for(&self, user_id: &str) -> Vec<PredictionRecord> {
        self.predictions
            .get(user_id)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    pub fn prediction_count(&self) -> usize {
        self.predictions.iter().map(|entry| entry.len()).sum()
    }

    pub fn ehr_entries(&self) -> Vec<EhrEntry> {
        self.ehr_entries.iter().map(|entry| entry.clone()).collect()
    }

    fn check_failure(&self) -> Result<()> {
        if take_failure(&self.pending_failures) {
            return Err(AppError::collaborator("history", "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryCollaborator for InMemoryHistory {
    async fn record_prediction(&self, record: &PredictionRecord) -> Result<RecordId> {
        self.check_failure()?;
        self.predictions
            .entry(record.user_id.clone())
            .or_default()
            .push(record.clone());

        tracing::debug!(prediction_id = %record.prediction_id, "Prediction recorded");
        Ok(record.prediction_id.to_string())
    }

    async fn create_ehr_entry(&self, entry: &EhrEntry) -> Result<RecordId> {
        self.check_failure()?;
        self.ehr_entries.insert(entry.prediction_id, entry.clone());

        tracing::debug!(prediction_id = %entry.prediction_id, "EHR entry created");
        Ok(entry.prediction_id.to_string())
    }

    async fn recent_diseases(&self, user_id: &str, limit: usize) -> Result<Vec<String>> {
        Ok(self
            .predictions
            .get(user_id)
            .map(|records| {
                records
                    .iter()
                    .rev()
                    .take(limit)
                    .map(|r| r.result.top_label.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// A notification as delivered to [`InMemoryNotifier`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub user_id: String,
    pub kind: NotificationKind,
    pub payload: NotificationPayload,
}

/// Notifier that keeps everything it is asked to send
#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<SentNotification>>>,
    pending_failures: Arc<AtomicU32>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` sends fail with a collaborator error
    pub fn fail_next(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().clone()
    }

    pub fn count_of(&self, kind: NotificationKind) -> usize {
        self.sent.lock().iter().filter(|n| n.kind == kind).count()
    }
}

#[async_trait]
impl NotificationCollaborator for InMemoryNotifier {
    async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<()> {
        if take_failure(&self.pending_failures) {
            return Err(AppError::collaborator("notifications", "injected failure"));
        }

        tracing::info!(
            user_id = %user_id,
            kind = %kind,
            title = %payload.title,
            "Notification sent"
        );
        self.sent.lock().push(SentNotification {
            user_id: user_id.to_string(),
            kind,
            payload: payload.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdviceLevel, AdvisoryBundle, PredictionResult, RiskTier};
    use chrono::Utc;

    fn record(user: &str, disease: &str) -> PredictionRecord {
        PredictionRecord {
            prediction_id: Uuid::new_v4(),
            user_id: user.to_string(),
            symptoms: "fever and cough".to_string(),
            result: PredictionResult {
                top_label: disease.to_string(),
                confidence: 0.8,
                risk_tier: RiskTier::Low,
            },
            advisory: AdvisoryBundle {
                advice_level: AdviceLevel::Low,
                precautions: vec!["Rest".to_string()],
                dos: vec![],
                donts: vec![],
                consult_when: vec![],
                disclaimer: "d".to_string(),
            },
            doctors: vec![],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_recent_diseases_newest_first() {
        let history = InMemoryHistory::new();
        for disease in ["A", "B", "C"] {
            history.record_prediction(&record("u1", disease)).await.unwrap();
        }
        history.record_prediction(&record("u2", "Z")).await.unwrap();

        let recent = history.recent_diseases("u1", 2).await.unwrap();
        assert_eq!(recent, vec!["C".to_string(), "B".to_string()]);
        assert!(history.recent_diseases("nobody", 10).await.unwrap().is_empty());
        assert_eq!(history.prediction_count(), 4);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let history = InMemoryHistory::new();
        history.fail_next(1);
        assert!(history.record_prediction(&record("u1", "A")).await.is_err());
        assert!(history.record_prediction(&record("u1", "A")).await.is_ok());
    }

    #[tokio::test]
    async fn test_notifier_records_sends() {
        let notifier = InMemoryNotifier::new();
        let payload =
            NotificationPayload::new(NotificationKind::HighRiskAlert, "Pneumonia", RiskTier::High);
        notifier
            .notify("u1", NotificationKind::HighRiskAlert, &payload)
            .await
            .unwrap();

        assert_eq!(notifier.count_of(NotificationKind::HighRiskAlert), 1);
        assert_eq!(notifier.sent()[0].user_id, "u1");
    }
}
