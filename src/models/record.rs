use crate::models::{AdvisoryBundle, DoctorRecommendation, PredictionResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller identity supplied by the auth collaborator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub user_id: String,
}

impl CallerIdentity {
    pub const ANONYMOUS: &'static str = "anonymous";

    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(Self::ANONYMOUS)
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id == Self::ANONYMOUS
    }
}

/// Identifier returned by the history collaborator
pub type RecordId = String;

/// Everything the history collaborator keeps for one prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub prediction_id: Uuid,
    pub user_id: String,
    pub symptoms: String,
    pub result: PredictionResult,
    pub advisory: AdvisoryBundle,
    pub doctors: Vec<DoctorRecommendation>,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    /// Render advice the way it is archived alongside the prediction
    pub fn advisory_text(&self) -> String {
        let mut lines = vec![
            format!(
                "Advice Level: {}",
                self.advisory.advice_level.to_string().to_uppercase()
            ),
            String::new(),
            "Key Recommendations:".to_string(),
        ];
        lines.extend(self.advisory.precautions.iter().map(|p| format!("• {}", p)));
        lines.join("\n")
    }
}

/// System-generated EHR entry describing a prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EhrEntry {
    pub prediction_id: Uuid,
    pub user_id: String,
    pub category: String,
    pub title: String,
    pub description: String,
    pub system_generated: bool,
    pub created_at: DateTime<Utc>,
}

impl EhrEntry {
    pub const CATEGORY: &'static str = "system_prediction";

    pub fn from_record(record: &PredictionRecord) -> Self {
        Self {
            prediction_id: record.prediction_id,
            user_id: record.user_id.clone(),
            category: Self::CATEGORY.to_string(),
            title: format!("AI Prediction: {}", record.result.top_label),
            description: format!(
                "Symptoms: {}\nRisk: {}\nConfidence: {:.0}%\n\n{}",
                record.symptoms,
                record.result.risk_tier,
                record.result.confidence * 100.0,
                record.advisory_text()
            ),
            system_generated: true,
            created_at: record.created_at,
        }
    }
}
