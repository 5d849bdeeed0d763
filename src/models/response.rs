use crate::models::{AdviceLevel, DoctorRecommendation, RiskTier};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request body for `POST /v1/predict`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PredictRequest {
    #[validate(length(max = 5000))]
    pub symptoms: String,
}

/// Practitioner as shown to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedDoctor {
    pub name: String,
    pub specialization: String,
    pub hospital: String,
    pub contact: String,
    pub experience: u32,
}

impl From<&DoctorRecommendation> for RecommendedDoctor {
    fn from(rec: &DoctorRecommendation) -> Self {
        let p = &rec.practitioner;
        Self {
            name: p.name.clone(),
            specialization: p.specialty.clone(),
            hospital: p.hospital.clone(),
            contact: p.contact.clone(),
            experience: p.experience_years,
        }
    }
}

/// Full triage answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageResponse {
    pub disease: String,
    pub risk: RiskTier,
    pub confidence: f64,
    pub message: String,
    pub advice_level: AdviceLevel,
    pub precautions: Vec<String>,
    pub dos: Vec<String>,
    pub donts: Vec<String>,
    pub consult_when: Vec<String>,
    pub disclaimer: String,
    pub recommended_doctors: Vec<RecommendedDoctor>,
}

/// Round a probability to two decimals for display
pub fn display_confidence(confidence: f64) -> f64 {
    (confidence * 100.0).round() / 100.0
}
