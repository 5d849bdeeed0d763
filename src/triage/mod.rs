//! Post-classification stages: risk tiering, advisory selection and doctor
//! ranking. Everything here is a pure function of the loaded tables.

pub mod advisory;
pub mod recommender;
pub mod risk;

pub use advisory::{advice_level, AdvisorySelector, AdvisorySource};
pub use recommender::DoctorRecommender;
pub use risk::{
    risk_message, RiskAssessment, RiskResolver, UnknownLabelWarning, BASE_RISK_THRESHOLD,
    MEDIUM_RISK_FLOOR,
};
