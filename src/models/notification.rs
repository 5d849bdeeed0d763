use crate::models::RiskTier;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Kinds of notification the pipeline asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum NotificationKind {
    PredictionComplete,
    HighRiskAlert,
    RecurringPattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Normal,
    Elevated,
    Urgent,
}

impl NotificationKind {
    /// Pick the notice for a finished prediction
    pub fn for_risk(risk: RiskTier) -> Self {
        if risk.is_alerting() {
            NotificationKind::HighRiskAlert
        } else {
            NotificationKind::PredictionComplete
        }
    }

    pub fn priority(&self) -> NotificationPriority {
        match self {
            NotificationKind::HighRiskAlert => NotificationPriority::Urgent,
            NotificationKind::RecurringPattern => NotificationPriority::Elevated,
            NotificationKind::PredictionComplete => NotificationPriority::Normal,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::PredictionComplete => "Prediction Complete",
            NotificationKind::HighRiskAlert => "High Risk Alert",
            NotificationKind::RecurringPattern => "Recurring Condition",
        }
    }
}

/// Body handed to the notification collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub message: String,
    pub disease: String,
    pub risk: RiskTier,
    pub priority: NotificationPriority,
}

impl NotificationPayload {
    pub fn new(kind: NotificationKind, disease: &str, risk: RiskTier) -> Self {
        let message = match kind {
            NotificationKind::PredictionComplete => format!(
                "Your symptom analysis is complete. Predicted condition: {}",
                disease
            ),
            NotificationKind::HighRiskAlert => format!(
                "Your prediction ({}) indicates a HIGH risk level. Please consider consulting a doctor soon.",
                disease
            ),
            NotificationKind::RecurringPattern => format!(
                "We noticed you've had similar symptoms ({}) multiple times. Consider a medical checkup.",
                disease
            ),
        };

        Self {
            title: kind.title().to_string(),
            message,
            disease: disease.to_string(),
            risk,
            priority: kind.priority(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_for_risk() {
        assert_eq!(NotificationKind::for_risk(RiskTier::High), NotificationKind::HighRiskAlert);
        assert_eq!(
            NotificationKind::for_risk(RiskTier::Medium),
            NotificationKind::PredictionComplete
        );
        assert_eq!(NotificationKind::for_risk(RiskTier::Low), NotificationKind::PredictionComplete);
    }

    #[test]
    fn test_kind_wire_format() {
        assert_eq!(NotificationKind::HighRiskAlert.to_string(), "high-risk-alert");
        assert_eq!(
            serde_json::to_string(&NotificationKind::RecurringPattern).unwrap(),
            "\"recurring-pattern\""
        );
    }

    #[test]
    fn test_payload_priority() {
        let payload =
            NotificationPayload::new(NotificationKind::HighRiskAlert, "Pneumonia", RiskTier::High);
        assert_eq!(payload.priority, NotificationPriority::Urgent);
        assert!(payload.message.contains("Pneumonia"));
    }
}
