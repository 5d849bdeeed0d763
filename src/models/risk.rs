use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Urgency signal attached to every prediction
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString,
    Display, EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Check if this tier should raise an alert
    pub fn is_alerting(&self) -> bool {
        matches!(self, RiskTier::High)
    }
}

/// Coarse urgency of the advice wording
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AdviceLevel {
    Low,
    Medium,
    High,
}

impl From<RiskTier> for AdviceLevel {
    fn from(tier: RiskTier) -> Self {
        match tier {
            RiskTier::Low => AdviceLevel::Low,
            RiskTier::Medium => AdviceLevel::Medium,
            RiskTier::High => AdviceLevel::High,
        }
    }
}
