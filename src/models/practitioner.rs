use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::Validate;

/// Consultation fee band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeeTier {
    Economy,
    Standard,
    Premium,
}

impl Default for FeeTier {
    fn default() -> Self {
        FeeTier::Standard
    }
}

/// Static directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Practitioner {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(length(min = 1, max = 100))]
    pub specialty: String,

    pub hospital: String,

    #[serde(default = "default_contact")]
    pub contact: String,

    #[serde(default)]
    pub availability: Option<String>,

    #[validate(range(max = 80))]
    pub experience_years: u32,

    #[serde(default)]
    pub fee_tier: FeeTier,
}

fn default_contact() -> String {
    "Not Available".to_string()
}

/// Practitioner ranked for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorRecommendation {
    pub practitioner: Practitioner,
    pub relevance_score: u32,
}

impl DoctorRecommendation {
    pub fn name(&self) -> &str {
        &self.practitioner.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_practitioner_validation() {
        let mut p = Practitioner {
            name: "Dr. Test".to_string(),
            specialty: "General Physician".to_string(),
            hospital: "City Clinic".to_string(),
            contact: default_contact(),
            availability: None,
            experience_years: 12,
            fee_tier: FeeTier::Economy,
        };
        assert!(p.validate().is_ok());

        p.name.clear();
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_fee_tier_parse() {
        use std::str::FromStr;
        assert_eq!(FeeTier::from_str("premium").unwrap(), FeeTier::Premium);
        assert_eq!(FeeTier::default(), FeeTier::Standard);
    }
}
