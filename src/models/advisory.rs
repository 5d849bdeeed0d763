use crate::models::AdviceLevel;
use serde::{Deserialize, Serialize};

/// Precautions, do/don't lists and consult triggers for one (disease, risk) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryBundle {
    pub advice_level: AdviceLevel,

    #[serde(default)]
    pub precautions: Vec<String>,

    #[serde(default)]
    pub dos: Vec<String>,

    #[serde(default)]
    pub donts: Vec<String>,

    #[serde(default)]
    pub consult_when: Vec<String>,

    pub disclaimer: String,
}

impl AdvisoryBundle {
    /// True when no section carries any advice
    pub fn is_empty(&self) -> bool {
        self.precautions.is_empty()
            && self.dos.is_empty()
            && self.donts.is_empty()
            && self.consult_when.is_empty()
    }

    /// Cap every list section at `limit` entries
    pub fn truncated(mut self, limit: usize) -> Self {
        self.precautions.truncate(limit);
        self.dos.truncate(limit);
        self.donts.truncate(limit);
        self.consult_when.truncate(limit);
        self
    }
}
