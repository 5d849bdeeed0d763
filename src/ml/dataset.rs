use crate::catalogue::DiseaseProfile;
use crate::ml::training::TrainingConfig;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Joiners used when composing synthetic symptom text; repeats weight the draw
const SEPARATORS: [&str; 5] = [", ", " ", " and ", ", ", " "];

/// One labelled training example
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomSample {
    pub text: String,
    pub label: String,
}

/// Seeded generator of synthetic symptom descriptions
pub struct SyntheticCorpus {
    samples_per_disease: usize,
    min_symptoms: usize,
    max_symptoms: usize,
    seed: u64,
}

impl SyntheticCorpus {
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            samples_per_disease: config.samples_per_disease,
            min_symptoms: config.min_symptoms,
            max_symptoms: config.max_symptoms,
            seed: config.seed,
        }
    }

    /// Emit `samples_per_disease` samples for each profile, in profile order
    pub fn generate(&self, diseases: &[DiseaseProfile]) -> Vec<SymptomSample> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut samples = Vec::with_capacity(diseases.len() * self.samples_per_disease);

        for disease in diseases.iter().filter(|d| !d.symptoms.is_empty()) {
            let available = disease.symptoms.len();
            let upper = self.max_symptoms.min(available);
            let lower = self.min_symptoms.min(upper);

            for _ in 0..self.samples_per_disease {
                let count = rng.gen_range(lower..=upper);
                let picked: Vec<&str> = disease
                    .symptoms
                    .choose_multiple(&mut rng, count)
                    .map(|s| s.as_str())
                    .collect();
                let separator = SEPARATORS.choose(&mut rng).copied().unwrap_or(" ");

                samples.push(SymptomSample {
                    text: picked.join(separator),
                    label: disease.name.clone(),
                });
            }
        }

        samples
    }
}
