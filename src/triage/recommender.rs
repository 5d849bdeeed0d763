use crate::catalogue::{PractitionerDirectory, SpecialtyMap};
use crate::config::RecommenderConfig;
use crate::models::{DoctorRecommendation, Practitioner, RiskTier};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

/// Ranks practitioners for a predicted disease
#[derive(Debug, Clone)]
pub struct DoctorRecommender {
    config: RecommenderConfig,
}

impl DoctorRecommender {
    pub fn new(config: RecommenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    /// Up to `max_results` practitioners, best first.
    ///
    /// Only practitioners whose specialty is mapped to the disease are
    /// considered; an empty list means no specific recommendation exists.
    pub fn recommend(
        &self,
        disease: &str,
        risk: RiskTier,
        specialties: &SpecialtyMap,
        directory: &PractitionerDirectory,
    ) -> Vec<DoctorRecommendation> {
        let wanted = specialties.specialties_for(disease);

        let mut ranked: Vec<DoctorRecommendation> = wanted
            .iter()
            .enumerate()
            .flat_map(|(position, specialty)| {
                let rank_weight = self.rank_weight(wanted.len(), position);
                directory
                    .by_specialty(specialty)
                    .into_iter()
                    .map(move |p| (p, rank_weight))
            })
            .map(|(practitioner, rank_weight)| {
                let generalist = specialties.is_generalist(&practitioner.specialty);
                DoctorRecommendation {
                    relevance_score: rank_weight + self.bonus(practitioner, risk, generalist),
                    practitioner: practitioner.clone(),
                }
            })
            .collect();

        ranked.sort_by(compare);
        let mut seen = HashSet::new();
        ranked.retain(|r| seen.insert(r.practitioner.name.clone()));
        ranked.truncate(self.config.max_results);

        debug!(
            disease = %disease,
            risk = %risk,
            matched = ranked.len(),
            "Ranked practitioners"
        );
        ranked
    }

    fn rank_weight(&self, len: usize, position: usize) -> u32 {
        self.config.rank_step * (len - position) as u32
    }

    fn bonus(&self, practitioner: &Practitioner, risk: RiskTier, generalist: bool) -> u32 {
        let mut score = practitioner
            .experience_years
            .min(self.config.experience_cap);
        match risk {
            RiskTier::High if !generalist => score += self.config.high_risk_specialist_bonus,
            RiskTier::Low if generalist => score += self.config.low_risk_generalist_bonus,
            _ => {}
        }
        score
    }
}

impl Default for DoctorRecommender {
    fn default() -> Self {
        Self::new(RecommenderConfig::default())
    }
}

/// Descending score, then ascending name
fn compare(a: &DoctorRecommendation, b: &DoctorRecommendation) -> Ordering {
    b.relevance_score
        .cmp(&a.relevance_score)
        .then_with(|| a.practitioner.name.cmp(&b.practitioner.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeeTier;

    fn practitioner(name: &str, specialty: &str, years: u32) -> Practitioner {
        Practitioner {
            name: name.to_string(),
            specialty: specialty.to_string(),
            hospital: "City Hospital".to_string(),
            contact: "Not Available".to_string(),
            availability: None,
            experience_years: years,
            fee_tier: FeeTier::Standard,
        }
    }

    fn fixtures() -> (SpecialtyMap, PractitionerDirectory) {
        let map = SpecialtyMap::new(
            vec![
                (
                    "Influenza (Flu)".to_string(),
                    vec!["General Physician".to_string(), "Pulmonologist".to_string()],
                ),
                ("Glaucoma".to_string(), vec!["Ophthalmologist".to_string()]),
            ],
            vec!["General Physician".to_string()],
            vec!["General Physician".to_string()],
        );
        let directory = PractitionerDirectory::new(vec![
            practitioner("Dr. Gamma", "General Physician", 12),
            practitioner("Dr. Alpha", "General Physician", 12),
            practitioner("Dr. Beta", "General Physician", 25),
            practitioner("Dr. Delta", "General Physician", 3),
            practitioner("Dr. Lung", "Pulmonologist", 30),
            practitioner("Dr. Skin", "Dermatologist", 40),
        ])
        .unwrap();
        (map, directory)
    }

    #[test]
    fn test_returns_three_sorted_by_score_then_name() {
        let (map, directory) = fixtures();
        let recommendations = DoctorRecommender::default().recommend(
            "Influenza (Flu)",
            RiskTier::Medium,
            &map,
            &directory,
        );

        let names: Vec<&str> = recommendations.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["Dr. Beta", "Dr. Alpha", "Dr. Gamma"]);
        assert_eq!(recommendations[0].relevance_score, 40 + 25);
        assert_eq!(
            recommendations[1].relevance_score,
            recommendations[2].relevance_score
        );
    }

    #[test]
    fn test_high_risk_prefers_specialists() {
        let (map, directory) = fixtures();
        let recommendations = DoctorRecommender::default().recommend(
            "Influenza (Flu)",
            RiskTier::High,
            &map,
            &directory,
        );
        assert_eq!(recommendations[0].name(), "Dr. Lung");
        assert_eq!(recommendations[0].relevance_score, 20 + 30 + 30);
    }

    #[test]
    fn test_low_risk_generalist_bonus() {
        let (map, directory) = fixtures();
        let recommendations = DoctorRecommender::default().recommend(
            "Influenza (Flu)",
            RiskTier::Low,
            &map,
            &directory,
        );
        assert_eq!(recommendations[0].name(), "Dr. Beta");
        assert_eq!(recommendations[0].relevance_score, 40 + 25 + 20);
    }

    #[test]
    fn test_no_matching_practitioners_is_empty() {
        let (map, directory) = fixtures();
        let recommendations =
            DoctorRecommender::default().recommend("Glaucoma", RiskTier::High, &map, &directory);
        assert!(recommendations.is_empty());
    }

    #[test]
    fn test_unmapped_disease_uses_default_specialties() {
        let (map, directory) = fixtures();
        let recommendations =
            DoctorRecommender::default().recommend("Hiccups", RiskTier::Low, &map, &directory);
        assert_eq!(recommendations.len(), 3);
        assert!(recommendations
            .iter()
            .all(|r| r.practitioner.specialty == "General Physician"));
    }

    #[test]
    fn test_fewer_candidates_than_limit() {
        let map = SpecialtyMap::new(
            vec![("Asthma".to_string(), vec!["Pulmonologist".to_string()])],
            vec![],
            vec![],
        );
        let (_, directory) = fixtures();
        let recommendations =
            DoctorRecommender::default().recommend("Asthma", RiskTier::Medium, &map, &directory);
        assert_eq!(recommendations.len(), 1);
    }

    #[test]
    fn test_generalist_spelling_ignores_case() {
        let (map, _) = fixtures();
        let directory = PractitionerDirectory::new(vec![
            practitioner("Dr. Lower", "general physician", 10),
            practitioner("Dr. Lung", "Pulmonologist", 10),
        ])
        .unwrap();

        let recommendations = DoctorRecommender::default().recommend(
            "Influenza (Flu)",
            RiskTier::High,
            &map,
            &directory,
        );
        assert_eq!(recommendations[0].name(), "Dr. Lung");
        assert_eq!(recommendations[0].relevance_score, 20 + 10 + 30);
        // rank weight and experience only, no specialist bonus
        assert_eq!(recommendations[1].name(), "Dr. Lower");
        assert_eq!(recommendations[1].relevance_score, 40 + 10);
    }

    #[test]
    fn test_experience_is_capped() {
        let config = RecommenderConfig {
            experience_cap: 10,
            ..RecommenderConfig::default()
        };
        let (map, directory) = fixtures();
        let recommendations = DoctorRecommender::new(config).recommend(
            "Influenza (Flu)",
            RiskTier::Medium,
            &map,
            &directory,
        );
        // Beta, Alpha, Gamma all cap at 10; ties fall to name order
        let names: Vec<&str> = recommendations.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["Dr. Alpha", "Dr. Beta", "Dr. Gamma"]);
    }
}
