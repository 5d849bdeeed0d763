use crate::config::{AdvisoryConfig, Config, RecommenderConfig};
use crate::error::Result;
use crate::metrics::{PREDICTIONS_TOTAL, PREDICTION_DURATION_SECONDS, PREDICTION_ERRORS_TOTAL};
use crate::ml::{BundleHandle, ModelBundle};
use crate::models::{
    display_confidence, AdvisoryBundle, CallerIdentity, DoctorRecommendation, EhrEntry,
    NotificationKind, NotificationPayload, PredictionRecord, RecommendedDoctor, SymptomQuery,
    TriageResponse,
};
use crate::pipeline::dispatch::{OutboundMessage, SideEffectDispatcher};
use crate::triage::{AdvisorySelector, DoctorRecommender, RiskAssessment, RiskResolver};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Everything computed for one prediction, before it is shaped into a response
#[derive(Debug, Clone)]
pub struct TriageOutcome {
    pub assessment: RiskAssessment,
    pub advisory: AdvisoryBundle,
    pub doctors: Vec<DoctorRecommendation>,
}

impl TriageOutcome {
    pub fn to_response(&self) -> TriageResponse {
        let result = &self.assessment.result;
        TriageResponse {
            disease: result.top_label.clone(),
            risk: result.risk_tier,
            confidence: display_confidence(result.confidence),
            message: self.assessment.message.to_string(),
            advice_level: self.advisory.advice_level,
            precautions: self.advisory.precautions.clone(),
            dos: self.advisory.dos.clone(),
            donts: self.advisory.donts.clone(),
            consult_when: self.advisory.consult_when.clone(),
            disclaimer: self.advisory.disclaimer.clone(),
            recommended_doctors: self.doctors.iter().map(RecommendedDoctor::from).collect(),
        }
    }
}

/// Runs normalisation through doctor ranking and hands side effects to the dispatcher
pub struct TriagePipeline {
    bundles: Arc<BundleHandle>,
    dispatcher: Arc<SideEffectDispatcher>,
    recommender: DoctorRecommender,
    advisory: AdvisoryConfig,
}

impl TriagePipeline {
    pub fn new(
        bundles: Arc<BundleHandle>,
        dispatcher: Arc<SideEffectDispatcher>,
        recommender: RecommenderConfig,
        advisory: AdvisoryConfig,
    ) -> Self {
        Self {
            bundles,
            dispatcher,
            recommender: DoctorRecommender::new(recommender),
            advisory,
        }
    }

    pub fn from_config(
        config: &Config,
        bundles: Arc<BundleHandle>,
        dispatcher: Arc<SideEffectDispatcher>,
    ) -> Self {
        Self::new(
            bundles,
            dispatcher,
            config.recommender.clone(),
            config.advisory.clone(),
        )
    }

    pub fn bundles(&self) -> &Arc<BundleHandle> {
        &self.bundles
    }

    pub fn dispatcher(&self) -> &Arc<SideEffectDispatcher> {
        &self.dispatcher
    }

    /// Answer one symptom query for `caller`.
    ///
    /// Nothing here waits on I/O: history, EHR and notification work is only
    /// queued, and a queueing failure is logged without affecting the answer.
    pub fn predict(&self, caller: &CallerIdentity, symptoms: &str) -> Result<TriageResponse> {
        let timer = PREDICTION_DURATION_SECONDS.start_timer();

        let outcome = match self.triage(symptoms) {
            Ok(outcome) => outcome,
            Err(e) => {
                timer.stop_and_discard();
                PREDICTION_ERRORS_TOTAL
                    .with_label_values(&[e.metric_label()])
                    .inc();
                debug!(error = %e, "Prediction rejected");
                return Err(e);
            }
        };
        let response = outcome.to_response();
        timer.observe_duration();

        let risk = outcome.assessment.result.risk_tier;
        let risk_label = risk.to_string();
        PREDICTIONS_TOTAL
            .with_label_values(&[risk_label.as_str()])
            .inc();
        info!(
            user_id = %caller.user_id,
            disease = %response.disease,
            risk = %risk,
            confidence = response.confidence,
            doctors = response.recommended_doctors.len(),
            "Prediction completed"
        );

        self.dispatch_side_effects(caller, symptoms, outcome);
        Ok(response)
    }

    /// The pure part of a prediction: no metrics, no side effects
    pub fn triage(&self, symptoms: &str) -> Result<TriageOutcome> {
        let query = SymptomQuery::parse(symptoms)?;
        let bundle = self.bundles.current()?;
        self.triage_with(&bundle, &query)
    }

    fn triage_with(&self, bundle: &ModelBundle, query: &SymptomQuery) -> Result<TriageOutcome> {
        let catalogue = bundle.catalogue();

        let distribution = bundle.classify(query)?;
        let assessment = RiskResolver::new(catalogue.risk_table()).resolve(&distribution)?;
        if let Some(warning) = &assessment.warning {
            warn!(
                label = %warning.label,
                model = %bundle.version(),
                "Model and catalogue disagree on labels"
            );
        }

        let disease = assessment.result.top_label.as_str();
        let risk = assessment.result.risk_tier;

        let selector =
            AdvisorySelector::new(catalogue.advisory(), self.advisory.max_items_per_section);
        let advisory =
            selector.advise(disease, risk, display_confidence(assessment.result.confidence));

        let doctors = self.recommender.recommend(
            disease,
            risk,
            catalogue.specialties(),
            catalogue.directory(),
        );
        if doctors.is_empty() {
            debug!(disease = %disease, "No practitioner matches the disease's specialties");
        }

        Ok(TriageOutcome {
            assessment,
            advisory,
            doctors,
        })
    }

    fn dispatch_side_effects(
        &self,
        caller: &CallerIdentity,
        symptoms: &str,
        outcome: TriageOutcome,
    ) {
        let result = outcome.assessment.result;
        let kind = NotificationKind::for_risk(result.risk_tier);
        let payload = NotificationPayload::new(kind, &result.top_label, result.risk_tier);

        let record = PredictionRecord {
            prediction_id: Uuid::new_v4(),
            user_id: caller.user_id.clone(),
            symptoms: symptoms.trim().to_string(),
            result,
            advisory: outcome.advisory,
            doctors: outcome.doctors,
            created_at: Utc::now(),
        };
        let ehr = EhrEntry::from_record(&record);

        let accepted = self.dispatcher.dispatch_all([
            OutboundMessage::PersistHistory(Box::new(record)),
            OutboundMessage::CreateEhrEntry(ehr),
            OutboundMessage::Notify {
                user_id: caller.user_id.clone(),
                kind,
                payload,
            },
        ]);
        debug!(accepted, "Side effects queued");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::Catalogue;
    use crate::collaborators::{InMemoryHistory, InMemoryNotifier};
    use crate::config::DispatchConfig;
    use crate::error::AppError;
    use crate::ml::{
        DecisionTree, FeatureEncoder, ModelArtifact, ModelMetadata, NormMode,
        RandomForestClassifier, TrainedModel, Vocabulary,
    };
    use crate::models::RiskTier;
    use std::collections::BTreeMap;
    use std::time::Duration;

    /// A forest of constant trees voting `count` times for each label
    fn fixed_vote_bundle(votes: &[(&str, usize)]) -> ModelBundle {
        let mut labels: Vec<String> = votes.iter().map(|(l, _)| l.to_string()).collect();
        labels.sort();

        let vocabulary = Vocabulary::from_weights(
            vec![("fever".to_string(), 1.0), ("headache".to_string(), 1.2)],
            (1, 2),
            NormMode::L2,
        )
        .unwrap();

        let n_labels = labels.len();
        let mut trees = Vec::new();
        for (label, count) in votes {
            let index = labels.iter().position(|l| l == label).unwrap();
            for _ in 0..*count {
                trees.push(DecisionTree::constant(index, n_labels, 2).unwrap());
            }
        }
        let forest = RandomForestClassifier::new(labels, trees, 2).unwrap();

        let artifact = ModelArtifact::from_trained(TrainedModel {
            encoder: FeatureEncoder::new(vocabulary),
            forest,
            metadata: ModelMetadata {
                name: "fixed-votes".to_string(),
                version: "0.0.1".to_string(),
                trained_at: Utc::now(),
                n_training_samples: 0,
                n_test_samples: 0,
                n_features: 2,
                n_labels,
                validation_metrics: None,
                hyperparameters: BTreeMap::new(),
                fingerprint: None,
            },
        });
        ModelBundle::new(artifact, Catalogue::builtin().unwrap()).unwrap()
    }

    fn pipeline(
        bundle: Option<ModelBundle>,
    ) -> (TriagePipeline, InMemoryHistory, InMemoryNotifier) {
        let history = InMemoryHistory::new();
        let notifier = InMemoryNotifier::new();
        let dispatcher = SideEffectDispatcher::start(
            &DispatchConfig::default(),
            Arc::new(history.clone()),
            Arc::new(notifier.clone()),
        );
        let handle = match bundle {
            Some(bundle) => BundleHandle::ready(bundle),
            None => BundleHandle::new(),
        };
        let pipeline = TriagePipeline::new(
            Arc::new(handle),
            Arc::new(dispatcher),
            RecommenderConfig::default(),
            AdvisoryConfig::default(),
        );
        (pipeline, history, notifier)
    }

    #[tokio::test]
    async fn test_influenza_at_72_percent() {
        let (pipeline, history, notifier) = pipeline(Some(fixed_vote_bundle(&[
            ("Influenza (Flu)", 72),
            ("Common Cold", 28),
        ])));
        let caller = CallerIdentity::new("u-42");

        let response = pipeline
            .predict(&caller, "fever headache body aches fatigue")
            .unwrap();
        assert_eq!(response.disease, "Influenza (Flu)");
        assert_eq!(response.risk, RiskTier::Medium);
        assert_eq!(response.confidence, 0.72);
        assert_eq!(response.message, "");
        assert!(!response.recommended_doctors.is_empty());
        assert!(response.recommended_doctors.len() <= 3);
        assert!(response
            .recommended_doctors
            .iter()
            .all(|d| d.specialization == "General Physician"));

        assert!(pipeline.dispatcher().drain(Duration::from_secs(2)).await);
        assert_eq!(history.predictions_for("u-42").len(), 1);
        assert_eq!(history.ehr_entries()[0].category, EhrEntry::CATEGORY);
        assert_eq!(notifier.count_of(NotificationKind::PredictionComplete), 1);
    }

    #[tokio::test]
    async fn test_short_input_issues_no_side_effects() {
        let (pipeline, history, notifier) =
            pipeline(Some(fixed_vote_bundle(&[("Influenza (Flu)", 3), ("Common Cold", 1)])));
        let err = pipeline.predict(&CallerIdentity::anonymous(), "x").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        assert!(pipeline.dispatcher().drain(Duration::from_secs(1)).await);
        assert_eq!(history.prediction_count(), 0);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_uninitialized_bundle_is_unavailable() {
        let (pipeline, _, _) = pipeline(None);
        let err = pipeline
            .predict(&CallerIdentity::anonymous(), "fever and chills")
            .unwrap_err();
        assert!(matches!(err, AppError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn test_low_confidence_raises_high_risk_alert() {
        let (pipeline, _, notifier) = pipeline(Some(fixed_vote_bundle(&[
            ("Common Cold", 30),
            ("Allergic Rhinitis", 25),
            ("Migraine", 25),
            ("Acne", 20),
        ])));
        let response = pipeline
            .predict(&CallerIdentity::new("u-1"), "sneezing runny nose")
            .unwrap();
        assert_eq!(response.risk, RiskTier::High);
        assert!(response.message.starts_with("Low confidence"));

        assert!(pipeline.dispatcher().drain(Duration::from_secs(2)).await);
        assert_eq!(notifier.count_of(NotificationKind::HighRiskAlert), 1);
    }

    #[tokio::test]
    async fn test_repeated_calls_are_identical() {
        let (pipeline, _, _) = pipeline(Some(fixed_vote_bundle(&[
            ("Influenza (Flu)", 72),
            ("Common Cold", 28),
        ])));
        let caller = CallerIdentity::anonymous();
        let first = pipeline.predict(&caller, "fever headache").unwrap();
        let second = pipeline.predict(&caller, "fever headache").unwrap();
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn test_outcome_response_rounds_confidence_only_for_display() {
        let outcome = TriageOutcome {
            assessment: RiskAssessment {
                result: crate::models::PredictionResult {
                    top_label: "Asthma".to_string(),
                    confidence: 0.6999,
                    risk_tier: RiskTier::Medium,
                },
                message: "",
                warning: None,
            },
            advisory: AdvisoryBundle {
                advice_level: crate::models::AdviceLevel::Medium,
                precautions: vec![],
                dos: vec![],
                donts: vec![],
                consult_when: vec![],
                disclaimer: "d".to_string(),
            },
            doctors: vec![],
        };
        let response = outcome.to_response();
        assert_eq!(response.confidence, 0.70);
        assert_eq!(response.risk, RiskTier::Medium);
    }
}
