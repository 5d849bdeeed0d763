//! Common test utilities for the triage integration suites
//!
//! Builders for small trained models, fixed-vote bundles and fully wired
//! pipelines backed by in-memory collaborators.

#![allow(dead_code)]

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use symptom_triage::{
    catalogue::Catalogue,
    collaborators::{InMemoryHistory, InMemoryNotifier},
    config::{AdvisoryConfig, DispatchConfig, RecommenderConfig},
    ml::{
        BundleHandle, DecisionTree, FeatureEncoder, ModelArtifact, ModelBundle, ModelMetadata,
        NormMode, RandomForestClassifier, TrainedModel, TrainingConfig, Vocabulary,
    },
    pipeline::{SideEffectDispatcher, TriagePipeline},
};

/// Training settings small enough for a test run
pub fn small_training_config() -> TrainingConfig {
    TrainingConfig {
        samples_per_disease: 12,
        n_trees: 15,
        max_features: 300,
        ..TrainingConfig::default()
    }
}

/// A bundle whose forest is made of constant trees, so every query gets
/// exactly `count / total` for each label
pub fn fixed_vote_bundle(votes: &[(&str, usize)]) -> ModelBundle {
    let mut labels: Vec<String> = votes.iter().map(|(l, _)| l.to_string()).collect();
    labels.sort();

    let vocabulary = Vocabulary::from_weights(
        vec![
            ("fever".to_string(), 1.0),
            ("headache".to_string(), 1.3),
            ("fever headache".to_string(), 2.1),
        ],
        (1, 2),
        NormMode::L2,
    )
    .expect("vocabulary");

    let n_labels = labels.len();
    let mut trees = Vec::new();
    for (label, count) in votes {
        let index = labels.iter().position(|l| l == label).expect("label");
        for _ in 0..*count {
            trees.push(DecisionTree::constant(index, n_labels, 3).expect("constant tree"));
        }
    }
    let forest = RandomForestClassifier::new(labels, trees, 3).expect("forest");

    let artifact = ModelArtifact::from_trained(TrainedModel {
        encoder: FeatureEncoder::new(vocabulary),
        forest,
        metadata: ModelMetadata {
            name: "fixed-votes".to_string(),
            version: "0.0.1".to_string(),
            trained_at: Utc::now(),
            n_training_samples: 0,
            n_test_samples: 0,
            n_features: 3,
            n_labels,
            validation_metrics: None,
            hyperparameters: BTreeMap::new(),
            fingerprint: None,
        },
    });
    ModelBundle::new(artifact, Catalogue::builtin().expect("catalogue")).expect("bundle")
}

/// Everything a test needs to drive and observe the pipeline
pub struct Harness {
    pub pipeline: Arc<TriagePipeline>,
    pub history: InMemoryHistory,
    pub notifier: InMemoryNotifier,
}

/// Wire a pipeline; `None` leaves the model uninitialized
pub fn harness(bundle: Option<ModelBundle>, dispatch: DispatchConfig) -> Harness {
    let history = InMemoryHistory::new();
    let notifier = InMemoryNotifier::new();
    let dispatcher = SideEffectDispatcher::start(
        &dispatch,
        Arc::new(history.clone()),
        Arc::new(notifier.clone()),
    );
    let handle = match bundle {
        Some(bundle) => BundleHandle::ready(bundle),
        None => BundleHandle::new(),
    };
    let pipeline = Arc::new(TriagePipeline::new(
        Arc::new(handle),
        Arc::new(dispatcher),
        RecommenderConfig::default(),
        AdvisoryConfig::default(),
    ));
    Harness {
        pipeline,
        history,
        notifier,
    }
}

/// Dispatch settings with fast retries for tests
pub fn fast_dispatch() -> DispatchConfig {
    DispatchConfig {
        queue_size: 64,
        worker_threads: 2,
        max_retries: 2,
        retry_backoff_ms: 1,
    }
}

/// Helper function to parse Prometheus exposition format
/// Returns a map of metric name to its sample lines
pub fn parse_prometheus_output(output: &str) -> HashMap<String, Vec<String>> {
    let mut metrics: HashMap<String, Vec<String>> = HashMap::new();
    for line in output.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let name = line
            .split(|c| c == '{' || c == ' ')
            .next()
            .unwrap_or_default()
            .to_string();
        metrics.entry(name).or_default().push(line.to_string());
    }
    metrics
}
