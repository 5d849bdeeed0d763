/// Integration tests for the triage pipeline
///
/// These tests drive the orchestrator end to end:
/// - Risk tiering at the confidence boundaries
/// - Advisory and practitioner selection from the built-in catalogue
/// - Fire-and-forget history, EHR and notification side effects
/// - Degraded behaviour without a model

mod common;

use std::time::Duration;
use symptom_triage::{
    config::DispatchConfig,
    models::{AdviceLevel, CallerIdentity, EhrEntry, NotificationKind, RiskTier},
    AppError,
};

const DRAIN: Duration = Duration::from_secs(3);

#[tokio::test]
async fn test_influenza_end_to_end() {
    let h = common::harness(
        Some(common::fixed_vote_bundle(&[
            ("Influenza (Flu)", 72),
            ("Common Cold", 28),
        ])),
        common::fast_dispatch(),
    );
    let caller = CallerIdentity::new("patient-1");

    let response = h
        .pipeline
        .predict(&caller, "fever headache body aches fatigue")
        .unwrap();

    assert_eq!(response.disease, "Influenza (Flu)");
    assert_eq!(response.risk, RiskTier::Medium);
    assert_eq!(response.confidence, 0.72);
    assert_eq!(response.message, "");
    assert_eq!(response.advice_level, AdviceLevel::Medium);

    let doctors: Vec<(&str, &str)> = response
        .recommended_doctors
        .iter()
        .map(|d| (d.name.as_str(), d.specialization.as_str()))
        .collect();
    assert_eq!(
        doctors,
        vec![
            ("Dr. C H Madhuri", "General Physician"),
            ("Dr. Ravi Kumar Gurugubelli", "General Physician"),
            ("Dr. Thriveni Reddy", "General Physician"),
        ]
    );

    assert!(response.precautions.len() >= 2);
    assert!(response.precautions[0].starts_with("Based on your symptoms analysis"));
    assert!(response
        .precautions
        .last()
        .unwrap()
        .starts_with("If symptoms persist"));
    assert!(response.dos.len() <= 4);
    assert!(response.donts.len() <= 4);
    assert!(response.consult_when.len() <= 4);
    assert!(!response.disclaimer.is_empty());

    assert!(h.pipeline.dispatcher().drain(DRAIN).await);
    let records = h.history.predictions_for("patient-1");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].result.top_label, "Influenza (Flu)");

    let ehr = h.history.ehr_entries();
    assert_eq!(ehr.len(), 1);
    assert_eq!(ehr[0].category, EhrEntry::CATEGORY);
    assert!(ehr[0].system_generated);
    assert_eq!(ehr[0].title, "AI Prediction: Influenza (Flu)");

    assert_eq!(h.notifier.count_of(NotificationKind::PredictionComplete), 1);
    assert_eq!(h.notifier.count_of(NotificationKind::HighRiskAlert), 0);
}

#[tokio::test]
async fn test_confidence_boundaries() {
    // (votes for top label out of 100, base risk LOW via Common Cold, expected tier)
    let cases = [
        (70, RiskTier::Low),
        (69, RiskTier::Medium),
        (40, RiskTier::Medium),
        (39, RiskTier::High),
    ];

    for (top, expected) in cases {
        let rest = 100 - top;
        // split the remainder so no other label outvotes the top one
        let a = rest / 2;
        let b = rest - a;
        let h = common::harness(
            Some(common::fixed_vote_bundle(&[
                ("Common Cold", top),
                ("Migraine", a),
                ("Acne", b),
            ])),
            common::fast_dispatch(),
        );

        let response = h
            .pipeline
            .predict(&CallerIdentity::anonymous(), "sneezing and runny nose")
            .unwrap();
        assert_eq!(response.disease, "Common Cold", "top={}", top);
        assert_eq!(response.risk, expected, "top={}", top);
    }
}

#[tokio::test]
async fn test_high_risk_alert_and_specialists() {
    let h = common::harness(
        Some(common::fixed_vote_bundle(&[("Pneumonia", 9), ("Common Cold", 1)])),
        common::fast_dispatch(),
    );

    let response = h
        .pipeline
        .predict(&CallerIdentity::new("patient-2"), "high fever chest pain cough")
        .unwrap();
    assert_eq!(response.risk, RiskTier::High);
    assert_eq!(response.advice_level, AdviceLevel::High);
    assert!(!response.recommended_doctors.is_empty());
    assert_eq!(response.recommended_doctors[0].specialization, "Pulmonologist");
    assert!(response
        .precautions
        .last()
        .unwrap()
        .starts_with("Given the risk assessment"));

    assert!(h.pipeline.dispatcher().drain(DRAIN).await);
    assert_eq!(h.notifier.count_of(NotificationKind::HighRiskAlert), 1);
    assert_eq!(h.notifier.count_of(NotificationKind::PredictionComplete), 0);
}

#[tokio::test]
async fn test_disease_without_practitioners_returns_empty_list() {
    let h = common::harness(
        Some(common::fixed_vote_bundle(&[("Glaucoma", 8), ("Migraine", 2)])),
        common::fast_dispatch(),
    );
    let response = h
        .pipeline
        .predict(&CallerIdentity::anonymous(), "blurred vision eye pain")
        .unwrap();
    assert_eq!(response.disease, "Glaucoma");
    assert!(response.recommended_doctors.is_empty());
}

#[tokio::test]
async fn test_recurring_pattern_on_third_prediction() {
    let h = common::harness(
        Some(common::fixed_vote_bundle(&[("Migraine", 8), ("Acne", 2)])),
        common::fast_dispatch(),
    );
    let caller = CallerIdentity::new("patient-3");

    for expected in [0, 0, 1] {
        h.pipeline.predict(&caller, "throbbing headache nausea").unwrap();
        assert!(h.pipeline.dispatcher().drain(DRAIN).await);
        assert_eq!(h.notifier.count_of(NotificationKind::RecurringPattern), expected);
    }
}

#[tokio::test]
async fn test_recurring_pattern_without_waiting_between_predictions() {
    let h = common::harness(
        Some(common::fixed_vote_bundle(&[("Migraine", 8), ("Acne", 2)])),
        common::fast_dispatch(),
    );
    h.history.fail_next(1);
    let caller = CallerIdentity::new("patient-8");

    for _ in 0..3 {
        h.pipeline.predict(&caller, "throbbing headache nausea").unwrap();
    }
    assert!(h.pipeline.dispatcher().drain(DRAIN).await);

    assert_eq!(h.history.predictions_for("patient-8").len(), 3);
    assert_eq!(h.notifier.count_of(NotificationKind::RecurringPattern), 1);
}

#[tokio::test]
async fn test_side_effect_failures_do_not_fail_prediction() {
    let h = common::harness(
        Some(common::fixed_vote_bundle(&[("Migraine", 8), ("Acne", 2)])),
        DispatchConfig {
            max_retries: 0,
            ..common::fast_dispatch()
        },
    );
    h.history.fail_next(100);
    h.notifier.fail_next(100);

    let response = h
        .pipeline
        .predict(&CallerIdentity::new("patient-4"), "throbbing headache")
        .unwrap();
    assert_eq!(response.disease, "Migraine");

    assert!(h.pipeline.dispatcher().drain(DRAIN).await);
    assert!(h.history.predictions_for("patient-4").is_empty());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_full_queue_does_not_fail_prediction() {
    let h = common::harness(
        Some(common::fixed_vote_bundle(&[("Migraine", 8), ("Acne", 2)])),
        DispatchConfig {
            queue_size: 1,
            worker_threads: 1,
            max_retries: 0,
            retry_backoff_ms: 1,
        },
    );

    for _ in 0..20 {
        let response = h
            .pipeline
            .predict(&CallerIdentity::new("patient-5"), "throbbing headache")
            .unwrap();
        assert_eq!(response.disease, "Migraine");
    }
    assert!(h.pipeline.dispatcher().drain(DRAIN).await);
}

#[tokio::test]
async fn test_invalid_input_has_no_side_effects() {
    let h = common::harness(
        Some(common::fixed_vote_bundle(&[("Migraine", 8), ("Acne", 2)])),
        common::fast_dispatch(),
    );

    for input in ["x", "  ", "the and of"] {
        let err = h
            .pipeline
            .predict(&CallerIdentity::new("patient-6"), input)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)), "input {:?}", input);
    }

    assert!(h.pipeline.dispatcher().drain(DRAIN).await);
    assert_eq!(h.history.prediction_count(), 0);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_uninitialized_model_is_unavailable() {
    let h = common::harness(None, common::fast_dispatch());
    let err = h
        .pipeline
        .predict(&CallerIdentity::anonymous(), "fever and chills")
        .unwrap_err();
    assert!(matches!(err, AppError::ModelUnavailable(_)));
}

#[tokio::test]
async fn test_identical_inputs_give_identical_responses() {
    let h = common::harness(
        Some(common::fixed_vote_bundle(&[
            ("Influenza (Flu)", 72),
            ("Common Cold", 28),
        ])),
        common::fast_dispatch(),
    );
    let caller = CallerIdentity::new("patient-7");

    let first = h.pipeline.predict(&caller, "fever headache").unwrap();
    let second = h.pipeline.predict(&caller, "fever headache").unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn test_trained_model_through_pipeline() {
    let artifact = symptom_triage::ml::train_artifact(
        &symptom_triage::catalogue::Catalogue::builtin().unwrap(),
        &common::small_training_config(),
    )
    .unwrap();
    let bundle = symptom_triage::ml::ModelBundle::new(
        artifact,
        symptom_triage::catalogue::Catalogue::builtin().unwrap(),
    )
    .unwrap();
    let h = common::harness(Some(bundle), common::fast_dispatch());

    let response = h
        .pipeline
        .predict(&CallerIdentity::anonymous(), "high fever chills body aches fatigue")
        .unwrap();
    assert!((0.0..=1.0).contains(&response.confidence));
    assert!(response.recommended_doctors.len() <= 3);
    assert!(!response.precautions.is_empty());
}
