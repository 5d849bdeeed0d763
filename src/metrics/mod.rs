/// Prometheus metrics for the triage service.
///
/// All metrics live in one registry under the `symptom_triage` namespace and
/// are exposed at `GET /metrics`.
///
/// # Example
/// ```no_run
/// use symptom_triage::metrics::PREDICTIONS_TOTAL;
///
/// PREDICTIONS_TOTAL.with_label_values(&["HIGH"]).inc();
/// ```

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::sync::Once;

const NAMESPACE: &str = "symptom_triage";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Successful predictions
    ///
    /// Labels: risk
    pub static ref PREDICTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("predictions_total", "Total number of successful predictions")
            .namespace(NAMESPACE),
        &["risk"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Rejected or failed predictions
    ///
    /// Labels: kind (invalid_input, model_unavailable, internal)
    pub static ref PREDICTION_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("prediction_errors_total", "Total number of failed predictions")
            .namespace(NAMESPACE),
        &["kind"]
    ).expect("Failed to create PREDICTION_ERRORS_TOTAL metric");

    /// End-to-end pipeline latency, side effects excluded
    pub static ref PREDICTION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "prediction_duration_seconds",
            "Prediction pipeline duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0])
    ).expect("Failed to create PREDICTION_DURATION_SECONDS metric");

    /// Outcome of fire-and-forget side effects
    ///
    /// Labels: effect (history, ehr, notification), outcome (delivered, retried, failed, dropped)
    pub static ref SIDE_EFFECTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("side_effects_total", "Total number of side-effect attempts by outcome")
            .namespace(NAMESPACE),
        &["effect", "outcome"]
    ).expect("Failed to create SIDE_EFFECTS_TOTAL metric");

    /// Predicted labels that had no entry in the risk table
    pub static ref UNKNOWN_LABEL_WARNINGS_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new(
            "unknown_label_warnings_total",
            "Predictions whose label was missing from the risk table"
        )
        .namespace(NAMESPACE)
    ).expect("Failed to create UNKNOWN_LABEL_WARNINGS_TOTAL metric");

    /// 1 when a model bundle is loaded, 0 otherwise
    pub static ref MODEL_READY: Gauge = Gauge::with_opts(
        Opts::new("model_ready", "Whether the model bundle is loaded").namespace(NAMESPACE)
    ).expect("Failed to create MODEL_READY metric");

    /// Build information
    ///
    /// Labels: version
    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Build information").namespace(NAMESPACE),
        &["version"]
    ).expect("Failed to create BUILD_INFO metric");
}

static INIT: Once = Once::new();

/// Register every metric with the global registry; safe to call repeatedly
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(PREDICTIONS_TOTAL.clone()),
            Box::new(PREDICTION_ERRORS_TOTAL.clone()),
            Box::new(PREDICTION_DURATION_SECONDS.clone()),
            Box::new(SIDE_EFFECTS_TOTAL.clone()),
            Box::new(UNKNOWN_LABEL_WARNINGS_TOTAL.clone()),
            Box::new(MODEL_READY.clone()),
            Box::new(BUILD_INFO.clone()),
        ];
        for collector in collectors {
            if let Err(e) = PROMETHEUS_REGISTRY.register(collector) {
                tracing::warn!(error = %e, "Failed to register metric");
            }
        }

        BUILD_INFO
            .with_label_values(&[env!("CARGO_PKG_VERSION")])
            .set(1.0);
    });
}

/// Render the registry in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record the outcome of one side-effect attempt
pub fn record_side_effect(effect: &str, outcome: &str) {
    SIDE_EFFECTS_TOTAL.with_label_values(&[effect, outcome]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_metrics();
        init_metrics();
        PREDICTIONS_TOTAL.with_label_values(&["LOW"]).inc();
        let output = gather_metrics();
        assert!(output.contains("symptom_triage_predictions_total"));
        assert!(output.contains("symptom_triage_build_info"));
    }

    #[test]
    fn test_side_effect_counter() {
        let before = SIDE_EFFECTS_TOTAL
            .with_label_values(&["history", "delivered"])
            .get();
        record_side_effect("history", "delivered");
        let after = SIDE_EFFECTS_TOTAL
            .with_label_values(&["history", "delivered"])
            .get();
        assert!(after >= before + 1.0);
    }
}
