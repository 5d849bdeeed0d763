use std::sync::Arc;
use std::time::Duration;
use symptom_triage::{
    api::{build_router, AppState},
    collaborators::{InMemoryHistory, InMemoryNotifier},
    config::Config,
    ml::{initialize, loader_from_config, BundleHandle},
    pipeline::{SideEffectDispatcher, TriagePipeline},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration before tracing so the log settings apply
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::embedded()?, Some(e)),
    };

    init_tracing(&config);

    if let Some(e) = config_error {
        tracing::warn!(error = %e, "Failed to load configuration, using embedded defaults");
    }

    tracing::info!(
        service = %config.observability.service_name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting symptom triage service"
    );

    if config.observability.prometheus_enabled {
        symptom_triage::metrics::init_metrics();
        tracing::info!("Prometheus metrics initialized");
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // Model bundle; a failure leaves the handle uninitialized and the server degraded
    let bundles = Arc::new(BundleHandle::new());
    let loader = loader_from_config(&config.model);
    if initialize(&bundles, loader.as_ref()).await {
        tracing::info!("Model bundle ready");
    } else {
        tracing::warn!("Serving without a model; predictions will return 503");
    }

    // Collaborators
    let history = Arc::new(InMemoryHistory::new());
    let notifier = Arc::new(InMemoryNotifier::new());
    let dispatcher = Arc::new(SideEffectDispatcher::start(
        &config.dispatch,
        history,
        notifier,
    ));

    let pipeline = Arc::new(TriagePipeline::from_config(
        &config,
        bundles,
        dispatcher.clone(),
    ));

    let app = build_router(AppState::new(pipeline));

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Predict: http://{}/v1/predict", http_addr);
    tracing::info!("   Metrics: http://{}/metrics", http_addr);

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Shutting down gracefully...");
    let grace = Duration::from_secs(config.server.request_timeout_secs);
    if !dispatcher.drain(grace).await {
        tracing::warn!(
            pending = dispatcher.in_flight(),
            "Side effects still pending at shutdown"
        );
    }
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "symptom_triage={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
