use anyhow::Context;
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use symptom_triage::{
    catalogue::Catalogue,
    collaborators::{InMemoryHistory, InMemoryNotifier},
    config::Config,
    ml::{train_artifact, BundleHandle, ModelArtifact, ModelBundle},
    pipeline::{SideEffectDispatcher, TriagePipeline},
};

#[derive(Parser)]
#[command(name = "triage-cli")]
#[command(about = "Symptom triage CLI", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model from the catalogue and write the artifact
    Train {
        /// Catalogue TOML; the built-in catalogue when omitted
        #[arg(short, long)]
        catalogue: Option<PathBuf>,

        /// Artifact output path; defaults to model.artifact_path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the training seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Override the number of trees
        #[arg(short = 'n', long)]
        trees: Option<usize>,
    },

    /// Ask a running server for a prediction
    Predict {
        #[arg(value_name = "SYMPTOMS")]
        symptoms: String,

        /// Caller id sent as x-user-id
        #[arg(short, long, env = "TRIAGE_USER_ID")]
        user: Option<String>,
    },

    /// Classify locally from a saved artifact, without a server
    Classify {
        #[arg(value_name = "SYMPTOMS")]
        symptoms: String,

        /// Artifact path; defaults to model.artifact_path
        #[arg(short, long)]
        artifact: Option<PathBuf>,

        /// Catalogue TOML; the built-in catalogue when omitted
        #[arg(short, long)]
        catalogue: Option<PathBuf>,
    },

    /// List practitioners, optionally for one specialty
    Doctors {
        #[arg(short, long)]
        specialty: Option<String>,
    },

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Train {
            catalogue,
            output,
            seed,
            trees,
        } => {
            let config = Config::load()?;
            let mut training = config.model.training.clone();
            if let Some(seed) = seed {
                training.seed = seed;
            }
            if let Some(trees) = trees {
                training.n_trees = trees;
            }

            let catalogue =
                Catalogue::load(catalogue.as_deref()).context("failed to load catalogue")?;
            println!(
                "Training on {} diseases ({} trees, seed {})...",
                catalogue.diseases().len(),
                training.n_trees,
                training.seed
            );

            let artifact =
                tokio::task::spawn_blocking(move || train_artifact(&catalogue, &training))
                    .await??;

            let output = output.unwrap_or(config.model.artifact_path);
            let fingerprint = artifact
                .save(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;

            let metadata = &artifact.metadata;
            println!("Artifact written to {}", output.display());
            println!("  Fingerprint: {}", fingerprint);
            println!("  Vocabulary:  {} terms", metadata.n_features);
            println!("  Labels:      {}", metadata.n_labels);
            println!(
                "  Samples:     {} train / {} test",
                metadata.n_training_samples, metadata.n_test_samples
            );
            if let Some(metrics) = &metadata.validation_metrics {
                println!("  Accuracy:    {:.4}", metrics.accuracy);
                println!("  Macro F1:    {:.4}", metrics.f1_score);
            }
        }

        Commands::Predict { symptoms, user } => {
            let mut request = client
                .post(format!("{}/v1/predict", cli.endpoint))
                .json(&json!({ "symptoms": symptoms }));
            if let Some(user) = user {
                request = request.header("x-user-id", user);
            }

            let response = request
                .send()
                .await
                .with_context(|| format!("failed to reach {}", cli.endpoint))?;
            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Classify {
            symptoms,
            artifact,
            catalogue,
        } => {
            let config = Config::load()?;
            let artifact_path = artifact.unwrap_or_else(|| config.model.artifact_path.clone());
            let catalogue =
                Catalogue::load(catalogue.as_deref()).context("failed to load catalogue")?;
            let artifact = ModelArtifact::load(&artifact_path)
                .with_context(|| format!("failed to read {}", artifact_path.display()))?;
            let bundle = ModelBundle::new(artifact, catalogue)?;

            let dispatcher = SideEffectDispatcher::start(
                &config.dispatch,
                Arc::new(InMemoryHistory::new()),
                Arc::new(InMemoryNotifier::new()),
            );
            let pipeline = TriagePipeline::from_config(
                &config,
                Arc::new(BundleHandle::ready(bundle)),
                Arc::new(dispatcher),
            );

            let response = pipeline.triage(&symptoms)?.to_response();
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Doctors { specialty } => {
            let url = match specialty {
                Some(specialty) => format!("{}/v1/doctors/{}", cli.endpoint, specialty),
                None => format!("{}/v1/doctors", cli.endpoint),
            };

            let response = client.get(&url).send().await?;
            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
