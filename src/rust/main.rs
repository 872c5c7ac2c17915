use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::Instant;
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Serialize;

use issue_router::{ArtifactStore, ClassifierError, IssueRouter, RouterConfig, ScoredLabel, UserId};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding model.onnx, vocab.txt and labels.json
    #[arg(short, long)]
    artifacts: Option<PathBuf>,

    /// Probability below which an issue is left unanswered
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Fetch the artifact bundle from this base URL before loading
    #[arg(long)]
    fetch_from: Option<String>,

    /// Also print the top K labels for each input
    #[arg(long, default_value_t = 0)]
    top: usize,

    /// Id of the user filing the issues, recorded in the logs
    #[arg(long, default_value = "cli")]
    user: String,

    /// Issue texts to classify; read from stdin, one per line, when omitted
    texts: Vec<String>,
}

#[derive(Serialize)]
struct Report<'a> {
    query: &'a str,
    best_label: &'a str,
    confidence: f32,
    is_low_confidence: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    top: Vec<ScoredLabel>,
}

fn build_config(args: &Args) -> Result<RouterConfig> {
    let mut config = match &args.config {
        Some(path) => RouterConfig::from_file(path)?,
        None => RouterConfig::default(),
    }
    .with_env_overrides()?;

    if let Some(dir) = &args.artifacts {
        config.artifacts_dir = Some(dir.clone());
    }
    if config.artifacts_dir.is_none() {
        config.artifacts_dir = Some(ArtifactStore::default_artifacts_dir());
    }
    if let Some(threshold) = args.threshold {
        config.confidence_threshold = threshold;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = build_config(&args)?;

    if let Some(base_url) = &args.fetch_from {
        let store = ArtifactStore::from_config(&config).context("Failed to open artifact store")?;
        info!("Fetching artifact bundle from {}", base_url);
        store.fetch_bundle(base_url).await?;
    }

    let start_time = Instant::now();
    info!("Loading classifier...");
    let router = IssueRouter::new(&config)?;
    router.load(&config).await.context("Failed to load classifier")?;
    info!("=== Classifier loaded (took {:.2?}) ===", start_time.elapsed());

    let texts = if args.texts.is_empty() {
        io::stdin().lock().lines().collect::<io::Result<Vec<_>>>()?
    } else {
        args.texts.clone()
    };

    let user = UserId::new(args.user.clone());
    let classify_start = Instant::now();
    let mut classified = 0u32;
    for text in &texts {
        match router.classify_detailed(text, &user).await {
            Ok((outcome, ranked)) => {
                let report = Report {
                    query: text,
                    best_label: &outcome.best_label,
                    confidence: outcome.confidence,
                    is_low_confidence: outcome.is_low_confidence,
                    top: ranked.top(args.top).to_vec(),
                };
                println!("{}", serde_json::to_string(&report)?);
                classified += 1;
            }
            Err(ClassifierError::EmptyInputError) => {
                info!("Skipping input with no tokens");
            }
            Err(e) => return Err(e.into()),
        }
    }

    if classified > 0 {
        info!(
            "Classified {} inputs in {:.2?} (average {:.2?})",
            classified,
            classify_start.elapsed(),
            classify_start.elapsed() / classified
        );
    }
    Ok(())
}
