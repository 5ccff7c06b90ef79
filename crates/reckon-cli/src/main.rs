//! reckon - JSON ファイルから評価エンジンを動かす薄い CLI
//!
//! Every command prints JSON on stdout. Outcome files are JSON arrays of
//! task outcomes; they are validated field by field before being recorded.

mod logging;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use reckon_core::{AssessmentContext, EngineConfig, SelfAssessmentEngine, TaskOutcome};

#[derive(Parser)]
#[command(name = "reckon")]
#[command(about = "Progress, blocker and approach assessment for agent task runs", long_about = None)]
#[command(version)]
struct Cli {
    /// Engine configuration (JSON). Missing fields take their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Full assessment and recommendation for one task context
    Assess {
        /// Assessment context (JSON)
        #[arg(long)]
        context: PathBuf,
    },
    /// Classify a task description into a task type
    Classify {
        #[arg(required = true)]
        description: Vec<String>,
    },
    /// Historical insights for a task type
    Insights {
        /// Recorded outcomes (JSON array)
        #[arg(long)]
        outcomes: PathBuf,
        task_type: String,
    },
    /// Recorded outcomes most similar to a description
    Similar {
        #[arg(long)]
        outcomes: PathBuf,
        #[arg(required = true)]
        description: Vec<String>,
    },
    /// Aggregate statistics over recorded outcomes
    Stats {
        #[arg(long)]
        outcomes: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => read_json::<EngineConfig>(path)?,
        None => EngineConfig::default(),
    };
    let engine = SelfAssessmentEngine::builder()
        .config(config)
        .build()
        .context("invalid engine configuration")?;

    match cli.command {
        Command::Assess { context } => {
            let ctx: AssessmentContext = read_json(&context)?;
            let task_id = ctx.task_id.clone();
            let full = engine.get_full_assessment(&task_id, ctx).await;
            print_json(&full)
        }
        Command::Classify { description } => {
            let task_type = engine.classify_task_type(&description.join(" "));
            print_json(&serde_json::json!({ "task_type": task_type }))
        }
        Command::Insights { outcomes, task_type } => {
            load_outcomes(&engine, &outcomes).await?;
            print_json(&engine.get_historical_insights(&task_type).await?)
        }
        Command::Similar {
            outcomes,
            description,
        } => {
            load_outcomes(&engine, &outcomes).await?;
            print_json(&engine.find_similar_tasks(&description.join(" ")).await?)
        }
        Command::Stats { outcomes } => {
            load_outcomes(&engine, &outcomes).await?;
            print_json(&engine.learner_statistics().await?)
        }
    }
}

async fn load_outcomes(engine: &SelfAssessmentEngine, path: &Path) -> Result<()> {
    let values: Vec<Value> = read_json(path)?;
    let count = values.len();
    for (index, value) in values.iter().enumerate() {
        let outcome = TaskOutcome::from_json(value)
            .with_context(|| format!("{}: outcome #{index} is malformed", path.display()))?;
        engine
            .record_outcome(outcome)
            .await
            .with_context(|| format!("{}: outcome #{index} was rejected", path.display()))?;
    }
    info!(path = %path.display(), count, "outcomes loaded");
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
