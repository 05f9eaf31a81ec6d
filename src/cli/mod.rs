//! Command-line interface for quill.
//!
//! Provides commands for running the content pipeline, working with image
//! prompts and placement plans, and inspecting recorded runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters::{LocalAssetStore, OpenAiImageGenerator, OpenAiTextGenerator};
use crate::config::{ConfigCache, ResolvedConfig};
use crate::core::{
    default_placement, optimize, synthesize, validate, ContentPipeline, ImageClient,
    PipelineOutcome, ProgressEmitter, RunLog,
};
use crate::domain::{ContentStyle, CreationConfig, Insight, Placement, PlacementSource};

/// quill - Illustrated article generation pipeline
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate an illustrated article from an insight
    Generate {
        /// Insight document (YAML or JSON)
        #[arg(short, long)]
        insight: PathBuf,

        /// Creation config document (YAML or JSON)
        #[arg(short, long)]
        creation: Option<PathBuf>,

        /// Skip placement analysis and image generation
        #[arg(long)]
        no_images: bool,

        /// Content style tag (e.g. 专业严谨, casual)
        #[arg(short, long)]
        style: Option<String>,

        /// Do not record the run log
        #[arg(long)]
        no_log: bool,
    },

    /// Work with image prompts
    Prompt {
        #[command(subcommand)]
        command: PromptCommands,
    },

    /// Print the index-based placement plan for an article file
    Placement {
        /// Article body (paragraphs separated by blank lines)
        file: PathBuf,
    },

    /// Inspect recorded runs
    Runs {
        #[command(subcommand)]
        command: RunsCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum PromptCommands {
    /// Check a prompt against the quality rules
    Validate {
        /// Prompt text
        text: String,
    },

    /// Append missing quality terms and tidy separators
    Optimize {
        /// Prompt text
        text: String,
    },

    /// Build a prompt from a scene description
    Synthesize {
        /// Scene description
        #[arg(long)]
        scene: String,

        /// Emotional tone of the scene
        #[arg(long, default_value = "")]
        emotion: String,

        /// Visual keywords (comma-separated)
        #[arg(short, long, default_value = "")]
        keywords: String,

        /// Content style tag
        #[arg(short, long, default_value = "专业严谨")]
        style: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum RunsCommands {
    /// List recorded runs
    List {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Replay the event log of a run
    Show {
        /// Run ID (UUID)
        run_id: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let configs = ConfigCache::from_current_dir()?;

        match self.command {
            Commands::Generate {
                insight,
                creation,
                no_images,
                style,
                no_log,
            } => {
                let config = configs.get()?;
                generate(&config, &insight, creation.as_deref(), no_images, style, no_log).await
            }
            Commands::Prompt { command } => execute_prompt(command),
            Commands::Placement { file } => show_placement(&file).await,
            Commands::Runs { command } => {
                let config = configs.get()?;
                match command {
                    RunsCommands::List { limit } => list_runs(&config, limit).await,
                    RunsCommands::Show { run_id } => show_run(&config, &run_id).await,
                }
            }
            Commands::Config => config_command(&configs),
        }
    }
}

/// Read a YAML or JSON document
fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse document: {}", path.display()))
}

/// Run the pipeline, streaming events to stdout as JSON lines
async fn generate(
    config: &ResolvedConfig,
    insight_path: &Path,
    creation_path: Option<&Path>,
    no_images: bool,
    style: Option<String>,
    no_log: bool,
) -> Result<()> {
    let insight: Insight = read_document(insight_path)?;
    let mut creation: CreationConfig = match creation_path {
        Some(path) => read_document(path)?,
        None => CreationConfig::default(),
    };

    if creation.text_model.trim().is_empty() {
        creation.text_model = config.provider.text_model.clone();
    }
    if no_images {
        creation.enable_images = false;
    }
    if let Some(tag) = style {
        creation.style = ContentStyle::from_tag(&tag);
    }

    let settings = config.provider_settings();
    let image_model = creation
        .image_model
        .clone()
        .unwrap_or_else(|| config.provider.image_model.clone());

    let text_generator = Arc::new(OpenAiTextGenerator::new(settings.clone())?);
    let image_generator = Arc::new(OpenAiImageGenerator::new(settings, image_model)?);
    let store = Arc::new(LocalAssetStore::new(
        &config.assets_dir,
        config.request_timeout(),
    )?);

    let image_client = ImageClient::new(image_generator)
        .with_store(store)
        .with_retry(config.images.retry.clone())
        .with_batch(config.batch_settings());
    let pipeline = ContentPipeline::new(text_generator, image_client)
        .with_request_timeout(config.request_timeout())
        .with_image_size(config.images.size);

    let run_log = if no_log {
        None
    } else {
        Some(RunLog::open(&config.runs_dir(), Uuid::new_v4()).await?)
    };
    if let Some(log) = &run_log {
        info!(run_id = %log.run_id(), "Recording run");
    }

    let cancel = CancellationToken::new();
    let (emitter, mut events) = ProgressEmitter::channel(cancel.clone());

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            interrupt.cancel();
        }
    });

    let run = async move {
        let outcome = pipeline.run(&insight, &creation, &emitter).await;
        drop(emitter);
        outcome
    };

    let forward = async {
        let mut stdout = tokio::io::stdout();
        while let Some(event) = events.recv().await {
            let line = serde_json::to_string(&event).context("Failed to serialize event")?;
            stdout.write_all(format!("{}\n", line).as_bytes()).await?;
            stdout.flush().await?;
            if let Some(log) = &run_log {
                log.append(&event).await?;
            }
        }
        Ok::<_, anyhow::Error>(())
    };

    let (outcome, forwarded) = tokio::join!(run, forward);
    forwarded?;

    match outcome {
        PipelineOutcome::Completed(payload) => {
            if let Some(log) = &run_log {
                let path = log.store_output(&payload).await?;
                eprintln!("\n[Run {} completed: {}]", log.run_id(), path.display());
            }
            Ok(())
        }
        PipelineOutcome::Failed { stage, error } => {
            Err(error).with_context(|| format!("Content generation failed during {:?}", stage))
        }
        PipelineOutcome::Cancelled { stage } => {
            anyhow::bail!("Content generation was cancelled during {:?}", stage)
        }
    }
}

fn execute_prompt(command: PromptCommands) -> Result<()> {
    match command {
        PromptCommands::Validate { text } => {
            let report = validate(&text);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.valid {
                std::process::exit(1);
            }
        }
        PromptCommands::Optimize { text } => {
            println!("{}", optimize(&text));
        }
        PromptCommands::Synthesize {
            scene,
            emotion,
            keywords,
            style,
        } => {
            let placement = Placement {
                paragraph_index: 0,
                paragraph_summary: String::new(),
                scene_description: scene,
                visual_keywords: keywords
                    .split([',', '，'])
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(String::from)
                    .collect(),
                emotion,
                reasoning: String::new(),
                prompt: None,
                source: PlacementSource::Heuristic,
            };
            println!("{}", synthesize(&placement, &ContentStyle::from_tag(&style)));
        }
    }
    Ok(())
}

async fn show_placement(file: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let plan = default_placement(&text);
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

async fn list_runs(config: &ResolvedConfig, limit: usize) -> Result<()> {
    let runs = RunLog::list_runs(&config.runs_dir()).await?;

    if runs.is_empty() {
        println!("No runs found");
        return Ok(());
    }

    let mut rows = Vec::with_capacity(runs.len());
    for run_id in runs {
        let log = RunLog::open(&config.runs_dir(), run_id).await?;
        let events = log.replay().await?;
        let started = events.first().map(|r| r.timestamp);
        let state = match events.iter().rev().map(|r| &r.event).find(|e| e.is_terminal()) {
            Some(event) => event.kind(),
            None if events.is_empty() => "empty",
            None => "incomplete",
        };
        rows.push((started, run_id, state));
    }
    rows.sort_by(|a, b| b.0.cmp(&a.0));

    println!("{:<38} {:<22} {:<12}", "RUN ID", "STARTED", "STATE");
    println!("{}", "-".repeat(72));

    for (started, run_id, state) in rows.into_iter().take(limit) {
        let started = started
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<38} {:<22} {:<12}", run_id, started, state);
    }

    Ok(())
}

async fn show_run(config: &ResolvedConfig, run_id_str: &str) -> Result<()> {
    let run_id = Uuid::parse_str(run_id_str)
        .with_context(|| format!("Invalid run ID: {}", run_id_str))?;

    let run_dir = config.runs_dir().join(run_id.to_string());
    if !run_dir.exists() {
        anyhow::bail!("Run not found: {}", run_id);
    }

    let log = RunLog::open(&config.runs_dir(), run_id).await?;
    for record in log.replay().await? {
        println!(
            "{} {}",
            record.timestamp.format("%H:%M:%S%.3f"),
            serde_json::to_string(&record.event)?
        );
    }

    if let Some(output) = log.load_output().await? {
        eprintln!(
            "\n[{}: {} words, {} min read, {} images]",
            output.content.title,
            output.content.word_count,
            output.content.reading_time_minutes,
            output.images.len()
        );
    }

    Ok(())
}

fn config_command(configs: &ConfigCache) -> Result<()> {
    let config = configs.get()?;
    show_config(&config)
}

fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    println!("Quill Configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:   {}", cfg.home.display());
    println!("  Runs:   {}", cfg.runs_dir().display());
    println!("  Assets: {}", cfg.assets_dir.display());
    println!();
    println!("Provider:");
    println!("  Base URL:    {}", cfg.provider.base_url);
    println!(
        "  API key:     {}",
        if cfg.provider.api_key.is_some() { "set" } else { "(not set)" }
    );
    println!("  Text model:  {}", cfg.provider.text_model);
    println!("  Image model: {}", cfg.provider.image_model);
    println!("  Timeout:     {}s", cfg.provider.request_timeout_seconds);
    println!();
    println!("Images:");
    println!("  Concurrency: {}", cfg.images.concurrency);
    println!("  Batch delay: {}ms", cfg.images.batch_delay_ms);
    println!(
        "  Retries:     {} (base delay {}ms)",
        cfg.images.retry.max_retries, cfg.images.retry.base_delay_ms
    );
    println!("  Size:        {}", cfg.images.size);
    println!("  Placeholder: {}", cfg.images.placeholder_url);

    Ok(())
}
