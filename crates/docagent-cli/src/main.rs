//! docagent command-line interface.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use docagent::core::io;
use docagent::{Agent, ConfigManager, GenerateOptions, OcrOptions, OcrResult, OcrTask, PluginCatalog, ProcessingMode};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docagent")]
#[command(about = "Pluggable document OCR and vision-LLM agent")]
#[command(version)]
struct Cli {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, global = true, default_value = "config/config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize text in an image
    Ocr {
        file: PathBuf,

        /// Use this OCR engine: run directly in fast mode, as the preferred engine in thinking mode
        #[arg(short, long)]
        engine: Option<String>,

        /// Processing mode: fast or thinking
        #[arg(short, long, default_value = "fast")]
        mode: String,

        /// Recognition task: text, formula or table
        #[arg(short, long, default_value = "text")]
        task: String,

        /// JSON schema file for structured extraction (engines that support it)
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Send a prompt to the active LLM provider
    Prompt {
        prompt: String,

        #[arg(long)]
        temperature: Option<f32>,
    },
    /// Probe every loaded plugin
    Health,
    /// List the plugins of a category
    Plugins { category: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigManager::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive(&config.log_level()))),
        )
        .with_writer(std::io::stderr)
        .init();

    for var in config.unresolved_vars() {
        tracing::warn!(variable = %var, "Environment variable referenced in config is not set");
    }

    let agent = Agent::new(config, &PluginCatalog::with_builtins());
    let outcome = run(&agent, cli.command).await;
    agent.shutdown()?;
    outcome
}

async fn run(agent: &Agent, command: Commands) -> Result<()> {
    match command {
        Commands::Ocr {
            file,
            engine,
            mode,
            task,
            schema,
            json,
        } => {
            let mode: ProcessingMode = mode.parse()?;
            let mut options = OcrOptions::with_task(task.parse::<OcrTask>()?);
            if let Some(schema_path) = schema {
                options.schema = Some(load_schema(&schema_path)?);
            }
            io::validate_file_exists(&file)?;

            let result = match ocr_route(engine, mode) {
                OcrRoute::Direct(name) => agent.execute("ocr", &name, &file, &options).await?,
                OcrRoute::Processor(preferred) => {
                    let mut processor = agent.ocr_processor()?.with_options(options);
                    if let Some(name) = preferred {
                        if agent.registry().get_ocr("ocr", &name)?.is_none() {
                            bail!("OCR engine '{}' is not loaded", name);
                        }
                        processor = processor.with_active_engine(name);
                    }
                    processor.process(&file, mode).await?
                }
            };
            print_result(&result, json)?;
        }
        Commands::Prompt { prompt, temperature } => {
            let response = agent.generate(&prompt, &GenerateOptions { temperature }).await?;
            println!("{}", response.text);
            tracing::info!(tokens = response.tokens_used, "Prompt finished");
        }
        Commands::Health => {
            let report = agent.health_report().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Plugins { category } => {
            let plugins = agent.list_plugins(&category).await?;
            if plugins.is_empty() {
                println!("No plugins registered in category '{}'", category);
            }
            for (name, status) in plugins {
                let health = if status.healthy { "healthy" } else { "unhealthy" };
                println!("{:<20} {:<10} {}", name, status.version, health);
            }
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
enum OcrRoute {
    /// Run one engine through the agent, no fallback.
    Direct(String),
    /// Run the processor, optionally overriding the preferred engine.
    Processor(Option<String>),
}

fn ocr_route(engine: Option<String>, mode: ProcessingMode) -> OcrRoute {
    match (engine, mode) {
        (Some(name), ProcessingMode::Fast) => OcrRoute::Direct(name),
        (preferred, _) => OcrRoute::Processor(preferred),
    }
}

fn load_schema(path: &Path) -> Result<Value> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read schema {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse schema {} as JSON", path.display()))
}

fn print_result(result: &OcrResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("{}", result.text);
    eprintln!(
        "engine: {}  confidence: {:.3}",
        result.engine().unwrap_or("unknown"),
        result.confidence
    );
    if let Some(reason) = result.metadata.get("degraded_reason").and_then(|v| v.as_str()) {
        eprintln!("degraded: {}", reason);
    }
    Ok(())
}

/// Map configured level names onto tracing filter directives.
fn filter_directive(level: &str) -> &'static str {
    match level.to_ascii_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}
