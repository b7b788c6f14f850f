//! skyaudit CLI
//!
//! Scans a cloud inventory for vulnerabilities and, on request, enriches
//! every finding with an AI-generated remediation backed by a vector
//! knowledge base of past fixes.
//!
//! # Usage
//! ```bash
//! # Scan two service groups against a local inventory export
//! skyaudit scan --snapshot export.json --services ec2,s3
//!
//! # Live scan with AI remediation, findings as JSON
//! skyaudit scan --region eu-west-1 --ai-remediation --output json
//!
//! # Show the rule catalog
//! skyaudit rules
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use skyaudit::config::{mask_key, Config};
use skyaudit::deadline::Deadline;
use skyaudit::engine::Scanner;
use skyaudit::inventory::{
    Inventory, RateLimiter, ResourceProvider, RestInventoryProvider, SnapshotProvider,
};
use skyaudit::knowledge::QdrantKnowledgeStore;
use skyaudit::output::{self, OutputFormat};
use skyaudit::remediation::{
    EmbeddingClient, LlmBackend, OllamaBackend, OpenAiBackend, Remediator,
};
use skyaudit::rules;

#[derive(Parser)]
#[command(name = "skyaudit")]
#[command(about = "Cloud security auditor with AI-powered remediation", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.skyaudit/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan cloud resources for vulnerabilities
    Scan {
        /// Region to scan
        #[arg(long, env = "SKYAUDIT_REGION")]
        region: Option<String>,

        /// Comma-separated service groups to scan (ec2,s3,iam); default all
        #[arg(long)]
        services: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,

        /// Write findings to this file instead of stdout
        #[arg(long)]
        output_file: Option<PathBuf>,

        /// Enable AI-driven remediation suggestions for findings
        #[arg(short, long)]
        ai_remediation: bool,

        /// Audit a local inventory export instead of the live API
        #[arg(long, env = "SKYAUDIT_SNAPSHOT")]
        snapshot: Option<PathBuf>,

        /// Scan deadline in minutes
        #[arg(long)]
        timeout_mins: Option<u64>,
    },

    /// List the registered rule catalog
    Rules,

    /// Write the configuration file interactively
    Configure,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so table/json/csv output stays pipeable.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan {
            region,
            services,
            output,
            output_file,
            ai_remediation,
            snapshot,
            timeout_mins,
        } => {
            if let Some(region) = region {
                config.region = region;
            }
            if let Some(path) = snapshot {
                config.inventory.snapshot = Some(path);
            }
            if let Some(mins) = timeout_mins {
                config.scan.timeout_mins = mins;
            }
            let selected = parse_services(services.as_deref())?;
            run_scan(config, selected, output, output_file.as_deref(), ai_remediation).await
        }

        Commands::Rules => {
            list_rules();
            Ok(())
        }

        Commands::Configure => run_configure(cli.config, config),
    }
}

async fn run_scan(
    config: Config,
    selected_services: Vec<String>,
    format: OutputFormat,
    output_file: Option<&Path>,
    ai_remediation: bool,
) -> Result<()> {
    config.validate()?;

    let deadline = Deadline::after(Duration::from_secs(config.scan.timeout_mins * 60));
    let limiter = Arc::new(RateLimiter::new(
        config.inventory.rate_per_sec,
        config.inventory.burst,
    ));

    let provider: Box<dyn ResourceProvider> = match &config.inventory.snapshot {
        Some(path) => {
            info!(path = %path.display(), "Auditing local inventory snapshot");
            Box::new(SnapshotProvider::load(path)?)
        }
        None => {
            let token = match std::env::var(&config.inventory.token_env) {
                Ok(token) if !token.is_empty() => Some(token),
                _ => {
                    warn!(
                        variable = %config.inventory.token_env,
                        "Inventory token variable not set, calling the API unauthenticated"
                    );
                    None
                }
            };
            Box::new(RestInventoryProvider::new(&config.inventory.endpoint, token)?)
        }
    };
    let inventory = Arc::new(Inventory::new(provider, limiter));

    let mut scanner = Scanner::new(inventory, config.region.clone());
    for rule in rules::default_rules() {
        if selected_services.is_empty()
            || selected_services.contains(&rule.service().to_ascii_lowercase())
        {
            scanner.register(rule);
        }
    }
    if scanner.rules().is_empty() {
        bail!("No rules selected");
    }

    let mut findings = scanner
        .run_scan(deadline)
        .await
        .context("Scan did not complete")?;

    if ai_remediation {
        info!("Enabling AI-driven remediation suggestions for findings");
        let remediator = build_remediator(&config).await?;
        remediator
            .remediate_all(deadline, &mut findings, config.scan.remediation_concurrency)
            .await;
    }

    output::print_findings(&mut findings, format, output_file)
}

async fn build_remediator(config: &Config) -> Result<Remediator> {
    let embedder = Arc::new(EmbeddingClient::new(&config.embedding.url)?);
    let knowledge = Arc::new(
        QdrantKnowledgeStore::connect(
            &config.knowledge.url,
            &config.knowledge.collection,
            config.embedding.dimension,
        )
        .await?,
    );

    // Config validation already constrained the choice to these two.
    let llm: Arc<dyn LlmBackend> = match config.llm.choice.as_str() {
        "openai" => {
            let key = config
                .llm
                .resolved_openai_key()
                .context("OpenAI API key not configured and OPENAI_API_KEY not set")?;
            Arc::new(OpenAiBackend::new(&key, &config.llm.openai_model))
        }
        _ => Arc::new(OllamaBackend::new(
            &config.llm.ollama_url,
            &config.llm.ollama_model,
        )?),
    };

    Ok(Remediator::new(embedder, knowledge, llm).with_top_k(config.scan.top_k))
}

fn parse_services(raw: Option<&str>) -> Result<Vec<String>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let mut selected = Vec::new();
    for part in raw.split(',') {
        let service = part.trim().to_ascii_lowercase();
        if service.is_empty() {
            continue;
        }
        match service.as_str() {
            "ec2" | "s3" | "iam" => {
                if !selected.contains(&service) {
                    selected.push(service);
                }
            }
            other => bail!("Unknown service '{other}' (expected ec2, s3, iam)"),
        }
    }
    Ok(selected)
}

fn list_rules() {
    println!(
        "\n{:<28} {:<10} {:<8} {}",
        "NAME", "SEVERITY", "SERVICE", "DESCRIPTION"
    );
    println!("{}", "-".repeat(110));
    for rule in rules::default_rules() {
        println!(
            "{:<28} {:<10} {:<8} {}",
            rule.name(),
            rule.severity(),
            rule.service(),
            rule.description()
        );
    }
}

/// Interactive walk over the configurable fields; an empty answer keeps
/// the current value. Mirrors the values `scan` consumes.
fn run_configure(config_path: Option<PathBuf>, mut config: Config) -> Result<()> {
    info!("Starting configuration...");

    let region = prompt("Enter region", &config.region)?;
    if !region.is_empty() {
        config.region = region;
    }

    let endpoint = prompt("Enter inventory API endpoint", &config.inventory.endpoint)?;
    if !endpoint.is_empty() {
        config.inventory.endpoint = endpoint;
    }

    let choice = prompt("Choose LLM provider (ollama/openai)", &config.llm.choice)?.to_lowercase();
    if choice == "ollama" || choice == "openai" {
        config.llm.choice = choice;
    } else if !choice.is_empty() {
        warn!(choice = %choice, "Invalid LLM choice, retaining current setting");
    }

    if config.llm.choice == "ollama" {
        let url = prompt("Enter Ollama API URL", &config.llm.ollama_url)?;
        if !url.is_empty() {
            config.llm.ollama_url = url;
        }
        let model = prompt("Enter Ollama model name", &config.llm.ollama_model)?;
        if !model.is_empty() {
            config.llm.ollama_model = model;
        }
    }

    if config.llm.choice == "openai" {
        let key = prompt("Enter OpenAI API key", &mask_key(&config.llm.openai_api_key))?;
        if !key.is_empty() {
            config.llm.openai_api_key = key;
        }
        let model = prompt("Enter OpenAI model name", &config.llm.openai_model)?;
        if !model.is_empty() {
            config.llm.openai_model = model;
        }
    }

    let url = prompt("Enter Qdrant URL", &config.knowledge.url)?;
    if !url.is_empty() {
        config.knowledge.url = url;
    }
    let collection = prompt("Enter Qdrant collection name", &config.knowledge.collection)?;
    if !collection.is_empty() {
        config.knowledge.collection = collection;
    }

    let embedding = prompt("Enter embedding server URL", &config.embedding.url)?;
    if !embedding.is_empty() {
        config.embedding.url = embedding;
    }

    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()
            .context("Could not resolve the home directory for the config file")?,
    };
    config.save(&path)?;
    info!(path = %path.display(), "Configuration saved");
    Ok(())
}

fn prompt(label: &str, current: &str) -> Result<String> {
    print!("{label} (current: {current}): ");
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read input")?;
    Ok(line.trim().to_string())
}
