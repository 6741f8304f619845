//! model-archive 命令行入口
//!
//! 列出或更新项目中的模型归档文件，结果以 JSON 输出到 stdout。

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use model_archive::utils::init_logging;
use model_archive::{BackendKind, EngineConfig, ModelArchive, Operation};
use tracing::debug;

#[derive(Parser)]
#[command(name = "model-archive")]
#[command(version, about = "Inspect and update zip model archives")]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend override: in_memory, streaming_merge or helper
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    /// Log level override, e.g. debug
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the entry tree of each archive
    List {
        /// Directory relative archive names are resolved against
        #[arg(long, default_value = ".")]
        base_dir: PathBuf,
        /// Archive files to list
        archives: Vec<String>,
    },
    /// Apply operations and print the updated entry trees
    Save {
        /// Directory relative archive names are resolved against
        #[arg(long, default_value = ".")]
        base_dir: PathBuf,
        /// JSON file mapping archive names to operation lists
        updates: PathBuf,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    config.ensure_valid()?;
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    init_logging(&config.log_level)?;
    debug!(backend = %config.backend, "Configuration loaded");

    let facade = ModelArchive::new(&config)?;

    match cli.command {
        Commands::List { base_dir, archives } => {
            let contents = facade
                .get_contents_of_archive_files(&base_dir, Some(&archives))
                .await?;
            println!("{}", serde_json::to_string_pretty(&contents)?);
        }
        Commands::Save { base_dir, updates } => {
            let raw = tokio::fs::read_to_string(&updates)
                .await
                .with_context(|| format!("Failed to read updates file {}", updates.display()))?;
            let updates: BTreeMap<String, Vec<Operation>> = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid updates file {}", updates.display()))?;
            let contents = facade
                .save_contents_of_archive_files(&base_dir, &updates)
                .await?;
            println!("{}", serde_json::to_string_pretty(&contents)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        process::exit(1);
    }
}
