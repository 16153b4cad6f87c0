use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use thesis_analysis::{
    config::{Config, LogFormat},
    storage::{AnalysisStore, SqliteStorage},
    AnalysisPipeline, AnalysisRequest, ModelClient, PriorContext,
};

/// Analyze investment theses with a fault-tolerant LLM pipeline
#[derive(Parser)]
#[command(name = "thesis-analysis", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a thesis and print the result as JSON
    Analyze(AnalyzeArgs),
    /// Print a saved analysis
    Show {
        /// Analysis ID
        id: String,
    },
    /// List recent analyses
    List {
        /// Maximum number of analyses to list
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Delete a saved analysis
    Delete {
        /// Analysis ID
        id: String,
    },
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Thesis text
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    thesis: Option<String>,
    /// Read the thesis from a file
    #[arg(long)]
    file: Option<PathBuf>,
    /// Re-analyze using a saved analysis as prior context
    #[arg(long)]
    prior: Option<String>,
    /// Supporting document whose text is passed as context
    #[arg(long)]
    notes: Option<PathBuf>,
    /// Do not save the result
    #[arg(long)]
    no_save: bool,
    /// Print compact JSON
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Thesis analysis starting..."
    );

    match cli.command {
        Command::Analyze(args) => analyze(&config, args).await,
        Command::Show { id } => {
            let storage = open_storage(&config).await?;
            let stored = storage
                .get_analysis(&id)
                .await?
                .with_context(|| format!("Analysis not found: {}", id))?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
            Ok(())
        }
        Command::List { limit } => {
            let storage = open_storage(&config).await?;
            for summary in storage.list_analyses(limit).await? {
                println!(
                    "{}  {}  {:<10}  {:>2} signals{}  {}",
                    summary.id,
                    summary.created_at.format("%Y-%m-%d %H:%M"),
                    summary.mental_model.as_str(),
                    summary.total_signals,
                    if summary.fallback_used { " (fallback)" } else { "" },
                    summary.thesis_preview
                );
            }
            Ok(())
        }
        Command::Delete { id } => {
            let storage = open_storage(&config).await?;
            storage.delete_analysis(&id).await?;
            info!(analysis_id = %id, "Analysis deleted");
            Ok(())
        }
    }
}

async fn analyze(config: &Config, args: AnalyzeArgs) -> anyhow::Result<()> {
    let thesis = match (args.thesis, args.file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read thesis from {}", path.display()))?,
        (None, None) => anyhow::bail!("Provide --thesis or --file"),
    };

    let needs_storage = !args.no_save || args.prior.is_some();
    let storage = if needs_storage {
        Some(open_storage(config).await?)
    } else {
        None
    };

    let mut context = match (&storage, &args.prior) {
        (Some(storage), Some(id)) => {
            let stored = storage
                .get_analysis(id)
                .await?
                .with_context(|| format!("Prior analysis not found: {}", id))?;
            Some(stored.prior_context())
        }
        _ => None,
    };

    if let Some(path) = &args.notes {
        let notes = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read notes from {}", path.display()))?;
        context = Some(context.unwrap_or_default().with_notes(notes));
    }

    let mut request = AnalysisRequest::new(thesis);
    if let Some(context) = context.filter(|c: &PriorContext| !c.is_empty()) {
        request = request.with_prior_context(context);
    }

    if config.model.api_key.is_none() {
        warn!("MODEL_API_KEY is not set, every stage will use its fallback");
    }

    let client = ModelClient::new(&config.model, config.request.clone())?;
    info!(base_url = %config.model.base_url, model = %config.model.model, "Model client initialized");

    let pipeline = AnalysisPipeline::new(Arc::new(client), config);
    let result = pipeline.run(request.clone()).await?;

    if let Some(storage) = storage.as_ref().filter(|_| !args.no_save) {
        match storage.save_analysis(&request, &result).await {
            Ok(id) => info!(analysis_id = %id, "Analysis saved"),
            Err(e) => error!(error = %e, "Failed to save analysis"),
        }
    }

    let output = if args.compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{}", output);
    Ok(())
}

async fn open_storage(config: &Config) -> anyhow::Result<SqliteStorage> {
    match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            Ok(s)
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            Err(e.into())
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
