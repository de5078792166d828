//! lexguard - risk highlighting and agent analysis for legal documents
//!
//! Offline commands work on a JSON file holding document text and risky-word
//! annotations. `analyze` talks to the analysis backend.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lexguard_core::AgentType;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;
mod input;

use commands::OutputFormat;

/// lexguard - legal document risk review
#[derive(Parser, Debug)]
#[command(name = "lexguard")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Where the document and its annotations come from.
#[derive(clap::Args, Debug)]
struct DocumentArgs {
    /// JSON file: a risk analysis response, its payload, or {"text", "words"}
    input: PathBuf,

    /// Read the document text from this file instead of the JSON
    #[arg(long)]
    text: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render the document with risky spans marked
    Highlight {
        #[command(flatten)]
        doc: DocumentArgs,
    },

    /// Risk density, severity and category breakdown
    Stats {
        #[command(flatten)]
        doc: DocumentArgs,
    },

    /// Show the details and suggested alternatives for one annotation
    Inspect {
        #[command(flatten)]
        doc: DocumentArgs,

        /// Annotation id
        id: String,
    },

    /// Replace an annotated word and re-base the remaining annotations
    Replace {
        #[command(flatten)]
        doc: DocumentArgs,

        /// Annotation id
        id: String,

        /// Index of the suggested alternative to apply
        #[arg(short, long, conflicts_with = "with", required_unless_present = "with")]
        alternative: Option<usize>,

        /// Free-form replacement text
        #[arg(long)]
        with: Option<String>,

        /// Write the updated document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch (and optionally run) an agent's analysis from the backend
    Analyze {
        /// Document id
        #[arg(short, long)]
        document: String,

        /// Agent: clause, risk, draft, or summary
        #[arg(short, long, default_value = "risk")]
        agent: AgentType,

        /// Run the agent if no analysis is stored yet, or retry a failed one
        #[arg(long)]
        process: bool,

        /// Run the agent even if an analysis is already stored
        #[arg(long, conflicts_with = "process")]
        reprocess: bool,

        /// Runtime configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the backend base URL
        #[arg(long)]
        base_url: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Highlight { doc } => {
            let document = input::load(&doc.input, doc.text.as_deref())?;
            commands::highlight(&document, cli.format)
        }
        Commands::Stats { doc } => {
            let document = input::load(&doc.input, doc.text.as_deref())?;
            commands::stats(&document, cli.format)
        }
        Commands::Inspect { doc, id } => {
            let document = input::load(&doc.input, doc.text.as_deref())?;
            commands::inspect(&document, &id, cli.format)
        }
        Commands::Replace {
            doc,
            id,
            alternative,
            with,
            output,
        } => {
            let document = input::load(&doc.input, doc.text.as_deref())?;
            let replacement = match (alternative, with) {
                (Some(index), _) => commands::Replacement::Alternative(index),
                (None, Some(text)) => commands::Replacement::Text(text),
                (None, None) => anyhow::bail!("either --alternative or --with is required"),
            };
            commands::replace(&document, &id, replacement, output.as_deref(), cli.format)
        }
        Commands::Analyze {
            document,
            agent,
            process,
            reprocess,
            config,
            base_url,
        } => {
            let mut runtime_config = match config {
                Some(path) => lexguard_runtime::RuntimeConfig::from_yaml_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => lexguard_runtime::RuntimeConfig::default(),
            };
            if let Some(url) = base_url {
                runtime_config.base_url = url;
            }

            let mode = if reprocess {
                commands::AnalyzeMode::Reprocess
            } else if process {
                commands::AnalyzeMode::ProcessIfNeeded
            } else {
                commands::AnalyzeMode::FetchOnly
            };

            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to build tokio runtime")?
                .block_on(commands::analyze(
                    &runtime_config,
                    &document,
                    agent,
                    mode,
                    cli.format,
                ))
        }
    }
}
