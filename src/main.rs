//! # casegen CLI
//!
//! The `casegen` binary drives the retrieval-augmented test-case pipeline
//! from the command line and hosts the HTTP API for the authoring UI.
//!
//! ## Usage
//!
//! ```bash
//! casegen --config ./config/casegen.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `casegen init` | Create the vector-index collection |
//! | `casegen ingest <file>` | Ingest a document, replacing the collection |
//! | `casegen query "<prompt>"` | Retrieve top-k context for a prompt |
//! | `casegen generate "<prompt>"` | Retrieve context and generate test cases |
//! | `casegen serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! # Bootstrap the collection
//! casegen init --config ./config/casegen.toml
//!
//! # Ingest a requirements document
//! casegen ingest ./requirements.pdf --config ./config/casegen.toml
//!
//! # Inspect what retrieval would ground a generation on
//! casegen query "password reset" --config ./config/casegen.toml
//!
//! # Generate five test cases around a heading
//! casegen generate "login feature" --count 5 --config ./config/casegen.toml
//!
//! # Serve the HTTP API for the UI
//! casegen serve --config ./config/casegen.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use casegen::server::AppState;
use casegen::{config, ingest, retrieval, server};

/// casegen CLI — retrieval-augmented test case generation for uploaded
/// requirement documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/casegen.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "casegen",
    about = "casegen — retrieval-augmented test case generation",
    version,
    long_about = "casegen ingests an uploaded requirement document, chunks and embeds it into \
    a vector index, and grounds a generative model in the retrieved context to produce \
    structured, validated test cases."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/casegen.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the vector-index collection.
    ///
    /// Creates the configured Qdrant collection with the embedding model's
    /// dimensionality and cosine distance. Idempotent — running it against
    /// an existing collection is safe.
    Init,

    /// Ingest a document into the vector index.
    ///
    /// Extracts text, chunks it, embeds the chunks, and replaces the
    /// collection's previous contents. The index holds one document at a
    /// time.
    Ingest {
        /// Path to the document (pdf, docx, txt, or md).
        file: PathBuf,
    },

    /// Retrieve context snippets for a prompt.
    ///
    /// Embeds the prompt and prints the top-k matching chunks with scores,
    /// in the index's similarity order.
    Query {
        /// The query prompt.
        prompt: String,

        /// Number of snippets to retrieve.
        #[arg(long)]
        k: Option<usize>,
    },

    /// Generate test cases grounded in retrieved context.
    ///
    /// Runs retrieval for the prompt, then asks the generative model for
    /// the requested number of test cases and validates its output.
    Generate {
        /// The generation prompt (e.g. a requirement heading).
        prompt: String,

        /// Number of test cases to request.
        #[arg(long, default_value_t = 5)]
        count: usize,
    },

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// ingest/retrieve/generate endpoints for the authoring UI.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let state = AppState::from_config(cfg)?;
            state.index.ensure_collection().await?;
            println!("Collection '{}' ready.", state.index.collection());
        }
        Commands::Ingest { file } => {
            let state = AppState::from_config(cfg)?;
            state.index.ensure_collection().await?;

            let bytes = std::fs::read(&file)?;
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload")
                .to_string();

            let document = ingest::ingest(
                &state.embedder,
                &state.index,
                &state.config.chunking,
                &bytes,
                &name,
            )
            .await?;

            println!("ingest {}", name);
            println!("  documentId: {}", document.document_id);
            println!("ok");
        }
        Commands::Query { prompt, k } => {
            let state = AppState::from_config(cfg)?;
            let k = k.unwrap_or(state.config.server.top_k);
            let results = retrieval::retrieve(&state.embedder, &state.index, &prompt, k).await?;

            if results.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for result in &results {
                println!("{}. [{:.4}]", result.rank, result.score);
                println!("    {}", result.text.replace('\n', " ").trim());
            }
        }
        Commands::Generate { prompt, count } => {
            let state = AppState::from_config(cfg)?;
            let context = retrieval::retrieve(
                &state.embedder,
                &state.index,
                &prompt,
                state.config.server.top_k,
            )
            .await?;
            let snippets: Vec<String> = context.into_iter().map(|c| c.text).collect();

            let cases = state
                .generator
                .generate_test_cases(&prompt, &snippets, count)
                .await?;

            println!("{}", serde_json::to_string_pretty(&cases)?);
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
