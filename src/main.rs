//! # Research Harness CLI (`rh`)
//!
//! The `rh` binary drives data collection for a research subject and reads
//! the collected corpus back out.
//!
//! ## Usage
//!
//! ```bash
//! rh --config ./config/rh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rh init` | Create the SQLite database and run schema migrations |
//! | `rh sources` | List registered data sources |
//! | `rh search "<query>"` | Ad-hoc web or news search |
//! | `rh collect --industry .. --region ..` | Run the collection pipeline |
//! | `rh digest <id>` | Print the Markdown digest of a research subject |
//! | `rh summary <id>` | Print collection counts for a research subject |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! rh init --config ./config/rh.toml
//!
//! # Collect everything except statistics APIs
//! rh collect --industry "IT" --region "Moscow" --skip-api
//!
//! # Feed the digest to a model
//! rh digest 3f0c7a0e-... > context.md
//! ```
//!
//! Logs go to stderr and are filtered by `RUST_LOG`
//! (default `research_harness=info`, or `debug` with `--verbose`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use research_harness::pipeline::StageFlags;
use research_harness::{collect, config, migrate, report, sources};
use research_harness_core::models::ResearchSubject;

/// Research Harness CLI: web, news, and statistics collection for market
/// research.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rh.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rh",
    about = "Research Harness — data collection for market research",
    version,
    long_about = "Research Harness searches the web, scrapes competitor pages, collects news, \
    queries statistics APIs, and verifies the results, storing everything in SQLite for \
    later digesting by a language model."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rh.toml`. Database, search provider, and
    /// collection limits are read from this file.
    #[arg(long, global = true, default_value = "./config/rh.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `data_sources` and
    /// `collected_records` tables. Running it again is safe.
    Init,

    /// List registered data sources.
    Sources,

    /// Search the web without storing anything.
    ///
    /// Uses the free provider first and falls back to the paid one when a
    /// key is configured (or the reverse with `search.prefer_secondary`).
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Search news instead of general web results.
        #[arg(long)]
        news: bool,
    },

    /// Run the collection pipeline for a research subject.
    Collect {
        /// Industry to research (e.g. `IT`, `retail`).
        #[arg(long)]
        industry: String,

        /// Region to research (e.g. `Moscow`).
        #[arg(long)]
        region: String,

        /// Optional product description; feeds keyword extraction.
        #[arg(long, default_value = "")]
        product: String,

        /// Reuse an existing research id instead of generating one.
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        skip_search: bool,
        #[arg(long)]
        skip_scraping: bool,
        #[arg(long)]
        skip_news: bool,
        #[arg(long)]
        skip_api: bool,
        #[arg(long)]
        skip_verification: bool,

        /// Print the full run result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the Markdown digest of everything collected for a subject.
    Digest {
        /// Research subject id.
        id: String,
    },

    /// Print collection counts for a subject.
    Summary {
        /// Research subject id.
        id: String,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "research_harness=debug"
    } else {
        "research_harness=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg).await?;
        }
        Commands::Search { query, limit, news } => {
            collect::run_search(&cfg, &query, limit, news).await?;
        }
        Commands::Collect {
            industry,
            region,
            product,
            id,
            skip_search,
            skip_scraping,
            skip_news,
            skip_api,
            skip_verification,
            json,
        } => {
            let mut subject = ResearchSubject::new(industry, region, product);
            if let Some(id) = id {
                subject.id = id;
            }
            let flags = StageFlags {
                search: !skip_search,
                scraping: !skip_scraping,
                news: !skip_news,
                api: !skip_api,
                verification: !skip_verification,
            };
            collect::run_collect(&cfg, subject, flags, json).await?;
        }
        Commands::Digest { id } => {
            report::run_digest(&cfg, &id).await?;
        }
        Commands::Summary { id, json } => {
            report::run_summary(&cfg, &id, json).await?;
        }
    }

    Ok(())
}
