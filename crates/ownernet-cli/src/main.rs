//! Ownernet CLI
//!
//! Command-line interface for:
//! - Importing ownership graphs (JSON documents) into `.ownd` snapshots
//! - Expanding the ownership network around a person or company
//! - Looking up and searching entities
//! - Generating deterministic synthetic ownership data and timing expansions

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use ownernet_core::{
    AggregationMode, CancellationToken, Direction, ExpandRequest, ExpansionConfig,
    NetworkExpander, NetworkResult, StoreGraph, StructuralEdgePolicy, DEFAULT_MAX_HOPS,
    DEFAULT_MIN_PERCENTAGE,
};
use ownernet_store::{GraphDocument, OwnershipDB};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod output;
mod perf;
mod synthetic;

#[derive(Parser)]
#[command(name = "ownernet")]
#[command(author, version, about = "Ownernet: ownership-network exploration")]
struct Cli {
    /// Raise log verbosity (`-v` debug, `-vv` trace). `RUST_LOG` wins when set.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a JSON ownership document into a `.ownd` snapshot.
    Import {
        /// Input document (`{ "entities": [...], "relationships": [...] }`)
        input: PathBuf,
        /// Output snapshot
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Export a `.ownd` snapshot back to a JSON document.
    Export {
        input: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Expand the ownership network around a seed entity.
    Expand(ExpandArgs),

    /// Show one entity with its direct ownership counts.
    Show {
        /// Snapshot (`.ownd`) or JSON document
        store: PathBuf,
        id: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Search entities by name (substring, prefix matches first).
    Search {
        /// Snapshot (`.ownd`) or JSON document
        store: PathBuf,
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Generate a deterministic synthetic ownership document.
    Generate(synthetic::GenerateArgs),

    /// Time repeated expansions over a synthetic graph.
    Perf(perf::PerfArgs),
}

#[derive(Args)]
struct ExpandArgs {
    /// Snapshot (`.ownd`) or JSON document
    store: PathBuf,

    /// Seed entity id
    #[arg(long)]
    seed: String,

    /// Hop limit (1..=8)
    #[arg(long, default_value_t = DEFAULT_MAX_HOPS)]
    max_hops: u8,

    /// Minimum effective ownership percentage (0..=50)
    #[arg(long, default_value_t = DEFAULT_MIN_PERCENTAGE)]
    min_percentage: f64,

    /// outgoing (what the seed owns), incoming (who owns the seed) or both
    #[arg(long, default_value = "outgoing")]
    direction: Direction,

    /// strongest (default) or summed
    #[arg(long)]
    mode: Option<AggregationMode>,

    /// Walk board seats and partnerships as 100% links
    #[arg(long)]
    structural: bool,

    /// JSON `ExpansionConfig`; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wall-clock budget in milliseconds (0 disables)
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long)]
    max_nodes: Option<usize>,

    #[arg(long)]
    max_edges: Option<usize>,

    /// Concurrent store fetches per level
    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Also write the JSON result here
    #[arg(short, long)]
    out: Option<PathBuf>,
}

impl ExpandArgs {
    fn config(&self) -> Result<ExpansionConfig> {
        let mut config = match &self.config {
            Some(path) => ExpansionConfig::from_json_file(path)?,
            None => ExpansionConfig::default(),
        };
        if let Some(mode) = self.mode {
            config.aggregation = mode;
        }
        if self.structural {
            config.structural_edges = StructuralEdgePolicy::PassThrough;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(max_nodes) = self.max_nodes {
            config.max_nodes = max_nodes;
        }
        if let Some(max_edges) = self.max_edges {
            config.max_edges = max_edges;
        }
        if let Some(concurrency) = self.concurrency {
            config.fetch_concurrency = concurrency;
        }
        Ok(config)
    }

    fn request(&self) -> ExpandRequest {
        ExpandRequest::new(self.seed.clone())
            .max_hops(self.max_hops)
            .min_percentage(self.min_percentage)
            .direction(self.direction)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "ownernet=debug,ownernet_core=debug,ownernet_store=debug,info",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default.into());
    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry().with(filter).with(fmt).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Import { input, out } => cmd_import(&input, &out),
        Commands::Export { input, out } => cmd_export(&input, &out),
        Commands::Expand(args) => cmd_expand(&args),
        Commands::Show { store, id, format } => cmd_show(&store, &id, format),
        Commands::Search {
            store,
            query,
            limit,
            format,
        } => cmd_search(&store, &query, limit, format),
        Commands::Generate(args) => synthetic::cmd_generate(&args),
        Commands::Perf(args) => perf::cmd_perf(&args),
    }
}

// ============================================================================
// Store loading
// ============================================================================

/// Load a `.ownd` snapshot, or build a store from a `.json` document.
pub(crate) fn load_store(path: &Path) -> Result<OwnershipDB> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let db = if is_json {
        let doc = GraphDocument::from_json_file(path)?;
        OwnershipDB::from_document(&doc)
            .with_context(|| format!("invalid ownership document {}", path.display()))?
    } else {
        OwnershipDB::load(path)?
    };
    debug!(
        path = %path.display(),
        json = is_json,
        entities = db.entity_count(),
        relationships = db.relationship_count(),
        "loaded store"
    );
    Ok(db)
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_import(input: &Path, out: &Path) -> Result<()> {
    println!("{} {}", "Importing".green().bold(), input.display());
    let doc = GraphDocument::from_json_file(input)?;
    let mut db = OwnershipDB::new();
    let stats = db
        .import_document(&doc)
        .with_context(|| format!("invalid ownership document {}", input.display()))?;
    db.save(out)?;
    println!(
        "{} {} entities, {} relationships → {}",
        "ok".green().bold(),
        stats.entities,
        stats.relationships,
        out.display().to_string().bold()
    );
    Ok(())
}

fn cmd_export(input: &Path, out: &Path) -> Result<()> {
    let db = OwnershipDB::load(input)?;
    db.to_document().write_json_file(out)?;
    eprintln!(
        "{} {}",
        "wrote".green().bold(),
        out.display().to_string().bold()
    );
    Ok(())
}

fn cmd_expand(args: &ExpandArgs) -> Result<()> {
    let config = args.config()?;
    let request = args.request();
    let db = load_store(&args.store)?;
    let expander = NetworkExpander::with_config(StoreGraph::new(db), config);

    let rt = runtime()?;
    let result: NetworkResult = rt.block_on(async {
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            }
        });
        let result = expander.expand_with_cancel(&request, &cancel).await;
        watcher.abort();
        result
    })?;

    if let Some(out) = &args.out {
        std::fs::write(out, serde_json::to_string_pretty(&result)?)
            .with_context(|| format!("failed to write {}", out.display()))?;
        eprintln!(
            "{} {}",
            "wrote".green().bold(),
            out.display().to_string().bold()
        );
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Table => print!("{}", output::render_network(&result)),
    }
    Ok(())
}

fn cmd_show(store: &Path, id: &str, format: OutputFormat) -> Result<()> {
    let db = load_store(store)?;
    let summary = db.summary(id).ok_or_else(|| anyhow!("entity `{id}` not found"))?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Table => print!("{}", output::render_summary(&summary)),
    }
    Ok(())
}

fn cmd_search(store: &Path, query: &str, limit: usize, format: OutputFormat) -> Result<()> {
    let db = load_store(store)?;
    let hits = db.search(query, limit);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&hits)?),
        OutputFormat::Table => print!("{}", output::render_hits(query, &hits)),
    }
    Ok(())
}
