use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;

/// Browses a remote taxonomy from the command line.
///
/// Everything goes through the same lazy tree store a graphical client
/// would use: children are fetched on expansion, rank listings are paged.
#[derive(Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// A global log level to use when printing logs.
    /// It's also possible to set `RUST_LOG` according to
    /// `tracing_subscriber::filter::EnvFilter`, which will always have
    /// priority.
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// Where the taxonomy is served from. Accepts `http(s)://` base URLs of
    /// the REST API, `memory://` and `memory:///path/to/taxonomy.json`.
    #[arg(long, env, default_value = "http://localhost:8000/api/")]
    pub taxon_service_addr: String,

    /// Path to a JSON file with tree store settings.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Prints the tree below a taxon.
    Tree {
        taxid: String,

        /// How many levels to expand.
        #[arg(long, short, default_value_t = 1)]
        depth: usize,

        /// Additionally expands the lineage of this taxon.
        #[arg(long)]
        reveal: Option<String>,

        /// Highlights taxa matching this query.
        #[arg(long)]
        highlight: Option<String>,
    },
    /// Prints how many taxa exist per rank.
    Ranks,
    /// Lists all taxa of a rank, most annotated first.
    ByRank {
        rank: String,

        /// How many pages to load.
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Looks up taxa by name or taxid.
    Search { query: String },
    /// Prints the lineage of a taxon, from the root down.
    Lineage { taxid: String },
}
