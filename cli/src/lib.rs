use std::io::Write;
use std::path::Path;

use futures::future::join_all;
use taxtree::search::SearchState;
use taxtree::store::{TreeStore, TreeStoreConfig};
use taxtree::taxonservice;
use tracing::{debug, info, instrument, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

pub mod args;
mod errors;
pub mod render;

pub use args::{Cli, Commands};
pub use errors::Error;

/// Reads a [TreeStoreConfig] from a JSON file.
pub async fn load_config(path: &Path) -> Result<TreeStoreConfig, Error> {
    let data = tokio::fs::read(path).await.map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&data)?)
}

/// Expands every visible node, level by level, until `depth` levels below
/// the roots are shown. Nodes of one level are fetched concurrently.
#[instrument(skip(store), fields(indicatif.pb_show = 1))]
pub async fn expand_levels(store: &TreeStore, depth: usize) {
    let span = Span::current();
    span.pb_set_style(&taxtree_tracing::PB_PROGRESS_STYLE);
    span.pb_set_message("Expanding");
    span.pb_set_length(depth as u64);
    span.pb_start();

    for level in 0..depth {
        let frontier: Vec<String> = store
            .flatten()
            .into_iter()
            .filter(|node| node.level == level)
            .map(|node| node.taxid)
            .collect();
        if frontier.is_empty() {
            break;
        }

        debug!(level, nodes = frontier.len(), "expanding level");
        join_all(frontier.iter().map(|taxid| store.expand(taxid))).await;
        span.pb_inc(1);
    }
}

/// Loads up to `pages` pages of rank roots.
#[instrument(skip(store), fields(indicatif.pb_show = 1), err)]
pub async fn load_rank_pages(store: &TreeStore, rank: &str, pages: usize) -> Result<(), Error> {
    let span = Span::current();
    span.pb_set_style(&taxtree_tracing::PB_PROGRESS_STYLE);
    span.pb_set_message(&format!("Loading {}", rank));
    span.pb_set_length(pages as u64);
    span.pb_start();

    store.set_rank(Some(rank)).await?;
    span.pb_inc(1);

    for _ in 1..pages {
        let has_more = store
            .state()
            .rank_roots()
            .is_some_and(|window| window.has_more());
        if !has_more {
            break;
        }
        store.load_more().await?;
        span.pb_inc(1);
    }
    Ok(())
}

/// Runs a single command, writing its output to `out`.
pub async fn run(cli: Cli, out: &mut (dyn Write + Send)) -> Result<(), Error> {
    let config = match &cli.config {
        Some(path) => load_config(path).await?,
        None => TreeStoreConfig::default(),
    };

    let taxon_service = taxonservice::from_addr(&cli.taxon_service_addr).await?;
    let store = TreeStore::new(taxon_service.clone(), config);

    match cli.command {
        Commands::Tree {
            taxid,
            depth,
            reveal,
            highlight,
        } => {
            if store.load_root(&taxid).await?.is_none() {
                return Err(Error::NotFound(taxid));
            }
            expand_levels(&store, depth).await;
            if let Some(reveal) = reveal {
                store.reveal(&reveal).await?;
            }
            if let Some(query) = highlight {
                store.search().search(&query).await;
            }

            write!(out, "{}", render::tree(&store.flatten()))?;
        }
        Commands::Ranks => {
            let frequencies = taxon_service.rank_frequencies().await?;
            write!(out, "{}", render::frequencies(&frequencies))?;
        }
        Commands::ByRank { rank, pages } => {
            load_rank_pages(&store, &rank, pages).await?;

            let (roots, total) = {
                let state = store.state();
                let total = state.rank_roots().map(|w| w.total()).unwrap_or_default();
                (state.roots().to_vec(), total)
            };
            write!(out, "{}", render::records(&roots))?;
            info!(shown = roots.len(), total, "listed {}", rank);
        }
        Commands::Search { query } => {
            store.search().search(&query).await;
            match store.search().state() {
                SearchState::Results { matched, .. } => {
                    write!(out, "{}", render::records(&matched))?;
                }
                SearchState::NoResults { .. } => info!("no taxa found"),
                SearchState::Failed { query, msg } => {
                    return Err(Error::Search { query, msg });
                }
                SearchState::Idle | SearchState::Pending { .. } => {
                    info!(
                        min_query_len = store.config().search.min_query_len,
                        "query too short"
                    )
                }
            }
        }
        Commands::Lineage { taxid } => {
            let record = taxon_service
                .get(&taxid)
                .await?
                .ok_or_else(|| Error::NotFound(taxid.clone()))?;

            let mut lineage = taxon_service.ancestors(&taxid).await?;
            lineage.push(record);
            write!(out, "{}", render::lineage(&lineage))?;
        }
    }

    out.flush()?;
    Ok(())
}
