use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Taxonomy(#[from] taxtree::Error),

    #[error("unable to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("taxon {0} not found")]
    NotFound(String),

    #[error("search for {query:?} failed: {msg}")]
    Search { query: String, msg: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
