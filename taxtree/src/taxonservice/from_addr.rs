use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use url::Url;

use super::{HttpTaxonService, MemoryTaxonService, TaxonService};
use crate::Error;

/// Constructs a new instance of a [TaxonService] from an URI.
///
/// The following URIs are supported:
/// - `memory:`
///   Uses an empty in-memory taxonomy.
/// - `memory:///absolute/path/to/taxonomy.json`
///   Uses an in-memory taxonomy, populated from a JSON list of
///   [super::TaxonEntry].
/// - `http://host[:port]/base/path`, `https://host[:port]/base/path`
///   Talks to the REST API below the given base path. A `timeout_secs`
///   query parameter sets a per-request timeout.
pub async fn from_addr(uri: &str) -> Result<Arc<dyn TaxonService>, Error> {
    let url = Url::parse(uri)
        .map_err(|e| Error::InvalidAddress(format!("unable to parse url: {}", e)))?;

    let taxon_service: Arc<dyn TaxonService> = match url.scheme() {
        "memory" => {
            // memory doesn't support a host, and the path (if any) points to
            // a fixture file.
            if url.has_host() {
                return Err(Error::InvalidAddress("no host allowed".to_string()));
            }

            match url.path() {
                "" => Arc::new(MemoryTaxonService::default()),
                "/" => {
                    return Err(Error::InvalidAddress(
                        "/ is not a taxonomy file".to_string(),
                    ))
                }
                path => {
                    let data = tokio::fs::read(path).await.map_err(|e| {
                        Error::InvalidAddress(format!("unable to read {}: {}", path, e))
                    })?;
                    let svc = MemoryTaxonService::from_json(&data)?;
                    debug!(path, taxa = svc.len(), "loaded taxonomy");
                    Arc::new(svc)
                }
            }
        }
        "http" | "https" => {
            if !url.has_host() {
                return Err(Error::InvalidAddress("host missing".to_string()));
            }

            let mut timeout = None;
            for (k, v) in url.query_pairs() {
                match k.as_ref() {
                    "timeout_secs" => {
                        let secs = v.parse::<u64>().map_err(|e| {
                            Error::InvalidAddress(format!("invalid timeout_secs: {}", e))
                        })?;
                        timeout = Some(Duration::from_secs(secs));
                    }
                    other => {
                        return Err(Error::InvalidAddress(format!(
                            "unknown parameter: {}",
                            other
                        )))
                    }
                }
            }

            let mut base_url = url.clone();
            base_url.set_query(None);

            Arc::new(match timeout {
                Some(timeout) => HttpTaxonService::with_timeout(base_url, timeout)?,
                None => HttpTaxonService::new(base_url),
            })
        }
        scheme => {
            return Err(Error::InvalidAddress(format!(
                "unknown scheme: {}",
                scheme
            )))
        }
    };

    Ok(taxon_service)
}
