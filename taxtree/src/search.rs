use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Deserializer};
use tracing::{debug, instrument, warn};

use crate::taxonservice::TaxonService;
use crate::TaxonRecord;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// How long a query has to stay unchanged before it is sent.
    #[serde(rename = "debounce_ms", deserialize_with = "deserialize_millis")]
    pub debounce: Duration,

    /// Shorter queries clear the search instead of being sent.
    pub min_query_len: usize,

    /// Maximum number of matches requested.
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(400),
            min_query_len: 2,
            limit: 50,
        }
    }
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

/// Where the last search stands.
///
/// [SearchState::Idle] and [SearchState::NoResults] are different things:
/// only a completed search can come back empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchState {
    #[default]
    Idle,
    Pending {
        query: String,
    },
    Results {
        query: String,
        matched: Vec<TaxonRecord>,
    },
    NoResults {
        query: String,
    },
    Failed {
        query: String,
        msg: String,
    },
}

#[derive(Default)]
struct Latest {
    /// Bumped for every query, and on clear. A response is only applied if
    /// it still carries the current token.
    token: u64,
    state: SearchState,
}

struct Inner {
    taxon_service: Arc<dyn TaxonService>,
    config: SearchConfig,
    latest: Mutex<Latest>,
}

/// Maps free text queries onto a set of matching taxa, without touching the
/// tree cache.
///
/// Queries are debounced, and responses to superseded queries are dropped.
#[derive(Clone)]
pub struct SearchOverlay {
    inner: Arc<Inner>,
}

impl SearchOverlay {
    pub fn new(taxon_service: Arc<dyn TaxonService>, config: SearchConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                taxon_service,
                config,
                latest: Mutex::new(Latest::default()),
            }),
        }
    }

    /// Runs a query. Returns once the query was answered, or superseded by a
    /// newer one.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) {
        let query = query.trim();

        let token = {
            let mut latest = self.inner.latest.lock();
            latest.token += 1;

            if query.chars().count() < self.inner.config.min_query_len {
                debug!("query too short, clearing");
                latest.state = SearchState::Idle;
                return;
            }

            latest.state = SearchState::Pending {
                query: query.to_string(),
            };
            latest.token
        };

        tokio::time::sleep(self.inner.config.debounce).await;
        if self.inner.latest.lock().token != token {
            debug!("superseded while debouncing");
            return;
        }

        let result = self
            .inner
            .taxon_service
            .search(query, self.inner.config.limit)
            .await;

        let mut latest = self.inner.latest.lock();
        if latest.token != token {
            debug!("discarding stale response");
            return;
        }

        let query = query.to_string();
        latest.state = match result {
            Ok(page) if page.results.is_empty() => SearchState::NoResults { query },
            Ok(page) => SearchState::Results {
                query,
                matched: page.results,
            },
            Err(e) => {
                warn!(err = %e, "search failed");
                SearchState::Failed {
                    query,
                    msg: e.to_string(),
                }
            }
        };
    }

    /// Resets to [SearchState::Idle]. Responses still in flight are dropped.
    pub fn clear(&self) {
        let mut latest = self.inner.latest.lock();
        latest.token += 1;
        latest.state = SearchState::Idle;
    }

    pub fn state(&self) -> SearchState {
        self.inner.latest.lock().state.clone()
    }

    /// Whether a search completed, successfully or not, and its outcome
    /// should drive rendering.
    pub fn is_search_mode(&self) -> bool {
        matches!(
            self.inner.latest.lock().state,
            SearchState::Results { .. } | SearchState::NoResults { .. }
        )
    }

    pub fn results(&self) -> Vec<TaxonRecord> {
        match &self.inner.latest.lock().state {
            SearchState::Results { matched, .. } => matched.clone(),
            _ => Vec::new(),
        }
    }

    pub fn matched_taxids(&self) -> HashSet<String> {
        match &self.inner.latest.lock().state {
            SearchState::Results { matched, .. } => {
                matched.iter().map(|r| r.taxid.clone()).collect()
            }
            _ => HashSet::new(),
        }
    }
}
