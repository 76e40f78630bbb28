use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::Deserialize;
use url::Url;

use crate::taxonservice::{HttpTaxonService, MemoryTaxonService, TaxonService};
use crate::{Error, Page, RankQuery, SortOrder, TaxonRecord};

type SharedTaxonService = Arc<dyn TaxonService>;

#[derive(Deserialize)]
struct ListParams {
    rank: Option<String>,
    query: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
    sort_by: Option<String>,
    sort_order: Option<SortOrder>,
}

fn to_status(e: Error) -> StatusCode {
    match e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn taxon(
    Path(taxid): Path<String>,
    State(svc): State<SharedTaxonService>,
) -> Result<Json<TaxonRecord>, StatusCode> {
    svc.get(&taxid)
        .await
        .map_err(to_status)?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn children(
    Path(taxid): Path<String>,
    State(svc): State<SharedTaxonService>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let results = svc.children(&taxid).await.map_err(to_status)?;
    Ok(Json(serde_json::json!({ "results": results })))
}

async fn ancestors(
    Path(taxid): Path<String>,
    State(svc): State<SharedTaxonService>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let results = svc.ancestors(&taxid).await.map_err(to_status)?;
    Ok(Json(serde_json::json!({ "results": results })))
}

async fn rank_frequencies(
    State(svc): State<SharedTaxonService>,
) -> Result<Json<BTreeMap<String, u64>>, StatusCode> {
    Ok(Json(svc.rank_frequencies().await.map_err(to_status)?))
}

async fn list(
    Query(params): Query<ListParams>,
    State(svc): State<SharedTaxonService>,
) -> Result<Json<Page<TaxonRecord>>, StatusCode> {
    let limit = params.limit.unwrap_or(RankQuery::DEFAULT_LIMIT);
    let page = match (params.query, params.rank) {
        (Some(query), _) => svc.search(&query, limit).await,
        (None, Some(rank)) => {
            let mut query = RankQuery::new(rank)
                .limit(limit)
                .offset(params.offset.unwrap_or_default());
            if let Some(sort_by) = params.sort_by {
                query.sort_by = sort_by;
            }
            if let Some(sort_order) = params.sort_order {
                query.sort_order = sort_order;
            }
            svc.list_by_rank(&query).await
        }
        (None, None) => return Err(StatusCode::BAD_REQUEST),
    }
    .map_err(to_status)?;

    Ok(Json(page))
}

/// Exposes `taxon_service` through the REST API on an ephemeral local port,
/// and returns a [HttpTaxonService] talking to it.
pub async fn make_http_taxon_service(taxon_service: SharedTaxonService) -> HttpTaxonService {
    let app = Router::new()
        .route("/api/taxons", get(list))
        .route("/api/taxons/frequencies/rank", get(rank_frequencies))
        .route("/api/taxons/:taxid", get(taxon))
        .route("/api/taxons/:taxid/children", get(children))
        .route("/api/taxons/:taxid/ancestors", get(ancestors))
        .with_state(taxon_service);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind");
    let addr = listener.local_addr().expect("must have local addr");

    tokio::spawn(async move { axum::serve(listener, app).await });

    HttpTaxonService::new(Url::parse(&format!("http://{}/api/", addr)).unwrap())
}

/// Wraps a [MemoryTaxonService], recording every call and allowing tests to
/// delay or fail individual calls.
///
/// Calls are keyed as `get:{taxid}`, `children:{taxid}`,
/// `ancestors:{taxid}`, `rank_frequencies`, `list_by_rank:{rank}:{offset}`
/// and `search:{query}`.
#[derive(Clone, Default)]
pub struct InstrumentedTaxonService {
    inner: MemoryTaxonService,
    calls: Arc<Mutex<Vec<String>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    default_delay: Arc<Mutex<Option<Duration>>>,
    failures: Arc<Mutex<HashSet<String>>>,
}

impl InstrumentedTaxonService {
    pub fn new(inner: MemoryTaxonService) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    /// Number of calls made with the given key.
    pub fn calls(&self, key: &str) -> usize {
        self.calls.lock().iter().filter(|k| *k == key).count()
    }

    /// Number of calls whose key starts with `prefix`.
    pub fn calls_with_prefix(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|k| k.starts_with(prefix))
            .count()
    }

    pub fn delay(&self, key: &str, delay: Duration) {
        self.delays.lock().insert(key.to_string(), delay);
    }

    pub fn delay_all(&self, delay: Duration) {
        *self.default_delay.lock() = Some(delay);
    }

    pub fn fail(&self, key: &str) {
        self.failures.lock().insert(key.to_string());
    }

    pub fn heal(&self, key: &str) {
        self.failures.lock().remove(key);
    }

    async fn record(&self, key: String) -> Result<(), Error> {
        self.calls.lock().push(key.clone());

        let delay = self
            .delays
            .lock()
            .get(&key)
            .copied()
            .or(*self.default_delay.lock());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failures.lock().contains(&key) {
            return Err(Error::Network(format!("injected failure for {}", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl TaxonService for InstrumentedTaxonService {
    async fn get(&self, taxid: &str) -> Result<Option<TaxonRecord>, Error> {
        self.record(format!("get:{}", taxid)).await?;
        self.inner.get(taxid).await
    }

    async fn children(&self, taxid: &str) -> Result<Vec<TaxonRecord>, Error> {
        self.record(format!("children:{}", taxid)).await?;
        self.inner.children(taxid).await
    }

    async fn ancestors(&self, taxid: &str) -> Result<Vec<TaxonRecord>, Error> {
        self.record(format!("ancestors:{}", taxid)).await?;
        self.inner.ancestors(taxid).await
    }

    async fn rank_frequencies(&self) -> Result<BTreeMap<String, u64>, Error> {
        self.record("rank_frequencies".to_string()).await?;
        self.inner.rank_frequencies().await
    }

    async fn list_by_rank(&self, query: &RankQuery) -> Result<Page<TaxonRecord>, Error> {
        self.record(format!("list_by_rank:{}:{}", query.rank, query.offset))
            .await?;
        self.inner.list_by_rank(query).await
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Page<TaxonRecord>, Error> {
        self.record(format!("search:{}", query)).await?;
        self.inner.search(query, limit).await
    }
}
