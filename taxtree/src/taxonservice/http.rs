use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::TaxonService;
use crate::{Error, Page, RankQuery, TaxonRecord};

/// HttpTaxonService talks to the JSON REST API of the annotation portal.
///
/// All paths are resolved relative to `base_url`:
/// - `taxons/{taxid}`
/// - `taxons/{taxid}/children`
/// - `taxons/{taxid}/ancestors`
/// - `taxons?rank=…` and `taxons?query=…`
/// - `taxons/frequencies/rank`
pub struct HttpTaxonService {
    base_url: Url,
    http_client: ClientWithMiddleware,
}

/// List endpoints answer with `{total, offset, limit, results}`, though the
/// children and ancestors endpoints only reliably send `results`.
#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    total: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
    results: Vec<T>,
}

impl<T> Envelope<T> {
    fn into_page(self, requested_offset: usize, requested_limit: usize) -> Page<T> {
        let offset = self.offset.unwrap_or(requested_offset);
        Page {
            total: self
                .total
                .unwrap_or_else(|| offset.saturating_add(self.results.len())),
            offset,
            limit: self.limit.unwrap_or(requested_limit),
            results: self.results,
        }
    }
}

impl HttpTaxonService {
    pub fn new(base_url: Url) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Builds a client whose requests give up after `timeout`.
    pub fn with_timeout(base_url: Url, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidAddress(e.to_string()))?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(mut base_url: Url, client: reqwest::Client) -> Self {
        // Url::join drops the last path segment unless it ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            base_url,
            http_client: ClientBuilder::new(client)
                .with(taxtree_tracing::propagate::reqwest::tracing_middleware())
                .build(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `{base_url}/taxons[/{segments}…]`, escaping each segment.
    fn taxons_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidAddress(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push("taxons")
            .extend(segments);
        Ok(url)
    }

    /// Sends a GET request and decodes the JSON body.
    /// A 404 is returned as Ok(None), every other non-success status as
    /// [Error::Network].
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, Error> {
        debug!(url = %url, "sending request");

        let resp = self.http_client.get(url.clone()).send().await.map_err(|e| {
            warn!(url = %url, err = %e, "unable to send request");
            Error::from(e)
        })?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !resp.status().is_success() {
            warn!(url = %url, status = %resp.status(), "request failed");
            return Err(Error::Network(format!(
                "{} answered with status {}",
                url,
                resp.status()
            )));
        }

        let body = resp.bytes().await?;
        let decoded = serde_json::from_slice(&body).map_err(|e| {
            warn!(url = %url, err = %e, "unable to decode response");
            Error::from(e)
        })?;

        Ok(Some(decoded))
    }

    async fn get_results(&self, taxid: &str, segment: &str) -> Result<Vec<TaxonRecord>, Error> {
        let url = self.taxons_url(&[taxid, segment])?;
        let envelope: Envelope<TaxonRecord> = self
            .get_json(url)
            .await?
            .ok_or_else(|| Error::NotFound(taxid.to_string()))?;
        Ok(envelope.results)
    }
}

#[async_trait]
impl TaxonService for HttpTaxonService {
    #[instrument(skip(self), err)]
    async fn get(&self, taxid: &str) -> Result<Option<TaxonRecord>, Error> {
        let url = self.taxons_url(&[taxid])?;
        self.get_json(url).await
    }

    #[instrument(skip(self), err)]
    async fn children(&self, taxid: &str) -> Result<Vec<TaxonRecord>, Error> {
        self.get_results(taxid, "children").await
    }

    #[instrument(skip(self), err)]
    async fn ancestors(&self, taxid: &str) -> Result<Vec<TaxonRecord>, Error> {
        self.get_results(taxid, "ancestors").await
    }

    #[instrument(skip(self), err)]
    async fn rank_frequencies(&self) -> Result<BTreeMap<String, u64>, Error> {
        let url = self.taxons_url(&["frequencies", "rank"])?;
        self.get_json(url)
            .await?
            .ok_or_else(|| Error::Network("rank frequencies endpoint not found".to_string()))
    }

    #[instrument(skip(self), fields(rank = %query.rank, offset = query.offset), err)]
    async fn list_by_rank(&self, query: &RankQuery) -> Result<Page<TaxonRecord>, Error> {
        let mut url = self.taxons_url(&[])?;
        url.query_pairs_mut()
            .append_pair("rank", &query.rank)
            .append_pair("limit", &query.limit.to_string())
            .append_pair("offset", &query.offset.to_string())
            .append_pair("sort_by", &query.sort_by)
            .append_pair("sort_order", query.sort_order.as_str());

        let envelope: Envelope<TaxonRecord> = self
            .get_json(url)
            .await?
            .ok_or_else(|| Error::Network("taxon listing endpoint not found".to_string()))?;
        Ok(envelope.into_page(query.offset, query.limit))
    }

    #[instrument(skip(self), err)]
    async fn search(&self, query: &str, limit: usize) -> Result<Page<TaxonRecord>, Error> {
        let mut url = self.taxons_url(&[])?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("limit", &limit.to_string());

        let envelope: Envelope<TaxonRecord> = self
            .get_json(url)
            .await?
            .ok_or_else(|| Error::Network("taxon search endpoint not found".to_string()))?;
        Ok(envelope.into_page(0, limit))
    }
}
