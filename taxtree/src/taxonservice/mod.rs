use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{Error, Page, RankQuery, TaxonRecord};

mod from_addr;
mod http;
mod memory;

#[cfg(test)]
pub mod tests;

pub use self::from_addr::from_addr;
pub use self::http::HttpTaxonService;
pub use self::memory::{MemoryTaxonService, TaxonEntry};

/// Read-only access to the taxonomy.
///
/// Implementations are stateless with regard to the tree: they neither cache
/// nor retry. Caching is the job of [crate::store::TreeStore].
#[async_trait]
pub trait TaxonService: Send + Sync {
    /// Looks up a single taxon.
    /// In case the taxon is not known, Ok(None) is returned.
    async fn get(&self, taxid: &str) -> Result<Option<TaxonRecord>, Error>;

    /// Returns the immediate children of a taxon, in the order the backend
    /// keeps them. A leaf returns an empty list, an unknown taxid
    /// [Error::NotFound].
    async fn children(&self, taxid: &str) -> Result<Vec<TaxonRecord>, Error>;

    /// Returns the lineage of a taxon, ordered from the root down to its
    /// parent. The taxon itself is not included.
    async fn ancestors(&self, taxid: &str) -> Result<Vec<TaxonRecord>, Error>;

    /// Returns how many taxa exist per rank.
    async fn rank_frequencies(&self) -> Result<BTreeMap<String, u64>, Error>;

    /// Lists one page of all taxa of the given rank.
    async fn list_by_rank(&self, query: &RankQuery) -> Result<Page<TaxonRecord>, Error>;

    /// Free text lookup over taxon names and ids.
    async fn search(&self, query: &str, limit: usize) -> Result<Page<TaxonRecord>, Error>;
}

#[async_trait]
impl<A> TaxonService for A
where
    A: AsRef<dyn TaxonService> + Send + Sync,
{
    async fn get(&self, taxid: &str) -> Result<Option<TaxonRecord>, Error> {
        self.as_ref().get(taxid).await
    }

    async fn children(&self, taxid: &str) -> Result<Vec<TaxonRecord>, Error> {
        self.as_ref().children(taxid).await
    }

    async fn ancestors(&self, taxid: &str) -> Result<Vec<TaxonRecord>, Error> {
        self.as_ref().ancestors(taxid).await
    }

    async fn rank_frequencies(&self) -> Result<BTreeMap<String, u64>, Error> {
        self.as_ref().rank_frequencies().await
    }

    async fn list_by_rank(&self, query: &RankQuery) -> Result<Page<TaxonRecord>, Error> {
        self.as_ref().list_by_rank(query).await
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Page<TaxonRecord>, Error> {
        self.as_ref().search(query, limit).await
    }
}
