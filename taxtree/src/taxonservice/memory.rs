use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::TaxonService;
use crate::record::deserialize_opt_taxid;
use crate::{Error, Page, RankQuery, SortOrder, TaxonRecord};

/// A taxon together with a link to its parent, the unit a
/// [MemoryTaxonService] is populated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonEntry {
    #[serde(flatten)]
    pub record: TaxonRecord,

    #[serde(
        default,
        alias = "parent_taxid",
        deserialize_with = "deserialize_opt_taxid",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent: Option<String>,
}

/// Keeps a whole taxonomy in memory.
///
/// Children are returned in insertion order, which stands in for whatever
/// order a real API would answer with.
#[derive(Clone, Default)]
pub struct MemoryTaxonService {
    db: Arc<RwLock<IndexMap<String, TaxonEntry>>>,
}

impl MemoryTaxonService {
    /// Inserts (or replaces) a taxon. Embedded children are ignored, parent
    /// links are the only source of structure.
    pub fn insert(&self, mut record: TaxonRecord, parent: Option<&str>) {
        record.children.clear();
        self.db.write().insert(
            record.taxid.clone(),
            TaxonEntry {
                record,
                parent: parent.map(str::to_string),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.db.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.read().is_empty()
    }

    /// Parses a JSON list of [TaxonEntry].
    pub fn from_json(data: &[u8]) -> Result<Self, Error> {
        let entries: Vec<TaxonEntry> = serde_json::from_slice(data)?;
        Ok(entries.into_iter().collect())
    }
}

impl FromIterator<TaxonEntry> for MemoryTaxonService {
    fn from_iter<T: IntoIterator<Item = TaxonEntry>>(iter: T) -> Self {
        let svc = MemoryTaxonService::default();
        for entry in iter {
            svc.insert(entry.record, entry.parent.as_deref());
        }
        svc
    }
}

fn compare_by(field: &str, a: &TaxonRecord, b: &TaxonRecord) -> Ordering {
    match field {
        "organisms_count" => a.organisms_count.cmp(&b.organisms_count),
        "assemblies_count" => a.assemblies_count.cmp(&b.assemblies_count),
        "scientific_name" => a.display_name().cmp(b.display_name()),
        "taxid" => a.taxid.cmp(&b.taxid),
        _ => a.annotations_count.cmp(&b.annotations_count),
    }
}

fn paginate(records: Vec<TaxonRecord>, offset: usize, limit: usize) -> Page<TaxonRecord> {
    Page {
        total: records.len(),
        offset,
        limit,
        results: records.into_iter().skip(offset).take(limit).collect(),
    }
}

#[async_trait]
impl TaxonService for MemoryTaxonService {
    #[instrument(skip(self))]
    async fn get(&self, taxid: &str) -> Result<Option<TaxonRecord>, Error> {
        Ok(self.db.read().get(taxid).map(|e| e.record.clone()))
    }

    #[instrument(skip(self))]
    async fn children(&self, taxid: &str) -> Result<Vec<TaxonRecord>, Error> {
        let db = self.db.read();
        if !db.contains_key(taxid) {
            return Err(Error::NotFound(taxid.to_string()));
        }

        Ok(db
            .values()
            .filter(|e| e.parent.as_deref() == Some(taxid))
            .map(|e| e.record.clone())
            .collect())
    }

    #[instrument(skip(self))]
    async fn ancestors(&self, taxid: &str) -> Result<Vec<TaxonRecord>, Error> {
        let db = self.db.read();
        let mut current = db
            .get(taxid)
            .ok_or_else(|| Error::NotFound(taxid.to_string()))?;

        let mut lineage = Vec::new();
        while let Some(parent) = current.parent.as_deref().and_then(|p| db.get(p)) {
            // parent links forming a cycle would never terminate otherwise.
            if lineage.len() >= db.len() {
                return Err(Error::InvalidResponse(format!(
                    "lineage of {} contains a cycle",
                    taxid
                )));
            }
            lineage.push(parent.record.clone());
            current = parent;
        }

        lineage.reverse();
        Ok(lineage)
    }

    #[instrument(skip(self))]
    async fn rank_frequencies(&self) -> Result<BTreeMap<String, u64>, Error> {
        let mut frequencies = BTreeMap::new();
        for entry in self.db.read().values() {
            if let Some(rank) = &entry.record.rank {
                *frequencies.entry(rank.clone()).or_insert(0) += 1;
            }
        }
        Ok(frequencies)
    }

    #[instrument(skip(self), fields(rank = %query.rank, offset = query.offset))]
    async fn list_by_rank(&self, query: &RankQuery) -> Result<Page<TaxonRecord>, Error> {
        let mut matching: Vec<TaxonRecord> = self
            .db
            .read()
            .values()
            .filter(|e| {
                e.record
                    .rank
                    .as_deref()
                    .is_some_and(|r| r.eq_ignore_ascii_case(&query.rank))
            })
            .map(|e| e.record.clone())
            .collect();

        matching.sort_by(|a, b| {
            let ord = compare_by(&query.sort_by, a, b);
            match query.sort_order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        });

        Ok(paginate(matching, query.offset, query.limit))
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str, limit: usize) -> Result<Page<TaxonRecord>, Error> {
        let needle = query.to_lowercase();
        let matching = self
            .db
            .read()
            .values()
            .filter(|e| {
                e.record.taxid == query
                    || e.record
                        .scientific_name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&needle))
            })
            .map(|e| e.record.clone())
            .collect();

        Ok(paginate(matching, 0, limit))
    }
}
