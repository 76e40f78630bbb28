use serde::{Deserialize, Deserializer, Serialize};

/// A single taxon, as served by the taxonomy API.
///
/// Records are immutable once fetched, the server is the source of truth.
/// Counters missing from (or null in) a response are read as 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonRecord {
    #[serde(deserialize_with = "deserialize_taxid")]
    pub taxid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scientific_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub organisms_count: u64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub assemblies_count: u64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub annotations_count: u64,

    /// Children embedded by some endpoints. Never authoritative: only a
    /// completed children fetch tells whether a taxon is a leaf.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub children: Vec<TaxonRecord>,
}

impl TaxonRecord {
    pub fn new(taxid: impl Into<String>) -> Self {
        Self {
            taxid: taxid.into(),
            scientific_name: None,
            rank: None,
            organisms_count: 0,
            assemblies_count: 0,
            annotations_count: 0,
            children: Vec::new(),
        }
    }

    pub fn with_name(mut self, scientific_name: impl Into<String>) -> Self {
        self.scientific_name = Some(scientific_name.into());
        self
    }

    pub fn with_rank(mut self, rank: impl Into<String>) -> Self {
        self.rank = Some(rank.into());
        self
    }

    pub fn with_annotations(mut self, annotations_count: u64) -> Self {
        self.annotations_count = annotations_count;
        self
    }

    /// The name to show for this taxon. Falls back to the taxid, so it is
    /// never blank.
    pub fn display_name(&self) -> &str {
        match self.scientific_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.taxid,
        }
    }

    /// Splits off the embedded children, leaving a flat record behind.
    pub fn take_children(&mut self) -> Vec<TaxonRecord> {
        std::mem::take(&mut self.children)
    }
}

/// Orders records by descending annotation count.
/// The sort is stable, records with equal counts keep the order the API
/// returned them in.
pub fn sort_by_annotations(records: &mut [TaxonRecord]) {
    records.sort_by(|a, b| b.annotations_count.cmp(&a.annotations_count));
}

/// The pagination envelope all list endpoints answer with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Whether more results exist past this page. `total` is authoritative.
    pub fn has_more(&self) -> bool {
        self.offset.saturating_add(self.results.len()) < self.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "asc")]
    Ascending,
    #[default]
    #[serde(rename = "desc")]
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Parameters for listing all taxa of a given rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankQuery {
    pub rank: String,
    pub limit: usize,
    pub offset: usize,
    pub sort_by: String,
    pub sort_order: SortOrder,
}

impl RankQuery {
    pub const DEFAULT_LIMIT: usize = 50;

    pub fn new(rank: impl Into<String>) -> Self {
        Self {
            rank: rank.into(),
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
            sort_by: "annotations_count".to_string(),
            sort_order: SortOrder::Descending,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn sort(mut self, sort_by: impl Into<String>, sort_order: SortOrder) -> Self {
        self.sort_by = sort_by.into();
        self.sort_order = sort_order;
        self
    }
}

/// Taxids are strings, but some endpoints send them as JSON numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTaxid {
    Str(String),
    Num(u64),
}

impl From<RawTaxid> for String {
    fn from(value: RawTaxid) -> Self {
        match value {
            RawTaxid::Str(s) => s,
            RawTaxid::Num(n) => n.to_string(),
        }
    }
}

pub(crate) fn deserialize_taxid<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawTaxid::deserialize(deserializer).map(Into::into)
}

pub(crate) fn deserialize_opt_taxid<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawTaxid>::deserialize(deserializer)?.map(Into::into))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
