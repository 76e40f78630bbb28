use crate::{Page, TaxonRecord};

/// An offset-based paging window over all taxa of one rank, used as an
/// alternative set of tree roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankRoots {
    rank: String,
    roots: Vec<TaxonRecord>,
    offset: usize,
    total: usize,
    has_more: bool,
    loading: bool,
    error: Option<String>,
    generation: u64,
}

impl RankRoots {
    pub(crate) fn new(rank: &str, generation: u64) -> Self {
        Self {
            rank: rank.to_string(),
            roots: Vec::new(),
            offset: 0,
            total: 0,
            // nothing is known before the first page, so assume there is one.
            has_more: true,
            loading: false,
            error: None,
            generation,
        }
    }

    pub fn rank(&self) -> &str {
        &self.rank
    }

    pub fn roots(&self) -> &[TaxonRecord] {
        &self.roots
    }

    /// How many records were received so far. This is where the next page
    /// starts.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Total number of taxa of this rank, as last reported by the server.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The error of the last failed page request, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Marks a page request as started. Returns false if another one is in
    /// flight, or there is nothing left to load.
    pub(crate) fn begin_load(&mut self) -> bool {
        if self.loading || !self.has_more {
            return false;
        }
        self.loading = true;
        self.error = None;
        true
    }

    pub(crate) fn abandon_load(&mut self) {
        self.loading = false;
    }

    /// Appends a received page. The offset advances by what was actually
    /// returned, not by what was asked for.
    pub(crate) fn append(&mut self, page: Page<TaxonRecord>) {
        let received = page.results.len();

        self.loading = false;
        self.offset += received;
        self.total = page.total;
        self.has_more = received > 0 && self.offset < self.total;
        self.roots.extend(page.results);
    }

    /// Records a failed page request. `has_more` stays as it was, so the
    /// same page can be asked for again.
    pub(crate) fn fail(&mut self, msg: String) {
        self.loading = false;
        self.error = Some(msg);
    }
}
