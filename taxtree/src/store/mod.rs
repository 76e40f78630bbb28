use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use parking_lot::{RwLock, RwLockReadGuard};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::builder::{build_tree, flatten_tree, FlatNode, TreeNode};
use crate::search::{SearchConfig, SearchOverlay};
use crate::taxonservice::TaxonService;
use crate::{Error, RankQuery, TaxonRecord};

mod rank_roots;
mod state;


pub use self::rank_roots::RankRoots;
pub use self::state::{ChildrenState, Expander, RootSpec, RootState, TreeState};

/// What happens to a node whose children could not be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Show the node as a leaf, and never ask again.
    TreatAsLeaf,
    /// Keep the node in [ChildrenState::Failed]. Expanding it again retries.
    #[default]
    Retry,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreeStoreConfig {
    pub failure_policy: FailurePolicy,
    /// Number of rank roots requested per page.
    pub page_size: usize,
    pub search: SearchConfig,
}

impl Default for TreeStoreConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            page_size: RankQuery::DEFAULT_LIMIT,
            search: SearchConfig::default(),
        }
    }
}

struct Inner {
    taxon_service: Arc<dyn TaxonService>,
    config: TreeStoreConfig,
    state: RwLock<TreeState>,
    search: SearchOverlay,
}

/// The single authoritative cache of a lazily browsed taxonomy tree.
///
/// All mutation of the [TreeState] goes through here. Cloning is cheap and
/// clones share the same state. The lock is only ever taken for synchronous
/// sections, never across an await.
#[derive(Clone)]
pub struct TreeStore {
    inner: Arc<Inner>,
}

/// Reverts a node to [ChildrenState::Unknown] if its fetch is dropped
/// before completing.
struct FetchGuard<'a> {
    state: &'a RwLock<TreeState>,
    taxid: &'a str,
    armed: bool,
}

impl FetchGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!(taxid = self.taxid, "children fetch dropped");
            self.state.write().abandon_fetch(self.taxid);
        }
    }
}

/// Clears the loading flag of a rank-roots window if its page request is
/// dropped before completing.
struct LoadGuard<'a> {
    state: &'a RwLock<TreeState>,
    generation: u64,
    armed: bool,
}

impl LoadGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(window) = self.state.write().rank_roots_mut() {
            if window.generation() == self.generation {
                window.abandon_load();
            }
        }
    }
}

/// Detaches embedded children from a list of records, keyed by their
/// parent's taxid.
fn take_embedded(records: &mut [TaxonRecord]) -> Vec<(String, Vec<TaxonRecord>)> {
    records
        .iter_mut()
        .filter(|r| !r.children.is_empty())
        .map(|r| (r.taxid.clone(), r.take_children()))
        .collect()
}

impl TreeStore {
    pub fn new(taxon_service: Arc<dyn TaxonService>, config: TreeStoreConfig) -> Self {
        let search = SearchOverlay::new(taxon_service.clone(), config.search.clone());
        Self {
            inner: Arc::new(Inner {
                taxon_service,
                config,
                state: RwLock::new(TreeState::default()),
                search,
            }),
        }
    }

    pub fn config(&self) -> &TreeStoreConfig {
        &self.inner.config
    }

    pub fn taxon_service(&self) -> &Arc<dyn TaxonService> {
        &self.inner.taxon_service
    }

    /// Read access to the current state. Don't hold on to it across awaits.
    pub fn state(&self) -> RwLockReadGuard<'_, TreeState> {
        self.inner.state.read()
    }

    pub fn search(&self) -> &SearchOverlay {
        &self.inner.search
    }

    /// Flips the expansion of a taxon and returns whether it is expanded now.
    /// Newly expanded taxa with unknown children get them fetched before
    /// this returns. Collapsing keeps the cached children.
    #[instrument(skip(self))]
    pub async fn toggle_expand(&self, taxid: &str) -> bool {
        let (expanded, needs_fetch) = {
            let mut state = self.inner.state.write();
            let expanded = state.toggle_expanded(taxid);
            (expanded, expanded && state.needs_fetch(taxid))
        };

        if needs_fetch {
            self.fetch_children_for(taxid).await;
        }
        expanded
    }

    /// Expands a taxon, fetching its children if needed. Already expanded
    /// taxa stay expanded.
    #[instrument(skip(self))]
    pub async fn expand(&self, taxid: &str) {
        let needs_fetch = {
            let mut state = self.inner.state.write();
            state.set_expanded(taxid);
            state.needs_fetch(taxid)
        };

        if needs_fetch {
            self.fetch_children_for(taxid).await;
        }
    }

    /// Fetches the children of a taxon, unless they are known or already
    /// being fetched.
    ///
    /// Failures are logged and recorded according to the configured
    /// [FailurePolicy], they never reach the caller.
    #[instrument(skip(self))]
    pub async fn fetch_children_for(&self, taxid: &str) {
        let started = self.inner.state.write().begin_fetch(taxid);
        if !started {
            debug!("children known or in flight, not fetching");
            return;
        }

        let guard = FetchGuard {
            state: &self.inner.state,
            taxid,
            armed: true,
        };

        let mut result = self.inner.taxon_service.children(taxid).await;
        guard.disarm();

        let embedded = match &mut result {
            Ok(children) => {
                debug!(children = children.len(), "fetched children");
                take_embedded(children)
            }
            Err(e) => {
                warn!(err = %e, policy = ?self.inner.config.failure_policy, "failed to fetch children");
                Vec::new()
            }
        };

        let mut state = self.inner.state.write();
        state.complete_fetch(taxid, result, self.inner.config.failure_policy);
        for (child, grandchildren) in embedded {
            state.seed_children(&child, grandchildren);
        }
    }

    /// Seeds the children of a taxon from an embedded `children` list.
    /// Returns false if the children were already known, or being fetched.
    pub fn seed_children(&self, taxid: &str, children: Vec<TaxonRecord>) -> bool {
        self.inner.state.write().seed_children(taxid, children)
    }

    /// Adds or removes a taxon from the selection, and returns whether it is
    /// selected afterwards. Works for taxa that were never expanded to.
    pub fn toggle_select(&self, record: TaxonRecord) -> bool {
        self.inner.state.write().toggle_select(record)
    }

    /// Replaces the selection with the given records.
    pub fn initialize_from_preset(&self, records: impl IntoIterator<Item = TaxonRecord>) {
        self.inner.state.write().replace_selection(records);
    }

    /// Looks up a stored list of taxids and makes them the selection.
    /// Taxids that don't exist anymore are skipped. If any lookup fails the
    /// selection is left alone.
    #[instrument(skip(self), err)]
    pub async fn restore_selection(&self, taxids: &[String]) -> Result<(), Error> {
        let found = try_join_all(
            taxids
                .iter()
                .map(|taxid| self.inner.taxon_service.get(taxid)),
        )
        .await?;

        let records: Vec<TaxonRecord> = taxids
            .iter()
            .zip(found)
            .filter_map(|(taxid, record)| {
                if record.is_none() {
                    warn!(taxid, "selected taxon not found, skipping");
                }
                record
            })
            .collect();

        self.initialize_from_preset(records);
        Ok(())
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.inner.state.read().selected_ids()
    }

    pub fn selected(&self) -> Vec<TaxonRecord> {
        self.inner.state.read().selected().cloned().collect()
    }

    /// Empties the selection. Expansion and cached children are untouched.
    pub fn clear_selection(&self) {
        self.inner.state.write().clear_selection();
    }

    /// Makes a single taxon the root of the tree. Leaves rank-roots mode.
    ///
    /// Returns Ok(None) if the taxon doesn't exist. Errors are recorded in
    /// [RootState::Failed] as well, and loading can simply be retried.
    /// If another root is requested in the meantime, the result is returned
    /// but not stored.
    #[instrument(skip(self), err)]
    pub async fn load_root(&self, taxid: &str) -> Result<Option<TaxonRecord>, Error> {
        let generation = {
            let mut state = self.inner.state.write();
            state.reset_rank_roots(None);
            state.begin_root_load(taxid)
        };

        let result = self.inner.taxon_service.get(taxid).await;

        let mut state = self.inner.state.write();
        if state.root_generation() != generation {
            debug!("discarding superseded root");
            return result;
        }
        match result {
            Ok(Some(mut record)) => {
                let children = record.take_children();
                state.seed_children(&record.taxid, children);
                state.set_root(RootState::Ready(record.clone()));
                Ok(Some(record))
            }
            Ok(None) => {
                warn!("root taxon not found");
                state.set_root(RootState::NotFound(taxid.to_string()));
                Ok(None)
            }
            Err(e) => {
                state.set_root(RootState::Failed {
                    taxid: taxid.to_string(),
                    msg: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Expands every ancestor of a taxon, so it becomes visible in the tree.
    #[instrument(skip(self), err)]
    pub async fn reveal(&self, taxid: &str) -> Result<(), Error> {
        let lineage = self.inner.taxon_service.ancestors(taxid).await?;
        debug!(depth = lineage.len(), "expanding lineage");

        join_all(lineage.iter().map(|ancestor| self.expand(&ancestor.taxid))).await;

        let state = self.inner.state.read();
        for ancestor in &lineage {
            if let ChildrenState::Failed(msg) = state.children_state(&ancestor.taxid) {
                return Err(Error::Network(msg.clone()));
            }
        }
        Ok(())
    }

    /// Switches to (or out of) rank-roots mode. Any search is cleared.
    /// Selecting a rank fetches its first page.
    #[instrument(skip(self), err)]
    pub async fn set_rank(&self, rank: Option<&str>) -> Result<(), Error> {
        self.inner.search.clear();
        self.inner.state.write().reset_rank_roots(rank);

        if rank.is_some() {
            self.load_more().await?;
        }
        Ok(())
    }

    /// Fetches the next page of rank roots.
    ///
    /// Does nothing while a page is in flight or once everything is loaded.
    /// Pages arriving after the rank changed are discarded.
    #[instrument(skip(self), err)]
    pub async fn load_more(&self) -> Result<(), Error> {
        let (query, generation) = {
            let mut state = self.inner.state.write();
            let Some(window) = state.rank_roots_mut() else {
                return Ok(());
            };
            if !window.begin_load() {
                debug!(rank = window.rank(), "nothing to load");
                return Ok(());
            }
            (
                RankQuery::new(window.rank())
                    .limit(self.inner.config.page_size)
                    .offset(window.offset()),
                window.generation(),
            )
        };

        let guard = LoadGuard {
            state: &self.inner.state,
            generation,
            armed: true,
        };
        let result = self.inner.taxon_service.list_by_rank(&query).await;
        guard.disarm();

        let mut state = self.inner.state.write();
        let window = match state.rank_roots_mut() {
            Some(window) if window.generation() == generation => window,
            _ => {
                debug!(rank = %query.rank, "discarding page of superseded rank");
                return Ok(());
            }
        };

        match result {
            Ok(mut page) => {
                debug!(received = page.results.len(), total = page.total, "received rank roots");
                let embedded = take_embedded(&mut page.results);
                window.append(page);
                for (taxid, children) in embedded {
                    state.seed_children(&taxid, children);
                }
                Ok(())
            }
            Err(e) => {
                warn!(err = %e, "failed to load rank roots");
                window.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// The entry point in use, if any.
    pub fn root_spec(&self) -> Option<RootSpec> {
        self.inner.state.read().root_spec()
    }

    /// The records the tree starts from.
    pub fn roots(&self) -> Vec<TaxonRecord> {
        self.inner.state.read().roots().to_vec()
    }

    /// Builds the nested tree from the current state.
    pub fn tree(&self) -> Vec<TreeNode> {
        let state = self.inner.state.read();
        build_tree(state.roots(), &state)
    }

    /// Builds the flattened tree from the current state, highlighting the
    /// taxa matched by the current search.
    pub fn flatten(&self) -> Vec<FlatNode> {
        let highlight = self.inner.search.matched_taxids();
        let state = self.inner.state.read();
        flatten_tree(state.roots(), &state, &highlight)
    }
}
