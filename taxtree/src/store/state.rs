use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use super::rank_roots::RankRoots;
use super::FailurePolicy;
use crate::{sort_by_annotations, Error, TaxonRecord};

/// What is known about the children of a single taxon.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChildrenState {
    /// Never fetched. Renders an optimistic expander.
    #[default]
    Unknown,
    /// A children request is in flight.
    Fetching,
    /// Fetched, and there are none.
    Leaf,
    /// Fetched (or seeded from an embedded list), sorted by descending
    /// annotation count. Never empty.
    Branch(Vec<TaxonRecord>),
    /// The last fetch failed. Expanding again retries.
    Failed(String),
}

static UNKNOWN: ChildrenState = ChildrenState::Unknown;

/// The entry point in fixed-root mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RootState {
    #[default]
    Unloaded,
    Loading(String),
    Ready(TaxonRecord),
    NotFound(String),
    Failed { taxid: String, msg: String },
}

/// Which set of records a tree starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootSpec {
    Fixed(String),
    RankRoots(String),
}

/// The expand affordance a node gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expander {
    /// Confirmed leaf.
    None,
    Collapsed,
    Expanded,
    Loading,
    /// The children fetch failed, offer a retry.
    Failed,
}

/// The lazily populated state of a taxonomy tree.
///
/// Only [super::TreeStore] mutates it. Readers get it through
/// [super::TreeStore::state].
#[derive(Debug, Default)]
pub struct TreeState {
    expanded: HashSet<String>,
    children: HashMap<String, ChildrenState>,
    selection: IndexMap<String, TaxonRecord>,
    root: RootState,
    rank_roots: Option<RankRoots>,
    rank_generation: u64,
    root_generation: u64,
}

impl TreeState {
    pub fn is_expanded(&self, taxid: &str) -> bool {
        self.expanded.contains(taxid)
    }

    pub fn children_state(&self, taxid: &str) -> &ChildrenState {
        self.children.get(taxid).unwrap_or(&UNKNOWN)
    }

    /// Returns the cached children of a taxon. None means not (yet) known,
    /// an empty slice a confirmed leaf.
    pub fn children(&self, taxid: &str) -> Option<&[TaxonRecord]> {
        match self.children_state(taxid) {
            ChildrenState::Leaf => Some(&[]),
            ChildrenState::Branch(children) => Some(children),
            _ => None,
        }
    }

    pub fn is_fetching(&self, taxid: &str) -> bool {
        matches!(self.children_state(taxid), ChildrenState::Fetching)
    }

    /// Whether the children of this taxon are known, either from a fetch or
    /// from an embedded list.
    pub fn is_fetched(&self, taxid: &str) -> bool {
        matches!(
            self.children_state(taxid),
            ChildrenState::Leaf | ChildrenState::Branch(_)
        )
    }

    pub fn expander(&self, taxid: &str) -> Expander {
        match self.children_state(taxid) {
            ChildrenState::Fetching => Expander::Loading,
            ChildrenState::Failed(_) => Expander::Failed,
            ChildrenState::Leaf => Expander::None,
            ChildrenState::Unknown | ChildrenState::Branch(_) => {
                if self.is_expanded(taxid) {
                    Expander::Expanded
                } else {
                    Expander::Collapsed
                }
            }
        }
    }

    pub fn is_selected(&self, taxid: &str) -> bool {
        self.selection.contains_key(taxid)
    }

    /// Selected taxa, in the order they were selected.
    pub fn selected(&self) -> impl Iterator<Item = &TaxonRecord> {
        self.selection.values()
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.selection.keys().cloned().collect()
    }

    pub fn root(&self) -> &RootState {
        &self.root
    }

    pub fn rank_roots(&self) -> Option<&RankRoots> {
        self.rank_roots.as_ref()
    }

    /// The entry point currently in use. Rank roots take precedence over a
    /// fixed root.
    pub fn root_spec(&self) -> Option<RootSpec> {
        if let Some(window) = &self.rank_roots {
            return Some(RootSpec::RankRoots(window.rank().to_string()));
        }
        match &self.root {
            RootState::Unloaded => None,
            RootState::Loading(taxid) | RootState::NotFound(taxid) => {
                Some(RootSpec::Fixed(taxid.clone()))
            }
            RootState::Ready(record) => Some(RootSpec::Fixed(record.taxid.clone())),
            RootState::Failed { taxid, .. } => Some(RootSpec::Fixed(taxid.clone())),
        }
    }

    /// The records a tree is built from. Empty while nothing is loaded.
    pub fn roots(&self) -> &[TaxonRecord] {
        if let Some(window) = &self.rank_roots {
            return window.roots();
        }
        match &self.root {
            RootState::Ready(record) => std::slice::from_ref(record),
            _ => &[],
        }
    }

    pub(crate) fn toggle_expanded(&mut self, taxid: &str) -> bool {
        if self.expanded.remove(taxid) {
            false
        } else {
            self.expanded.insert(taxid.to_string());
            true
        }
    }

    pub(crate) fn set_expanded(&mut self, taxid: &str) {
        self.expanded.insert(taxid.to_string());
    }

    /// Whether expanding this taxon has to go to the network.
    pub(crate) fn needs_fetch(&self, taxid: &str) -> bool {
        matches!(
            self.children_state(taxid),
            ChildrenState::Unknown | ChildrenState::Failed(_)
        )
    }

    /// Marks a children fetch as started. Returns false if the caller must
    /// not fetch, because the children are known or already being fetched.
    pub(crate) fn begin_fetch(&mut self, taxid: &str) -> bool {
        if !self.needs_fetch(taxid) {
            return false;
        }
        self.children
            .insert(taxid.to_string(), ChildrenState::Fetching);
        true
    }

    pub(crate) fn complete_fetch(
        &mut self,
        taxid: &str,
        result: Result<Vec<TaxonRecord>, Error>,
        policy: FailurePolicy,
    ) {
        let state = match result {
            Ok(children) => Self::state_for(children),
            Err(e) => match policy {
                FailurePolicy::TreatAsLeaf => ChildrenState::Leaf,
                FailurePolicy::Retry => ChildrenState::Failed(e.to_string()),
            },
        };
        self.children.insert(taxid.to_string(), state);
    }

    /// Reverts an unfinished fetch, so a later expand starts over.
    pub(crate) fn abandon_fetch(&mut self, taxid: &str) {
        if self.is_fetching(taxid) {
            self.children.remove(taxid);
        }
    }

    /// Seeds the children of a taxon from an embedded list. Known children
    /// and fetches in flight win over the embedded list.
    pub(crate) fn seed_children(&mut self, taxid: &str, children: Vec<TaxonRecord>) -> bool {
        if children.is_empty() || !self.needs_fetch(taxid) {
            return false;
        }
        self.children
            .insert(taxid.to_string(), Self::state_for(children));
        true
    }

    fn state_for(mut children: Vec<TaxonRecord>) -> ChildrenState {
        if children.is_empty() {
            return ChildrenState::Leaf;
        }
        for child in children.iter_mut() {
            child.children.clear();
        }
        sort_by_annotations(&mut children);
        ChildrenState::Branch(children)
    }

    /// Adds or removes a taxon from the selection. Returns whether it is
    /// selected afterwards.
    pub(crate) fn toggle_select(&mut self, mut record: TaxonRecord) -> bool {
        if self.selection.shift_remove(&record.taxid).is_some() {
            return false;
        }
        record.children.clear();
        self.selection.insert(record.taxid.clone(), record);
        true
    }

    pub(crate) fn replace_selection(&mut self, records: impl IntoIterator<Item = TaxonRecord>) {
        self.selection = records
            .into_iter()
            .map(|mut r| {
                r.children.clear();
                (r.taxid.clone(), r)
            })
            .collect();
    }

    pub(crate) fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub(crate) fn set_root(&mut self, root: RootState) {
        self.root = root;
    }

    /// Marks `taxid` as the root being loaded. The returned generation
    /// identifies this load; any earlier one is superseded.
    pub(crate) fn begin_root_load(&mut self, taxid: &str) -> u64 {
        self.root_generation += 1;
        self.root = RootState::Loading(taxid.to_string());
        self.root_generation
    }

    pub(crate) fn root_generation(&self) -> u64 {
        self.root_generation
    }

    pub(crate) fn rank_roots_mut(&mut self) -> Option<&mut RankRoots> {
        self.rank_roots.as_mut()
    }

    /// Replaces the rank-roots window. Every new window gets a fresh
    /// generation, so pages requested for an older one can be told apart.
    pub(crate) fn reset_rank_roots(&mut self, rank: Option<&str>) {
        self.rank_roots = rank.map(|rank| {
            self.rank_generation += 1;
            RankRoots::new(rank, self.rank_generation)
        });
    }
}
