//! Client-side core for browsing a remote taxonomy.
//!
//! The [taxonservice] module wraps the read-only taxonomy API, the
//! [store::TreeStore] owns the lazily populated tree state, the [builder]
//! derives renderable trees from it and [search::SearchOverlay] maps free
//! text queries onto highlighted taxa.

#[cfg(test)]
use rstest_reuse;

mod errors;
mod record;

pub mod builder;
pub mod fixtures;
pub mod search;
pub mod store;
pub mod taxonservice;

pub use errors::Error;
pub use record::{sort_by_annotations, Page, RankQuery, SortOrder, TaxonRecord};
