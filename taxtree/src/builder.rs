//! Derives renderable trees from a [TreeState].
//!
//! Both functions here are pure, and only walk what is visible: a node
//! contributes children only if it is expanded and its children are known.
//! They use an explicit stack, so deep lineages can't overflow the call stack.

use std::collections::HashSet;

use crate::store::{ChildrenState, Expander, TreeState};
use crate::TaxonRecord;

/// A node of the nested tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub taxid: String,
    pub data: TaxonRecord,
    /// Empty unless the node is expanded and has known children.
    pub children: Vec<TreeNode>,
    pub level: usize,
    pub expander: Expander,
}

/// A node of the flattened, pre-order tree, as used for list rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatNode {
    pub taxid: String,
    pub data: TaxonRecord,
    pub level: usize,
    pub expander: Expander,
    pub highlighted: bool,
}

/// Returns the children of a taxon that are currently shown, ordered by
/// descending annotation count. Ties keep the order the API returned.
pub fn visible_children<'a>(state: &'a TreeState, taxid: &str) -> Vec<&'a TaxonRecord> {
    if !state.is_expanded(taxid) {
        return Vec::new();
    }

    match state.children_state(taxid) {
        ChildrenState::Branch(children) => {
            let mut children: Vec<&TaxonRecord> = children.iter().collect();
            children.sort_by(|a, b| b.annotations_count.cmp(&a.annotations_count));
            children
        }
        _ => Vec::new(),
    }
}

/// One visible node, in pre-order, with the position of its parent.
struct Visit<'a> {
    record: &'a TaxonRecord,
    level: usize,
    parent: Option<usize>,
}

/// Walks all visible nodes in pre-order.
///
/// A taxid may show up in several places, e.g. as a rank root and below
/// another rank root. It is only skipped when it is its own ancestor, so
/// cyclic data terminates.
fn walk<'a>(roots: &'a [TaxonRecord], state: &'a TreeState) -> Vec<Visit<'a>> {
    let mut visits = Vec::new();
    // taxids from the current root down to the parent of the next visit
    let mut path: Vec<&'a str> = Vec::new();
    let mut on_path: HashSet<&'a str> = HashSet::new();

    let mut stack: Vec<Visit<'a>> = roots
        .iter()
        .rev()
        .map(|record| Visit {
            record,
            level: 0,
            parent: None,
        })
        .collect();

    while let Some(visit) = stack.pop() {
        while path.len() > visit.level {
            if let Some(taxid) = path.pop() {
                on_path.remove(taxid);
            }
        }

        let taxid = visit.record.taxid.as_str();
        if on_path.contains(taxid) {
            continue;
        }
        path.push(taxid);
        on_path.insert(taxid);

        let idx = visits.len();
        let level = visit.level;
        let children = visible_children(state, taxid);
        visits.push(visit);

        stack.extend(children.into_iter().rev().map(|record| Visit {
            record,
            level: level + 1,
            parent: Some(idx),
        }));
    }

    visits
}

/// Builds the nested tree below `roots`.
pub fn build_tree(roots: &[TaxonRecord], state: &TreeState) -> Vec<TreeNode> {
    let visits = walk(roots, state);

    // Children always come after their parent in pre-order, so going
    // backwards every node is complete once we reach it.
    let mut pending: Vec<Vec<TreeNode>> = vec![Vec::new(); visits.len()];
    let mut tree = Vec::new();

    for (idx, visit) in visits.into_iter().enumerate().rev() {
        let mut children = std::mem::take(&mut pending[idx]);
        children.reverse();

        let node = TreeNode {
            taxid: visit.record.taxid.clone(),
            data: visit.record.clone(),
            children,
            level: visit.level,
            expander: state.expander(&visit.record.taxid),
        };

        match visit.parent {
            Some(parent) => pending[parent].push(node),
            None => tree.push(node),
        }
    }

    tree.reverse();
    tree
}

/// Flattens the tree below `roots` in pre-order. Nodes whose taxid is in
/// `highlight` are marked as highlighted.
pub fn flatten_tree(
    roots: &[TaxonRecord],
    state: &TreeState,
    highlight: &HashSet<String>,
) -> Vec<FlatNode> {
    walk(roots, state)
        .into_iter()
        .map(|visit| FlatNode {
            taxid: visit.record.taxid.clone(),
            data: visit.record.clone(),
            level: visit.level,
            expander: state.expander(&visit.record.taxid),
            highlighted: highlight.contains(&visit.record.taxid),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::{build_tree, flatten_tree, visible_children, FlatNode};
    use crate::store::{Expander, FailurePolicy, TreeState};
    use crate::TaxonRecord;

    fn taxon(taxid: &str, annotations: u64) -> TaxonRecord {
        TaxonRecord::new(taxid).with_annotations(annotations)
    }

    /// root -> [x(10) -> [x1(1)], y(20)], everything expanded.
    fn expanded_state() -> TreeState {
        let mut state = TreeState::default();
        state.seed_children("root", vec![taxon("x", 10), taxon("y", 20)]);
        state.seed_children("x", vec![taxon("x1", 1)]);
        state.set_expanded("root");
        state.set_expanded("x");
        state
    }

    fn flat_ids(nodes: &[FlatNode]) -> Vec<(&str, usize)> {
        nodes.iter().map(|n| (n.taxid.as_str(), n.level)).collect()
    }

    #[test]
    fn sort_stability() {
        let mut state = TreeState::default();
        state.seed_children(
            "p",
            vec![taxon("a", 5), taxon("b", 5), taxon("c", 10)],
        );
        state.set_expanded("p");

        let children: Vec<&str> = visible_children(&state, "p")
            .into_iter()
            .map(|r| r.taxid.as_str())
            .collect();
        assert_eq!(vec!["c", "a", "b"], children);

        let tree = build_tree(&[taxon("p", 20)], &state);
        assert_eq!(
            vec!["c", "a", "b"],
            tree[0]
                .children
                .iter()
                .map(|n| n.taxid.as_str())
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn nested() {
        let state = expanded_state();
        let tree = build_tree(&[taxon("root", 30)], &state);

        assert_eq!(1, tree.len());
        let root = &tree[0];
        assert_eq!(Expander::Expanded, root.expander);
        assert_eq!(0, root.level);

        let y = &root.children[0];
        assert_eq!(("y", 1), (y.taxid.as_str(), y.level));
        // never fetched, so it might have children
        assert_eq!(Expander::Collapsed, y.expander);
        assert!(y.children.is_empty());

        let x = &root.children[1];
        assert_eq!("x", x.taxid);
        assert_eq!(Expander::Expanded, x.expander);
        assert_eq!(("x1", 2), (x.children[0].taxid.as_str(), x.children[0].level));
    }

    #[test]
    fn flatten_pre_order() {
        let state = expanded_state();
        let nodes = flatten_tree(
            &[taxon("root", 30), taxon("other", 1)],
            &state,
            &HashSet::new(),
        );

        assert_eq!(
            vec![("root", 0), ("y", 1), ("x", 1), ("x1", 2), ("other", 0)],
            flat_ids(&nodes)
        );
        assert!(nodes.iter().all(|n| !n.highlighted));
    }

    #[test]
    fn collapsed_hides_children() {
        let mut state = expanded_state();
        state.toggle_expanded("x");

        let nodes = flatten_tree(&[taxon("root", 30)], &state, &HashSet::new());
        assert_eq!(vec![("root", 0), ("y", 1), ("x", 1)], flat_ids(&nodes));
        assert_eq!(Expander::Collapsed, nodes[2].expander);
        assert!(state.is_fetched("x"), "collapse keeps the cache");
    }

    /// A fetched leaf loses its expander, an unfetched node keeps it.
    #[test]
    fn leaf_vs_unknown() {
        let mut state = TreeState::default();
        state.begin_fetch("leaf");
        state.complete_fetch("leaf", Ok(vec![]), FailurePolicy::Retry);
        state.set_expanded("leaf");

        let nodes = flatten_tree(
            &[taxon("leaf", 1), taxon("unknown", 1)],
            &state,
            &HashSet::new(),
        );
        assert_eq!(Expander::None, nodes[0].expander);
        assert_eq!(Expander::Collapsed, nodes[1].expander);
    }

    #[test]
    fn highlight() {
        let state = expanded_state();
        let highlight = HashSet::from(["x1".to_string()]);
        let nodes = flatten_tree(&[taxon("root", 30)], &state, &highlight);

        assert_eq!(
            vec!["x1"],
            nodes
                .iter()
                .filter(|n| n.highlighted)
                .map(|n| n.taxid.as_str())
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn cycle_terminates() {
        let mut state = TreeState::default();
        state.seed_children("a", vec![taxon("b", 1)]);
        state.seed_children("b", vec![taxon("a", 1)]);
        state.set_expanded("a");
        state.set_expanded("b");

        let tree = build_tree(&[taxon("a", 1)], &state);
        assert_eq!("b", tree[0].children[0].taxid);
        assert!(tree[0].children[0].children.is_empty());
    }

    /// Rank roots of self-nesting ranks can show up again below another
    /// root, and must stay visible in both places.
    #[test]
    fn root_also_descendant() {
        let mut state = TreeState::default();
        state.seed_children("c0", vec![taxon("c1", 1)]);
        state.set_expanded("c0");

        let roots = [taxon("c0", 2), taxon("c1", 1)];
        let tree = build_tree(&roots, &state);
        assert_eq!(2, tree.len());
        assert_eq!("c1", tree[0].children[0].taxid);
        assert_eq!("c1", tree[1].taxid);
        assert_eq!(
            vec![("c0", 0), ("c1", 1), ("c1", 0)],
            flat_ids(&flatten_tree(&roots, &state, &HashSet::new()))
        );

        let roots = [taxon("c1", 1), taxon("c0", 2)];
        let tree = build_tree(&roots, &state);
        assert_eq!(2, tree.len());
        assert_eq!("c0", tree[1].taxid);
        assert_eq!(1, tree[1].children.len());
        assert_eq!("c1", tree[1].children[0].taxid);
    }

    /// Siblings sharing a subtree each get their own copy of it.
    #[test]
    fn repeated_subtree() {
        let mut state = TreeState::default();
        state.seed_children("a", vec![taxon("x", 1)]);
        state.seed_children("b", vec![taxon("x", 1)]);
        state.seed_children("x", vec![taxon("y", 1)]);
        state.set_expanded("a");
        state.set_expanded("b");
        state.set_expanded("x");

        let nodes = flatten_tree(&[taxon("a", 2), taxon("b", 1)], &state, &HashSet::new());
        assert_eq!(
            vec![("a", 0), ("x", 1), ("y", 2), ("b", 0), ("x", 1), ("y", 2)],
            flat_ids(&nodes)
        );
    }

    #[test]
    fn deep_lineage() {
        let mut state = TreeState::default();
        for i in 0..50_000u64 {
            state.seed_children(&i.to_string(), vec![taxon(&(i + 1).to_string(), 1)]);
            state.set_expanded(&i.to_string());
        }

        let nodes = flatten_tree(&[taxon("0", 1)], &state, &HashSet::new());
        assert_eq!(50_001, nodes.len());
        assert_eq!(50_000, nodes.last().unwrap().level);
    }
}
