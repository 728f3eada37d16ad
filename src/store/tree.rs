//! Forest indexing for the hierarchical entity tables.
//!
//! Every structural mutation (insert under a parent, re-parent, delete)
//! triggers a full rebuild of the affected table's derived fields inside the
//! mutation's transaction. The rebuild is pure: it takes `(id, parent_id)`
//! pairs in sibling (insertion) order and produces the `depth`, `path`,
//! `lft`, `rgt` values for every node.
//!
//! Path segments are zero-padded lowercase hex so that lexicographic order
//! equals numeric sibling order; sorting by `path` ascending therefore yields
//! pre-order traversal. `lft`/`rgt` are a nested-set numbering: B is a
//! descendant of A iff `A.lft < B.lft < A.rgt`.

use std::collections::HashMap;

/// Derived hierarchy fields for one node, produced by [`rebuild`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub id: String,
    pub depth: i64,
    pub path: String,
    pub lft: i64,
    pub rgt: i64,
}

/// Recomputes the whole forest from `(id, parent_id)` pairs.
///
/// Input order is sibling order: roots appear in input order, and each
/// parent's children keep their relative input order. A parent id that does
/// not exist in the input is treated as absent (the node becomes a root);
/// foreign keys prevent that case in the store, but the rebuild must not
/// panic on it.
pub fn rebuild(nodes: &[(String, Option<String>)]) -> Vec<TreeRow> {
    let known: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, (id, _))| (id.as_str(), i))
        .collect();

    let mut children: HashMap<Option<usize>, Vec<usize>> = HashMap::new();
    for (i, (_, parent)) in nodes.iter().enumerate() {
        let parent_ix = parent
            .as_deref()
            .and_then(|p| known.get(p).copied())
            .filter(|&p| p != i);
        children.entry(parent_ix).or_default().push(i);
    }

    let mut rows = Vec::with_capacity(nodes.len());
    let mut counter: i64 = 0;

    fn visit(
        ix: usize,
        depth: i64,
        sibling_pos: usize,
        parent_path: &str,
        nodes: &[(String, Option<String>)],
        children: &HashMap<Option<usize>, Vec<usize>>,
        counter: &mut i64,
        rows: &mut Vec<TreeRow>,
    ) {
        let path = if parent_path.is_empty() {
            format!("{sibling_pos:04x}")
        } else {
            format!("{parent_path}.{sibling_pos:04x}")
        };

        *counter += 1;
        let lft = *counter;
        let slot = rows.len();
        rows.push(TreeRow {
            id: nodes[ix].0.clone(),
            depth,
            path: path.clone(),
            lft,
            rgt: 0,
        });

        if let Some(kids) = children.get(&Some(ix)) {
            for (pos, &kid) in kids.iter().enumerate() {
                visit(kid, depth + 1, pos, &path, nodes, children, counter, rows);
            }
        }

        *counter += 1;
        rows[slot].rgt = *counter;
    }

    if let Some(roots) = children.get(&None) {
        for (pos, &root) in roots.iter().enumerate() {
            visit(root, 0, pos, "", nodes, &children, &mut counter, &mut rows);
        }
    }

    rows
}

/// Returns true when attaching `node_id` under `new_parent_id` would make the
/// node its own ancestor.
///
/// Walks the candidate parent's ancestor chain; the walk is bounded by the
/// node count, so a corrupt chain cannot loop forever.
pub fn would_create_cycle(
    nodes: &[(String, Option<String>)],
    node_id: &str,
    new_parent_id: &str,
) -> bool {
    if node_id == new_parent_id {
        return true;
    }

    let parents: HashMap<&str, Option<&str>> = nodes
        .iter()
        .map(|(id, parent)| (id.as_str(), parent.as_deref()))
        .collect();

    let mut current = Some(new_parent_id);
    for _ in 0..=nodes.len() {
        match current {
            Some(id) if id == node_id => return true,
            Some(id) => current = parents.get(id).copied().flatten(),
            None => return false,
        }
    }
    false
}
