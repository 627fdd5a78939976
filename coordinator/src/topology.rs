//! Bandwidth-aware aggregation tree construction.
//!
//! Greedy minimum-load attachment: the highest-capacity node roots the
//! tree, every following node hangs off the already-placed node whose
//! normalized load is currently maximal. Fan-out emerges from the
//! load-normalization rule: higher-capacity, lower-degree nodes accumulate
//! more children.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// One fleet node as listed in the main configuration.
///
/// Immutable once loaded for a topology run; `id` doubles as the training
/// rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: u32,
    pub addr: Ipv4Addr,
    pub mac: String,
    #[serde(default)]
    pub disabled: bool,
}

/// Synthetic per-node capacity score, assigned once at tree-build time and
/// never updated during training.
#[derive(Debug, Clone, Copy)]
pub enum CapacityPolicy {
    /// Every node gets the same score; attachment order alone shapes the
    /// tree.
    Uniform(u32),
}

impl CapacityPolicy {
    pub fn capacity(&self, _node: &Node) -> u32 {
        match self {
            CapacityPolicy::Uniform(score) => *score,
        }
    }
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        CapacityPolicy::Uniform(10)
    }
}

/// Spanning aggregation tree over the enabled node set.
///
/// Exactly one root, every other node has exactly one parent; built once
/// per topology run, any change requires a full rebuild and redistribution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    /// The node attached first; `None` for an empty fleet.
    pub root: Option<u32>,
    /// Ordered child ids per placed node; leaves map to empty lists.
    pub children: BTreeMap<u32, Vec<u32>>,
}

impl Tree {
    /// Returns the children of `id`, empty when it is a leaf or absent.
    pub fn children_of(&self, id: u32) -> &[u32] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the parent of `id`, `None` for the root or unknown ids.
    pub fn parent_of(&self, id: u32) -> Option<u32> {
        self.children
            .iter()
            .find(|(_, children)| children.contains(&id))
            .map(|(&parent, _)| parent)
    }

    /// Number of parent edges; a spanning tree has `node_count() - 1`.
    pub fn edge_count(&self) -> usize {
        self.children.values().map(Vec::len).sum()
    }

    /// Number of placed nodes.
    pub fn node_count(&self) -> usize {
        self.children.len()
    }
}

/// Builds the aggregation tree over the non-disabled subsequence of `nodes`.
///
/// Deterministic given equal-capacity inputs: the stable capacity sort
/// breaks ties by input order for the root, and attachment ties go to the
/// first placed node with the maximal normalized load.
///
/// # Arguments
/// * `nodes` - The full fleet list; disabled nodes never appear in the tree.
/// * `policy` - Capacity score assignment.
///
/// # Returns
/// The spanning tree; empty or single-root for fleets of zero or one
/// enabled node (no aggregation performed in that case).
pub fn build_tree(nodes: &[Node], policy: &CapacityPolicy) -> Tree {
    let enabled: Vec<&Node> = nodes.iter().filter(|node| !node.disabled).collect();
    let count = enabled.len();

    let mut tree = Tree::default();
    if enabled.is_empty() {
        return tree;
    }

    let capacity: Vec<f64> = enabled
        .iter()
        .map(|node| policy.capacity(node) as f64)
        .collect();

    // Stable sort: the first maximum in input order becomes the root.
    let mut order: Vec<usize> = (0..count).collect();
    order.sort_by(|&a, &b| capacity[b].total_cmp(&capacity[a]));
    let root = order[0];

    let mut load = vec![0.0f64; count];
    let mut degree = vec![0usize; count];
    let mut placed = vec![false; count];

    load[root] = capacity[root];
    placed[root] = true;
    tree.root = Some(enabled[root].id);
    tree.children.insert(enabled[root].id, Vec::new());

    for v in 0..count {
        if placed[v] {
            continue;
        }

        // Attach under the placed node with maximal normalized load,
        // first occurrence winning ties.
        let mut attach = None;
        for u in 0..count {
            if placed[u] && attach.is_none_or(|a: usize| load[u] > load[a]) {
                attach = Some(u);
            }
        }
        let attach = attach.unwrap_or(root);

        tree.children
            .entry(enabled[attach].id)
            .or_default()
            .push(enabled[v].id);
        tree.children.insert(enabled[v].id, Vec::new());

        degree[attach] += 1;
        degree[v] += 1;
        load[attach] = capacity[attach] / (degree[attach] + 1) as f64;
        load[v] = capacity[v] / (degree[v] + 1) as f64;
        placed[v] = true;
    }

    tree
}
