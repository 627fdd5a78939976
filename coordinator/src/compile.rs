//! Turns the aggregation tree into per-node configuration records.

use std::collections::{BTreeMap, HashMap};

use comms::specs::{NodeDesc, NodeRecord};
use log::warn;

use crate::topology::{Node, Tree};

fn desc(node: &Node) -> NodeDesc {
    NodeDesc {
        id: node.id,
        addr: node.addr,
        mac: node.mac.clone(),
    }
}

/// Compiles one `NodeRecord` per node referenced by the tree.
///
/// A node with neither parent nor children still receives a record with an
/// empty child list and no parent (the degenerate root-only case). A tree
/// edge referencing an unknown node id is a data-integrity warning: the
/// offending edge is dropped, logged, and processing continues with the
/// partial tree.
///
/// Persistence and network distribution of the returned mapping belong to
/// the control plane, not here.
pub fn compile(tree: &Tree, nodes: &[Node]) -> BTreeMap<u32, NodeRecord> {
    let by_id: HashMap<u32, &Node> = nodes.iter().map(|node| (node.id, node)).collect();

    let mut records = BTreeMap::new();

    for (&parent_id, child_ids) in &tree.children {
        let Some(parent_node) = by_id.get(&parent_id).copied() else {
            warn!("dropping edges of unknown node {parent_id}");
            continue;
        };

        records
            .entry(parent_id)
            .or_insert_with(|| NodeRecord::solitary(desc(parent_node)));

        for &child_id in child_ids {
            let Some(child_node) = by_id.get(&child_id).copied() else {
                warn!("dropping edge {parent_id} -> {child_id}: unknown child node");
                continue;
            };

            if let Some(record) = records.get_mut(&parent_id) {
                record.children.push(desc(child_node));
            }

            records
                .entry(child_id)
                .or_insert_with(|| NodeRecord::solitary(desc(child_node)))
                .parent = Some(desc(parent_node));
        }
    }

    records
}
