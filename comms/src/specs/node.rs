use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::training::TrainParams;

/// Addressing information for one tree neighbor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDesc {
    /// Node identifier, also the training rank.
    pub id: u32,
    /// Network address.
    pub addr: Ipv4Addr,
    /// Link-layer address, `aa:bb:cc:dd:ee:ff` notation.
    pub mac: String,
}

/// Compiled per-node topology record.
///
/// Produced by the coordinator for every node referenced by the aggregation
/// tree and replaced wholesale on each redistribution, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: u32,
    pub addr: Ipv4Addr,
    pub mac: String,
    /// Absent for the tree root.
    pub parent: Option<NodeDesc>,
    /// Ordered child descriptors, empty for leaves.
    pub children: Vec<NodeDesc>,
}

impl NodeRecord {
    /// Creates a record with no tree neighbors yet.
    pub fn solitary(desc: NodeDesc) -> Self {
        Self {
            id: desc.id,
            addr: desc.addr,
            mac: desc.mac,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Returns `true` when this node is the aggregation-tree root.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Returns `true` when this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// The merged document an agent persists locally: its own topology record
/// plus the shared training parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(flatten)]
    pub record: NodeRecord,
    #[serde(flatten)]
    pub params: TrainParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(id: u32) -> NodeDesc {
        NodeDesc {
            id,
            addr: Ipv4Addr::new(10, 0, 0, id as u8),
            mac: format!("02:00:00:00:00:{id:02x}"),
        }
    }

    #[test]
    fn local_config_flattens_record_and_params() {
        let cfg = LocalConfig {
            record: NodeRecord {
                parent: Some(desc(0)),
                children: vec![desc(2)],
                ..NodeRecord::solitary(desc(1))
            },
            params: TrainParams::default(),
        };

        let value = serde_json::to_value(&cfg).unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(value["parent"]["id"], 0);
        assert_eq!(value["children"][0]["id"], 2);
        assert!(value.get("worker_num").is_some());

        let back: LocalConfig = serde_json::from_value(value).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn root_and_leaf_predicates() {
        let mut record = NodeRecord::solitary(desc(3));
        assert!(record.is_root());
        assert!(record.is_leaf());

        record.parent = Some(desc(0));
        record.children.push(desc(4));
        assert!(!record.is_root());
        assert!(!record.is_leaf());
    }
}
