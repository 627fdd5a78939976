//! Fleet configuration: the operator-authored main config going in, the
//! compiled system config and agent bootstrap environment going out.

use std::collections::BTreeMap;
use std::io;
use std::net::Ipv4Addr;
use std::path::Path;
use std::{fmt::Write as _, fs};

use comms::specs::{LocalConfig, NodeRecord, TrainParams};
use serde::{Deserialize, Serialize};

use crate::error::CoordinatorError;
use crate::topology::Node;

/// Where the coordinator control channel is reachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordConfig {
    pub ip: Ipv4Addr,
    pub port: u16,
}

/// Operator-authored input document (`main_config.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct MainConfig {
    pub node_config: Vec<Node>,
    pub train_config: TrainParams,
    pub coord_config: CoordConfig,
}

impl MainConfig {
    /// Loads and parses the main configuration.
    ///
    /// # Errors
    /// Returns `InvalidConfig` on unreadable or malformed input.
    pub fn load(path: &Path) -> Result<Self, CoordinatorError> {
        let content = fs::read_to_string(path)
            .map_err(|e| CoordinatorError::InvalidConfig(format!("{}: {e}", path.display())))?;

        serde_json::from_str(&content)
            .map_err(|e| CoordinatorError::InvalidConfig(format!("{}: {e}", path.display())))
    }

    /// Returns the non-disabled nodes in input order.
    pub fn enabled_nodes(&self) -> Vec<Node> {
        self.node_config
            .iter()
            .filter(|node| !node.disabled)
            .cloned()
            .collect()
    }
}

/// Compiled topology output persisted by the coordinator: the shared train
/// parameters plus the node-config mapping keyed by address.
///
/// This mapping is also the multicast membership source: only peers whose
/// address is a key here hold a valid compiled record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub train_config: TrainParams,
    pub clients: BTreeMap<Ipv4Addr, NodeRecord>,
}

impl SystemConfig {
    /// Re-keys compiled records by node address.
    pub fn new(train_config: TrainParams, records: BTreeMap<u32, NodeRecord>) -> Self {
        let clients = records
            .into_values()
            .map(|record| (record.addr, record))
            .collect();

        Self {
            train_config,
            clients,
        }
    }

    /// Writes the document as indented JSON.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
    }

    /// Returns `true` when `ip` holds a valid compiled record.
    pub fn is_participant(&self, ip: &Ipv4Addr) -> bool {
        self.clients.contains_key(ip)
    }

    /// Builds the directed per-agent payload: that peer's own record merged
    /// with the shared train parameters.
    pub fn local_config_for(&self, ip: &Ipv4Addr) -> Option<LocalConfig> {
        self.clients.get(ip).map(|record| LocalConfig {
            record: record.clone(),
            params: self.train_config.clone(),
        })
    }
}

/// Externalizes the coordinator address as environment-style key-value
/// pairs for agent bootstrap.
pub fn save_env_file(coord: &CoordConfig, path: &Path) -> io::Result<()> {
    let mut content = String::new();
    let _ = writeln!(content, "COORD_IP={}", coord.ip);
    let _ = writeln!(content, "COORD_PORT={}", coord.port);
    fs::write(path, content)
}
