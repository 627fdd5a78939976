//! Persistence of the agent's local configuration and its derived outputs.

use std::path::{Path, PathBuf};
use std::{fs, io};

use comms::specs::LocalConfig;
use log::{debug, info};

use crate::error::AgentError;
use crate::header;

/// Owns the on-disk copies of the local configuration: the JSON document
/// itself and the regenerated datapath header.
pub struct ConfigStore {
    config_path: PathBuf,
    header_path: PathBuf,
    local: Option<LocalConfig>,
}

impl ConfigStore {
    /// Opens the store, reloading a previously persisted configuration when
    /// one exists.
    pub fn open(config_path: PathBuf, header_path: PathBuf) -> Self {
        let local = match fs::read_to_string(&config_path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(cfg) => {
                    info!("reloaded local config from {}", config_path.display());
                    Some(cfg)
                }
                Err(e) => {
                    debug!("stale local config at {}: {e}", config_path.display());
                    None
                }
            },
            Err(_) => None,
        };

        Self {
            config_path,
            header_path,
            local,
        }
    }

    /// The currently applied configuration, if any has been received or
    /// reloaded.
    pub fn local(&self) -> Option<&LocalConfig> {
        self.local.as_ref()
    }

    /// Applies a new configuration: regenerates the datapath header,
    /// persists the JSON document and replaces the in-memory copy wholesale.
    ///
    /// The header goes to disk before the document and both land through a
    /// write-then-rename, so a failed update cannot leave a config on disk
    /// whose header was never regenerated.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for unrenderable records and `Io` when either
    /// file cannot be written; the in-memory copy is left untouched then.
    pub fn apply(&mut self, cfg: LocalConfig) -> Result<(), AgentError> {
        let header = header::render(&cfg)?;

        // SAFETY: Serialize impl for `LocalConfig` is derived and has no
        //         non string-key map inside.
        let document = serde_json::to_string_pretty(&cfg).unwrap();
        write_replacing(&self.header_path, header.as_bytes())?;
        write_replacing(&self.config_path, document.as_bytes())?;

        info!(
            id = cfg.record.id,
            worker_num = cfg.params.worker_num;
            "applied new local config"
        );
        self.local = Some(cfg);
        Ok(())
    }
}

/// Writes through a sibling temp file and renames it into place, so readers
/// never observe a half-written document.
fn write_replacing(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use comms::specs::{NodeDesc, NodeRecord, TrainParams};

    use super::*;

    fn sample() -> LocalConfig {
        LocalConfig {
            record: NodeRecord::solitary(NodeDesc {
                id: 2,
                addr: Ipv4Addr::new(10, 0, 0, 3),
                mac: "02:00:00:00:00:02".to_string(),
            }),
            params: TrainParams::default(),
        }
    }

    fn temp_paths(tag: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir();
        (
            dir.join(format!("agent-store-{tag}.json")),
            dir.join(format!("agent-store-{tag}.h")),
        )
    }

    #[test]
    fn apply_persists_document_and_header() {
        let (config_path, header_path) = temp_paths("apply");
        let mut store = ConfigStore::open(config_path.clone(), header_path.clone());
        assert!(store.local().is_none());

        store.apply(sample()).unwrap();
        assert_eq!(store.local().unwrap().record.id, 2);

        let document = fs::read_to_string(&config_path).unwrap();
        let back: LocalConfig = serde_json::from_str(&document).unwrap();
        assert_eq!(back, sample());

        let header = fs::read_to_string(&header_path).unwrap();
        assert!(header.contains("#define HOST_ID 2\n"));

        let _ = fs::remove_file(&config_path);
        let _ = fs::remove_file(&header_path);
    }

    #[test]
    fn reopened_store_reloads_the_persisted_config() {
        let (config_path, header_path) = temp_paths("reload");
        let mut store = ConfigStore::open(config_path.clone(), header_path.clone());
        store.apply(sample()).unwrap();
        drop(store);

        let store = ConfigStore::open(config_path.clone(), header_path.clone());
        assert_eq!(store.local(), Some(&sample()));

        let _ = fs::remove_file(&config_path);
        let _ = fs::remove_file(&header_path);
    }

    #[test]
    fn failed_header_write_leaves_no_config_behind() {
        let dir = std::env::temp_dir();
        let config_path = dir.join("agent-store-header-fail.json");
        let _ = fs::remove_file(&config_path);
        // Unwritable header target, the document write must never happen.
        let header_path = dir.join("agent-store-no-such-dir").join("node.h");

        let mut store = ConfigStore::open(config_path.clone(), header_path);
        match store.apply(sample()) {
            Err(AgentError::Io(_)) => {}
            other => panic!("expected Io, got {other:?}"),
        }

        assert!(store.local().is_none());
        assert!(!config_path.exists());
    }

    #[test]
    fn apply_leaves_no_temp_files() {
        let (config_path, header_path) = temp_paths("no-tmp");
        let mut store = ConfigStore::open(config_path.clone(), header_path.clone());
        store.apply(sample()).unwrap();

        for path in [&config_path, &header_path] {
            let mut tmp = path.as_os_str().to_owned();
            tmp.push(".tmp");
            assert!(!PathBuf::from(tmp).exists());
        }

        let _ = fs::remove_file(&config_path);
        let _ = fs::remove_file(&header_path);
    }

    #[test]
    fn unrenderable_config_leaves_the_store_untouched() {
        let (config_path, header_path) = temp_paths("bad-mac");
        let mut store = ConfigStore::open(config_path.clone(), header_path.clone());

        let mut bad = sample();
        bad.record.mac = "zz".to_string();
        assert!(store.apply(bad).is_err());
        assert!(store.local().is_none());
        assert!(!config_path.exists());

        let _ = fs::remove_file(&config_path);
        let _ = fs::remove_file(&header_path);
    }
}
