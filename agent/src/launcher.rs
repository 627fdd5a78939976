//! Fire-and-forget launching of the datapath and training processes.
//!
//! The agent never waits on these processes; run progress comes back
//! through the training stack itself, and `clean_progs` is the only way
//! the fleet tears them down.

use std::path::{Path, PathBuf};
use std::time::Duration;

use comms::specs::{LocalConfig, RunMode};
use log::{info, warn};
use tokio::process::Command;
use tokio::time;

/// Leaves start training last so interior nodes have their datapath and
/// worker ready before the first fragment arrives.
const LEAF_START_DELAY: Duration = Duration::from_secs(5);

const DATAPATH_SCRIPT: &str = "run_ebpf_progs.sh";
const WORKER_SCRIPT: &str = "run_worker.sh";
const CLEAN_SCRIPT: &str = "clean_progs.sh";

/// Spawns the node-local helper scripts for each fleet phase.
pub struct Launcher {
    scripts_dir: PathBuf,
}

impl Launcher {
    pub fn new(scripts_dir: PathBuf) -> Self {
        Self { scripts_dir }
    }

    /// Loads the native datapath programs for this node's tree position and
    /// starts the worker process that will drive the shared map.
    ///
    /// The worker needs the rank and world size from the local config; when
    /// none has been applied yet, only the datapath is loaded.
    pub fn load_datapath(&self, cfg: Option<&LocalConfig>) {
        spawn_detached(&self.scripts_dir.join(DATAPATH_SCRIPT), &[]);

        match cfg {
            Some(cfg) => {
                spawn_detached(&self.scripts_dir.join(WORKER_SCRIPT), &train_env(cfg));
            }
            None => warn!("no local config applied yet, skipping worker launch"),
        }
    }

    /// Launches a training run under the given strategy.
    ///
    /// The training process receives its rank and world size through the
    /// environment; a leaf node's launch is deferred by `LEAF_START_DELAY`.
    pub fn start_training(&self, mode: RunMode, cfg: &LocalConfig) {
        let script = self.scripts_dir.join(format!("run_{}_train.sh", mode.as_str()));
        let envs = train_env(cfg);

        if cfg.record.is_leaf() && !cfg.record.is_root() {
            info!(
                rank = cfg.record.id;
                "leaf node, deferring training launch"
            );
            tokio::spawn(async move {
                time::sleep(LEAF_START_DELAY).await;
                spawn_detached(&script, &envs);
            });
        } else {
            spawn_detached(&script, &envs);
        }
    }

    /// Tears down datapath programs and any running training processes.
    pub fn clean(&self) {
        spawn_detached(&self.scripts_dir.join(CLEAN_SCRIPT), &[]);
    }
}

fn train_env(cfg: &LocalConfig) -> [(&'static str, String); 4] {
    [
        ("RANK", cfg.record.id.to_string()),
        ("WORLD_SIZE", cfg.params.worker_num.to_string()),
        ("MODEL_TYPE", cfg.params.model_type.clone()),
        ("LEARNING_RATE", cfg.params.learning_rate.to_string()),
    ]
}

fn spawn_detached(script: &Path, envs: &[(&str, String)]) {
    let mut cmd = Command::new("sh");
    cmd.arg(script);
    for (key, value) in envs {
        cmd.env(key, value);
    }

    match cmd.spawn() {
        Ok(child) => info!(
            pid = child.id().unwrap_or(0);
            "launched {}", script.display()
        ),
        Err(e) => warn!("failed to launch {}: {e}", script.display()),
    }
}
