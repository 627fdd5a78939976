use std::io;

use serde::{Deserialize, Serialize};

use crate::Envelope;

use super::node::LocalConfig;

/// Training/aggregation strategy an agent launches on `run_<mode>_train`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// In-network aggregation over the native datapath.
    Ebpf,
    /// Framework-provided distributed data parallel backend.
    TorchDdp,
    /// Framework-provided TCP all-reduce backend.
    TorchTcp,
}

impl RunMode {
    /// Returns the stable identifier used in event names and process args.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Ebpf => "ebpf",
            RunMode::TorchDdp => "torch_ddp",
            RunMode::TorchTcp => "torch_tcp",
        }
    }
}

/// Typed view of the control-plane envelope events.
///
/// The coordinator is the sole command initiator; agents only reply with
/// plain-text acknowledgements and liveness responses.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Persist the record and regenerate derived local configuration.
    UpdateLocalConfig(Box<LocalConfig>),
    /// Launch the native datapath programs and the worker process.
    RunEbpfProgs,
    /// Launch a training run under the given strategy.
    RunTrain(RunMode),
    /// Terminate and reset any running training processes.
    CleanProgs,
    /// Application-level liveness probe.
    Ping,
    /// Stop the agent's control loop.
    KillAgent,
    /// Coordinator is going away, stop the agent's control loop.
    Shutdown,
}

impl Command {
    /// Returns the wire event name for this command.
    pub fn event(&self) -> String {
        match self {
            Command::UpdateLocalConfig(_) => "update_local_config".to_string(),
            Command::RunEbpfProgs => "run_ebpf_progs".to_string(),
            Command::RunTrain(mode) => format!("run_{}_train", mode.as_str()),
            Command::CleanProgs => "clean_progs".to_string(),
            Command::Ping => "ping".to_string(),
            Command::KillAgent => "kill_agent".to_string(),
            Command::Shutdown => "shutdown".to_string(),
        }
    }

    /// Wraps this command into a wire envelope.
    pub fn into_envelope(self) -> Envelope {
        let event = self.event();

        match self {
            Command::UpdateLocalConfig(cfg) => {
                // SAFETY: Serialize impl for `LocalConfig` is derived and has
                //         no non string-key map inside.
                let data = serde_json::to_value(&cfg).unwrap();
                Envelope::with_data(event, data)
            }
            Command::Ping => Envelope::with_data(event, "Ping!".into()),
            _ => Envelope::bare(event),
        }
    }
}

impl TryFrom<&Envelope> for Command {
    type Error = io::Error;

    /// Maps an envelope back to a typed command.
    ///
    /// # Errors
    /// Returns `io::Error` with kind `InvalidData` for unknown events or
    /// malformed payloads; such messages are ignored by receivers, the loop
    /// continues.
    fn try_from(envelope: &Envelope) -> io::Result<Self> {
        match envelope.event.as_str() {
            "update_local_config" => {
                let cfg: LocalConfig = serde_json::from_value(envelope.data.clone())?;
                Ok(Command::UpdateLocalConfig(Box::new(cfg)))
            }
            "run_ebpf_progs" => Ok(Command::RunEbpfProgs),
            "run_ebpf_train" => Ok(Command::RunTrain(RunMode::Ebpf)),
            "run_torch_ddp_train" => Ok(Command::RunTrain(RunMode::TorchDdp)),
            "run_torch_tcp_train" => Ok(Command::RunTrain(RunMode::TorchTcp)),
            "clean_progs" => Ok(Command::CleanProgs),
            "ping" => Ok(Command::Ping),
            "kill_agent" => Ok(Command::KillAgent),
            "shutdown" => Ok(Command::Shutdown),
            event => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown control event `{event}`"),
            )),
        }
    }
}
