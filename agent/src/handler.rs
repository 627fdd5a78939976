//! Agent-side command dispatch.

use comms::specs::{Command, RunMode};
use log::warn;

use crate::error::AgentError;
use crate::launcher::Launcher;
use crate::store::ConfigStore;

/// What the control loop should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Keep receiving, optionally acknowledging first.
    Continue(Option<String>),
    /// Stop the control loop and let the agent exit.
    Stop,
}

impl Flow {
    fn ack(text: &str) -> Self {
        Flow::Continue(Some(text.to_string()))
    }
}

/// Applies coordinator commands against the local store and launcher.
pub struct CommandHandler {
    store: ConfigStore,
    launcher: Launcher,
}

impl CommandHandler {
    pub fn new(store: ConfigStore, launcher: Launcher) -> Self {
        Self { store, launcher }
    }

    /// Executes one command and returns the loop disposition.
    ///
    /// # Errors
    /// Returns the underlying error when a configuration update cannot be
    /// applied; the control loop logs it and keeps receiving.
    pub fn handle(&mut self, cmd: Command) -> Result<Flow, AgentError> {
        match cmd {
            Command::UpdateLocalConfig(cfg) => {
                self.store.apply(*cfg)?;
                Ok(Flow::ack("Updated!"))
            }
            Command::RunEbpfProgs => {
                self.launcher.load_datapath(self.store.local());
                Ok(Flow::ack("Run ebpf!"))
            }
            Command::RunTrain(mode) => {
                match self.store.local() {
                    Some(cfg) => self.launcher.start_training(mode, cfg),
                    None => warn!("no local config applied yet, skipping training launch"),
                }
                Ok(Flow::ack(train_ack(mode)))
            }
            Command::CleanProgs => {
                self.launcher.clean();
                Ok(Flow::ack("Cleaned!"))
            }
            Command::Ping => Ok(Flow::ack("Pong!")),
            Command::KillAgent | Command::Shutdown => Ok(Flow::Stop),
        }
    }
}

fn train_ack(mode: RunMode) -> &'static str {
    match mode {
        RunMode::Ebpf => "Run ebpf training!",
        RunMode::TorchDdp => "Run torch ddp training!",
        RunMode::TorchTcp => "Run torch tcp training!",
    }
}
