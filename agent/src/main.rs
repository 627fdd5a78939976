use std::path::PathBuf;
use std::{env, io};

use log::{error, info};
use tokio::net::TcpStream;
use tokio::signal;

use agent::control::{self, KEEPALIVE_INTERVAL};
use agent::error::AgentError;
use agent::{CommandHandler, ConfigStore, Launcher};

const LOCAL_CONFIG_PATH: &str = "local_config.json";
const HEADER_PATH: &str = "node_config.h";
const SCRIPTS_DIR: &str = "scripts";

fn required_env(var: &'static str) -> Result<String, AgentError> {
    env::var(var).map_err(|_| AgentError::MissingEnv(var))
}

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    if let Err(e) = run().await {
        error!("agent terminated: {e}");
        return Err(io::Error::other(e));
    }

    Ok(())
}

async fn run() -> Result<(), AgentError> {
    let coord_ip = required_env("COORD_IP")?;
    let coord_port = required_env("COORD_PORT")?;
    let addr = format!("{coord_ip}:{coord_port}");

    // Dial refusal is terminal; the agent is restarted externally once the
    // coordinator is reachable again.
    let stream = TcpStream::connect(&addr)
        .await
        .map_err(|e| AgentError::ConnectionFailed {
            addr: addr.clone(),
            source: e,
        })?;
    info!("connected to coordinator at {addr}");

    let (rx, tx) = stream.into_split();
    let (rx, tx) = comms::channel(rx, tx);

    let store = ConfigStore::open(PathBuf::from(LOCAL_CONFIG_PATH), PathBuf::from(HEADER_PATH));
    let launcher = Launcher::new(PathBuf::from(SCRIPTS_DIR));
    let mut handler = CommandHandler::new(store, launcher);

    tokio::select! {
        ret = control::run(rx, tx, &mut handler, KEEPALIVE_INTERVAL) => ret,
        _ = signal::ctrl_c() => {
            info!("agent terminated manually");
            Ok(())
        }
    }
}
