use std::path::Path;
use std::sync::Arc;
use std::{env, io};

use log::info;
use tokio::net::TcpListener;
use tokio::signal;

use coordinator::configs::{MainConfig, SystemConfig, save_env_file};
use coordinator::server::{ControlPlane, KEEPALIVE_INTERVAL};
use coordinator::{CapacityPolicy, build_tree, compile, dispatch};

const DEFAULT_MAIN_CONFIG: &str = "main_config.json";
const SYSTEM_CONFIG_PATH: &str = "system_config.json";
const ENV_PATH: &str = ".env";

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_MAIN_CONFIG.to_string());
    let mut main_cfg = MainConfig::load(Path::new(&config_path)).map_err(io::Error::other)?;

    let nodes = main_cfg.enabled_nodes();
    main_cfg.train_config.worker_num = nodes.len() as u32;

    let tree = build_tree(&nodes, &CapacityPolicy::default());
    info!("generated aggregation tree: {tree:?}");

    let records = compile(&tree, &nodes);
    let system = SystemConfig::new(main_cfg.train_config.clone(), records);
    system.save(Path::new(SYSTEM_CONFIG_PATH))?;
    save_env_file(&main_cfg.coord_config, Path::new(ENV_PATH))?;

    let addr = format!("{}:{}", main_cfg.coord_config.ip, main_cfg.coord_config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("coordinator listening at {addr}");

    let plane = Arc::new(ControlPlane::new(system, KEEPALIVE_INTERVAL));

    tokio::select! {
        ret = plane.serve(listener) => ret?,
        ret = dispatch::event_dispatcher(Arc::clone(&plane)) => {
            ret?;
            info!("dispatcher closed, shutting down");
        }
        _ = signal::ctrl_c() => {
            info!("coordinator terminated manually");
        }
    }

    Ok(())
}
