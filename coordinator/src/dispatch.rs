//! Interactive operator loop, driving the fleet through its phases.

use std::io;
use std::sync::Arc;

use comms::specs::{Command, RunMode};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::server::ControlPlane;

const MENU: &str = "\nSelect an option:\n\
    1. Update local config\n\
    2. Run eBPF programs\n\
    3. Run eBPF training\n\
    4. Run Torch DDP training\n\
    5. Run Torch TCP training\n\
    6. Clean programs\n\
    7. Ping\n\
    8. Kill agents";

/// Reads operator choices from stdin until EOF, dispatching commands over
/// the shared control plane.
pub async fn event_dispatcher(plane: Arc<ControlPlane>) -> io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        println!("{MENU}");
        println!("Enter your choice (1->8): ");

        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };

        let delivered = match line.trim() {
            "1" => plane.update_local_config().await,
            "2" => plane.multicast(Command::RunEbpfProgs).await,
            "3" => plane.multicast(Command::RunTrain(RunMode::Ebpf)).await,
            "4" => plane.multicast(Command::RunTrain(RunMode::TorchDdp)).await,
            "5" => plane.multicast(Command::RunTrain(RunMode::TorchTcp)).await,
            "6" => plane.broadcast(Command::CleanProgs).await,
            "7" => {
                let live = plane.registry().len();
                if live == 0 {
                    println!("\nNo agents connected.");
                } else {
                    println!("\n{live} agents connected.");
                }
                plane.broadcast(Command::Ping).await
            }
            "8" => plane.broadcast(Command::KillAgent).await,
            _ => continue,
        };

        println!("Delivered to {delivered} agent(s).");
    }
}
