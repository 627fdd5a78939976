use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use comms::specs::{Command, NodeDesc, NodeRecord, TrainParams};
use comms::{Frame, FrameReceiver, FrameSender};
use tokio::io::{self, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::time::timeout;

use coordinator::configs::SystemConfig;
use coordinator::error::CoordinatorError;
use coordinator::registry::ConnectionHandle;
use coordinator::server::ControlPlane;

const BUF_SIZE: usize = 4096;

fn record(id: u32) -> NodeRecord {
    NodeRecord::solitary(NodeDesc {
        id,
        addr: Ipv4Addr::new(10, 0, 0, id as u8 + 1),
        mac: format!("02:00:00:00:00:{id:02x}"),
    })
}

/// Control plane whose node-config mapping holds the given node ids.
fn plane_with_participants(ids: &[u32], keepalive: Duration) -> ControlPlane {
    let records: BTreeMap<u32, NodeRecord> = ids.iter().map(|&id| (id, record(id))).collect();
    let system = SystemConfig::new(TrainParams::default(), records);
    ControlPlane::new(system, keepalive)
}

fn peer(id: u32) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, id as u8 + 1], 6000 + id as u16))
}

/// Registers a fake live connection and returns its frame queue.
fn register(plane: &ControlPlane, id: u32) -> mpsc::Receiver<Frame> {
    let (tx, rx) = mpsc::channel(8);
    plane
        .registry()
        .insert(ConnectionHandle::new(peer(id), tx));
    rx
}

async fn expect_event(rx: &mut mpsc::Receiver<Frame>, event: &str) -> serde_json::Value {
    match timeout(Duration::from_secs(1), rx.recv()).await {
        Ok(Some(Frame::Event(envelope))) => {
            assert_eq!(envelope.event, event);
            envelope.data
        }
        other => panic!("expected `{event}` event, got {other:?}"),
    }
}

#[tokio::test]
async fn broadcast_reaches_every_live_connection() {
    let plane = plane_with_participants(&[0, 2], Duration::from_secs(20));

    let mut queues: Vec<_> = (0..3).map(|id| register(&plane, id)).collect();

    let delivered = plane.broadcast(Command::CleanProgs).await;
    assert_eq!(delivered, 3);

    for rx in &mut queues {
        expect_event(rx, "clean_progs").await;
    }
}

#[tokio::test]
async fn multicast_reaches_only_topology_participants() {
    // Live peers {0, 1, 2}, node-config keys {0, 2}.
    let plane = plane_with_participants(&[0, 2], Duration::from_secs(20));

    let mut in_topology_a = register(&plane, 0);
    let mut outsider = register(&plane, 1);
    let mut in_topology_b = register(&plane, 2);

    let delivered = plane.multicast(Command::RunEbpfProgs).await;
    assert_eq!(delivered, 2);

    expect_event(&mut in_topology_a, "run_ebpf_progs").await;
    expect_event(&mut in_topology_b, "run_ebpf_progs").await;

    assert!(
        timeout(Duration::from_millis(100), outsider.recv())
            .await
            .is_err(),
        "outsider must not receive multicast"
    );
}

#[tokio::test]
async fn directed_update_carries_each_peers_own_record() {
    let plane = plane_with_participants(&[0, 1], Duration::from_secs(20));

    let mut first = register(&plane, 0);
    let mut second = register(&plane, 1);
    let mut outsider = register(&plane, 7);

    let delivered = plane.update_local_config().await;
    assert_eq!(delivered, 2);

    let data = expect_event(&mut first, "update_local_config").await;
    assert_eq!(data["id"], 0);
    assert!(data.get("worker_num").is_some());

    let data = expect_event(&mut second, "update_local_config").await;
    assert_eq!(data["id"], 1);

    assert!(
        timeout(Duration::from_millis(100), outsider.recv())
            .await
            .is_err(),
        "peer without a compiled record must be skipped"
    );
}

#[tokio::test]
async fn one_dead_target_does_not_block_the_batch() {
    let plane = plane_with_participants(&[0, 1], Duration::from_secs(20));

    let dead = register(&plane, 0);
    drop(dead);
    let mut alive = register(&plane, 1);

    let delivered = plane.broadcast(Command::Ping).await;
    assert_eq!(delivered, 1);

    expect_event(&mut alive, "ping").await;
}

type AgentEnd = (
    FrameReceiver<ReadHalf<DuplexStream>>,
    FrameSender<WriteHalf<DuplexStream>>,
);

fn session_pair(
    plane: &Arc<ControlPlane>,
    id: u32,
) -> (tokio::task::JoinHandle<Result<(), CoordinatorError>>, AgentEnd) {
    let (coord_stream, agent_stream) = io::duplex(BUF_SIZE);

    let (rx, tx) = io::split(coord_stream);
    let (rx, tx) = comms::channel(rx, tx);

    let plane = Arc::clone(plane);
    let task = tokio::spawn(async move { plane.session(peer(id), rx, tx).await });

    let (rx, tx) = io::split(agent_stream);
    (task, comms::channel(rx, tx))
}

#[tokio::test]
async fn silent_agent_is_expelled_on_missed_keepalive() {
    let plane = Arc::new(plane_with_participants(&[0], Duration::from_millis(50)));

    let (task, (mut agent_rx, _agent_tx)) = session_pair(&plane, 0);

    // The agent reads the probe but never answers it.
    assert_eq!(agent_rx.recv().await.unwrap(), Frame::Ping);

    match timeout(Duration::from_secs(1), task).await.unwrap().unwrap() {
        Err(CoordinatorError::PeerLost { addr }) => assert_eq!(addr, peer(0)),
        other => panic!("expected PeerLost, got {other:?}"),
    }

    assert!(plane.registry().is_empty());
    assert_eq!(plane.broadcast(Command::Ping).await, 0);
}

#[tokio::test]
async fn responsive_agent_stays_registered() {
    let plane = Arc::new(plane_with_participants(&[0], Duration::from_millis(50)));

    let (task, (mut agent_rx, mut agent_tx)) = session_pair(&plane, 0);

    // Answer three probe cycles.
    for _ in 0..3 {
        assert_eq!(agent_rx.recv().await.unwrap(), Frame::Ping);
        agent_tx.send(&Frame::Pong).await.unwrap();
    }

    assert_eq!(plane.registry().len(), 1);

    // Commands queued through the registry arrive over the session.
    let delivered = plane.broadcast(Command::CleanProgs).await;
    assert_eq!(delivered, 1);

    loop {
        match agent_rx.recv().await.unwrap() {
            Frame::Event(envelope) => {
                assert_eq!(envelope.event, "clean_progs");
                break;
            }
            Frame::Ping => agent_tx.send(&Frame::Pong).await.unwrap(),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    // Closing the agent side ends the session cleanly.
    drop(agent_rx);
    drop(agent_tx);
    assert!(timeout(Duration::from_secs(1), task).await.unwrap().unwrap().is_ok());
    assert!(plane.registry().is_empty());
}
