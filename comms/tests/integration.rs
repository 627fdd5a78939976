use comms::specs::{Command, RunMode};
use comms::{Envelope, Frame};
use tokio::io;

const BUF_SIZE: usize = 4096;

#[tokio::test]
async fn send_recv_text_ack() {
    let (one, two) = io::duplex(BUF_SIZE);

    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);
    tx.send(&Frame::Text("Pong!".to_string())).await.unwrap();

    let (rx, tx) = io::split(two);
    let (mut rx, _) = comms::channel(rx, tx);

    assert_eq!(rx.recv().await.unwrap(), Frame::Text("Pong!".to_string()));
}

#[tokio::test]
async fn send_recv_command_envelope() {
    let (one, two) = io::duplex(BUF_SIZE);

    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);

    let envelope = Command::RunTrain(RunMode::TorchDdp).into_envelope();
    tx.send(&Frame::Event(envelope)).await.unwrap();

    let (rx, tx) = io::split(two);
    let (mut rx, _) = comms::channel(rx, tx);

    match rx.recv().await.unwrap() {
        Frame::Event(envelope) => {
            let cmd = Command::try_from(&envelope).unwrap();
            assert_eq!(cmd, Command::RunTrain(RunMode::TorchDdp));
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn ping_pong_exchange() {
    let (one, two) = io::duplex(BUF_SIZE);

    let (a_rx, a_tx) = io::split(one);
    let (mut a_rx, mut a_tx) = comms::channel(a_rx, a_tx);

    let (b_rx, b_tx) = io::split(two);
    let (mut b_rx, mut b_tx) = comms::channel(b_rx, b_tx);

    a_tx.send(&Frame::Ping).await.unwrap();
    assert_eq!(b_rx.recv().await.unwrap(), Frame::Ping);

    b_tx.send(&Frame::Pong).await.unwrap();
    assert_eq!(a_rx.recv().await.unwrap(), Frame::Pong);
}

#[tokio::test]
async fn frames_preserve_arrival_order() {
    let (one, two) = io::duplex(BUF_SIZE);

    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);

    tx.send(&Frame::Event(Envelope::bare("clean_progs")))
        .await
        .unwrap();
    tx.send(&Frame::Text("Cleaned!".to_string())).await.unwrap();
    tx.send(&Frame::Ping).await.unwrap();

    let (rx, tx) = io::split(two);
    let (mut rx, _) = comms::channel(rx, tx);

    assert_eq!(
        rx.recv().await.unwrap(),
        Frame::Event(Envelope::bare("clean_progs"))
    );
    assert_eq!(rx.recv().await.unwrap(), Frame::Text("Cleaned!".to_string()));
    assert_eq!(rx.recv().await.unwrap(), Frame::Ping);
}
