//! End-to-end test: a TCP peer drives the full command -> acquire ->
//! transmit loop against the mock sensor.

use std::time::Duration;

use ppg_daemon::connection;
use ppg_daemon::transport::{TcpTransport, Transport};
use ppg_pipeline::{decode_frame, StreamConfig, StreamPipeline};
use ppg_sensor::{create_sensor, SensorConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

fn test_stream_config() -> StreamConfig {
    StreamConfig {
        pacing_ms: 1,
        ..StreamConfig::default()
    }
}

/// Bind a transport on an ephemeral port and serve a single connection.
async fn spawn_server(config: StreamConfig) -> (std::net::SocketAddr, JoinHandle<()>) {
    let mut transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap();
    let mut pipeline = StreamPipeline::new(config).unwrap();
    let mut sensor = create_sensor(true).unwrap();
    let sensor_config = SensorConfig::default();

    let handle = tokio::spawn(async move {
        transport.advertise().await.unwrap();
        transport.wait_for_peer().await.unwrap();
        connection::serve_peer(
            &mut pipeline,
            sensor.as_mut(),
            &sensor_config,
            &mut transport,
        )
        .await;
    });
    (addr, handle)
}

#[tokio::test]
async fn streams_ordered_frames_to_a_tcp_peer() {
    let config = test_stream_config();
    let frame_size = config.frame_size();
    let frames_per_chunk = config.frames_per_chunk();
    let batch_size = config.batch_size;
    let (addr, server) = spawn_server(config).await;

    let mut peer = TcpStream::connect(addr).await.unwrap();
    peer.write_all(b"S").await.unwrap();

    // Two chunks are 64 samples, ~320 ms of mock data at 200 Hz.
    let wanted = 2 * frames_per_chunk;
    let mut frames = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    let mut buf = vec![0u8; frame_size];
    while frames.len() < wanted {
        tokio::select! {
            res = peer.read_exact(&mut buf) => {
                res.unwrap();
                frames.push(buf.clone());
            }
            _ = tokio::time::sleep_until(deadline) => {
                panic!("timed out after {} of {} frames", frames.len(), wanted);
            }
        }
    }

    // Frames of one chunk share a sequence byte; chunks count up from 1.
    for (i, frame) in frames.iter().enumerate() {
        let (seq, samples) = decode_frame(frame).unwrap();
        assert_eq!(seq as usize, i / frames_per_chunk + 1);
        assert_eq!(samples.len(), batch_size);
    }

    peer.write_all(b"P").await.unwrap();
    drop(peer);
    server.await.unwrap();
}

#[tokio::test]
async fn idle_peer_receives_nothing() {
    let (addr, server) = spawn_server(test_stream_config()).await;

    let mut peer = TcpStream::connect(addr).await.unwrap();
    // Unknown command and a pause while idle are both no-ops.
    peer.write_all(b"X").await.unwrap();
    peer.write_all(b"P").await.unwrap();

    let mut buf = [0u8; 1];
    let res = tokio::time::timeout(Duration::from_millis(300), peer.read(&mut buf)).await;
    assert!(res.is_err(), "no frames expected while idle");

    drop(peer);
    server.await.unwrap();
}

#[tokio::test]
async fn disconnect_mid_stream_resets_cleanly() {
    let (addr, server) = spawn_server(test_stream_config()).await;

    let mut peer = TcpStream::connect(addr).await.unwrap();
    peer.write_all(b"S").await.unwrap();

    // Take one frame so the session is demonstrably live, then vanish
    // without pausing.
    let mut buf = vec![0u8; test_stream_config().frame_size()];
    tokio::time::timeout(Duration::from_secs(10), peer.read_exact(&mut buf))
        .await
        .expect("first frame within deadline")
        .unwrap();
    drop(peer);

    // The serve loop must notice the disconnect and return.
    tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("server loop exits on disconnect")
        .unwrap();
}
