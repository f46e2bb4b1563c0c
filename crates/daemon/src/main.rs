use anyhow::Context;
use clap::{Arg, Command};
use ppg_daemon::transport::{TcpTransport, Transport};
use ppg_daemon::{config, connection};
use ppg_pipeline::StreamPipeline;
use ppg_sensor::create_sensor;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ppg_daemon=info,ppg_pipeline=info,ppg_sensor=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("PPG streaming daemon starting...");

    // --- Argument Parsing ---
    let matches = Command::new("ppg_daemon")
        .about("PPG sample streaming daemon")
        .arg(
            Arg::new("mock")
                .long("mock")
                .action(clap::ArgAction::SetTrue)
                .help("Use the synthetic PPG sensor instead of real hardware"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .default_value("config.json")
                .help("Path to the daemon configuration file"),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .cloned()
        .unwrap_or_else(|| "config.json".to_string());
    let daemon_config = config::load_config(&config_path);

    // A configuration that fails here cannot satisfy the framing
    // invariants; this is never a runtime path.
    let mut pipeline = StreamPipeline::new(daemon_config.stream.clone())
        .context("invalid stream configuration")?;
    let stream = pipeline.config();
    tracing::info!(
        "stream geometry: {} Hz, buffer {} samples, chunk {} samples, {} frames of {} bytes per chunk",
        stream.sample_rate,
        stream.buffer_capacity(),
        stream.chunk_size(),
        stream.frames_per_chunk(),
        stream.frame_size(),
    );

    // --- Collaborator Initialization ---
    // Either collaborator failing to come up is fatal: the pipeline's
    // invariants (configured sensor, advertising transport) cannot be
    // established, so halt before serving.
    let use_mock = matches.get_flag("mock");
    let mut sensor = create_sensor(use_mock).context("sensor initialization failed")?;

    let mut transport = TcpTransport::bind(&daemon_config.listen_addr)
        .await
        .context("transport initialization failed")?;

    // --- Connection Loop ---
    // One peer at a time; every disconnect returns the system to a
    // state ready to accept exactly one new connection.
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        transport.advertise().await?;
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break;
            }
            res = async {
                transport.wait_for_peer().await?;
                connection::serve_peer(
                    &mut pipeline,
                    sensor.as_mut(),
                    &daemon_config.sensor,
                    &mut transport,
                )
                .await;
                Ok::<_, ppg_daemon::transport::TransportError>(())
            } => {
                res.context("connection service failed")?;
            }
        }
    }

    if let Err(e) = sensor.shutdown() {
        tracing::warn!("sensor shutdown failed: {e}");
    }
    tracing::info!("PPG daemon stopped gracefully.");
    Ok(())
}
