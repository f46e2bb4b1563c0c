//! Per-connection service loop: command -> acquire -> transmit ->
//! transport housekeeping, repeated until the peer disconnects.

use std::time::Duration;

use ppg_pipeline::StreamPipeline;
use ppg_sensor::{PpgSensor, SensorConfig, SensorStatus};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::transport::Transport;

pub const CMD_START: u8 = b'S';
pub const CMD_PAUSE: u8 = b'P';

/// Sleep for a pass that did no work, so the cooperative loop does not
/// spin a core while idle. The pacing delay inside transmission is the
/// only other suspension point.
const IDLE_TICK: Duration = Duration::from_millis(1);

/// Service one connected peer until it disconnects.
///
/// On return the pipeline is fully reset, the sensor is powered down
/// and the peer is dropped; the caller re-advertises so exactly one new
/// connection can be accepted.
pub async fn serve_peer(
    pipeline: &mut StreamPipeline,
    sensor: &mut dyn PpgSensor,
    sensor_config: &SensorConfig,
    transport: &mut dyn Transport,
) {
    pipeline.reset_for_connection();
    let pacing = pipeline.config().pacing();

    while transport.is_connected() {
        let mut worked = false;

        if let Some(cmd) = transport.take_command() {
            worked = true;
            handle_command(cmd, pipeline, sensor, sensor_config);
        }

        if pipeline.is_streaming() {
            match pipeline.poll_sensor(sensor) {
                Ok(outcome) => worked |= outcome.read > 0,
                Err(e) => warn!("sensor poll failed: {e}"),
            }

            if let Some(frames) = pipeline.try_encode_chunk() {
                worked = true;
                for frame in &frames {
                    if transport.notify(frame).await.is_err() {
                        // Disconnect observed mid-chunk; the remaining
                        // frames are discarded with the rest of the
                        // session state below.
                        break;
                    }
                    sleep(pacing).await;
                }
            }
        }

        transport.housekeeping().await;
        if !worked {
            sleep(IDLE_TICK).await;
        }
    }

    // Final statistics, then the same full reset as at connect.
    if let Some(summary) = pipeline.session_summary() {
        println!("{summary}");
    }
    pipeline.reset_for_connection();
    if let Err(e) = sensor.shutdown() {
        warn!("sensor shutdown failed: {e}");
    }
    transport.close_peer().await;
    info!("peer disconnected, state reset");
}

fn handle_command(
    cmd: u8,
    pipeline: &mut StreamPipeline,
    sensor: &mut dyn PpgSensor,
    sensor_config: &SensorConfig,
) {
    match cmd {
        CMD_START => {
            if pipeline.is_streaming() {
                debug!("start command ignored, already streaming");
                return;
            }
            // Configure at most once per connection; the disconnect
            // path shuts the sensor back down.
            if sensor.status() != SensorStatus::Ready {
                if let Err(e) = sensor.configure(sensor_config) {
                    warn!("sensor configuration failed, staying idle: {e}");
                    return;
                }
            }
            pipeline.start_session();
            info!("command: START streaming");
        }
        CMD_PAUSE => {
            if pipeline.pause_session() {
                // Always show stats when pausing, whatever the log
                // verbosity; this is the pipeline's tuning signal.
                if let Some(summary) = pipeline.session_summary() {
                    println!("{summary}");
                }
                info!("command: PAUSE streaming");
            } else {
                debug!("pause command ignored, already idle");
            }
        }
        other => {
            debug!("ignoring unknown command byte 0x{other:02x}");
        }
    }
}
