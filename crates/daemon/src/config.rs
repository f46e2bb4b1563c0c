//! Daemon configuration: file-backed, defaults written on first run.

use ppg_pipeline::StreamConfig;
use ppg_sensor::SensorConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Configuration for the daemon
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Address the transport listens on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Stream geometry
    #[serde(default)]
    pub stream: StreamConfig,
    /// Optical front-end settings
    #[serde(default)]
    pub sensor: SensorConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:9290".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            stream: StreamConfig::default(),
            sensor: SensorConfig::default(),
        }
    }
}

/// Load configuration from `path`, creating the file with defaults when
/// it does not exist yet. A malformed file falls back to defaults
/// rather than refusing to start.
pub fn load_config(path: &str) -> DaemonConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                info!("loaded configuration from {path}");
                config
            }
            Err(e) => {
                warn!("could not parse {path}: {e}; using defaults");
                DaemonConfig::default()
            }
        },
        Err(_) => {
            let config = DaemonConfig::default();
            if let Ok(json) = serde_json::to_string_pretty(&config) {
                if std::fs::write(path, json).is_ok() {
                    info!("created default configuration file at {path}");
                }
            }
            config
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let path = path.to_str().unwrap();

        let config = load_config(path);
        assert_eq!(config.listen_addr, "0.0.0.0:9290");
        assert_eq!(config.stream.sample_rate, 200);

        // The file now exists and parses back to the same values.
        let reloaded = load_config(path);
        assert_eq!(reloaded.stream.batch_size, config.stream.batch_size);
        assert_eq!(reloaded.sensor.pulse_width, config.sensor.pulse_width);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"listen_addr": "127.0.0.1:7000", "stream": {"sample_rate": 400}}"#,
        )
        .unwrap();

        let config = load_config(path.to_str().unwrap());
        assert_eq!(config.listen_addr, "127.0.0.1:7000");
        assert_eq!(config.stream.sample_rate, 400);
        assert_eq!(config.stream.batch_size, 16);
        assert_eq!(config.sensor.led_brightness, 0xF1);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let config = load_config(path.to_str().unwrap());
        assert_eq!(config.stream.sample_rate, 200);
    }
}
