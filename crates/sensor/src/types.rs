//! Common types and the trait all PPG front-end drivers implement.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One photoplethysmogram sample: infrared and red LED intensities the
/// front-end captured for the same instant. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub ir: u32,
    pub red: u32,
}

/// Hardware settings applied to the optical front-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Target sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// LED drive current code (0xF1 is roughly 50 mA; lower it if the
    /// sensor runs hot)
    #[serde(default = "default_led_brightness")]
    pub led_brightness: u8,
    /// On-chip sample averaging (1 = none)
    #[serde(default = "default_sample_average")]
    pub sample_average: u8,
    /// LED mode (2 = Red + IR)
    #[serde(default = "default_led_mode")]
    pub led_mode: u8,
    /// LED pulse width in microseconds
    #[serde(default = "default_pulse_width")]
    pub pulse_width: u32,
    /// ADC full-scale range in nA
    #[serde(default = "default_adc_range")]
    pub adc_range: u32,
}

fn default_sample_rate() -> u32 {
    200
}
fn default_led_brightness() -> u8 {
    0xF1
}
fn default_sample_average() -> u8 {
    1
}
fn default_led_mode() -> u8 {
    2
}
fn default_pulse_width() -> u32 {
    411
}
fn default_adc_range() -> u32 {
    16384
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            led_brightness: default_led_brightness(),
            sample_average: default_sample_average(),
            led_mode: default_led_mode(),
            pulse_width: default_pulse_width(),
            adc_range: default_adc_range(),
        }
    }
}

/// Status of a sensor driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorStatus {
    /// Probed but not yet configured for a connection
    Standby,
    /// Configured and converting
    Ready,
    /// Powered down
    ShutDown,
}

/// Errors that can occur in sensor drivers
#[derive(Error, Debug)]
pub enum SensorError {
    /// Hardware probe failed
    #[error("Hardware not found: {0}")]
    HardwareNotFound(String),
    /// Invalid or unsupported configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    /// Fault while reading samples
    #[error("Acquisition error: {0}")]
    AcquisitionError(String),
    /// Bus-level communication error
    #[error("Bus error: {0}")]
    BusError(String),
    /// Operation requires a configured sensor
    #[error("Sensor not configured")]
    NotConfigured,
}

/// Trait all PPG front-end drivers implement.
///
/// The pipeline polls cooperatively from a single control flow: `check`
/// refreshes the driver's view of the hardware FIFO, `next_sample` pops
/// one queued sample. Neither call blocks. The driver's own FIFO may
/// discard data if `check` is called too rarely; that loss happens at
/// the hardware boundary and is not surfaced as an error.
pub trait PpgSensor: Send {
    /// Apply the front-end settings and start conversions. Safe to call
    /// again with the same settings.
    fn configure(&mut self, config: &SensorConfig) -> Result<(), SensorError>;

    /// Refresh the driver's sample queue from the hardware FIFO.
    /// Returns the number of samples read off the hardware.
    fn check(&mut self) -> Result<usize, SensorError>;

    /// Pop the oldest queued sample, if any.
    fn next_sample(&mut self) -> Option<Sample>;

    /// Power the front-end down. Safe to call when already down.
    fn shutdown(&mut self) -> Result<(), SensorError>;

    /// Current driver status.
    fn status(&self) -> SensorStatus;
}
