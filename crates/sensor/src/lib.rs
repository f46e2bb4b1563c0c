//! PPG sensor drivers: the front-end trait, a synthetic mock and the
//! MAX30102 hardware driver (behind the `hardware` feature).

pub mod mock;
pub mod types;

#[cfg(feature = "hardware")]
pub mod max30102;

// Re-export the main types that users need
pub use types::{PpgSensor, Sample, SensorConfig, SensorError, SensorStatus};

/// Factory for the appropriate driver.
///
/// `use_mock` forces the synthetic sensor. Otherwise the MAX30102 is
/// probed when compiled with the `hardware` feature, falling back to the
/// mock when the probe fails so development boxes still run.
pub fn create_sensor(use_mock: bool) -> Result<Box<dyn PpgSensor>, SensorError> {
    #[cfg(feature = "hardware")]
    if !use_mock {
        match max30102::Max30102::probe() {
            Ok(sensor) => return Ok(Box::new(sensor)),
            Err(e) => {
                log::warn!("MAX30102 probe failed ({e}), falling back to MockSensor");
            }
        }
    }

    #[cfg(not(feature = "hardware"))]
    if !use_mock {
        log::info!("hardware feature not enabled, using MockSensor");
    }

    Ok(Box::new(mock::MockSensor::new()?))
}
