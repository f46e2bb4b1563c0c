//! Synthetic PPG front-end used when no hardware is attached.
//!
//! Produces a plausible cardiac waveform at the configured sample rate,
//! paced by wall clock, through a bounded FIFO with the same depth and
//! overrun behavior as the real chip.

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::time::Instant;

use log::{debug, info, trace, warn};
use rand_distr::{Distribution, Normal};

use crate::types::{PpgSensor, Sample, SensorConfig, SensorError, SensorStatus};

/// Depth of the simulated hardware FIFO, matching the MAX30102.
const FIFO_DEPTH: usize = 32;

/// Simulated pulse rate, ~72 bpm.
const PULSE_HZ: f64 = 1.2;
/// Respiratory baseline drift.
const RESP_HZ: f64 = 0.25;

const IR_DC: f64 = 90_000.0;
const IR_AC: f64 = 6_000.0;
const RED_DC: f64 = 70_000.0;
const RED_AC: f64 = 4_500.0;
const NOISE_SD: f64 = 120.0;

/// A stubbed-out driver that does not access any hardware.
pub struct MockSensor {
    config: SensorConfig,
    status: SensorStatus,
    fifo: VecDeque<Sample>,
    /// Wall-clock instant of the last FIFO refill.
    last_check: Option<Instant>,
    /// Fractional sample period carried between refills.
    carry: f64,
    /// Samples synthesized since configure; drives the waveform phase.
    produced: u64,
    noise: Normal<f64>,
}

impl MockSensor {
    pub fn new() -> Result<Self, SensorError> {
        let noise = Normal::new(0.0, NOISE_SD)
            .map_err(|e| SensorError::ConfigurationError(format!("noise model: {e}")))?;
        info!("MockSensor created");
        Ok(Self {
            config: SensorConfig::default(),
            status: SensorStatus::Standby,
            fifo: VecDeque::with_capacity(FIFO_DEPTH),
            last_check: None,
            carry: 0.0,
            produced: 0,
            noise,
        })
    }

    /// One synthetic sample: DC level plus a cardiac pulse with a
    /// dicrotic bump, breathing drift and shot noise.
    fn synthesize(&mut self) -> Sample {
        let t = self.produced as f64 / self.config.sample_rate as f64;
        self.produced += 1;

        let beat = 2.0 * PI * PULSE_HZ * t;
        let pulse = 0.60 * beat.sin() + 0.20 * (2.0 * beat).sin();
        let drift = 0.05 * (2.0 * PI * RESP_HZ * t).sin();
        let noise = self.noise.sample(&mut rand::thread_rng());

        let ir = IR_DC + IR_AC * (pulse + drift) + noise;
        let red = RED_DC + RED_AC * (pulse + drift) + noise * 0.8;
        Sample {
            ir: ir.max(0.0) as u32,
            red: red.max(0.0) as u32,
        }
    }
}

impl PpgSensor for MockSensor {
    fn configure(&mut self, config: &SensorConfig) -> Result<(), SensorError> {
        if config.sample_rate == 0 {
            return Err(SensorError::ConfigurationError(
                "sample rate must be greater than 0".to_string(),
            ));
        }
        self.config = config.clone();
        self.fifo.clear();
        self.last_check = Some(Instant::now());
        self.carry = 0.0;
        self.produced = 0;
        self.status = SensorStatus::Ready;
        info!(
            "MockSensor configured for {} Hz streaming",
            config.sample_rate
        );
        Ok(())
    }

    fn check(&mut self) -> Result<usize, SensorError> {
        if self.status != SensorStatus::Ready {
            trace!("check on unconfigured MockSensor, nothing queued");
            return Ok(0);
        }

        let now = Instant::now();
        let last = match self.last_check.replace(now) {
            Some(last) => last,
            None => return Ok(0),
        };

        let period = 1.0 / self.config.sample_rate as f64;
        let elapsed = now.duration_since(last).as_secs_f64() + self.carry;
        let due = (elapsed / period) as usize;
        self.carry = elapsed - due as f64 * period;

        let mut overrun = 0usize;
        let mut to_generate = due;
        if to_generate > FIFO_DEPTH {
            // Anything past one FIFO depth would be displaced before it
            // could be read; skip the waveform ahead instead of
            // synthesizing samples just to drop them.
            let skipped = to_generate - FIFO_DEPTH;
            self.produced += skipped as u64;
            overrun += skipped;
            to_generate = FIFO_DEPTH;
        }
        for _ in 0..to_generate {
            let sample = self.synthesize();
            if self.fifo.len() == FIFO_DEPTH {
                // Hardware FIFO semantics: the chip discards the oldest
                // unread sample when it rolls over.
                self.fifo.pop_front();
                overrun += 1;
            }
            self.fifo.push_back(sample);
        }

        if overrun > 0 {
            warn!("MockSensor FIFO overrun, {overrun} oldest samples discarded");
        }
        trace!("MockSensor queued {due} samples");
        Ok(due)
    }

    fn next_sample(&mut self) -> Option<Sample> {
        self.fifo.pop_front()
    }

    fn shutdown(&mut self) -> Result<(), SensorError> {
        debug!("Shutting down MockSensor");
        self.fifo.clear();
        self.last_check = None;
        self.status = SensorStatus::ShutDown;
        Ok(())
    }

    fn status(&self) -> SensorStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn produces_samples_at_wall_clock_rate() {
        let mut sensor = MockSensor::new().unwrap();
        sensor.configure(&SensorConfig::default()).unwrap();

        sleep(Duration::from_millis(100));
        let queued = sensor.check().unwrap();

        // 200 Hz over >= 100 ms is at least 20 samples; a slow test
        // machine only increases the count, capped by the FIFO.
        assert!(queued >= 20, "expected >= 20 samples, got {queued}");
        assert!(sensor.fifo.len() <= FIFO_DEPTH);
    }

    #[test]
    fn fifo_overrun_discards_oldest() {
        let mut sensor = MockSensor::new().unwrap();
        sensor.configure(&SensorConfig::default()).unwrap();

        // 300 ms at 200 Hz is ~60 samples, well past the 32-deep FIFO.
        sleep(Duration::from_millis(300));
        let queued = sensor.check().unwrap();
        assert!(queued > FIFO_DEPTH);
        assert_eq!(sensor.fifo.len(), FIFO_DEPTH);

        let mut drained = 0;
        while sensor.next_sample().is_some() {
            drained += 1;
        }
        assert_eq!(drained, FIFO_DEPTH);
    }

    #[test]
    fn unconfigured_sensor_queues_nothing() {
        let mut sensor = MockSensor::new().unwrap();
        assert_eq!(sensor.status(), SensorStatus::Standby);
        assert_eq!(sensor.check().unwrap(), 0);
        assert!(sensor.next_sample().is_none());
    }

    #[test]
    fn shutdown_clears_queue_and_state() {
        let mut sensor = MockSensor::new().unwrap();
        sensor.configure(&SensorConfig::default()).unwrap();
        sleep(Duration::from_millis(50));
        sensor.check().unwrap();

        sensor.shutdown().unwrap();
        assert_eq!(sensor.status(), SensorStatus::ShutDown);
        assert!(sensor.next_sample().is_none());
        assert_eq!(sensor.check().unwrap(), 0);
    }

    #[test]
    fn reconfigure_restarts_the_waveform() {
        let mut sensor = MockSensor::new().unwrap();
        sensor.configure(&SensorConfig::default()).unwrap();
        sleep(Duration::from_millis(50));
        sensor.check().unwrap();

        sensor.configure(&SensorConfig::default()).unwrap();
        assert!(sensor.next_sample().is_none());
        assert_eq!(sensor.produced, 0);
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let mut sensor = MockSensor::new().unwrap();
        let config = SensorConfig {
            sample_rate: 0,
            ..SensorConfig::default()
        };
        assert!(sensor.configure(&config).is_err());
        assert_eq!(sensor.status(), SensorStatus::Standby);
    }
}
