//! Register-level driver for the MAX30102 pulse-oximetry front-end.
//!
//! Talks I2C via rppal. Only the registers the streaming path needs are
//! modeled: probe, reset, FIFO configuration, burst FIFO reads and the
//! shutdown bit.

use std::collections::VecDeque;

use log::{debug, info, trace, warn};
use rppal::i2c::I2c;

use crate::types::{PpgSensor, Sample, SensorConfig, SensorError, SensorStatus};

const I2C_ADDRESS: u16 = 0x57;

const REG_FIFO_WR_PTR: u8 = 0x04;
const REG_OVF_COUNTER: u8 = 0x05;
const REG_FIFO_RD_PTR: u8 = 0x06;
const REG_FIFO_DATA: u8 = 0x07;
const REG_FIFO_CONFIG: u8 = 0x08;
const REG_MODE_CONFIG: u8 = 0x09;
const REG_SPO2_CONFIG: u8 = 0x0A;
const REG_LED1_PA: u8 = 0x0C;
const REG_LED2_PA: u8 = 0x0D;
const REG_PART_ID: u8 = 0xFF;

const PART_ID: u8 = 0x15;
const MODE_SPO2: u8 = 0x03;
const MODE_RESET: u8 = 0x40;
const MODE_SHUTDOWN: u8 = 0x80;
/// FIFO rollover enable: the chip overwrites its oldest unread sample
/// when full, the accepted loss mode at the hardware boundary.
const FIFO_ROLLOVER_EN: u8 = 0x10;

const FIFO_DEPTH: u8 = 32;
/// Bytes per stored sample: 3 per LED, Red then IR in SpO2 mode.
const BYTES_PER_FIFO_SAMPLE: usize = 6;

pub struct Max30102 {
    i2c: I2c,
    config: SensorConfig,
    status: SensorStatus,
    queue: VecDeque<Sample>,
}

impl Max30102 {
    /// Open the bus and verify the part responds with the right ID.
    pub fn probe() -> Result<Self, SensorError> {
        let mut i2c = I2c::new().map_err(|e| SensorError::BusError(e.to_string()))?;
        i2c.set_slave_address(I2C_ADDRESS)
            .map_err(|e| SensorError::BusError(e.to_string()))?;

        let mut sensor = Self {
            i2c,
            config: SensorConfig::default(),
            status: SensorStatus::Standby,
            queue: VecDeque::with_capacity(FIFO_DEPTH as usize),
        };

        let part_id = sensor.read_register(REG_PART_ID)?;
        if part_id != PART_ID {
            return Err(SensorError::HardwareNotFound(format!(
                "unexpected part id 0x{part_id:02x}, check wiring"
            )));
        }
        info!("MAX30102 found on I2C address 0x{I2C_ADDRESS:02x}");
        Ok(sensor)
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(&[reg], &mut buf)
            .map_err(|e| SensorError::BusError(e.to_string()))?;
        Ok(buf[0])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(&[reg, value])
            .map_err(|e| SensorError::BusError(e.to_string()))?;
        Ok(())
    }

    fn clear_fifo(&mut self) -> Result<(), SensorError> {
        self.write_register(REG_FIFO_WR_PTR, 0)?;
        self.write_register(REG_OVF_COUNTER, 0)?;
        self.write_register(REG_FIFO_RD_PTR, 0)?;
        self.queue.clear();
        Ok(())
    }
}

/// Sample-average count to FIFO_CONFIG[7:5].
fn sample_average_bits(avg: u8) -> Result<u8, SensorError> {
    let bits = match avg {
        1 => 0b000,
        2 => 0b001,
        4 => 0b010,
        8 => 0b011,
        16 => 0b100,
        32 => 0b101,
        other => {
            return Err(SensorError::ConfigurationError(format!(
                "unsupported sample average {other}"
            )))
        }
    };
    Ok(bits << 5)
}

/// Sample rate in Hz to SPO2_CONFIG[4:2].
fn sample_rate_bits(rate: u32) -> Result<u8, SensorError> {
    let bits = match rate {
        50 => 0b000,
        100 => 0b001,
        200 => 0b010,
        400 => 0b011,
        800 => 0b100,
        1000 => 0b101,
        1600 => 0b110,
        3200 => 0b111,
        other => {
            return Err(SensorError::ConfigurationError(format!(
                "unsupported sample rate {other} Hz"
            )))
        }
    };
    Ok(bits << 2)
}

/// Pulse width in microseconds to SPO2_CONFIG[1:0].
fn pulse_width_bits(width: u32) -> Result<u8, SensorError> {
    match width {
        69 => Ok(0b00),
        118 => Ok(0b01),
        215 => Ok(0b10),
        411 => Ok(0b11),
        other => Err(SensorError::ConfigurationError(format!(
            "unsupported pulse width {other} us"
        ))),
    }
}

/// ADC full-scale range in nA to SPO2_CONFIG[6:5].
fn adc_range_bits(range: u32) -> Result<u8, SensorError> {
    let bits = match range {
        2048 => 0b00,
        4096 => 0b01,
        8192 => 0b10,
        16384 => 0b11,
        other => {
            return Err(SensorError::ConfigurationError(format!(
                "unsupported ADC range {other} nA"
            )))
        }
    };
    Ok(bits << 5)
}

impl PpgSensor for Max30102 {
    fn configure(&mut self, config: &SensorConfig) -> Result<(), SensorError> {
        if config.led_mode != 2 {
            return Err(SensorError::ConfigurationError(format!(
                "streaming needs Red + IR (led_mode 2), got {}",
                config.led_mode
            )));
        }

        let spo2 = adc_range_bits(config.adc_range)?
            | sample_rate_bits(config.sample_rate)?
            | pulse_width_bits(config.pulse_width)?;
        let fifo = sample_average_bits(config.sample_average)? | FIFO_ROLLOVER_EN;

        self.write_register(REG_MODE_CONFIG, MODE_RESET)?;
        self.write_register(REG_FIFO_CONFIG, fifo)?;
        self.write_register(REG_SPO2_CONFIG, spo2)?;
        self.write_register(REG_LED1_PA, config.led_brightness)?;
        self.write_register(REG_LED2_PA, config.led_brightness)?;
        self.write_register(REG_MODE_CONFIG, MODE_SPO2)?;
        self.clear_fifo()?;

        self.config = config.clone();
        self.status = SensorStatus::Ready;
        info!(
            "MAX30102 configured for {} Hz streaming",
            config.sample_rate
        );
        Ok(())
    }

    fn check(&mut self) -> Result<usize, SensorError> {
        if self.status != SensorStatus::Ready {
            return Err(SensorError::NotConfigured);
        }

        let wr_ptr = self.read_register(REG_FIFO_WR_PTR)?;
        let rd_ptr = self.read_register(REG_FIFO_RD_PTR)?;
        let available = wr_ptr.wrapping_sub(rd_ptr) & (FIFO_DEPTH - 1);
        if available == 0 {
            return Ok(0);
        }

        let mut raw = vec![0u8; available as usize * BYTES_PER_FIFO_SAMPLE];
        self.i2c
            .write_read(&[REG_FIFO_DATA], &mut raw)
            .map_err(|e| SensorError::BusError(e.to_string()))?;

        for bytes in raw.chunks_exact(BYTES_PER_FIFO_SAMPLE) {
            // 18-bit values, left-justified across three bytes
            let red = (u32::from(bytes[0]) << 16 | u32::from(bytes[1]) << 8 | u32::from(bytes[2]))
                & 0x03FFFF;
            let ir = (u32::from(bytes[3]) << 16 | u32::from(bytes[4]) << 8 | u32::from(bytes[5]))
                & 0x03FFFF;
            self.queue.push_back(Sample { ir, red });
        }

        let overflow = self.read_register(REG_OVF_COUNTER)?;
        if overflow > 0 {
            warn!("MAX30102 FIFO rolled over, ~{overflow} samples lost on chip");
        }
        trace!("MAX30102 read {available} samples off the FIFO");
        Ok(available as usize)
    }

    fn next_sample(&mut self) -> Option<Sample> {
        self.queue.pop_front()
    }

    fn shutdown(&mut self) -> Result<(), SensorError> {
        if self.status == SensorStatus::ShutDown {
            return Ok(());
        }
        debug!("Shutting down MAX30102");
        self.write_register(REG_MODE_CONFIG, MODE_SHUTDOWN)?;
        self.queue.clear();
        self.status = SensorStatus::ShutDown;
        info!("MAX30102 shut down (power saving)");
        Ok(())
    }

    fn status(&self) -> SensorStatus {
        self.status
    }
}
