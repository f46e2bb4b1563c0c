//! Stream geometry: the tunable knobs and the sizes derived from them.
//!
//! Everything here is fixed at configuration time. `validate` rejects
//! any combination that would break the framing invariants, so the
//! runtime never has to re-check them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest frame the transport will accept in one notification.
pub const MAX_FRAME_SIZE: usize = 512;

/// User-tunable streaming parameters.
///
/// The defaults trade detail against transport stability the same way
/// the reference hardware settings do: 200 Hz, five seconds of buffer
/// headroom, 0.2 s chunks of 16-sample frames with 3 ms pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sample production rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Seconds of buffer headroom absorbing transport stalls.
    #[serde(default = "default_headroom_secs")]
    pub headroom_secs: u32,
    /// Seconds of data sent in one burst; latency vs. overhead.
    #[serde(default = "default_chunk_secs")]
    pub chunk_secs: f32,
    /// Delay between successive frames of one chunk, in milliseconds.
    /// Protects the transport's internal send queue.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    /// Samples encoded per frame.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_sample_rate() -> u32 {
    200
}
fn default_headroom_secs() -> u32 {
    5
}
fn default_chunk_secs() -> f32 {
    0.20
}
fn default_pacing_ms() -> u64 {
    3
}
fn default_batch_size() -> usize {
    16
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            headroom_secs: default_headroom_secs(),
            chunk_secs: default_chunk_secs(),
            pacing_ms: default_pacing_ms(),
            batch_size: default_batch_size(),
        }
    }
}

/// A configuration the framing invariants cannot be built from.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("sample rate must be greater than 0")]
    ZeroSampleRate,
    #[error("batch size must be greater than 0")]
    ZeroBatchSize,
    #[error("buffer headroom must be greater than 0")]
    ZeroHeadroom,
    #[error("a {chunk_secs} s chunk at {sample_rate} Hz holds no full batch of {batch_size}")]
    ChunkTooSmall {
        chunk_secs: f32,
        sample_rate: u32,
        batch_size: usize,
    },
    #[error("frame of {frame_size} bytes exceeds the transport limit of {limit}")]
    FrameTooLarge { frame_size: usize, limit: usize },
    #[error("buffer capacity {capacity} cannot hold one chunk of {chunk_size} samples")]
    CapacityTooSmall { capacity: usize, chunk_size: usize },
}

impl StreamConfig {
    /// Buffer capacity in samples.
    pub fn buffer_capacity(&self) -> usize {
        (self.sample_rate * self.headroom_secs) as usize
    }

    /// Chunk size before rounding to a batch multiple.
    pub fn raw_chunk_size(&self) -> usize {
        (self.sample_rate as f32 * self.chunk_secs + 0.5) as usize
    }

    /// Samples per chunk, rounded down to a multiple of `batch_size`.
    pub fn chunk_size(&self) -> usize {
        if self.batch_size == 0 {
            return 0;
        }
        (self.raw_chunk_size() / self.batch_size) * self.batch_size
    }

    /// Frames needed to carry one chunk.
    pub fn frames_per_chunk(&self) -> usize {
        if self.batch_size == 0 {
            return 0;
        }
        self.chunk_size() / self.batch_size
    }

    /// Bytes per frame: one sequence byte plus 8 bytes per sample.
    pub fn frame_size(&self) -> usize {
        crate::frame::frame_size(self.batch_size)
    }

    /// Delay between successive frames of one chunk.
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Check every derived-size invariant. Violations are construction
    /// defects, never a runtime path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.headroom_secs == 0 {
            return Err(ConfigError::ZeroHeadroom);
        }
        if self.chunk_size() == 0 {
            return Err(ConfigError::ChunkTooSmall {
                chunk_secs: self.chunk_secs,
                sample_rate: self.sample_rate,
                batch_size: self.batch_size,
            });
        }
        if self.frame_size() > MAX_FRAME_SIZE {
            return Err(ConfigError::FrameTooLarge {
                frame_size: self.frame_size(),
                limit: MAX_FRAME_SIZE,
            });
        }
        if self.buffer_capacity() < self.chunk_size() {
            return Err(ConfigError::CapacityTooSmall {
                capacity: self.buffer_capacity(),
                chunk_size: self.chunk_size(),
            });
        }
        // chunk_size is rounded down to a batch multiple above, so the
        // divisibility invariant holds by construction.
        debug_assert_eq!(self.chunk_size() % self.batch_size, 0);
        Ok(())
    }
}
