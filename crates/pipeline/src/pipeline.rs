//! The owned acquisition -> buffer -> frames pipeline.

use log::{debug, warn};
use ppg_sensor::{PpgSensor, SensorError};

use crate::buffer::SampleBuffer;
use crate::config::{ConfigError, StreamConfig};
use crate::frame;
use crate::session::{SessionSummary, StreamSession};

/// Outcome of one acquisition pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Samples read from the sensor this pass.
    pub read: usize,
    /// Samples rejected by a full buffer.
    pub dropped: usize,
}

/// Single owner of all streaming state for the active connection:
/// buffer, sequence counter and session. Collaborators are handed in
/// per call and hold no pipeline state.
pub struct StreamPipeline {
    config: StreamConfig,
    buffer: SampleBuffer,
    session: StreamSession,
    seq: u8,
}

impl StreamPipeline {
    /// Build a pipeline from a configuration, validating every derived
    /// size up front so the runtime never re-checks them.
    pub fn new(config: StreamConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let buffer = SampleBuffer::new(config.buffer_capacity());
        let session = StreamSession::new(config.sample_rate);
        Ok(Self {
            config,
            buffer,
            session,
            seq: 0,
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn is_streaming(&self) -> bool {
        self.session.is_streaming()
    }

    /// Buffered, unread samples.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Re-establish every invariant for a fresh connection: Idle state,
    /// sequence 0, empty buffer, zeroed counters.
    pub fn reset_for_connection(&mut self) {
        self.session.reset();
        self.buffer.clear();
        self.seq = 0;
        debug!("pipeline state reset");
    }

    /// Idle -> Streaming; `false` when already streaming.
    pub fn start_session(&mut self) -> bool {
        self.session.start()
    }

    /// Streaming -> Idle; `false` when already idle.
    pub fn pause_session(&mut self) -> bool {
        self.session.pause()
    }

    /// Session statistics so far; `None` when nothing was captured.
    pub fn session_summary(&self) -> Option<SessionSummary> {
        self.session.summary()
    }

    /// Drain everything the sensor currently has queued into the buffer.
    ///
    /// Counts every sample read whether or not it fit, so the summary's
    /// miss rate tracks production against wall clock rather than
    /// transport throughput. Overflowed samples are dropped with a
    /// warning; there is no way to retry a lost real-time sample.
    pub fn poll_sensor(&mut self, sensor: &mut dyn PpgSensor) -> Result<PollOutcome, SensorError> {
        if !self.session.is_streaming() {
            return Ok(PollOutcome::default());
        }

        sensor.check()?;
        let mut outcome = PollOutcome::default();
        while let Some(sample) = sensor.next_sample() {
            outcome.read += 1;
            if !self.buffer.push(sample) {
                outcome.dropped += 1;
            }
        }

        self.session.record_captured(outcome.read as u64);
        if outcome.dropped > 0 {
            self.session.record_dropped(outcome.dropped as u64);
            warn!(
                "buffer overflow: dropped {} of {} samples this pass",
                outcome.dropped, outcome.read
            );
        }
        Ok(outcome)
    }

    /// Extract the oldest chunk and encode it into wire frames, bumping
    /// the sequence counter once for the whole chunk.
    ///
    /// `None` means idle, or not enough samples buffered yet; the
    /// latter is the normal steady state between acquisition bursts,
    /// not a fault.
    pub fn try_encode_chunk(&mut self) -> Option<Vec<Vec<u8>>> {
        if !self.session.is_streaming() {
            return None;
        }
        let chunk = self.buffer.pop_n(self.config.chunk_size())?;
        self.seq = self.seq.wrapping_add(1);
        self.session.record_chunk();
        debug!("chunk extracted, seq={}, {} samples", self.seq, chunk.len());
        Some(frame::encode_chunk(self.seq, &chunk, self.config.batch_size))
    }
}
