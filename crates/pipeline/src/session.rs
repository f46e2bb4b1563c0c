//! Session state machine and per-session statistics.

use std::fmt;
use std::time::Instant;

/// Pipeline gate: acquisition and transmission run only while Streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
}

/// One connection's streaming session: the Idle/Streaming gate plus the
/// counters read back at pause and disconnect.
#[derive(Debug)]
pub struct StreamSession {
    state: SessionState,
    sample_rate: u32,
    started_at: Option<Instant>,
    samples_captured: u64,
    samples_dropped: u64,
    chunks_sent: u32,
}

impl StreamSession {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            state: SessionState::Idle,
            sample_rate,
            started_at: None,
            samples_captured: 0,
            samples_dropped: 0,
            chunks_sent: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::Streaming
    }

    /// Idle -> Streaming: record the start instant and zero the sample
    /// counters. Returns `false` with no side effects when already
    /// streaming.
    pub fn start(&mut self) -> bool {
        if self.state == SessionState::Streaming {
            return false;
        }
        self.state = SessionState::Streaming;
        self.started_at = Some(Instant::now());
        self.samples_captured = 0;
        self.samples_dropped = 0;
        true
    }

    /// Streaming -> Idle. Returns `false` with no side effects when
    /// already idle.
    pub fn pause(&mut self) -> bool {
        if self.state == SessionState::Idle {
            return false;
        }
        self.state = SessionState::Idle;
        true
    }

    pub fn record_captured(&mut self, n: u64) {
        self.samples_captured += n;
    }

    pub fn record_dropped(&mut self, n: u64) {
        self.samples_dropped += n;
    }

    pub fn record_chunk(&mut self) {
        self.chunks_sent += 1;
    }

    pub fn chunks_sent(&self) -> u32 {
        self.chunks_sent
    }

    /// Statistics for the session so far; `None` when nothing was
    /// captured, so an untouched session never reports.
    pub fn summary(&self) -> Option<SessionSummary> {
        if self.samples_captured == 0 {
            return None;
        }
        let elapsed_secs = self.started_at?.elapsed().as_secs_f32();
        let expected = elapsed_secs * self.sample_rate as f32;
        let missed = (expected - self.samples_captured as f32).max(0.0);
        let miss_rate_pct = if expected > 0.0 {
            missed / expected * 100.0
        } else {
            0.0
        };
        Some(SessionSummary {
            elapsed_secs,
            samples_captured: self.samples_captured,
            samples_dropped: self.samples_dropped,
            samples_expected: expected as u64,
            samples_missed: missed as u64,
            miss_rate_pct,
            chunks_sent: self.chunks_sent,
        })
    }

    /// Full reset at connection boundaries; nothing leaks across
    /// connections.
    pub fn reset(&mut self) {
        *self = Self::new(self.sample_rate);
    }
}

/// The primary tuning signal for the whole pipeline, emitted on pause
/// and on disconnect. The miss rate measures acquisition against wall
/// clock, not transport loss.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub elapsed_secs: f32,
    pub samples_captured: u64,
    pub samples_dropped: u64,
    pub samples_expected: u64,
    pub samples_missed: u64,
    pub miss_rate_pct: f32,
    pub chunks_sent: u32,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== STREAMING SESSION SUMMARY ===")?;
        writeln!(f, "Duration:         {:.1} s", self.elapsed_secs)?;
        writeln!(f, "Samples captured: {}", self.samples_captured)?;
        writeln!(f, "Samples expected: ~{}", self.samples_expected)?;
        writeln!(
            f,
            "Samples missed:   ~{} ({:.1}%)",
            self.samples_missed, self.miss_rate_pct
        )?;
        writeln!(f, "Chunks sent:      {}", self.chunks_sent)?;
        write!(f, "=================================")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_and_toggles() {
        let mut session = StreamSession::new(200);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.start());
        assert!(session.is_streaming());
        assert!(session.pause());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn duplicate_start_keeps_counters() {
        let mut session = StreamSession::new(200);
        assert!(session.start());
        session.record_captured(5);
        // A second start command must not reset anything.
        assert!(!session.start());
        assert_eq!(session.summary().unwrap().samples_captured, 5);
    }

    #[test]
    fn pause_while_idle_is_a_no_op() {
        let mut session = StreamSession::new(200);
        assert!(!session.pause());
        assert!(session.summary().is_none());
    }

    #[test]
    fn restart_zeroes_sample_counters_but_not_chunks() {
        let mut session = StreamSession::new(200);
        session.start();
        session.record_captured(100);
        session.record_chunk();
        session.pause();

        session.start();
        session.record_captured(1);
        let summary = session.summary().unwrap();
        assert_eq!(summary.samples_captured, 1);
        assert_eq!(summary.chunks_sent, 1);
    }

    #[test]
    fn summary_is_suppressed_with_nothing_captured() {
        let mut session = StreamSession::new(200);
        session.start();
        assert!(session.summary().is_none());
    }

    #[test]
    fn summary_fields_are_consistent() {
        let mut session = StreamSession::new(200);
        session.start();
        session.record_captured(50);
        session.record_dropped(3);
        session.record_chunk();
        session.record_chunk();

        let summary = session.summary().unwrap();
        assert_eq!(summary.samples_captured, 50);
        assert_eq!(summary.samples_dropped, 3);
        assert_eq!(summary.chunks_sent, 2);
        assert!(summary.miss_rate_pct >= 0.0);
        assert!(summary.samples_missed <= summary.samples_expected);
    }

    #[test]
    fn reset_clears_everything() {
        let mut session = StreamSession::new(200);
        session.start();
        session.record_captured(10);
        session.record_chunk();
        session.reset();

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.chunks_sent(), 0);
        assert!(session.summary().is_none());
    }

    #[test]
    fn summary_renders_every_field() {
        let summary = SessionSummary {
            elapsed_secs: 12.34,
            samples_captured: 2458,
            samples_dropped: 0,
            samples_expected: 2468,
            samples_missed: 10,
            miss_rate_pct: 0.4,
            chunks_sent: 76,
        };
        let text = summary.to_string();
        assert!(text.contains("STREAMING SESSION SUMMARY"));
        assert!(text.contains("12.3 s"));
        assert!(text.contains("2458"));
        assert!(text.contains("~2468"));
        assert!(text.contains("~10 (0.4%)"));
        assert!(text.contains("Chunks sent:      76"));
    }
}
