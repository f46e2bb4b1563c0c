//! Acquisition-buffering-transmission pipeline for PPG sample streams.
//!
//! Data flows one direction: sensor -> circular buffer -> chunk -> wire
//! frames. Control flows from the session state machine, which gates
//! acquisition and transmission. All of it is owned by one
//! [`StreamPipeline`] and touched from a single control flow.

pub mod buffer;
pub mod config;
pub mod frame;
pub mod pipeline;
pub mod session;

// Re-export the main types that users need
pub use buffer::SampleBuffer;
pub use config::{ConfigError, StreamConfig, MAX_FRAME_SIZE};
pub use frame::{decode_frame, encode_chunk, FrameError};
pub use pipeline::{PollOutcome, StreamPipeline};
pub use session::{SessionState, SessionSummary, StreamSession};
