//! Wire framing: fixed-size frames carrying big-endian sample pairs.
//!
//! Frame layout: byte 0 is the sequence number, shared by every frame
//! of one chunk; then for each sample in chronological order, IR as
//! four big-endian bytes followed by Red as four big-endian bytes.

use ppg_sensor::Sample;
use thiserror::Error;

/// Encoded bytes per sample: 4 IR + 4 Red.
pub const BYTES_PER_SAMPLE: usize = 8;

/// Bytes per frame for a given batch size.
pub fn frame_size(batch_size: usize) -> usize {
    1 + batch_size * BYTES_PER_SAMPLE
}

/// Encode one chunk into `chunk.len() / batch_size` frames sharing `seq`.
///
/// Callers guarantee `chunk.len()` is a multiple of `batch_size`; the
/// configuration layer enforces this at construction time.
pub fn encode_chunk(seq: u8, chunk: &[Sample], batch_size: usize) -> Vec<Vec<u8>> {
    debug_assert_eq!(chunk.len() % batch_size, 0);
    chunk
        .chunks_exact(batch_size)
        .map(|batch| {
            let mut frame = Vec::with_capacity(frame_size(batch_size));
            frame.push(seq);
            for sample in batch {
                frame.extend_from_slice(&sample.ir.to_be_bytes());
                frame.extend_from_slice(&sample.red.to_be_bytes());
            }
            frame
        })
        .collect()
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame length {0} does not match the 1 + 8k layout")]
    BadLength(usize),
}

/// Decode one frame back into its sequence byte and samples.
///
/// Host-side counterpart of [`encode_chunk`]; the daemon itself only
/// encodes.
pub fn decode_frame(frame: &[u8]) -> Result<(u8, Vec<Sample>), FrameError> {
    if frame.is_empty() || (frame.len() - 1) % BYTES_PER_SAMPLE != 0 {
        return Err(FrameError::BadLength(frame.len()));
    }
    let seq = frame[0];
    let samples = frame[1..]
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|raw| Sample {
            ir: u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
            red: u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]),
        })
        .collect();
    Ok((seq, samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_layout_is_exact() {
        let chunk = [Sample {
            ir: 0x0102_0304,
            red: 0xA1B2_C3D4,
        }];
        let frames = encode_chunk(7, &chunk, 1);
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0],
            vec![7, 0x01, 0x02, 0x03, 0x04, 0xA1, 0xB2, 0xC3, 0xD4]
        );
    }

    #[test]
    fn chunk_round_trips_through_frames() {
        let chunk: Vec<Sample> = (0..32)
            .map(|i| Sample {
                ir: 90_000 + i,
                red: 70_000 + i * 2,
            })
            .collect();
        let frames = encode_chunk(42, &chunk, 16);
        assert_eq!(frames.len(), 2);

        let mut decoded = Vec::new();
        for frame in &frames {
            assert_eq!(frame.len(), 129);
            let (seq, samples) = decode_frame(frame).unwrap();
            assert_eq!(seq, 42);
            decoded.extend(samples);
        }
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn malformed_lengths_are_rejected() {
        assert_eq!(decode_frame(&[]), Err(FrameError::BadLength(0)));
        assert_eq!(decode_frame(&[1, 2, 3]), Err(FrameError::BadLength(3)));
        // A lone sequence byte is a frame of zero samples.
        assert_eq!(decode_frame(&[9]).unwrap(), (9, Vec::new()));
    }
}
