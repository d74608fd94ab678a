//! Multipart framing
//!
//! ## Wire Format
//! ```text
//! ┌──────────────┬──────────┬──────────┬──────────┬──────────┬─────┐
//! │ Count (4)    │ Len (4)  │ Frame 1  │ Len (4)  │ Frame 2  │ ... │
//! └──────────────┴──────────┴──────────┴──────────┴──────────┴─────┘
//! ```
//! All integers are big-endian.

use std::io::{Read, Write};

use bytes::Bytes;

use crate::error::{LaneError, Result};

/// Size of the frame count and of each frame length prefix
pub const FRAME_HEADER_SIZE: usize = 4;

/// Maximum number of frames in one unit
pub const MAX_FRAMES: usize = 16;

/// Read one multipart unit from a stream
///
/// Blocks until the whole unit is available. A clean end of stream before the
/// first byte surfaces as an `UnexpectedEof` I/O error.
pub fn read_frames<R: Read>(reader: &mut R, max_frame_size: usize) -> Result<Vec<Bytes>> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    reader.read_exact(&mut header)?;
    let count = u32::from_be_bytes(header) as usize;

    if count == 0 || count > MAX_FRAMES {
        return Err(LaneError::Transport(format!(
            "Invalid frame count: {} (expected 1..={})",
            count, MAX_FRAMES
        )));
    }

    let mut frames = Vec::with_capacity(count);
    for _ in 0..count {
        reader.read_exact(&mut header)?;
        let len = u32::from_be_bytes(header) as usize;

        if len > max_frame_size {
            return Err(LaneError::FrameTooLarge {
                size: len,
                max: max_frame_size,
            });
        }

        let mut frame = vec![0u8; len];
        if len > 0 {
            reader.read_exact(&mut frame)?;
        }
        frames.push(Bytes::from(frame));
    }

    Ok(frames)
}

/// Write one multipart unit to a stream and flush it
pub fn write_frames<W: Write>(writer: &mut W, frames: &[&[u8]]) -> Result<()> {
    if frames.is_empty() || frames.len() > MAX_FRAMES {
        return Err(LaneError::Transport(format!(
            "Invalid frame count: {} (expected 1..={})",
            frames.len(),
            MAX_FRAMES
        )));
    }

    writer.write_all(&(frames.len() as u32).to_be_bytes())?;
    for frame in frames {
        writer.write_all(&(frame.len() as u32).to_be_bytes())?;
        writer.write_all(frame)?;
    }
    writer.flush()?;
    Ok(())
}
