//! JPEG frame reassembly from an append-only byte stream.

use bytes::{Bytes, BytesMut};

use crate::infrastructure::stream::protocol::{FRAME_END, FRAME_START};

/// Extracts delimited JPEG frames from a byte stream.
///
/// Frames may span multiple transport reads, and one read may carry several
/// frames; partial data stays buffered until its end marker arrives. The
/// buffer is not bounded -- a stream that never terminates a frame will grow
/// it indefinitely.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    buffer: BytesMut,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Removes and returns the next complete frame, markers included, or
    /// `None` when no complete frame is buffered. Call repeatedly to drain
    /// all frames delivered in one read.
    pub fn extract_frame(&mut self) -> Option<Bytes> {
        let start = find(&self.buffer, &FRAME_START)?;
        let end = find(&self.buffer[start + 2..], &FRAME_END)? + start + 2;

        // Splice out start..end+2, keeping any bytes on either side.
        let mut frame = self.buffer.split_off(start);
        let tail = frame.split_off(end + 2 - start);
        self.buffer.unsplit(tail);
        Some(frame.freeze())
    }

    /// Bytes currently held back waiting for a frame boundary.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

fn find(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == needle)
}
