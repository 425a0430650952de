//! Length-prefixed, checksummed key/value frames.
//!
//! Both the file engine's data log and the file change log persist pairs
//! with the same framing:
//!
//! ```text
//! | key_len (4, LE) | value_len (4, LE) | key (N) | value (M) | crc32 (4, LE) |
//! ```
//!
//! The checksum covers everything before it.
//!
//! ## Recovery Policy
//!
//! - A truncated trailing frame (short header or short body) is treated as
//!   a clean end of log: the writer crashed mid-append.
//! - A checksum mismatch on a complete frame is fatal.

use crate::error::{StorageError, StorageResult};

/// Size of the frame header: key length (4) + value length (4).
pub const FRAME_HEADER_SIZE: usize = 8;

/// Size of the trailing checksum.
pub const FRAME_CRC_SIZE: usize = 4;

/// Encodes one key/value pair as a frame.
///
/// # Errors
///
/// Returns an error if either part exceeds `u32::MAX` bytes.
pub fn encode_frame(key: &[u8], value: &[u8]) -> StorageResult<Vec<u8>> {
    let key_len = u32::try_from(key.len())
        .map_err(|_| StorageError::corrupted("frame key too large"))?;
    let value_len = u32::try_from(value.len())
        .map_err(|_| StorageError::corrupted("frame value too large"))?;

    let mut data =
        Vec::with_capacity(FRAME_HEADER_SIZE + key.len() + value.len() + FRAME_CRC_SIZE);
    data.extend_from_slice(&key_len.to_le_bytes());
    data.extend_from_slice(&value_len.to_le_bytes());
    data.extend_from_slice(key);
    data.extend_from_slice(value);

    let crc = compute_crc32(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    Ok(data)
}

/// Streaming reader over a buffer of frames.
///
/// Yields borrowed `(key, value)` slices. After iteration ends,
/// [`FrameReader::valid_len`] reports how many leading bytes held complete
/// frames, so a writer can cut a torn tail before appending again.
#[derive(Debug)]
pub struct FrameReader<'a> {
    data: &'a [u8],
    pos: usize,
    finished: bool,
}

impl<'a> FrameReader<'a> {
    /// Creates a reader over `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            finished: false,
        }
    }

    /// Number of bytes consumed by complete, verified frames.
    #[must_use]
    pub fn valid_len(&self) -> usize {
        self.pos
    }

    fn read_u32(&self, at: usize) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[at..at + 4]);
        u32::from_le_bytes(buf)
    }
}

impl<'a> Iterator for FrameReader<'a> {
    type Item = StorageResult<(&'a [u8], &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let remaining = self.data.len() - self.pos;
        if remaining < FRAME_HEADER_SIZE {
            self.finished = true;
            return None;
        }

        let key_len = self.read_u32(self.pos) as usize;
        let value_len = self.read_u32(self.pos + 4) as usize;
        let body_len = FRAME_HEADER_SIZE
            .saturating_add(key_len)
            .saturating_add(value_len);
        let frame_len = body_len.saturating_add(FRAME_CRC_SIZE);

        if remaining < frame_len {
            self.finished = true;
            return None;
        }

        let start = self.pos;
        let body = &self.data[start..start + body_len];
        let expected = self.read_u32(start + body_len);
        let actual = compute_crc32(body);
        if expected != actual {
            self.finished = true;
            return Some(Err(StorageError::ChecksumMismatch {
                offset: start as u64,
                expected,
                actual,
            }));
        }

        let key_start = start + FRAME_HEADER_SIZE;
        let value_start = key_start + key_len;
        let key = &self.data[key_start..value_start];
        let value = &self.data[value_start..value_start + value_len];

        self.pos = start + frame_len;
        Some(Ok((key, value)))
    }
}

/// Computes a CRC32 (IEEE) checksum.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
