// Staging buffer between storage and the panel: up to 32 BGR pixels per
// refill. Each refill is capped at the visible bytes left in the current
// row, so row padding and cropped columns are never fetched and a short
// read is always an error rather than stale data.

use crate::drivers::storage::{ImageFile, StorageError};
use crate::formats::bmp::BYTES_PER_PIXEL;

pub const BUF_PIXELS: usize = 32;
pub const BUF_SIZE: usize = BUF_PIXELS * BYTES_PER_PIXEL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefillError {
    Read(StorageError),
    Short { wanted: usize, got: usize },
}

pub struct PixelBuffer {
    buf: [u8; BUF_SIZE],
    len: usize,
    pos: usize,
    // visible bytes of the current row not yet fetched
    row_left: usize,
}

impl Default for PixelBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelBuffer {
    pub const fn new() -> Self {
        Self {
            buf: [0u8; BUF_SIZE],
            len: 0,
            pos: 0,
            row_left: 0,
        }
    }

    // drop anything buffered and expect `row_bytes` from the file's
    // current position
    pub fn begin_row(&mut self, row_bytes: usize) {
        self.len = 0;
        self.pos = 0;
        self.row_left = row_bytes;
    }

    pub fn capacity(&self) -> usize {
        BUF_SIZE
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // buffered bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.len - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.len
    }

    pub fn row_left(&self) -> usize {
        self.row_left
    }

    /// Fetch the next chunk of the row: `min(row_left, BUF_SIZE)` bytes.
    pub fn refill<F: ImageFile>(&mut self, file: &mut F) -> Result<usize, RefillError> {
        let wanted = self.row_left.min(BUF_SIZE);
        let got = file
            .read_full(&mut self.buf[..wanted])
            .map_err(RefillError::Read)?;
        if got < wanted {
            return Err(RefillError::Short { wanted, got });
        }
        self.len = got;
        self.pos = 0;
        self.row_left -= got;
        Ok(got)
    }

    /// Next pixel as stored on disk: `[blue, green, red]`.
    pub fn next_bgr<F: ImageFile>(&mut self, file: &mut F) -> Result<[u8; 3], RefillError> {
        if self.remaining() < BYTES_PER_PIXEL {
            self.refill(file)?;
            if self.remaining() < BYTES_PER_PIXEL {
                return Err(RefillError::Short {
                    wanted: BYTES_PER_PIXEL,
                    got: self.remaining(),
                });
            }
        }
        let p = self.pos;
        self.pos += BYTES_PER_PIXEL;
        Ok([self.buf[p], self.buf[p + 1], self.buf[p + 2]])
    }
}
