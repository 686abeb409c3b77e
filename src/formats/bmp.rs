// BMP header decoding and scanline geometry.
// Only one variant is accepted: 1 plane, 24 bpp BGR, BI_RGB (uncompressed).
// Header is the 14-byte file header plus the first 20 bytes of the DIB
// header (through the compression field); integers are little-endian.
// Rows are padded to 4 bytes; positive height = bottom-up rows.

use core::fmt;

pub const SIGNATURE: u16 = 0x4D42; // "BM" read as a LE word
pub const SIGNATURE_LEN: usize = 2;

// bytes consumed from the start of the file
pub const HEADER_LEN: usize = 34;

pub const BYTES_PER_PIXEL: usize = 3;

const REQUIRED_PLANES: u16 = 1;
const REQUIRED_DEPTH: u16 = 24;
const BI_RGB: u32 = 0;

// field offsets
const OFF_FILE_SIZE: usize = 2;
const OFF_PIXEL_DATA: usize = 10; // 6..10 reserved
const OFF_HEADER_SIZE: usize = 14;
const OFF_WIDTH: usize = 18;
const OFF_HEIGHT: usize = 22;
const OFF_PLANES: usize = 26;
const OFF_DEPTH: usize = 28;
const OFF_COMPRESSION: usize = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowOrder {
    // canonical BMP: first stored row is the bottom of the image
    BottomUp,
    // negative header height
    TopDown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderError {
    NotABitmap,
    UnsupportedPlanes(u16),
    UnsupportedFormat { depth: u16, compression: u32 },
    InvalidDimensions { width: i32, height: i32 },
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotABitmap => f.write_str("not a BMP file"),
            Self::UnsupportedPlanes(n) => write!(f, "unsupported plane count {}", n),
            Self::UnsupportedFormat { depth, compression } => write!(
                f,
                "unsupported format: {} bpp, compression {}",
                depth, compression
            ),
            Self::InvalidDimensions { width, height } => {
                write!(f, "invalid dimensions {}x{}", width, height)
            }
        }
    }
}

pub fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

pub fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

pub fn le_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

pub fn check_signature(sig: &[u8; SIGNATURE_LEN]) -> Result<(), HeaderError> {
    if le_u16(sig, 0) == SIGNATURE {
        Ok(())
    } else {
        Err(HeaderError::NotABitmap)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BmpHeader {
    pub file_size: u32,
    pub pixel_offset: u32,
    pub header_size: u32,
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub depth: u16,
    pub compression: u32,
}

impl BmpHeader {
    /// Decode and validate the leading [`HEADER_LEN`] bytes of a file.
    ///
    /// Checks run in file order: signature, plane count, depth and
    /// compression, then dimensions.
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self, HeaderError> {
        check_signature(&[bytes[0], bytes[1]])?;

        let header = Self {
            file_size: le_u32(bytes, OFF_FILE_SIZE),
            pixel_offset: le_u32(bytes, OFF_PIXEL_DATA),
            header_size: le_u32(bytes, OFF_HEADER_SIZE),
            width: le_i32(bytes, OFF_WIDTH),
            height: le_i32(bytes, OFF_HEIGHT),
            planes: le_u16(bytes, OFF_PLANES),
            depth: le_u16(bytes, OFF_DEPTH),
            compression: le_u32(bytes, OFF_COMPRESSION),
        };
        header.validate()?;
        Ok(header)
    }

    pub fn validate(&self) -> Result<(), HeaderError> {
        if self.planes != REQUIRED_PLANES {
            return Err(HeaderError::UnsupportedPlanes(self.planes));
        }
        if self.depth != REQUIRED_DEPTH || self.compression != BI_RGB {
            return Err(HeaderError::UnsupportedFormat {
                depth: self.depth,
                compression: self.compression,
            });
        }
        if self.width <= 0 || self.height == 0 {
            return Err(self.invalid_dimensions());
        }
        Ok(())
    }

    pub fn row_order(&self) -> RowOrder {
        if self.height < 0 {
            RowOrder::TopDown
        } else {
            RowOrder::BottomUp
        }
    }

    // stored row count, independent of order
    pub fn rows(&self) -> u32 {
        self.height.unsigned_abs()
    }

    // bytes per stored row, padded to a 4-byte boundary
    pub fn row_stride(&self) -> u64 {
        (self.width.max(0) as u64 * BYTES_PER_PIXEL as u64 + 3) & !3
    }

    /// Crop the image to a `surface_w` x `surface_h` display.
    ///
    /// Fails if the pixel array would extend past the 4 GiB a 32-bit
    /// offset can address.
    pub fn geometry(&self, surface_w: u16, surface_h: u16) -> Result<RenderGeometry, HeaderError> {
        self.validate()?;

        let rows = self.rows();
        let stride = self.row_stride();
        let end = self.pixel_offset as u64 + rows as u64 * stride;
        if end > u32::MAX as u64 {
            return Err(self.invalid_dimensions());
        }

        let width = self.width as u32;
        Ok(RenderGeometry {
            pixel_offset: self.pixel_offset,
            image_width: width,
            image_height: rows,
            row_stride: stride as u32,
            row_order: self.row_order(),
            draw_width: width.min(surface_w as u32) as u16,
            draw_height: rows.min(surface_h as u32) as u16,
        })
    }

    fn invalid_dimensions(&self) -> HeaderError {
        HeaderError::InvalidDimensions {
            width: self.width,
            height: self.height,
        }
    }
}

/// Where each destination row lives in the file, and how much of it is drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderGeometry {
    pub pixel_offset: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub row_stride: u32,
    pub row_order: RowOrder,
    pub draw_width: u16,
    pub draw_height: u16,
}

impl RenderGeometry {
    // absolute file offset of the stored row shown at destination `row`;
    // `row` must be below `draw_height`
    pub fn row_offset(&self, row: u16) -> u32 {
        let stored = match self.row_order {
            RowOrder::BottomUp => self.image_height - 1 - row as u32,
            RowOrder::TopDown => row as u32,
        };
        self.pixel_offset + stored * self.row_stride
    }

    // pixel bytes read per row; padding and cropped columns are never read
    pub fn row_bytes(&self) -> usize {
        self.draw_width as usize * BYTES_PER_PIXEL
    }

    pub fn pixel_count(&self) -> u32 {
        self.draw_width as u32 * self.draw_height as u32
    }
}
