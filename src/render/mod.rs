//! Bitmap streaming from storage to a TFT surface.
//!
//! One pass per file: read and validate the header, crop the image to the
//! panel, then for every visible row seek to its stored position and push
//! pixels through a 96-byte [`PixelBuffer`]. Rows are re-sought even when
//! contiguous; that keeps cropping, padding and both row orders on a
//! single code path.
//!
//! Nothing is drawn unless the header is a 1-plane, 24 bpp, uncompressed
//! BMP. The file handle is dropped (closed) on every return path.

mod pixbuf;

use core::fmt;

use log::{debug, info, warn};

use crate::drivers::display::TftSurface;
use crate::drivers::storage::{FileStore, ImageFile, StorageError};
use crate::formats::bmp::{
    BmpHeader, HEADER_LEN, HeaderError, RenderGeometry, SIGNATURE_LEN, check_signature,
};

pub use pixbuf::{BUF_PIXELS, BUF_SIZE, PixelBuffer, RefillError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderError<E> {
    Open(StorageError),
    NotABitmap,
    UnsupportedPlanes(u16),
    UnsupportedFormat { depth: u16, compression: u32 },
    InvalidDimensions { width: i32, height: i32 },
    Seek,
    Read,
    // storage returned fewer bytes than the header or a row needs
    ShortRead { wanted: usize, got: usize },
    Display(E),
}

impl<E> From<HeaderError> for RenderError<E> {
    fn from(e: HeaderError) -> Self {
        match e {
            HeaderError::NotABitmap => Self::NotABitmap,
            HeaderError::UnsupportedPlanes(n) => Self::UnsupportedPlanes(n),
            HeaderError::UnsupportedFormat { depth, compression } => {
                Self::UnsupportedFormat { depth, compression }
            }
            HeaderError::InvalidDimensions { width, height } => {
                Self::InvalidDimensions { width, height }
            }
        }
    }
}

impl<E> From<RefillError> for RenderError<E> {
    fn from(e: RefillError) -> Self {
        match e {
            RefillError::Read(StorageError::Seek) => Self::Seek,
            RefillError::Read(_) => Self::Read,
            RefillError::Short { wanted, got } => Self::ShortRead { wanted, got },
        }
    }
}

impl<E> RenderError<E> {
    /// Short description without the variant's fields; needs no bound on `E`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open(_) => "open failed",
            Self::NotABitmap => "not a BMP file",
            Self::UnsupportedPlanes(_) => "unsupported plane count",
            Self::UnsupportedFormat { .. } => "unsupported format",
            Self::InvalidDimensions { .. } => "invalid dimensions",
            Self::Seek => "seek failed",
            Self::Read => "read failed",
            Self::ShortRead { .. } => "short read",
            Self::Display(_) => "display error",
        }
    }
}

impl<E: fmt::Debug> fmt::Display for RenderError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())?;
        match self {
            Self::Open(e) => write!(f, ": {}", e),
            Self::UnsupportedPlanes(n) => write!(f, " {}", n),
            Self::UnsupportedFormat { depth, compression } => {
                write!(f, ": {} bpp, compression {}", depth, compression)
            }
            Self::InvalidDimensions { width, height } => write!(f, " {}x{}", width, height),
            Self::ShortRead { wanted, got } => {
                write!(f, ": wanted {} bytes, got {}", wanted, got)
            }
            Self::Display(e) => write!(f, ": {:?}", e),
            Self::NotABitmap | Self::Seek | Self::Read => Ok(()),
        }
    }
}

/// Outcome of a successful render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rendered {
    pub image_width: u32,
    pub image_height: u32,
    pub drawn_width: u16,
    pub drawn_height: u16,
}

impl Rendered {
    pub fn pixels(&self) -> u32 {
        self.drawn_width as u32 * self.drawn_height as u32
    }

    pub fn is_cropped(&self) -> bool {
        self.drawn_width as u32 != self.image_width || self.drawn_height as u32 != self.image_height
    }
}

pub struct BitmapRenderer<'s, S> {
    surface: &'s mut S,
}

impl<'s, S: TftSurface> BitmapRenderer<'s, S> {
    pub fn new(surface: &'s mut S) -> Self {
        Self { surface }
    }

    pub fn surface(&mut self) -> &mut S {
        &mut *self.surface
    }

    /// Open `path` on `store` and draw it at the panel's top-left corner.
    pub fn render<F: FileStore>(
        &mut self,
        store: &F,
        path: &str,
    ) -> Result<Rendered, RenderError<S::Error>> {
        let mut file = store.open(path).map_err(|e| {
            warn!("[BMP] {}: {}", path, e);
            RenderError::Open(e)
        })?;

        match self.render_file(&mut file) {
            Ok(done) => {
                info!(
                    "[BMP] {}: {}x{} drawn {}x{}",
                    path, done.image_width, done.image_height, done.drawn_width, done.drawn_height
                );
                Ok(done)
            }
            Err(e) => {
                warn!("[BMP] {}: {}", path, e.as_str());
                Err(e)
            }
        }
    }

    /// Draw from an already opened file, starting at its header.
    pub fn render_file<F: ImageFile>(
        &mut self,
        file: &mut F,
    ) -> Result<Rendered, RenderError<S::Error>> {
        let header = read_header(file)?;
        let geometry = header.geometry(self.surface.width(), self.surface.height())?;

        debug!(
            "[BMP] offset {} stride {} {:?}, crop {}x{}",
            geometry.pixel_offset,
            geometry.row_stride,
            geometry.row_order,
            geometry.draw_width,
            geometry.draw_height
        );

        self.blit(file, &geometry)?;

        Ok(Rendered {
            image_width: geometry.image_width,
            image_height: geometry.image_height,
            drawn_width: geometry.draw_width,
            drawn_height: geometry.draw_height,
        })
    }

    fn blit<F: ImageFile>(
        &mut self,
        file: &mut F,
        geometry: &RenderGeometry,
    ) -> Result<(), RenderError<S::Error>> {
        let mut buf = PixelBuffer::new();
        let row_bytes = geometry.row_bytes();

        for row in 0..geometry.draw_height {
            self.surface
                .set_cursor(0, row)
                .map_err(RenderError::Display)?;

            file.seek_to(geometry.row_offset(row))
                .map_err(|_| RenderError::Seek)?;
            buf.begin_row(row_bytes);

            for col in 0..geometry.draw_width {
                let [b, g, r] = buf.next_bgr(file)?;
                let color = self.surface.color(r, g, b);
                self.surface
                    .draw_pixel(col, row, color)
                    .map_err(RenderError::Display)?;
            }
        }
        Ok(())
    }
}

/// Render `path` from `store` onto `surface`.
pub fn render_bitmap_file<F, S>(
    store: &F,
    surface: &mut S,
    path: &str,
) -> Result<Rendered, RenderError<S::Error>>
where
    F: FileStore,
    S: TftSurface,
{
    BitmapRenderer::new(surface).render(store, path)
}

/// Read and validate the header from the start of `file`.
///
/// The signature is checked before the rest of the header is read, so a
/// short non-BMP file reports `NotABitmap` rather than a short read.
pub fn read_header<F: ImageFile, E>(file: &mut F) -> Result<BmpHeader, RenderError<E>> {
    let mut bytes = [0u8; HEADER_LEN];
    file.seek_to(0).map_err(|_| RenderError::Seek)?;

    read_exact(file, &mut bytes[..SIGNATURE_LEN])?;
    check_signature(&[bytes[0], bytes[1]])?;

    read_exact(file, &mut bytes[SIGNATURE_LEN..])?;
    Ok(BmpHeader::parse(&bytes)?)
}

fn read_exact<F: ImageFile, E>(file: &mut F, buf: &mut [u8]) -> Result<(), RenderError<E>> {
    let got = file.read_full(buf).map_err(|_| RenderError::Read)?;
    if got < buf.len() {
        return Err(RenderError::ShortRead {
            wanted: buf.len(),
            got,
        });
    }
    Ok(())
}
