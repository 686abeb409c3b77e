//! Pixel sink for the bitmap renderer.
//!
//! [`TftSurface`] is the small interface the renderer streams into: panel
//! size, a write cursor, an RGB to native color conversion and single
//! pixel writes. Panel drivers implement it directly (see
//! [`Ssd1351`](super::ssd1351::Ssd1351)); any embedded-graphics
//! `DrawTarget` can be wrapped in a [`GraphicsSurface`].

use embedded_graphics_core::{
    Pixel,
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Point},
    pixelcolor::Rgb888,
};

pub trait TftSurface {
    /// Native pixel representation (e.g. packed RGB565).
    type Color: Copy;
    type Error;

    fn width(&self) -> u16;
    fn height(&self) -> u16;

    /// Position the controller's write pointer before a run of pixels.
    fn set_cursor(&mut self, x: u16, y: u16) -> Result<(), Self::Error>;

    /// Convert 8-bit channels to the native color.
    fn color(&self, r: u8, g: u8, b: u8) -> Self::Color;

    fn draw_pixel(&mut self, x: u16, y: u16, color: Self::Color) -> Result<(), Self::Error>;
}

/// [`TftSurface`] over an embedded-graphics draw target.
///
/// The target has no hardware cursor, so `set_cursor` does nothing and
/// each pixel is drawn at its own coordinates.
pub struct GraphicsSurface<D> {
    target: D,
}

impl<D> GraphicsSurface<D> {
    pub fn new(target: D) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &D {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut D {
        &mut self.target
    }

    pub fn into_inner(self) -> D {
        self.target
    }
}

impl<D> TftSurface for GraphicsSurface<D>
where
    D: DrawTarget + OriginDimensions,
    D::Color: From<Rgb888>,
{
    type Color = D::Color;
    type Error = D::Error;

    fn width(&self) -> u16 {
        self.target.size().width.min(u16::MAX as u32) as u16
    }

    fn height(&self) -> u16 {
        self.target.size().height.min(u16::MAX as u32) as u16
    }

    fn set_cursor(&mut self, _x: u16, _y: u16) -> Result<(), D::Error> {
        Ok(())
    }

    fn color(&self, r: u8, g: u8, b: u8) -> D::Color {
        Rgb888::new(r, g, b).into()
    }

    fn draw_pixel(&mut self, x: u16, y: u16, color: D::Color) -> Result<(), D::Error> {
        self.target
            .draw_iter(core::iter::once(Pixel(Point::new(x as i32, y as i32), color)))
    }
}
