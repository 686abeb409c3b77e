// SSD1351 RGB OLED driver (board-independent)
// 128x128 or 128x96, 65k colour: RGB565, two bytes per pixel, MSB first.
// No framebuffer. go_to() opens a RAM window from (x, y) to the panel's
// bottom-right corner; each data write then auto-increments along the row
// and wraps back to the window's first column. The driver tracks that
// position so consecutive pixels stream without re-addressing.
// Init sequence from the Adafruit SSD1351 library.

use embedded_graphics_core::{
    Pixel,
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Size},
    pixelcolor::{IntoStorage, Rgb565},
};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;

use super::display::TftSurface;

pub const WIDTH: u16 = 128;

pub const SPI_FREQ_MHZ: u32 = 16;

#[allow(dead_code)]
mod cmd {
    pub const SET_COLUMN: u8 = 0x15;
    pub const SET_ROW: u8 = 0x75;
    pub const WRITE_RAM: u8 = 0x5C;
    pub const SET_REMAP: u8 = 0xA0;
    pub const START_LINE: u8 = 0xA1;
    pub const DISPLAY_OFFSET: u8 = 0xA2;
    pub const DISPLAY_ALL_OFF: u8 = 0xA4;
    pub const DISPLAY_ALL_ON: u8 = 0xA5;
    pub const NORMAL_DISPLAY: u8 = 0xA6;
    pub const INVERT_DISPLAY: u8 = 0xA7;
    pub const FUNCTION_SELECT: u8 = 0xAB;
    pub const DISPLAY_OFF: u8 = 0xAE;
    pub const DISPLAY_ON: u8 = 0xAF;
    pub const PRECHARGE: u8 = 0xB1;
    pub const CLOCK_DIV: u8 = 0xB3;
    pub const SET_VSL: u8 = 0xB4;
    pub const SET_GPIO: u8 = 0xB5;
    pub const PRECHARGE2: u8 = 0xB6;
    pub const VCOMH: u8 = 0xBE;
    pub const CONTRAST_ABC: u8 = 0xC1;
    pub const CONTRAST_MASTER: u8 = 0xC7;
    pub const MUX_RATIO: u8 = 0xCA;
    pub const COMMAND_LOCK: u8 = 0xFD;
}

// 65k colour, COM split, CBA order, scan bottom-up
const REMAP_DEFAULT: u8 = 0x74;

// bytes pushed per SPI write in fill()
const FILL_CHUNK: usize = 64;

/// Supported module geometries; both are 128 columns wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Rows128,
    Rows96,
}

impl Panel {
    pub const fn height(self) -> u16 {
        match self {
            Panel::Rows128 => 128,
            Panel::Rows96 => 96,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError<SpiE, PinE> {
    Spi(SpiE),
    Pin(PinE),
}

/// Pack 8-bit channels into RGB565 by truncation (5-6-5 high bits).
pub const fn color565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

// controller RAM pointer inside the window opened by go_to()
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Cursor {
    x0: u16,
    x: u16,
    y: u16,
}

pub struct Ssd1351<SPI, DC, RST> {
    spi: SPI,
    dc: DC,
    rst: RST,
    panel: Panel,
    height: u16,
    cursor: Option<Cursor>,
}

impl<SPI, DC, RST, PinE> Ssd1351<SPI, DC, RST>
where
    SPI: SpiDevice,
    DC: OutputPin<Error = PinE>,
    RST: OutputPin<Error = PinE>,
{
    pub fn new(spi: SPI, dc: DC, rst: RST, panel: Panel) -> Self {
        Self {
            spi,
            dc,
            rst,
            panel,
            height: panel.height(),
            cursor: None,
        }
    }

    pub fn release(self) -> (SPI, DC, RST) {
        (self.spi, self.dc, self.rst)
    }

    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), DisplayError<SPI::Error, PinE>> {
        self.rst.set_high().map_err(DisplayError::Pin)?;
        delay.delay_ms(50);
        self.rst.set_low().map_err(DisplayError::Pin)?;
        delay.delay_ms(50);
        self.rst.set_high().map_err(DisplayError::Pin)?;
        delay.delay_ms(50);
        Ok(())
    }

    pub fn init(&mut self, delay: &mut impl DelayNs) -> Result<(), DisplayError<SPI::Error, PinE>> {
        self.reset(delay)?;

        let start_line = match self.panel {
            Panel::Rows96 => 96,
            Panel::Rows128 => 0,
        };

        self.send_command(cmd::COMMAND_LOCK, &[0x12])?;
        self.send_command(cmd::COMMAND_LOCK, &[0xB1])?;
        self.send_command(cmd::DISPLAY_OFF, &[])?;
        self.send_command(cmd::CLOCK_DIV, &[0xF1])?;
        self.send_command(cmd::MUX_RATIO, &[127])?;
        self.send_command(cmd::SET_REMAP, &[REMAP_DEFAULT])?;
        self.send_command(cmd::SET_COLUMN, &[0x00, (WIDTH - 1) as u8])?;
        self.send_command(cmd::SET_ROW, &[0x00, (self.height - 1) as u8])?;
        self.send_command(cmd::START_LINE, &[start_line])?;
        self.send_command(cmd::DISPLAY_OFFSET, &[0x00])?;
        self.send_command(cmd::SET_GPIO, &[0x00])?;
        self.send_command(cmd::FUNCTION_SELECT, &[0x01])?; // internal VDD
        self.send_command(cmd::PRECHARGE, &[0x32])?;
        self.send_command(cmd::VCOMH, &[0x05])?;
        self.send_command(cmd::NORMAL_DISPLAY, &[])?;
        self.send_command(cmd::CONTRAST_ABC, &[0xC8, 0x80, 0xC8])?;
        self.send_command(cmd::CONTRAST_MASTER, &[0x0F])?;
        self.send_command(cmd::SET_VSL, &[0xA0, 0xB5, 0x55])?;
        self.send_command(cmd::PRECHARGE2, &[0x01])?;
        self.send_command(cmd::DISPLAY_ON, &[])?;

        self.cursor = None;
        Ok(())
    }

    pub fn panel(&self) -> Panel {
        self.panel
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn display_on(&mut self, on: bool) -> Result<(), DisplayError<SPI::Error, PinE>> {
        let c = if on { cmd::DISPLAY_ON } else { cmd::DISPLAY_OFF };
        self.send_command(c, &[])
    }

    pub fn invert(&mut self, inverted: bool) -> Result<(), DisplayError<SPI::Error, PinE>> {
        let c = if inverted {
            cmd::INVERT_DISPLAY
        } else {
            cmd::NORMAL_DISPLAY
        };
        self.send_command(c, &[])
    }

    // master contrast, 0..=15
    pub fn set_contrast(&mut self, level: u8) -> Result<(), DisplayError<SPI::Error, PinE>> {
        self.send_command(cmd::CONTRAST_MASTER, &[level.min(0x0F)])
    }

    /// Open a RAM window from (x, y) to the bottom-right corner.
    /// Out-of-bounds positions are ignored.
    pub fn go_to(&mut self, x: u16, y: u16) -> Result<(), DisplayError<SPI::Error, PinE>> {
        if x >= WIDTH || y >= self.height {
            return Ok(());
        }
        self.set_window(x, y, WIDTH - 1, self.height - 1)?;
        self.cursor = Some(Cursor { x0: x, x, y });
        Ok(())
    }

    /// Write one pixel; re-addresses only when (x, y) is not where the
    /// controller's RAM pointer already is. Off-panel pixels are clipped.
    pub fn put_pixel(&mut self, x: u16, y: u16, color: u16) -> Result<(), DisplayError<SPI::Error, PinE>> {
        if x >= WIDTH || y >= self.height {
            return Ok(());
        }
        if !matches!(self.cursor, Some(c) if c.x == x && c.y == y) {
            self.go_to(x, y)?;
        }
        self.spi
            .write(&color.to_be_bytes())
            .map_err(DisplayError::Spi)?;
        self.advance();
        Ok(())
    }

    pub fn fill(&mut self, color: u16) -> Result<(), DisplayError<SPI::Error, PinE>> {
        self.set_window(0, 0, WIDTH - 1, self.height - 1)?;
        self.cursor = None;

        let [hi, lo] = color.to_be_bytes();
        let mut chunk = [0u8; FILL_CHUNK];
        for pair in chunk.chunks_exact_mut(2) {
            pair[0] = hi;
            pair[1] = lo;
        }

        let mut remaining = WIDTH as usize * self.height as usize * 2;
        while remaining > 0 {
            let n = remaining.min(FILL_CHUNK);
            self.spi.write(&chunk[..n]).map_err(DisplayError::Spi)?;
            remaining -= n;
        }
        Ok(())
    }

    fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<(), DisplayError<SPI::Error, PinE>> {
        self.send_command(cmd::SET_COLUMN, &[x0 as u8, x1 as u8])?;
        self.send_command(cmd::SET_ROW, &[y0 as u8, y1 as u8])?;
        self.send_command(cmd::WRITE_RAM, &[])
    }

    // mirror the controller's auto-increment inside the go_to() window
    fn advance(&mut self) {
        let height = self.height;
        self.cursor = self.cursor.and_then(|mut c| {
            c.x += 1;
            if c.x >= WIDTH {
                c.x = c.x0;
                c.y += 1;
            }
            (c.y < height).then_some(c)
        });
    }

    // any command other than WRITE_RAM makes the controller take the
    // following data bytes as its parameters, so the RAM pointer is lost
    fn send_command(&mut self, command: u8, data: &[u8]) -> Result<(), DisplayError<SPI::Error, PinE>> {
        if command != cmd::WRITE_RAM {
            self.cursor = None;
        }
        self.dc.set_low().map_err(DisplayError::Pin)?;
        self.spi.write(&[command]).map_err(DisplayError::Spi)?;
        self.dc.set_high().map_err(DisplayError::Pin)?;
        if !data.is_empty() {
            self.spi.write(data).map_err(DisplayError::Spi)?;
        }
        Ok(())
    }
}

impl<SPI, DC, RST, PinE> TftSurface for Ssd1351<SPI, DC, RST>
where
    SPI: SpiDevice,
    DC: OutputPin<Error = PinE>,
    RST: OutputPin<Error = PinE>,
{
    type Color = u16;
    type Error = DisplayError<SPI::Error, PinE>;

    fn width(&self) -> u16 {
        WIDTH
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn set_cursor(&mut self, x: u16, y: u16) -> Result<(), Self::Error> {
        self.go_to(x, y)
    }

    fn color(&self, r: u8, g: u8, b: u8) -> u16 {
        color565(r, g, b)
    }

    fn draw_pixel(&mut self, x: u16, y: u16, color: u16) -> Result<(), Self::Error> {
        self.put_pixel(x, y, color)
    }
}

impl<SPI, DC, RST, PinE> OriginDimensions for Ssd1351<SPI, DC, RST>
where
    SPI: SpiDevice,
    DC: OutputPin<Error = PinE>,
    RST: OutputPin<Error = PinE>,
{
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, self.height as u32)
    }
}

impl<SPI, DC, RST, PinE> DrawTarget for Ssd1351<SPI, DC, RST>
where
    SPI: SpiDevice,
    DC: OutputPin<Error = PinE>,
    RST: OutputPin<Error = PinE>,
{
    type Color = Rgb565;
    type Error = DisplayError<SPI::Error, PinE>;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 || point.x > u16::MAX as i32 || point.y > u16::MAX as i32 {
                continue;
            }
            self.put_pixel(point.x as u16, point.y as u16, color.into_storage())?;
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color.into_storage())
    }
}
