// micro-ad-display: 24-bit BMP slides from SD card to an SSD1351 panel
//
// formats: BMP header decoding and scanline geometry
// drivers: storage (FileStore, SD, in-memory), display surface, SSD1351
// render:  streaming bitmap renderer
// board:   ESP32-C3 pin map and bus wiring (feature "esp32c3")

#![cfg_attr(not(test), no_std)]

#[cfg(feature = "esp32c3")]
pub mod board;
pub mod drivers;
pub mod formats;
pub mod render;

pub use render::{BitmapRenderer, RenderError, Rendered, render_bitmap_file};
