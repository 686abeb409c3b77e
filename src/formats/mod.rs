// File format support
//
// bmp — uncompressed 24-bit BMP header and row geometry

pub mod bmp;
