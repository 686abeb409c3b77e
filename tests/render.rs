use std::cell::{Cell, RefCell};

use embedded_graphics::mock_display::MockDisplay;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;

use micro_ad_display::drivers::display::{GraphicsSurface, TftSurface};
use micro_ad_display::drivers::storage::{FileStore, ImageFile, MemStore, StorageError};
use micro_ad_display::render::{BUF_PIXELS, read_header};
use micro_ad_display::{BitmapRenderer, RenderError, Rendered, render_bitmap_file};

const PIXEL_OFFSET: usize = 54;
const PAD: u8 = 0xEE;

fn stride(width: usize) -> usize {
    (width * 3 + 3) & !3
}

// stored (file order) pixel at column x of stored row y, as [b, g, r]
fn bgr(x: usize, y: usize) -> [u8; 3] {
    [x as u8, y as u8, ((x * 7 + y * 13) as u8) ^ 0x5A]
}

fn rgb(p: [u8; 3]) -> [u8; 3] {
    [p[2], p[1], p[0]]
}

struct Bmp {
    width: i32,
    height: i32,
    planes: u16,
    depth: u16,
    compression: u32,
}

impl Bmp {
    fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            planes: 1,
            depth: 24,
            compression: 0,
        }
    }

    fn build(&self) -> Vec<u8> {
        let w = self.width.max(0) as usize;
        let rows = self.height.unsigned_abs() as usize;
        let s = stride(w);

        let mut out = Vec::with_capacity(PIXEL_OFFSET + rows * s);
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&((PIXEL_OFFSET + rows * s) as u32).to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&(PIXEL_OFFSET as u32).to_le_bytes());
        out.extend_from_slice(&40u32.to_le_bytes());
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.planes.to_le_bytes());
        out.extend_from_slice(&self.depth.to_le_bytes());
        out.extend_from_slice(&self.compression.to_le_bytes());
        out.resize(PIXEL_OFFSET, 0);

        for y in 0..rows {
            for x in 0..w {
                out.extend_from_slice(&bgr(x, y));
            }
            out.resize(out.len() + (s - w * 3), PAD);
        }
        out
    }
}

// records every cursor move and pixel write; color is plain [r, g, b]
struct Recorder {
    width: u16,
    height: u16,
    cursors: Vec<(u16, u16)>,
    pixels: Vec<(u16, u16, [u8; 3])>,
    fail_at: Option<usize>,
}

impl Recorder {
    fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cursors: Vec::new(),
            pixels: Vec::new(),
            fail_at: None,
        }
    }

    fn pixel(&self, x: u16, y: u16) -> Option<[u8; 3]> {
        self.pixels
            .iter()
            .find(|p| p.0 == x && p.1 == y)
            .map(|p| p.2)
    }
}

impl TftSurface for Recorder {
    type Color = [u8; 3];
    type Error = &'static str;

    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn set_cursor(&mut self, x: u16, y: u16) -> Result<(), &'static str> {
        self.cursors.push((x, y));
        Ok(())
    }

    fn color(&self, r: u8, g: u8, b: u8) -> [u8; 3] {
        [r, g, b]
    }

    fn draw_pixel(&mut self, x: u16, y: u16, color: [u8; 3]) -> Result<(), &'static str> {
        if self.fail_at == Some(self.pixels.len()) {
            return Err("bus fault");
        }
        assert!(x < self.width && y < self.height, "write outside panel");
        self.pixels.push((x, y, color));
        Ok(())
    }
}

// single-file store that logs every read as (offset, len); reads at or
// past `fail_from` return a storage fault
struct Traced<'d> {
    data: &'d [u8],
    reads: RefCell<Vec<(usize, usize)>>,
    fail_from: Option<usize>,
    open: Cell<usize>,
}

impl<'d> Traced<'d> {
    fn new(data: &'d [u8]) -> Self {
        Self {
            data,
            reads: RefCell::new(Vec::new()),
            fail_from: None,
            open: Cell::new(0),
        }
    }
}

struct TracedFile<'a> {
    data: &'a [u8],
    pos: usize,
    reads: &'a RefCell<Vec<(usize, usize)>>,
    fail_from: Option<usize>,
    open: &'a Cell<usize>,
}

impl Drop for TracedFile<'_> {
    fn drop(&mut self) {
        self.open.set(self.open.get() - 1);
    }
}

impl FileStore for Traced<'_> {
    type File<'a>
        = TracedFile<'a>
    where
        Self: 'a;

    fn open(&self, _path: &str) -> Result<TracedFile<'_>, StorageError> {
        self.open.set(self.open.get() + 1);
        Ok(TracedFile {
            data: self.data,
            pos: 0,
            reads: &self.reads,
            fail_from: self.fail_from,
            open: &self.open,
        })
    }
}

impl ImageFile for TracedFile<'_> {
    fn seek_to(&mut self, offset: u32) -> Result<(), StorageError> {
        if offset as usize > self.data.len() {
            return Err(StorageError::Seek);
        }
        self.pos = offset as usize;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        if self.fail_from.is_some_and(|at| self.pos >= at) {
            return Err(StorageError::Read);
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.reads.borrow_mut().push((self.pos, n));
        self.pos += n;
        Ok(n)
    }
}

#[test]
fn bottom_up_2x2_scenario() {
    let data = Bmp::new(2, 2).build();
    assert_eq!(data.len(), PIXEL_OFFSET + 2 * 8);
    let files = [("AD.BMP", &data[..])];
    let store = MemStore::new(&files);

    let mut surface = GraphicsSurface::new(MockDisplay::<Rgb888>::new());
    let done = render_bitmap_file(&store, &mut surface, "AD.BMP").unwrap();
    assert_eq!(
        done,
        Rendered {
            image_width: 2,
            image_height: 2,
            drawn_width: 2,
            drawn_height: 2,
        }
    );

    let display = surface.into_inner();
    let color = |p: [u8; 3]| Rgb888::new(p[2], p[1], p[0]);
    // destination row 0 comes from the second stored row
    assert_eq!(display.get_pixel(Point::new(0, 0)), Some(color(bgr(0, 1))));
    assert_eq!(display.get_pixel(Point::new(1, 0)), Some(color(bgr(1, 1))));
    assert_eq!(display.get_pixel(Point::new(0, 1)), Some(color(bgr(0, 0))));
    assert_eq!(display.get_pixel(Point::new(1, 1)), Some(color(bgr(1, 0))));
    assert_eq!(display.get_pixel(Point::new(2, 0)), None);
    assert_eq!(store.open_files(), 0);
}

#[test]
fn top_down_2x2_scenario() {
    let data = Bmp::new(2, -2).build();
    let files = [("AD.BMP", &data[..])];
    let store = MemStore::new(&files);

    let mut surface = GraphicsSurface::new(MockDisplay::<Rgb888>::new());
    render_bitmap_file(&store, &mut surface, "AD.BMP").unwrap();

    let display = surface.into_inner();
    let color = |p: [u8; 3]| Rgb888::new(p[2], p[1], p[0]);
    assert_eq!(display.get_pixel(Point::new(0, 0)), Some(color(bgr(0, 0))));
    assert_eq!(display.get_pixel(Point::new(0, 1)), Some(color(bgr(0, 1))));
}

#[test]
fn every_pixel_written_once_with_its_color() {
    // width 5: 15 pixel bytes per row, 1 byte of padding
    let (w, h) = (5u16, 3u16);
    let data = Bmp::new(w as i32, h as i32).build();
    let files = [("AD.BMP", &data[..])];
    let store = MemStore::new(&files);

    let mut rec = Recorder::new(128, 128);
    render_bitmap_file(&store, &mut rec, "AD.BMP").unwrap();

    assert_eq!(rec.pixels.len(), (w * h) as usize);
    for r in 0..h {
        for c in 0..w {
            let stored_row = (h - 1 - r) as usize;
            assert_eq!(rec.pixel(c, r), Some(rgb(bgr(c as usize, stored_row))));
        }
    }
    assert!(rec.pixels.iter().all(|p| p.2 != [PAD, PAD, PAD]));
    assert_eq!(rec.cursors, vec![(0, 0), (0, 1), (0, 2)]);
}

#[test]
fn crops_to_top_left_of_surface() {
    let data = Bmp::new(10, 8).build();
    let files = [("BIG.BMP", &data[..])];
    let store = MemStore::new(&files);

    let mut rec = Recorder::new(4, 3);
    let done = render_bitmap_file(&store, &mut rec, "BIG.BMP").unwrap();
    assert!(done.is_cropped());
    assert_eq!((done.drawn_width, done.drawn_height), (4, 3));

    assert_eq!(rec.pixels.len(), 4 * 3);
    // bottom-up: destination row 0 is stored row 7
    for r in 0..3u16 {
        for c in 0..4u16 {
            assert_eq!(
                rec.pixel(c, r),
                Some(rgb(bgr(c as usize, 7 - r as usize)))
            );
        }
    }
}

#[test]
fn crops_to_mock_display_bounds() {
    // MockDisplay panics on any write outside its 64x64 area
    let data = Bmp::new(70, -66).build();
    let files = [("WIDE.BMP", &data[..])];
    let store = MemStore::new(&files);

    let mut surface = GraphicsSurface::new(MockDisplay::<Rgb888>::new());
    let done = render_bitmap_file(&store, &mut surface, "WIDE.BMP").unwrap();
    assert_eq!(done.pixels(), 64 * 64);

    let display = surface.into_inner();
    let p = bgr(63, 63);
    assert_eq!(
        display.get_pixel(Point::new(63, 63)),
        Some(Rgb888::new(p[2], p[1], p[0]))
    );
}

#[test]
fn reads_stay_inside_visible_row_bytes() {
    let (w, h) = (5usize, 4usize);
    let data = Bmp::new(w as i32, h as i32).build();
    let store = Traced::new(&data);

    let mut rec = Recorder::new(3, 128);
    render_bitmap_file(&store, &mut rec, "AD.BMP").unwrap();

    let s = stride(w);
    let reads = store.reads.borrow();
    let pixel_reads: Vec<_> = reads.iter().filter(|r| r.0 >= PIXEL_OFFSET).collect();
    assert_eq!(pixel_reads.len(), h);
    for &&(start, len) in &pixel_reads {
        let row_start = PIXEL_OFFSET + (start - PIXEL_OFFSET) / s * s;
        assert_eq!(start, row_start, "reads begin at a row boundary");
        assert_eq!(len, 3 * 3, "only the 3 visible pixels are fetched");
    }
    let end = reads.iter().map(|r| r.0 + r.1).max().unwrap();
    assert!(end <= PIXEL_OFFSET + h * s);
    assert_eq!(store.open.get(), 0);
}

#[test]
fn rows_wider_than_the_buffer_refill() {
    let w = BUF_PIXELS * 2 + 5;
    let data = Bmp::new(w as i32, 2).build();
    let files = [("WIDE.BMP", &data[..])];
    let store = MemStore::new(&files);

    let mut rec = Recorder::new(128, 128);
    render_bitmap_file(&store, &mut rec, "WIDE.BMP").unwrap();

    assert_eq!(rec.pixels.len(), w * 2);
    for c in [0, BUF_PIXELS - 1, BUF_PIXELS, 2 * BUF_PIXELS, w - 1] {
        assert_eq!(rec.pixel(c as u16, 0), Some(rgb(bgr(c, 1))));
        assert_eq!(rec.pixel(c as u16, 1), Some(rgb(bgr(c, 0))));
    }
}

#[test]
fn rejects_unsupported_files_without_drawing() {
    let mut not_bmp = Bmp::new(2, 2).build();
    not_bmp[0] = b'X';

    let mut planes = Bmp::new(2, 2);
    planes.planes = 2;
    let mut depth = Bmp::new(2, 2);
    depth.depth = 16;
    let mut rle = Bmp::new(2, 2);
    rle.compression = 1;

    let planes = planes.build();
    let depth = depth.build();
    let rle = rle.build();
    let empty_width = Bmp::new(0, 2).build();

    let cases: [(&[u8], RenderError<&'static str>); 5] = [
        (&not_bmp[..], RenderError::NotABitmap),
        (&planes[..], RenderError::UnsupportedPlanes(2)),
        (
            &depth[..],
            RenderError::UnsupportedFormat {
                depth: 16,
                compression: 0,
            },
        ),
        (
            &rle[..],
            RenderError::UnsupportedFormat {
                depth: 24,
                compression: 1,
            },
        ),
        (
            &empty_width[..],
            RenderError::InvalidDimensions {
                width: 0,
                height: 2,
            },
        ),
    ];

    for (data, expected) in cases {
        let files = [("AD.BMP", data)];
        let store = MemStore::new(&files);
        let mut rec = Recorder::new(128, 128);

        let err = render_bitmap_file(&store, &mut rec, "AD.BMP").unwrap_err();
        assert_eq!(err, expected);
        assert!(rec.pixels.is_empty());
        assert!(rec.cursors.is_empty());
        assert_eq!(store.open_files(), 0, "file closed after {:?}", expected);
    }
}

#[test]
fn missing_file_is_an_open_error() {
    let store = MemStore::new(&[]);
    let mut rec = Recorder::new(128, 128);
    assert_eq!(
        render_bitmap_file(&store, &mut rec, "GONE.BMP"),
        Err(RenderError::Open(StorageError::NotFound))
    );
    assert!(rec.pixels.is_empty());
}

#[test]
fn truncated_pixel_data_is_a_short_read() {
    let mut data = Bmp::new(4, 4).build();
    // the last stored row is drawn first; cut 2 of its 12 bytes
    data.truncate(data.len() - 2);
    let files = [("CUT.BMP", &data[..])];
    let store = MemStore::new(&files);

    let mut rec = Recorder::new(128, 128);
    let err = render_bitmap_file(&store, &mut rec, "CUT.BMP").unwrap_err();
    assert_eq!(err, RenderError::ShortRead { wanted: 12, got: 10 });
    assert!(rec.pixels.is_empty());
    assert_eq!(store.open_files(), 0);
}

#[test]
fn pixel_offset_past_end_is_a_seek_error() {
    let mut data = Bmp::new(2, 2).build();
    data[10..14].copy_from_slice(&1000u32.to_le_bytes());
    let files = [("FAR.BMP", &data[..])];
    let store = MemStore::new(&files);

    let mut rec = Recorder::new(128, 128);
    let err = render_bitmap_file(&store, &mut rec, "FAR.BMP").unwrap_err();
    assert_eq!(err, RenderError::Seek);
    assert!(rec.pixels.is_empty());
    assert_eq!(store.open_files(), 0);
}

#[test]
fn storage_fault_mid_row_is_a_read_error() {
    // 40 pixels = 120 bytes per row, fetched as 96 + 24
    let w = 40usize;
    let data = Bmp::new(w as i32, 2).build();
    let first_drawn = PIXEL_OFFSET + stride(w);
    let mut store = Traced::new(&data);
    store.fail_from = Some(first_drawn + BUF_PIXELS * 3);

    let mut rec = Recorder::new(128, 128);
    let err = render_bitmap_file(&store, &mut rec, "AD.BMP").unwrap_err();
    assert_eq!(err, RenderError::Read);
    assert_eq!(rec.pixels.len(), BUF_PIXELS);
    assert!(rec.pixels.iter().all(|p| p.1 == 0));
    assert_eq!(store.open.get(), 0);
}

#[test]
fn display_errors_abort_and_close() {
    let data = Bmp::new(3, 3).build();
    let files = [("AD.BMP", &data[..])];
    let store = MemStore::new(&files);

    let mut rec = Recorder::new(128, 128);
    rec.fail_at = Some(4);
    let err = BitmapRenderer::new(&mut rec)
        .render(&store, "AD.BMP")
        .unwrap_err();
    assert_eq!(err, RenderError::Display("bus fault"));
    assert_eq!(rec.pixels.len(), 4);
    assert_eq!(store.open_files(), 0);
}

#[test]
fn header_reader_reports_fields() {
    let data = Bmp::new(7, -3).build();
    let files = [("AD.BMP", &data[..])];
    let store = MemStore::new(&files);
    let mut file = store.open("AD.BMP").unwrap();

    let header = read_header::<_, ()>(&mut file).unwrap();
    assert_eq!(header.pixel_offset, PIXEL_OFFSET as u32);
    assert_eq!((header.width, header.height), (7, -3));
    assert_eq!(header.file_size as usize, data.len());
}

#[test]
fn renderer_can_draw_twice() {
    let data = Bmp::new(2, 2).build();
    let files = [("AD.BMP", &data[..])];
    let store = MemStore::new(&files);

    let mut rec = Recorder::new(128, 128);
    let mut renderer = BitmapRenderer::new(&mut rec);
    renderer.render(&store, "AD.BMP").unwrap();
    renderer.render(&store, "/ad.bmp").unwrap();
    assert_eq!(renderer.surface().pixels.len(), 8);
}
