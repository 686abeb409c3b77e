// micro-ad-display entry point
//
// Boot sequence: logger -> board -> panel init -> slide loop
// Slides are 24-bit BMP files on the SD card, drawn from the panel's
// top-left corner and cropped to it. A slide that fails to render is
// logged and skipped; if none render the loop backs off and retries.

#![no_std]
#![no_main]

use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use log::{info, warn};

use micro_ad_display::board::Board;
use micro_ad_display::render_bitmap_file;

esp_bootloader_esp_idf::esp_app_desc!();

const SLIDES: &[&str] = &[
    "ADS/SLIDE1.BMP",
    "ADS/SLIDE2.BMP",
    "ADS/SLIDE3.BMP",
    "LOGO.BMP",
];

const SLIDE_DWELL_MS: u32 = 8_000;
const RETRY_MS: u32 = 2_000;

// RGB565 black
const BACKGROUND: u16 = 0x0000;

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger_from_env();
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    info!("booting...");

    let mut board = Board::init(peripherals);
    let mut delay = Delay::new();
    if let Err(e) = board.display.init(&mut delay) {
        warn!("[TFT] init failed: {:?}", e);
    }
    info!("hardware initialized.");

    loop {
        if !board.storage.probe() {
            delay.delay_millis(RETRY_MS);
            continue;
        }

        let mut shown = 0u32;
        for path in SLIDES {
            if let Err(e) = board.display.fill(BACKGROUND) {
                warn!("[TFT] clear failed: {:?}", e);
            }
            // failures are logged by the renderer
            if render_bitmap_file(&board.storage, &mut board.display, path).is_ok() {
                shown += 1;
                delay.delay_millis(SLIDE_DWELL_MS);
            }
        }

        if shown == 0 {
            warn!("no slides rendered, retrying");
            delay.delay_millis(RETRY_MS);
        }
    }
}
