//! ESP32-C3 ad-panel board support
//!
//! Maps the physical hardware to named subsystems. The SD card and the
//! SSD1351 panel share SPI2; each gets its own chip select through a
//! `RefCellDevice` over the one bus.
//!
//! Pin Map:
//! GPIO |   Function   |      Notes
//!  1   | SD CS        | Active LOW
//!  2   | SPI2 MISO    | SD card only
//!  3   | TFT DC       | LOW = command, HIGH = data
//!  4   | TFT RST      | Active LOW
//!  6   | SPI2 SCK     | Shared clock
//!  7   | SPI2 MOSI    | Shared data out
//! 10   | TFT CS       | Active LOW

use core::cell::RefCell;

use embedded_hal_bus::spi::RefCellDevice;
use embedded_sdmmc::SdCard;
use esp_hal::{
    Blocking,
    delay::Delay,
    gpio::{Level, Output, OutputConfig},
    peripherals::Peripherals,
    spi,
    time::Rate,
};
use log::info;
use static_cell::StaticCell;

use crate::drivers::sdcard::SdStorage;
use crate::drivers::ssd1351::{Panel, SPI_FREQ_MHZ, Ssd1351};

// 128x128 module; Rows96 for the 1.27" variant
pub const PANEL: Panel = Panel::Rows128;

// SD cards must be initialised at <= 400 kHz
pub const SD_INIT_FREQ_HZ: u32 = 400_000;

pub type SpiBus = spi::master::Spi<'static, Blocking>;
pub type SharedSpi = RefCellDevice<'static, SpiBus, Output<'static>, Delay>;
pub type Tft = Ssd1351<SharedSpi, Output<'static>, Output<'static>>;
pub type Sd = SdStorage<SdCard<SharedSpi, Delay>>;

static SPI_BUS: StaticCell<RefCell<SpiBus>> = StaticCell::new();

pub struct Board {
    pub display: Tft,
    pub storage: Sd,
}

impl Board {
    pub fn init(p: Peripherals) -> Self {
        let slow = spi::master::Config::default().with_frequency(Rate::from_hz(SD_INIT_FREQ_HZ));
        let spi_bus = spi::master::Spi::new(p.SPI2, slow)
            .unwrap()
            .with_sck(p.GPIO6)
            .with_mosi(p.GPIO7)
            .with_miso(p.GPIO2);
        let bus: &'static RefCell<SpiBus> = SPI_BUS.init(RefCell::new(spi_bus));

        let sd_cs = Output::new(p.GPIO1, Level::High, OutputConfig::default());
        let tft_cs = Output::new(p.GPIO10, Level::High, OutputConfig::default());
        let dc = Output::new(p.GPIO3, Level::High, OutputConfig::default());
        let rst = Output::new(p.GPIO4, Level::High, OutputConfig::default());

        // card init handshake runs at the slow clock
        let sd_spi = RefCellDevice::new(bus, sd_cs, Delay::new()).unwrap();
        let storage = SdStorage::from_card(sd_spi, Delay::new());

        let fast = spi::master::Config::default().with_frequency(Rate::from_mhz(SPI_FREQ_MHZ));
        bus.borrow_mut().apply_config(&fast).unwrap();
        info!("SPI2 at {} MHz", SPI_FREQ_MHZ);

        let tft_spi = RefCellDevice::new(bus, tft_cs, Delay::new()).unwrap();
        let display = Ssd1351::new(tft_spi, dc, rst, PANEL);

        Board { display, storage }
    }
}
