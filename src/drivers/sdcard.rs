// SD card FAT volume behind the FileStore trait.
// No RTC on board; timestamps are fixed to 2025-01-01.
// Files are opened through raw handles so an SdFile can own its volume
// and file slots and release both on drop.

use embedded_sdmmc::{
    BlockDevice, Mode, RawDirectory, RawFile, RawVolume, SdCard, TimeSource, Timestamp,
    VolumeIdx, VolumeManager,
};
use log::{info, warn};

use super::storage::{FileStore, ImageFile, StorageError};

#[derive(Default, Clone, Copy)]
pub struct FixedTimeSource;

impl TimeSource for FixedTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 55,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

pub struct SdStorage<D, T = FixedTimeSource>
where
    D: BlockDevice,
    T: TimeSource,
{
    pub volume_mgr: VolumeManager<D, T>,
}

impl<SPI, DELAY> SdStorage<SdCard<SPI, DELAY>>
where
    SPI: embedded_hal::spi::SpiDevice<u8>,
    DELAY: embedded_hal::delay::DelayNs,
{
    // probes the card (CMD0, CMD8, ACMD41) before the volume manager owns it
    pub fn from_card(spi: SPI, delay: DELAY) -> Self {
        let sdcard = SdCard::new(spi, delay);

        match sdcard.num_bytes() {
            Ok(bytes) => info!("[SD] {} bytes ({} MB)", bytes, bytes / 1024 / 1024),
            Err(e) => warn!("[SD] probe failed: {:?}", e),
        }

        Self::new(sdcard, FixedTimeSource)
    }
}

impl<D, T> SdStorage<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    pub fn new(device: D, time: T) -> Self {
        Self {
            volume_mgr: VolumeManager::new(device, time),
        }
    }

    // true if the first FAT volume mounts
    pub fn probe(&self) -> bool {
        match self.volume_mgr.open_raw_volume(VolumeIdx(0)) {
            Ok(volume) => {
                let _ = self.volume_mgr.close_volume(volume);
                true
            }
            Err(e) => {
                warn!("[SD] no volume: {:?}", e);
                false
            }
        }
    }

    // walk "DIR/SUB/NAME.BMP" from the root; every directory handle is
    // closed again before returning
    fn open_in_volume(&self, volume: RawVolume, path: &str) -> Result<RawFile, StorageError> {
        let mgr = &self.volume_mgr;
        let mut dir: RawDirectory = mgr.open_root_dir(volume).map_err(|e| {
            warn!("[SD] open root dir: {:?}", e);
            StorageError::Volume
        })?;

        let mut parts = path.split('/').filter(|p| !p.is_empty()).peekable();
        let result = loop {
            let Some(part) = parts.next() else {
                break Err(StorageError::NotFound);
            };
            if parts.peek().is_none() {
                break mgr
                    .open_file_in_dir(dir, part, Mode::ReadOnly)
                    .map_err(|e| open_error(part, e));
            }
            match mgr.open_dir(dir, part) {
                Ok(sub) => {
                    let _ = mgr.close_dir(dir);
                    dir = sub;
                }
                Err(e) => break Err(open_error(part, e)),
            }
        };

        let _ = mgr.close_dir(dir);
        result
    }
}

fn open_error<E: core::fmt::Debug>(name: &str, e: embedded_sdmmc::Error<E>) -> StorageError {
    match e {
        embedded_sdmmc::Error::NotFound => StorageError::NotFound,
        e => {
            warn!("[SD] open {}: {:?}", name, e);
            StorageError::Open
        }
    }
}

impl<D, T> FileStore for SdStorage<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    type File<'a>
        = SdFile<'a, D, T>
    where
        Self: 'a;

    fn open(&self, path: &str) -> Result<SdFile<'_, D, T>, StorageError> {
        let volume = self
            .volume_mgr
            .open_raw_volume(VolumeIdx(0))
            .map_err(|e| {
                warn!("[SD] open volume: {:?}", e);
                StorageError::Volume
            })?;

        match self.open_in_volume(volume, path) {
            Ok(file) => Ok(SdFile {
                mgr: &self.volume_mgr,
                volume,
                file,
            }),
            Err(e) => {
                let _ = self.volume_mgr.close_volume(volume);
                Err(e)
            }
        }
    }
}

pub struct SdFile<'a, D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    mgr: &'a VolumeManager<D, T>,
    volume: RawVolume,
    file: RawFile,
}

impl<D, T> ImageFile for SdFile<'_, D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    fn seek_to(&mut self, offset: u32) -> Result<(), StorageError> {
        self.mgr
            .file_seek_from_start(self.file, offset)
            .map_err(|_| StorageError::Seek)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.mgr.read(self.file, buf).map_err(|e| {
            warn!("[SD] read: {:?}", e);
            StorageError::Read
        })
    }
}

impl<D, T> Drop for SdFile<'_, D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    fn drop(&mut self) {
        if let Err(e) = self.mgr.close_file(self.file) {
            warn!("[SD] close file: {:?}", e);
        }
        let _ = self.mgr.close_volume(self.volume);
    }
}
