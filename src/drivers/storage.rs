// File access seen by the renderer: open by path, absolute seek, read.
// Handles close when dropped, so every early return releases them.
// SdStorage (sdcard.rs) backs this with a FAT volume; MemStore serves
// images linked into flash.

use core::cell::Cell;
use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageError {
    Volume,
    NotFound,
    Open,
    Seek,
    Read,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Volume => "open volume failed",
            Self::NotFound => "file not found",
            Self::Open => "open file failed",
            Self::Seek => "seek failed",
            Self::Read => "read failed",
        })
    }
}

pub trait ImageFile {
    // absolute position from the start of the file
    fn seek_to(&mut self, offset: u32) -> Result<(), StorageError>;

    // may return fewer bytes than asked; 0 means end of file
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Read until `buf` is full or the file ends; returns the byte count.
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        let mut total = 0;
        while total < buf.len() {
            let n = self.read(&mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }
}

pub trait FileStore {
    type File<'a>: ImageFile
    where
        Self: 'a;

    fn open(&self, path: &str) -> Result<Self::File<'_>, StorageError>;
}

// read-only in-memory files, looked up by exact name
pub struct MemStore<'d> {
    files: &'d [(&'d str, &'d [u8])],
    open: Cell<usize>,
}

impl<'d> MemStore<'d> {
    pub const fn new(files: &'d [(&'d str, &'d [u8])]) -> Self {
        Self {
            files,
            open: Cell::new(0),
        }
    }

    // handles currently alive
    pub fn open_files(&self) -> usize {
        self.open.get()
    }
}

impl FileStore for MemStore<'_> {
    type File<'a>
        = MemFile<'a>
    where
        Self: 'a;

    fn open(&self, path: &str) -> Result<MemFile<'_>, StorageError> {
        let path = path.trim_start_matches('/');
        let data = self
            .files
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(path))
            .map(|&(_, data)| data)
            .ok_or(StorageError::NotFound)?;

        self.open.set(self.open.get() + 1);
        Ok(MemFile {
            data,
            pos: 0,
            open: &self.open,
        })
    }
}

pub struct MemFile<'a> {
    data: &'a [u8],
    pos: usize,
    open: &'a Cell<usize>,
}

impl ImageFile for MemFile<'_> {
    fn seek_to(&mut self, offset: u32) -> Result<(), StorageError> {
        let offset = offset as usize;
        if offset > self.data.len() {
            return Err(StorageError::Seek);
        }
        self.pos = offset;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        let rest = &self.data[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Drop for MemFile<'_> {
    fn drop(&mut self) {
        self.open.set(self.open.get() - 1);
    }
}
