use crate::block::block_error::BlockError;
use log::debug;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

/// Size of a block device sector in bytes.
///
/// Every `block_read`/`block_write` transfers exactly one block of this size.
pub const BLOCK_SIZE: usize = 4096;

/// Total number of blocks on a disk image.
pub const DISK_BLOCKS: usize = 8192;

/// Index of a block device sector.
pub type BlockSector = u32;

/// Lower-level interface to block device drivers
pub trait BlockOp {
    /// Read a block sector
    fn read(&mut self, sector: BlockSector, buf: &mut [u8]) -> Result<(), BlockError>;

    /// Write a block sector
    fn write(&mut self, sector: BlockSector, buf: &[u8]) -> Result<(), BlockError>;

    /// Flush buffered writes to stable storage
    fn sync(&mut self) -> Result<(), BlockError> {
        Ok(())
    }
}

/// Driver for disk images backed by a regular file.
struct FileDriver {
    file: File,
}

impl BlockOp for FileDriver {
    fn read(&mut self, sector: BlockSector, buf: &mut [u8]) -> Result<(), BlockError> {
        self.file
            .read_exact_at(buf, sector as u64 * BLOCK_SIZE as u64)
            .map_err(|_| BlockError::ReadError)
    }

    fn write(&mut self, sector: BlockSector, buf: &[u8]) -> Result<(), BlockError> {
        self.file
            .write_all_at(buf, sector as u64 * BLOCK_SIZE as u64)
            .map_err(|_| BlockError::WriteError)
    }

    fn sync(&mut self) -> Result<(), BlockError> {
        self.file.sync_all().map_err(|_| BlockError::WriteError)
    }
}

/// A block device over a fixed-geometry disk image.
///
/// All accesses are validated against the device bounds before they reach the
/// driver; transfers are whole blocks only.
pub struct Disk {
    /// The name of the backing image
    name: String,
    /// The driver performing the raw transfers
    driver: Box<dyn BlockOp>,
    /// The size of the device in sectors
    block_count: BlockSector,
    /// The read count
    read_count: u32,
    /// The write count
    write_count: u32,
}

impl Disk {
    /// Creates a fresh, zero-filled disk image at `path` and opens it.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Disk, BlockError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(BlockError::CreateError)?;
        file.set_len((DISK_BLOCKS * BLOCK_SIZE) as u64)
            .map_err(BlockError::CreateError)?;
        debug!(
            "created disk image {:?} ({} blocks of {} bytes)",
            path.as_ref(),
            DISK_BLOCKS,
            BLOCK_SIZE
        );
        Ok(Self::with_driver(
            path.as_ref().to_string_lossy().into_owned(),
            Box::new(FileDriver { file }),
        ))
    }

    /// Opens an existing disk image at `path`.
    ///
    /// The image must have exactly `DISK_BLOCKS * BLOCK_SIZE` bytes.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Disk, BlockError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(BlockError::OpenError)?;
        let len = file.metadata().map_err(BlockError::OpenError)?.len();
        if len != (DISK_BLOCKS * BLOCK_SIZE) as u64 {
            return Err(BlockError::GeometryMismatch);
        }
        debug!("opened disk image {:?}", path.as_ref());
        Ok(Self::with_driver(
            path.as_ref().to_string_lossy().into_owned(),
            Box::new(FileDriver { file }),
        ))
    }

    pub(crate) fn with_driver(name: String, driver: Box<dyn BlockOp>) -> Disk {
        Disk {
            name,
            driver,
            block_count: DISK_BLOCKS as BlockSector,
            read_count: 0,
            write_count: 0,
        }
    }

    /// Verifies that `buf` is a valid buffer for reading or writing a sector.
    fn is_buffer_valid(buf: &[u8]) -> bool {
        buf.len() == BLOCK_SIZE
    }

    /// Verifies that `sector` is a valid offset within the block device.
    fn is_sector_valid(&self, sector: BlockSector) -> bool {
        sector < self.block_count
    }

    /// Reads sector `sector` from the block device into `buf`, which must have
    /// room for `BLOCK_SIZE` bytes.
    pub fn read(&mut self, sector: BlockSector, buf: &mut [u8]) -> Result<(), BlockError> {
        if !self.is_sector_valid(sector) {
            return Err(BlockError::SectorOutOfBounds);
        }
        if !Self::is_buffer_valid(buf) {
            return Err(BlockError::BufferInvalid);
        }
        self.read_count += 1;
        self.driver.read(sector, buf)
    }

    /// Writes sector `sector` from `buf`, which must contain `BLOCK_SIZE`
    /// bytes. Returns after the driver has accepted the data.
    pub fn write(&mut self, sector: BlockSector, buf: &[u8]) -> Result<(), BlockError> {
        if !self.is_sector_valid(sector) {
            return Err(BlockError::SectorOutOfBounds);
        }
        if !Self::is_buffer_valid(buf) {
            return Err(BlockError::BufferInvalid);
        }
        self.write_count += 1;
        self.driver.write(sector, buf)
    }

    /// Flushes and closes the device.
    pub fn close(mut self) -> Result<(), BlockError> {
        self.driver.sync()?;
        debug!(
            "closed disk {:?} ({} reads, {} writes)",
            self.name, self.read_count, self.write_count
        );
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
