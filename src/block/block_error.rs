use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::io;

/// Error type for block operations
#[derive(Debug)]
pub enum BlockError {
    /// The sector is out of bounds (greater than the block count)
    SectorOutOfBounds,
    /// The buffer has an invalid size (not `BLOCK_SIZE`)
    BufferInvalid,
    /// The image file could not be created
    CreateError(io::Error),
    /// The image file could not be opened
    OpenError(io::Error),
    /// The image file has the wrong size for this geometry
    GeometryMismatch,
    /// Error reading from the disk
    ReadError,
    /// Error writing to the disk
    WriteError,
}

impl Display for BlockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockError::SectorOutOfBounds => {
                write!(f, "sector out of bounds (greater than the block count)")
            }
            BlockError::BufferInvalid => write!(f, "invalid buffer size (not `BLOCK_SIZE`)"),
            BlockError::CreateError(e) => write!(f, "failed to create disk image: {e}"),
            BlockError::OpenError(e) => write!(f, "failed to open disk image: {e}"),
            BlockError::GeometryMismatch => {
                write!(f, "disk image size does not match the fixed geometry")
            }
            BlockError::ReadError => write!(f, "error reading from the block device"),
            BlockError::WriteError => write!(f, "error writing to the block device"),
        }
    }
}

impl Error for BlockError {}
