//! A FAT-style filesystem over fixed-size disk images.
//!
//! [`FadeFs::make`] formats an image, [`FadeFs::mount`] loads its metadata
//! into memory, file operations go through small integer handles, and
//! [`FadeFs::umount`] flushes everything back to the image.

pub mod block;
pub mod error;
pub mod fs;

pub use block::block_core::{Disk, BLOCK_SIZE, DISK_BLOCKS};
pub use block::block_error::BlockError;
pub use error::{Error, Result};
pub use fs::dirent::{MAX_FILENAME_LENGTH, MAX_FILES};
pub use fs::fd_table::{Fd, MAX_OPEN_FILES};
pub use fs::FadeFs;
