use crate::block::block_core::{BLOCK_SIZE, DISK_BLOCKS};
use crate::error::{corrupt, Result};
use crate::fs::fat::FAT_EOF;
use zerocopy::little_endian::U32;
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// Magic constant identifying a formatted image.
pub const MAGIC: u32 = 0xFADE_BEEF;

/// On-disk header, stored at block 0 and zero-padded to the block size.
///
/// All integers are little-endian 32-bit values.
#[repr(C)]
#[derive(Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
pub struct Superblock {
    magic: U32,
    total_blocks: U32,
    block_size: U32,
    fat1_start_block: U32,
    fat_blocks_count: U32,
    fat2_start_block: U32,
    root_dir_block: U32,
    root_dir_blocks: U32,
    data_start_block: U32,
    data_blocks_count: U32,
    free_blocks_count: U32,
}

impl Superblock {
    /// Computes the layout of a fresh filesystem over the fixed geometry.
    ///
    /// FAT1 starts right after the header; FAT2 mirrors it; one block of
    /// directory entries follows; everything after that is data.
    pub fn for_disk() -> Superblock {
        let fat_blocks_count = (DISK_BLOCKS * 4).div_ceil(BLOCK_SIZE) as u32;
        let fat1_start_block = 1;
        let fat2_start_block = fat1_start_block + fat_blocks_count;
        let root_dir_block = fat2_start_block + fat_blocks_count;
        let root_dir_blocks = 1;
        let data_start_block = root_dir_block + root_dir_blocks;
        let data_blocks_count = DISK_BLOCKS as u32 - data_start_block;
        Superblock {
            magic: MAGIC.into(),
            total_blocks: (DISK_BLOCKS as u32).into(),
            block_size: (BLOCK_SIZE as u32).into(),
            fat1_start_block: fat1_start_block.into(),
            fat_blocks_count: fat_blocks_count.into(),
            fat2_start_block: fat2_start_block.into(),
            root_dir_block: root_dir_block.into(),
            root_dir_blocks: root_dir_blocks.into(),
            data_start_block: data_start_block.into(),
            data_blocks_count: data_blocks_count.into(),
            free_blocks_count: data_blocks_count.into(),
        }
    }

    /// Parses the header out of a block-0 buffer.
    pub fn parse(buf: &[u8]) -> Result<Superblock> {
        match Superblock::read_from_prefix(buf) {
            Some(sb) => Ok(sb),
            None => corrupt!("block 0 is too short to hold a superblock"),
        }
    }

    /// Serializes the header into a zero-padded block.
    pub fn to_block(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        buf[..self.as_bytes().len()].copy_from_slice(self.as_bytes());
        buf
    }

    /// Validates the header against the fixed geometry.
    pub fn check_integrity(&self) -> Result<()> {
        if self.magic.get() != MAGIC {
            return corrupt!("bad magic in superblock: {:#010x}", self.magic.get());
        }
        if self.block_size() != BLOCK_SIZE as u32 {
            return corrupt!("unsupported block size: {}", self.block_size());
        }
        if self.total_blocks() != DISK_BLOCKS as u32 {
            return corrupt!("unsupported block count: {}", self.total_blocks());
        }
        let fat_end = self
            .fat2_start_block()
            .wrapping_add(self.fat_blocks_count());
        if self.fat1_start_block() == 0
            || self.fat2_start_block() != self.fat1_start_block() + self.fat_blocks_count()
            || self.root_dir_block() != fat_end
            || self.data_start_block() != self.root_dir_block() + self.root_dir_blocks()
            || self.data_start_block() >= self.total_blocks()
            || self.data_blocks_count() != self.total_blocks() - self.data_start_block()
        {
            return corrupt!("inconsistent region layout in superblock");
        }
        // every data block index must be representable in a FAT entry,
        // clear of the sentinel range
        if self.data_blocks_count() >= FAT_EOF {
            return corrupt!("data region collides with FAT sentinels");
        }
        let fat_capacity = self.fat_blocks_count() as usize * (BLOCK_SIZE / 4);
        if fat_capacity < self.data_blocks_count() as usize {
            return corrupt!("FAT region too small for the data region");
        }
        if self.free_blocks_count() > self.data_blocks_count() {
            return corrupt!("free block count exceeds the data region");
        }
        Ok(())
    }

    pub fn block_size(&self) -> u32 {
        self.block_size.get()
    }
    pub fn total_blocks(&self) -> u32 {
        self.total_blocks.get()
    }
    pub fn fat1_start_block(&self) -> u32 {
        self.fat1_start_block.get()
    }
    pub fn fat_blocks_count(&self) -> u32 {
        self.fat_blocks_count.get()
    }
    pub fn fat2_start_block(&self) -> u32 {
        self.fat2_start_block.get()
    }
    pub fn root_dir_block(&self) -> u32 {
        self.root_dir_block.get()
    }
    pub fn root_dir_blocks(&self) -> u32 {
        self.root_dir_blocks.get()
    }
    pub fn data_start_block(&self) -> u32 {
        self.data_start_block.get()
    }
    pub fn data_blocks_count(&self) -> u32 {
        self.data_blocks_count.get()
    }
    pub fn free_blocks_count(&self) -> u32 {
        self.free_blocks_count.get()
    }
    pub(crate) fn set_free_blocks_count(&mut self, count: u32) {
        self.free_blocks_count = count.into();
    }
}
