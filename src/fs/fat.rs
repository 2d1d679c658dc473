use crate::block::block_core::{Disk, BLOCK_SIZE};
use crate::error::{corrupt, Error, Result};
use crate::fs::superblock::Superblock;
use log::warn;
use zerocopy::AsBytes;

/// Marks a cluster as unallocated.
pub const FAT_FREE: u32 = 0xFFFF_FFFF;
/// Marks a cluster as the last one of its chain.
pub const FAT_EOF: u32 = 0xFFFF_FFFE;

/// FAT entries per disk block (entries are packed 32-bit values).
const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / 4;

/// File Allocation Table
///
/// Lists the clusters which are allocated or free,
/// and maintains linked lists of clusters for files.
pub struct Fat {
    data: Vec<u32>,
    free_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FatEntry {
    /// Indicates a cluster is free
    Free,
    /// Indicates a cluster is the last one for a file.
    Eof,
    /// Indicates a cluster is not the last one for a file, and includes an index to the next cluster.
    HasNext(u32),
}

impl FatEntry {
    fn from_raw(raw: u32) -> FatEntry {
        match raw {
            FAT_FREE => FatEntry::Free,
            FAT_EOF => FatEntry::Eof,
            x => FatEntry::HasNext(x),
        }
    }

    fn to_raw(self) -> u32 {
        match self {
            FatEntry::Free => FAT_FREE,
            FatEntry::Eof => FAT_EOF,
            FatEntry::HasNext(x) => x,
        }
    }
}

impl std::fmt::Debug for Fat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<FAT length={} free={}>", self.data.len(), self.free_count)
    }
}

impl Fat {
    /// A fresh table with every cluster free.
    pub fn new_empty(cluster_count: u32) -> Fat {
        Fat {
            data: vec![FAT_FREE; cluster_count as usize],
            free_count: cluster_count,
        }
    }

    /// Loads the table from disk.
    ///
    /// FAT1 is authoritative; a FAT1 block whose read fails is recovered from
    /// the FAT2 mirror, and loading fails only when both copies fail.
    pub fn load(disk: &mut Disk, sb: &Superblock) -> Result<Fat> {
        let capacity = sb.fat_blocks_count() as usize * ENTRIES_PER_BLOCK;
        let mut data: Vec<u32> = Vec::new();
        data.try_reserve_exact(capacity).map_err(|_| Error::NoSpace)?;
        data.resize(capacity, 0);

        for i in 0..sb.fat_blocks_count() {
            let slice = &mut data[i as usize * ENTRIES_PER_BLOCK..(i as usize + 1) * ENTRIES_PER_BLOCK];
            let primary = sb.fat1_start_block() + i;
            if let Err(e) = disk.read(primary, slice.as_bytes_mut()) {
                warn!("FAT1 block {primary} unreadable ({e}), falling back to FAT2");
                disk.read(sb.fat2_start_block() + i, slice.as_bytes_mut())?;
            }
        }

        #[cfg(target_endian = "big")]
        // FAT entries are stored in little endian
        for entry in data.iter_mut() {
            *entry = entry.swap_bytes();
        }

        // only the data region's worth of entries is meaningful
        data.truncate(sb.data_blocks_count() as usize);

        let cluster_count = data.len() as u32;
        let mut free_count = 0;
        for (i, &raw) in data.iter().enumerate() {
            match FatEntry::from_raw(raw) {
                FatEntry::Free => free_count += 1,
                FatEntry::Eof => {}
                FatEntry::HasNext(n) => {
                    if n >= cluster_count {
                        return corrupt!(
                            "invalid entry in FAT: {raw:#010x} at cluster {i} (cluster count = {cluster_count})"
                        );
                    }
                }
            }
        }
        Ok(Fat { data, free_count })
    }

    /// Writes the table to both on-disk copies.
    pub fn flush(&self, disk: &mut Disk, sb: &Superblock) -> Result<()> {
        let mut block = [0u32; ENTRIES_PER_BLOCK];
        for i in 0..sb.fat_blocks_count() as usize {
            block.fill(0);
            let start = i * ENTRIES_PER_BLOCK;
            if start < self.data.len() {
                let end = usize::min(start + ENTRIES_PER_BLOCK, self.data.len());
                block[..end - start].copy_from_slice(&self.data[start..end]);
            }
            #[cfg(target_endian = "big")]
            for entry in block.iter_mut() {
                *entry = entry.swap_bytes();
            }
            disk.write(sb.fat1_start_block() + i as u32, block.as_bytes())?;
            disk.write(sb.fat2_start_block() + i as u32, block.as_bytes())?;
        }
        Ok(())
    }

    /// Number of clusters tracked by the table.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Number of clusters currently free.
    pub fn free_count(&self) -> u32 {
        self.free_count
    }

    pub fn entry(&self, cluster: u32) -> Result<FatEntry> {
        match self.data.get(cluster as usize) {
            Some(&raw) => Ok(FatEntry::from_raw(raw)),
            None => corrupt!("cluster {cluster} is out of range"),
        }
    }

    fn set(&mut self, cluster: u32, entry: FatEntry) {
        self.data[cluster as usize] = entry.to_raw();
    }

    /// Lowest-indexed free cluster, if any.
    pub fn find_free(&self) -> Option<u32> {
        self.data
            .iter()
            .position(|&raw| raw == FAT_FREE)
            .map(|i| i as u32)
    }

    /// Claims a free cluster as the single block of a new chain.
    pub fn allocate_initial(&mut self) -> Result<u32> {
        let cluster = self.find_free().ok_or(Error::NoSpace)?;
        self.set(cluster, FatEntry::Eof);
        self.free_count -= 1;
        Ok(cluster)
    }

    /// Grows the chain ending at `tail` by one cluster and returns it.
    pub fn extend(&mut self, tail: u32) -> Result<u32> {
        if self.entry(tail)? != FatEntry::Eof {
            return corrupt!("cluster {tail} is not the end of a chain");
        }
        let new = self.find_free().ok_or(Error::NoSpace)?;
        self.set(tail, FatEntry::HasNext(new));
        self.set(new, FatEntry::Eof);
        self.free_count -= 1;
        Ok(new)
    }

    /// Advances `links` forward pointers starting from `start`.
    ///
    /// Hitting a free cluster, or the end of the chain before `links` steps
    /// elapse, means the chain disagrees with the metadata that led here.
    pub fn walk(&self, start: u32, links: usize) -> Result<u32> {
        let mut cluster = start;
        for _ in 0..links {
            cluster = match self.entry(cluster)? {
                FatEntry::HasNext(next) => next,
                FatEntry::Eof => return corrupt!("chain ends early at cluster {cluster}"),
                FatEntry::Free => return corrupt!("chain reaches free cluster {cluster}"),
            };
        }
        // the destination itself must be allocated
        if self.entry(cluster)? == FatEntry::Free {
            return corrupt!("chain reaches free cluster {cluster}");
        }
        Ok(cluster)
    }

    /// Rewrites the entry at `tail` to terminate its chain.
    pub fn terminate(&mut self, tail: u32) -> Result<()> {
        self.entry(tail)?;
        self.set(tail, FatEntry::Eof);
        Ok(())
    }

    /// Releases every cluster of the chain starting at `start`.
    pub fn free_chain(&mut self, start: u32) -> Result<()> {
        let mut cluster = start;
        let mut steps = 0usize;
        loop {
            if steps > self.data.len() {
                return corrupt!("cycle in chain starting at cluster {start}");
            }
            steps += 1;
            match self.entry(cluster)? {
                FatEntry::Free => {
                    return corrupt!("chain reaches free cluster {cluster}");
                }
                FatEntry::Eof => {
                    self.set(cluster, FatEntry::Free);
                    self.free_count += 1;
                    return Ok(());
                }
                FatEntry::HasNext(next) => {
                    self.set(cluster, FatEntry::Free);
                    self.free_count += 1;
                    cluster = next;
                }
            }
        }
    }
}
