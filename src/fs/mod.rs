pub mod dirent;
pub mod fat;
pub mod fd_table;
pub mod superblock;

use crate::block::block_core::{Disk, BLOCK_SIZE};
use crate::error::{corrupt, Error, Result};
use dirent::Directory;
use fat::{Fat, FatEntry, FAT_FREE};
use fd_table::{Fd, FdTable};
use log::{debug, trace};
use std::path::Path;
use superblock::Superblock;

/// A mounted filesystem.
///
/// `mount` produces one; every file operation is a method on it; `umount`
/// consumes it and flushes all in-memory metadata back to the image. Nothing
/// is persisted in between, so state mutated during a session is lost if the
/// process dies before unmounting.
pub struct FadeFs {
    disk: Disk,
    superblock: Superblock,
    fat: Fat,
    dir: Directory,
    fds: FdTable,
}

impl FadeFs {
    /// Formats a fresh filesystem image at `path`.
    ///
    /// Lays out the superblock, both FAT copies (all clusters free) and an
    /// empty directory, then closes the image.
    pub fn make<P: AsRef<Path>>(path: P) -> Result<()> {
        let mut disk = Disk::create(&path)?;
        let superblock = Superblock::for_disk();
        disk.write(0, &superblock.to_block())?;
        let fat = Fat::new_empty(superblock.data_blocks_count());
        fat.flush(&mut disk, &superblock)?;
        let dir = Directory::new_empty();
        dir.flush(&mut disk, &superblock)?;
        disk.close()?;
        debug!(
            "formatted {:?}: {} data blocks",
            path.as_ref(),
            superblock.data_blocks_count()
        );
        Ok(())
    }

    /// Mounts the filesystem image at `path`.
    pub fn mount<P: AsRef<Path>>(path: P) -> Result<FadeFs> {
        Self::mount_disk(Disk::open(&path)?)
    }

    pub(crate) fn mount_disk(mut disk: Disk) -> Result<FadeFs> {
        let mut block = [0u8; BLOCK_SIZE];
        disk.read(0, &mut block)?;
        let superblock = Superblock::parse(&block)?;
        superblock.check_integrity()?;
        let fat = Fat::load(&mut disk, &superblock)?;
        let dir = Directory::load(&mut disk, &superblock)?;
        debug!(
            "mounted {}: {} of {} data blocks free",
            disk.name(),
            fat.free_count(),
            superblock.data_blocks_count()
        );
        Ok(FadeFs {
            disk,
            superblock,
            fat,
            dir,
            fds: FdTable::new(),
        })
    }

    /// Unmounts the filesystem, flushing the FAT (both copies), the
    /// directory, and the superblock when its free count changed.
    ///
    /// Open handles do not survive this; the table dies with the mount.
    pub fn umount(mut self) -> Result<()> {
        self.fat.flush(&mut self.disk, &self.superblock)?;
        self.dir.flush(&mut self.disk, &self.superblock)?;
        if self.fat.free_count() != self.superblock.free_blocks_count() {
            self.superblock.set_free_blocks_count(self.fat.free_count());
            self.disk.write(0, &self.superblock.to_block())?;
        }
        debug!("unmounted {}", self.disk.name());
        self.disk.close()?;
        Ok(())
    }

    /// Creates an empty file.
    ///
    /// The file owns one cluster from the start, so its starting cluster is
    /// always a real chain head.
    pub fn create(&mut self, name: &str) -> Result<()> {
        dirent::validate_name(name)?;
        if self.dir.find(name).is_some() {
            return Err(Error::AlreadyExists);
        }
        let slot = self.dir.free_slot().ok_or(Error::NoSpace)?;
        let cluster = self.fat.allocate_initial()?;
        self.dir.insert(slot, name, cluster);
        trace!("created {name:?} at slot {slot}, cluster {cluster}");
        Ok(())
    }

    /// Opens an existing file and returns a handle with the cursor at zero.
    pub fn open(&mut self, name: &str) -> Result<Fd> {
        if name.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let index = self.dir.find(name).ok_or(Error::NotFound)?;
        let fd = self.fds.allocate(index)?;
        trace!("opened {name:?} as fd {fd}");
        Ok(fd)
    }

    /// Releases a handle. Handles revoked by [`FadeFs::delete`] close cleanly.
    pub fn close(&mut self, fd: Fd) -> Result<()> {
        self.fds.release(fd)?;
        trace!("closed fd {fd}");
        Ok(())
    }

    /// Deletes a file, returning its whole chain to the free pool.
    ///
    /// Handles still bound to the file are revoked: their subsequent reads,
    /// writes and seeks fail with [`Error::NotFound`].
    pub fn delete(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let index = self.dir.find(name).ok_or(Error::NotFound)?;
        let start = self.dir.entry(index).starting_cluster();
        if start != FAT_FREE {
            self.fat.free_chain(start)?;
        }
        self.dir.remove(index);
        self.fds.revoke_bindings(index);
        trace!("deleted {name:?}");
        Ok(())
    }

    /// Current size in bytes of the file behind `fd`.
    pub fn file_size(&self, fd: Fd) -> Result<u32> {
        let binding = self.fds.resolve(fd)?;
        Ok(self.dir.entry(binding.file_index).file_size())
    }

    /// Moves the cursor of `fd`. Seeking to exactly the file size is legal
    /// and makes the next read report end of file.
    pub fn seek(&mut self, fd: Fd, offset: u32) -> Result<()> {
        let file_index = self.fds.resolve(fd)?.file_index;
        if offset > self.dir.entry(file_index).file_size() {
            return Err(Error::InvalidArgument);
        }
        self.fds.resolve_mut(fd)?.offset = offset;
        Ok(())
    }

    /// Reads from the cursor into `buf`, returning the byte count; 0 means
    /// end of file.
    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let binding = *self.fds.resolve(fd)?;
        let entry = self.dir.entry(binding.file_index);
        let size = entry.file_size();
        if binding.offset >= size {
            return Ok(0);
        }
        let mut remaining = usize::min(buf.len(), (size - binding.offset) as usize);
        let start = entry.starting_cluster();
        if start == FAT_FREE {
            return corrupt!("file has {size} bytes but no chain");
        }
        let mut cluster = self.fat.walk(start, binding.offset as usize / BLOCK_SIZE)?;
        let mut intra = binding.offset as usize % BLOCK_SIZE;
        let data_start = self.superblock.data_start_block();

        let mut block = [0u8; BLOCK_SIZE];
        let mut copied = 0;
        loop {
            self.disk.read(data_start + cluster, &mut block)?;
            let n = usize::min(remaining, BLOCK_SIZE - intra);
            buf[copied..copied + n].copy_from_slice(&block[intra..intra + n]);
            copied += n;
            remaining -= n;
            intra = 0;
            if remaining == 0 {
                break;
            }
            cluster = match self.fat.entry(cluster)? {
                FatEntry::HasNext(next) => next,
                // the size clamp keeps us inside the chain; a shorter chain
                // just ends the read
                FatEntry::Eof => break,
                FatEntry::Free => return corrupt!("chain reaches free cluster {cluster}"),
            };
        }
        self.fds.resolve_mut(fd)?.offset += copied as u32;
        trace!("read {copied} bytes from fd {fd}");
        Ok(copied)
    }

    /// Writes `buf` at the cursor, returning the byte count.
    ///
    /// Writing past the end of the chain grows it one cluster at a time;
    /// running out of clusters fails with [`Error::NoSpace`], and whatever
    /// was already written stays written.
    pub fn write(&mut self, fd: Fd, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let binding = *self.fds.resolve(fd)?;
        let file_index = binding.file_index;

        // a file that never received a block gets its first one here
        let mut cluster = match self.dir.entry(file_index).starting_cluster() {
            FAT_FREE => {
                let first = self.fat.allocate_initial()?;
                self.dir.entry_mut(file_index).set_starting_cluster(first);
                first
            }
            c => c,
        };

        // advance to the cluster holding the cursor, extending the chain
        // when the cursor lies beyond it
        let mut offset = binding.offset as usize;
        while offset >= BLOCK_SIZE {
            cluster = match self.fat.entry(cluster)? {
                FatEntry::HasNext(next) => next,
                FatEntry::Eof => self.fat.extend(cluster)?,
                FatEntry::Free => return corrupt!("chain reaches free cluster {cluster}"),
            };
            offset -= BLOCK_SIZE;
        }

        let data_start = self.superblock.data_start_block();
        let mut block = [0u8; BLOCK_SIZE];
        let mut written = 0;
        loop {
            let sector = data_start + cluster;
            self.disk.read(sector, &mut block)?;
            let n = usize::min(buf.len() - written, BLOCK_SIZE - offset);
            block[offset..offset + n].copy_from_slice(&buf[written..written + n]);
            self.disk.write(sector, &block)?;
            written += n;
            offset = 0;
            if written == buf.len() {
                break;
            }
            cluster = match self.fat.entry(cluster)? {
                FatEntry::HasNext(next) => next,
                FatEntry::Eof => self.fat.extend(cluster)?,
                FatEntry::Free => return corrupt!("chain reaches free cluster {cluster}"),
            };
        }

        let binding = self.fds.resolve_mut(fd)?;
        binding.offset += written as u32;
        let end = binding.offset;
        let entry = self.dir.entry_mut(file_index);
        if end > entry.file_size() {
            entry.set_file_size(end);
        }
        trace!("wrote {written} bytes to fd {fd}");
        Ok(written)
    }

    /// Shrinks the file behind `fd` to `new_size` bytes, freeing clusters
    /// past the new tail. Growing is not supported.
    pub fn truncate(&mut self, fd: Fd, new_size: u32) -> Result<()> {
        let file_index = self.fds.resolve(fd)?.file_index;
        let entry = self.dir.entry(file_index);
        if new_size > entry.file_size() {
            return Err(Error::InvalidArgument);
        }
        let start = entry.starting_cluster();
        if start != FAT_FREE {
            // keep at least the starting cluster, even at size zero
            let keep = usize::max(1, (new_size as usize).div_ceil(BLOCK_SIZE));
            let tail = self.fat.walk(start, keep - 1)?;
            if let FatEntry::HasNext(surplus) = self.fat.entry(tail)? {
                self.fat.terminate(tail)?;
                self.fat.free_chain(surplus)?;
            }
        }
        self.dir.entry_mut(file_index).set_file_size(new_size);
        self.fds.clamp_offsets(file_index, new_size);
        trace!("truncated fd {fd} to {new_size} bytes");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    // https://github.com/rust-lang/rust/pull/120234
    macro_rules! assert_matches {
        ($expression:expr, $pattern:pat) => {
            assert!(matches!($expression, $pattern))
        };
    }

    const GREETING: &[u8] = b"Testing file system";

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn image(dir: &TempDir) -> PathBuf {
        dir.path().join("fs.img")
    }

    fn fresh(dir: &TempDir) -> FadeFs {
        init_logging();
        let path = image(dir);
        FadeFs::make(&path).unwrap();
        FadeFs::mount(&path).unwrap()
    }

    // byte pattern that doesn't repeat at block granularity
    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn read_all(fs: &mut FadeFs, fd: Fd) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let n = fs.read(fd, &mut buf).unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    /// Free-count consistency and chain well-formedness over all live files.
    fn assert_consistent(fs: &FadeFs) {
        let scanned = (0..fs.fat.len() as u32)
            .filter(|&i| matches!(fs.fat.entry(i).unwrap(), FatEntry::Free))
            .count() as u32;
        assert_eq!(scanned, fs.fat.free_count());
        for (_, entry) in fs.dir.occupied() {
            let blocks = usize::max(1, (entry.file_size() as usize).div_ceil(BLOCK_SIZE));
            let tail = fs.fat.walk(entry.starting_cluster(), blocks - 1).unwrap();
            assert_matches!(fs.fat.entry(tail).unwrap(), FatEntry::Eof);
        }
    }

    #[test]
    fn basic_write_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);
        fs.create("t").unwrap();
        let fd = fs.open("t").unwrap();
        assert_eq!(fs.write(fd, GREETING).unwrap(), 19);
        fs.close(fd).unwrap();
        let fd = fs.open("t").unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 19);
        assert_eq!(&buf[..19], GREETING);
        assert_eq!(fs.file_size(fd).unwrap(), 19);
        assert_consistent(&fs);
    }

    #[test]
    fn seek_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);
        fs.create("t").unwrap();
        let fd = fs.open("t").unwrap();
        fs.write(fd, GREETING).unwrap();
        fs.seek(fd, 7).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 12);
        assert_eq!(&buf[..12], b" file system");
    }

    #[test]
    fn truncate_discards_tail() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);
        fs.create("t").unwrap();
        let fd = fs.open("t").unwrap();
        fs.write(fd, GREETING).unwrap();
        fs.truncate(fd, 10).unwrap();
        assert_eq!(fs.file_size(fd).unwrap(), 10);
        fs.seek(fd, 0).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 10);
        assert_eq!(&buf[..10], b"Testing fi");
        assert_consistent(&fs);
    }

    #[test]
    fn delete_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);
        let baseline = fs.fat.free_count();
        fs.create("t").unwrap();
        let fd = fs.open("t").unwrap();
        fs.write(fd, &pattern(2 * BLOCK_SIZE + 5)).unwrap();
        fs.close(fd).unwrap();
        fs.delete("t").unwrap();
        assert_matches!(fs.open("t"), Err(Error::NotFound));
        assert_eq!(fs.fat.free_count(), baseline);
        assert_consistent(&fs);
    }

    #[test]
    fn copy_across_chain() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);
        let data = pattern(3 * BLOCK_SIZE + 7);
        fs.create("a").unwrap();
        let fda = fs.open("a").unwrap();
        assert_eq!(fs.write(fda, &data).unwrap(), data.len());
        fs.create("b").unwrap();
        let fdb = fs.open("b").unwrap();
        fs.seek(fda, 0).unwrap();
        let mut buf = [0u8; 64];
        loop {
            let n = fs.read(fda, &mut buf).unwrap();
            if n == 0 {
                break;
            }
            assert_eq!(fs.write(fdb, &buf[..n]).unwrap(), n);
        }
        assert_eq!(fs.file_size(fdb).unwrap() as usize, data.len());
        fs.seek(fdb, 0).unwrap();
        assert_eq!(read_all(&mut fs, fdb), data);
        assert_consistent(&fs);
    }

    #[test]
    fn persists_across_remount() {
        let dir = tempfile::tempdir().unwrap();
        let path = image(&dir);
        let data = pattern(3 * BLOCK_SIZE + 7);
        {
            let mut fs = fresh(&dir);
            fs.create("a").unwrap();
            let fd = fs.open("a").unwrap();
            fs.write(fd, &data).unwrap();
            fs.umount().unwrap();
        }
        let mut fs = FadeFs::mount(&path).unwrap();
        let fd = fs.open("a").unwrap();
        assert_eq!(read_all(&mut fs, fd), data);
        assert_consistent(&fs);
        fs.umount().unwrap();
    }

    #[test]
    fn clean_mount_leaves_image_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = image(&dir);
        init_logging();
        FadeFs::make(&path).unwrap();
        let before = std::fs::read(&path).unwrap();
        let fs = FadeFs::mount(&path).unwrap();
        fs.umount().unwrap();
        let after = std::fs::read(&path).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn write_read_idempotence() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);
        for (i, len) in [1, 63, BLOCK_SIZE - 1, BLOCK_SIZE, BLOCK_SIZE + 1, 5 * BLOCK_SIZE / 2]
            .into_iter()
            .enumerate()
        {
            let name = format!("f{i}");
            let data = pattern(len);
            fs.create(&name).unwrap();
            let fd = fs.open(&name).unwrap();
            assert_eq!(fs.write(fd, &data).unwrap(), len);
            fs.seek(fd, 0).unwrap();
            assert_eq!(read_all(&mut fs, fd), data);
            fs.close(fd).unwrap();
        }
        assert_consistent(&fs);
    }

    #[test]
    fn exact_block_fill_and_eof() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);
        fs.create("t").unwrap();
        let fd = fs.open("t").unwrap();
        let data = pattern(BLOCK_SIZE);
        assert_eq!(fs.write(fd, &data).unwrap(), BLOCK_SIZE);
        assert_eq!(fs.file_size(fd).unwrap() as usize, BLOCK_SIZE);
        // the cursor sits exactly at the end: next read reports EOF
        let mut buf = [0u8; 64];
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 0);
        // seeking to the size is legal, past it is not
        fs.seek(fd, BLOCK_SIZE as u32).unwrap();
        assert_matches!(
            fs.seek(fd, BLOCK_SIZE as u32 + 1),
            Err(Error::InvalidArgument)
        );
        // a full chain of exactly one block
        assert_consistent(&fs);
        // appending after the boundary extends the chain
        assert_eq!(fs.write(fd, b"x").unwrap(), 1);
        assert_eq!(fs.file_size(fd).unwrap() as usize, BLOCK_SIZE + 1);
        assert_consistent(&fs);
    }

    #[test]
    fn directory_fills_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);
        let baseline = fs.fat.free_count();
        for i in 0..dirent::MAX_FILES {
            fs.create(&format!("file{i}")).unwrap();
        }
        assert_matches!(fs.create("one-more"), Err(Error::NoSpace));
        // every live file owns its initial cluster
        assert_eq!(fs.fat.free_count(), baseline - dirent::MAX_FILES as u32);
        assert_consistent(&fs);
    }

    #[test]
    fn fat_fills_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);
        let baseline = fs.fat.free_count();
        fs.create("big").unwrap();
        let fd = fs.open("big").unwrap();
        let capacity = fs.superblock.data_blocks_count() as usize * BLOCK_SIZE;
        let data = vec![0xA5u8; capacity];
        assert_eq!(fs.write(fd, &data).unwrap(), capacity);
        assert_eq!(fs.fat.free_count(), 0);
        assert_matches!(fs.write(fd, b"x"), Err(Error::NoSpace));
        fs.close(fd).unwrap();
        fs.delete("big").unwrap();
        assert_eq!(fs.fat.free_count(), baseline);
        assert_consistent(&fs);
    }

    #[test]
    fn rejects_bad_handles_and_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);
        fs.create("t").unwrap();
        let fd = fs.open("t").unwrap();
        let mut buf = [0u8; 8];
        assert_matches!(fs.read(99, &mut buf), Err(Error::InvalidArgument));
        assert_matches!(fs.write(99, &buf), Err(Error::InvalidArgument));
        assert_matches!(fs.seek(99, 0), Err(Error::InvalidArgument));
        assert_matches!(fs.file_size(99), Err(Error::InvalidArgument));
        assert_matches!(fs.close(99), Err(Error::InvalidArgument));
        assert_matches!(fs.read(fd, &mut buf[..0]), Err(Error::InvalidArgument));
        assert_matches!(fs.write(fd, &buf[..0]), Err(Error::InvalidArgument));
    }

    #[test]
    fn delete_revokes_open_handles() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);
        fs.create("t").unwrap();
        let fd = fs.open("t").unwrap();
        fs.write(fd, GREETING).unwrap();
        fs.delete("t").unwrap();
        let mut buf = [0u8; 8];
        assert_matches!(fs.read(fd, &mut buf), Err(Error::NotFound));
        assert_matches!(fs.write(fd, b"x"), Err(Error::NotFound));
        assert_matches!(fs.seek(fd, 0), Err(Error::NotFound));
        assert_matches!(fs.file_size(fd), Err(Error::NotFound));
        fs.close(fd).unwrap();
        assert_consistent(&fs);
    }

    #[test]
    fn create_validates_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);
        fs.create("t").unwrap();
        assert_matches!(fs.create("t"), Err(Error::AlreadyExists));
        assert_matches!(fs.create(""), Err(Error::InvalidArgument));
        assert_matches!(fs.create("fifteen-bytes!!"), Err(Error::InvalidArgument));
        // 14 usable bytes is the longest legal name
        fs.create("abcdefghijklmn").unwrap();
        fs.open("abcdefghijklmn").unwrap();
    }

    #[test]
    fn open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);
        assert_matches!(fs.open("nope"), Err(Error::NotFound));
        assert_matches!(fs.open(""), Err(Error::InvalidArgument));
        assert_matches!(fs.delete("nope"), Err(Error::NotFound));
    }

    #[test]
    fn handle_table_fills_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);
        fs.create("t").unwrap();
        for _ in 0..fd_table::MAX_OPEN_FILES {
            fs.open("t").unwrap();
        }
        assert_matches!(fs.open("t"), Err(Error::NoHandles));
    }

    #[test]
    fn truncate_to_zero_keeps_one_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);
        let baseline = fs.fat.free_count();
        fs.create("t").unwrap();
        let fd = fs.open("t").unwrap();
        fs.write(fd, &pattern(5 * BLOCK_SIZE / 2)).unwrap();
        fs.truncate(fd, 0).unwrap();
        assert_eq!(fs.file_size(fd).unwrap(), 0);
        assert_eq!(fs.fat.free_count(), baseline - 1);
        let mut buf = [0u8; 8];
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 0);
        // the cursor was pulled back with the size; writing restarts at zero
        assert_eq!(fs.write(fd, b"hi").unwrap(), 2);
        fs.seek(fd, 0).unwrap();
        assert_eq!(read_all(&mut fs, fd), &b"hi"[..]);
        assert_consistent(&fs);
    }

    #[test]
    fn truncate_on_cluster_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = fresh(&dir);
        let baseline = fs.fat.free_count();
        fs.create("t").unwrap();
        let fd = fs.open("t").unwrap();
        let data = pattern(2 * BLOCK_SIZE);
        fs.write(fd, &data).unwrap();
        assert_eq!(fs.fat.free_count(), baseline - 2);
        fs.truncate(fd, BLOCK_SIZE as u32).unwrap();
        assert_eq!(fs.fat.free_count(), baseline - 1);
        fs.seek(fd, 0).unwrap();
        assert_eq!(read_all(&mut fs, fd), &data[..BLOCK_SIZE]);
        assert_matches!(
            fs.truncate(fd, 2 * BLOCK_SIZE as u32),
            Err(Error::InvalidArgument)
        );
        assert_consistent(&fs);
    }

    #[test]
    fn mount_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = image(&dir);
        init_logging();
        FadeFs::make(&path).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();
        assert_matches!(FadeFs::mount(&path), Err(Error::Corruption(_)));
    }

    #[test]
    fn mount_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        init_logging();
        assert_matches!(
            FadeFs::mount(dir.path().join("absent.img")),
            Err(Error::Io(_))
        );
    }

    #[test]
    fn mount_survives_fat1_read_failure() {
        use crate::block::block_core::test::disk_from_vec_faulty;
        let dir = tempfile::tempdir().unwrap();
        let path = image(&dir);
        let mut fs = fresh(&dir);
        fs.create("t").unwrap();
        let fd = fs.open("t").unwrap();
        fs.write(fd, GREETING).unwrap();
        fs.umount().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let bad = Superblock::for_disk().fat1_start_block();
        let disk = disk_from_vec_faulty(bytes, &[bad]);
        let mut fs = FadeFs::mount_disk(disk).unwrap();
        let fd = fs.open("t").unwrap();
        assert_eq!(read_all(&mut fs, fd), GREETING);
    }
}
