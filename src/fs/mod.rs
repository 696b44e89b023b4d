//! The engine: superblock, inode table, directory table, bitmap, descriptor
//! table, allocator, read/write path, and mount/format, bundled into one
//! [`Filesystem`] value the caller holds and passes to every operation.
//!
//! Per the concurrency model, nothing here is internally synchronized: a
//! `Filesystem` is not `Sync`-safe to share across threads without external
//! exclusion, and the engine does not attempt to provide that exclusion
//! itself.

pub mod bitmap;
pub mod constants;
pub mod descriptor;
pub mod directory;
pub mod engine;
pub mod inode;
pub mod superblock;

use bytemuck::{bytes_of, cast_slice, cast_slice_mut};

use crate::device::BlockDevice;
use crate::error::{FsError, FsResult};
use crate::fs::bitmap::Bitmap;
use crate::fs::constants::{Layout, BLOCK_SIZE, MAX_FILENAME, NUM_FILE_INODES, NUM_INODES};
use crate::fs::descriptor::DescriptorTable;
use crate::fs::directory::{DirectoryCursor, DirectoryEntry};
use crate::fs::inode::Inode;
use crate::fs::superblock::Superblock;
use crate::{error, info};

/// A mounted filesystem instance: every in-memory table the engine needs,
/// plus the block device backing it.
pub struct Filesystem<D: BlockDevice> {
    pub(crate) device: D,
    pub(crate) layout: Layout,
    pub(crate) superblock: Superblock,
    pub(crate) inodes: Vec<Inode>,
    pub(crate) directory: Vec<DirectoryEntry>,
    pub(crate) bitmap: Bitmap,
    pub(crate) descriptors: DescriptorTable,
    pub(crate) cursor: DirectoryCursor,
}

impl<D: BlockDevice> Filesystem<D> {
    /// Formats `device` as a fresh filesystem using the production layout
    /// (§3.4): zeroes every table, reserves inode 0 for the root directory,
    /// and persists the superblock, inode table, directory table, and
    /// bitmap to their fixed offsets.
    pub fn format(device: D) -> FsResult<Self> {
        Self::format_with_layout(device, Layout::production())
    }

    /// Formats `device` with an explicit `layout` instead of the production
    /// one. `device` must have at least `layout.total_blocks` blocks. Used
    /// by tests that need a data region small enough to exhaust the bitmap
    /// without writing gigabytes of filler.
    pub fn format_with_layout(device: D, layout: Layout) -> FsResult<Self> {
        let superblock = Superblock::new(&layout, BLOCK_SIZE as u32, NUM_INODES as u32);

        let mut inodes = vec![Inode::default(); NUM_INODES];
        inodes[0].mode = 0;
        inodes[0].link_cnt = 1;

        let directory = vec![DirectoryEntry::default(); NUM_FILE_INODES];
        let bitmap = Bitmap::new(layout.num_data_blocks as usize);
        let descriptors = DescriptorTable::new(NUM_INODES);

        let mut fs = Self {
            device,
            layout,
            superblock,
            inodes,
            directory,
            bitmap,
            descriptors,
            cursor: DirectoryCursor::default(),
        };

        fs.persist_superblock()?;
        fs.persist_inode_table()?;
        fs.persist_directory_table()?;
        fs.persist_bitmap()?;

        info!("mount", "formatted fresh filesystem ({} blocks)", fs.layout.total_blocks);
        Ok(fs)
    }

    /// Attaches to an already-formatted `device` laid out with the
    /// production layout: reads the superblock, the inode table, the
    /// directory table, and the bitmap back into memory, and builds a fresh
    /// descriptor table and directory iteration cursor (neither is
    /// persistent, so there is nothing to read back for either).
    pub fn mount(device: D) -> FsResult<Self> {
        Self::mount_with_layout(device, Layout::production())
    }

    /// Mounts `device` against an explicit `layout` instead of the
    /// production one — the counterpart to [`Self::format_with_layout`],
    /// needed to remount a disk that was formatted with a non-production
    /// layout.
    pub fn mount_with_layout(mut device: D, layout: Layout) -> FsResult<Self> {
        let mut sb_buf = vec![0u8; BLOCK_SIZE];
        device.read_block(0, &mut sb_buf)?;
        let superblock = *bytemuck::from_bytes::<Superblock>(&sb_buf[..core::mem::size_of::<Superblock>()]);

        if !superblock.is_valid() {
            error!("mount", "superblock magic mismatch, treating disk as unformatted");
            return Err(FsError::InvalidArgument);
        }

        let mut inode_buf = vec![0u8; layout.num_inode_blocks as usize * BLOCK_SIZE];
        device.read_blocks(layout.inode_table_start(), layout.num_inode_blocks, &mut inode_buf)?;
        let inodes: Vec<Inode> = cast_slice::<u8, Inode>(&inode_buf)[..NUM_INODES].to_vec();

        let mut dir_buf = vec![0u8; layout.num_dir_blocks as usize * BLOCK_SIZE];
        device.read_blocks(layout.dir_table_start(), layout.num_dir_blocks, &mut dir_buf)?;
        let directory: Vec<DirectoryEntry> =
            cast_slice::<u8, DirectoryEntry>(&dir_buf)[..NUM_FILE_INODES].to_vec();

        let mut bitmap_buf = vec![0u8; layout.num_bitmap_blocks as usize * BLOCK_SIZE];
        device.read_blocks(layout.bitmap_start(), layout.num_bitmap_blocks, &mut bitmap_buf)?;
        bitmap_buf.truncate(layout.num_data_blocks as usize);
        let bitmap = Bitmap::from_bytes(bitmap_buf);

        let descriptors = DescriptorTable::new(NUM_INODES);

        info!("mount", "remounted filesystem ({} active files)", inodes.iter().skip(1).filter(|i| i.is_allocated()).count());

        Ok(Self {
            device,
            layout,
            superblock,
            inodes,
            directory,
            bitmap,
            descriptors,
            cursor: DirectoryCursor::default(),
        })
    }

    pub fn total_blocks(&self) -> u32 {
        self.layout.total_blocks
    }

    pub fn free_blocks(&self) -> usize {
        self.bitmap.count_free()
    }

    // -- persistence -------------------------------------------------

    fn persist_superblock(&mut self) -> FsResult<()> {
        let mut buf = vec![0u8; BLOCK_SIZE];
        let sb_bytes = bytes_of(&self.superblock);
        buf[..sb_bytes.len()].copy_from_slice(sb_bytes);
        self.device.write_block(0, &buf)?;
        Ok(())
    }

    fn persist_inode_table(&mut self) -> FsResult<()> {
        let mut buf = vec![0u8; self.layout.num_inode_blocks as usize * BLOCK_SIZE];
        cast_slice_mut::<u8, Inode>(&mut buf)[..self.inodes.len()].copy_from_slice(&self.inodes);
        self.device
            .write_blocks(self.layout.inode_table_start(), self.layout.num_inode_blocks, &buf)?;
        Ok(())
    }

    fn persist_directory_table(&mut self) -> FsResult<()> {
        let mut buf = vec![0u8; self.layout.num_dir_blocks as usize * BLOCK_SIZE];
        cast_slice_mut::<u8, DirectoryEntry>(&mut buf)[..self.directory.len()]
            .copy_from_slice(&self.directory);
        self.device
            .write_blocks(self.layout.dir_table_start(), self.layout.num_dir_blocks, &buf)?;
        Ok(())
    }

    fn persist_bitmap(&mut self) -> FsResult<()> {
        let mut buf = vec![0u8; self.layout.num_bitmap_blocks as usize * BLOCK_SIZE];
        buf[..self.bitmap.len()].copy_from_slice(self.bitmap.as_bytes());
        self.device
            .write_blocks(self.layout.bitmap_start(), self.layout.num_bitmap_blocks, &buf)?;
        Ok(())
    }

    // -- directory enumeration ------------------------------------------

    /// Returns the next active filename, or `None` once every active entry
    /// has been produced (the cursor wraps back to the start in that case).
    pub fn next_filename(&mut self) -> Option<String> {
        self.cursor.next_name(&self.directory)
    }

    // -- size query -------------------------------------------------------

    /// Returns the size in bytes of `name`, or `-1` if no active entry
    /// matches.
    pub fn file_size(&self, name: &str) -> i64 {
        match self.find_entry(name) {
            Some(inode_idx) => i64::from(self.inodes[inode_idx].size),
            None => -1,
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.find_entry(name).is_some()
    }

    /// Linear scan for an active entry named `name`; returns its inode
    /// index (`1..NUM_INODES`) on a match.
    fn find_entry(&self, name: &str) -> Option<usize> {
        self.directory
            .iter()
            .position(|e| e.is_active() && e.name_str() == name)
            .map(|slot| slot + 1)
    }

    // -- open / create ----------------------------------------------------

    /// Opens `name`, creating it if no active entry matches. Returns the
    /// descriptor number on success, `-1` on name-too-long, duplicate-open,
    /// or exhaustion of inodes/descriptors.
    pub fn open(&mut self, name: &str) -> i32 {
        if name.is_empty() || name.len() >= MAX_FILENAME {
            return -1;
        }

        match self.find_entry(name) {
            Some(inode_idx) => {
                if self.descriptors.find_by_inode(inode_idx).is_some() {
                    return -1;
                }
                let Some(fd) = self.descriptors.first_free() else {
                    return -1;
                };
                let size = self.inodes[inode_idx].size as u64;
                *self.descriptors.get_mut(fd).unwrap() = crate::fs::descriptor::FileDescriptor {
                    inode: Some(inode_idx),
                    rwptr: size,
                };
                fd as i32
            }
            None => self.create(name),
        }
    }

    fn create(&mut self, name: &str) -> i32 {
        let Some(inode_idx) = (1..NUM_INODES).find(|&i| self.inodes[i].is_free()) else {
            error!("open", "no free inode slot for {name}");
            return -1;
        };
        let Some(fd) = self.descriptors.first_free() else {
            error!("open", "no free descriptor slot for {name}");
            return -1;
        };

        self.directory[inode_idx - 1].bind(name);
        self.inodes[inode_idx].init_new_file();
        *self.descriptors.get_mut(fd).unwrap() = crate::fs::descriptor::FileDescriptor {
            inode: Some(inode_idx),
            rwptr: 0,
        };

        if self.persist_inode_table().is_err() || self.persist_directory_table().is_err() {
            return -1;
        }

        fd as i32
    }

    // -- close --------------------------------------------------------------

    /// Closes `fd`. Returns `0` on success, `-1` if it was not open.
    pub fn close(&mut self, fd: i32) -> i32 {
        let Some(slot) = self.valid_fd(fd) else {
            return -1;
        };
        let Some(descriptor) = self.descriptors.get_mut(slot) else {
            return -1;
        };
        if !descriptor.is_open() {
            return -1;
        }
        *descriptor = crate::fs::descriptor::FileDescriptor::default();
        0
    }

    // -- seek -------------------------------------------------------------

    /// Seeks `fd` to `loc`. Returns `0` on success, `-1` if `fd` is not
    /// open or `loc` is out of range (`loc > size`, including any attempt
    /// to seek past `MAX_FILE_BYTES`).
    pub fn seek(&mut self, fd: i32, loc: i64) -> i32 {
        let Some(slot) = self.valid_fd(fd) else {
            return -1;
        };
        if loc < 0 {
            return -1;
        }
        let loc = loc as u64;
        let Some(descriptor) = self.descriptors.get(slot).copied() else {
            return -1;
        };
        let Some(inode_idx) = descriptor.inode else {
            return -1;
        };
        let size = u64::from(self.inodes[inode_idx].size);
        if loc > size || loc >= crate::fs::constants::MAX_FILE_BYTES {
            return -1;
        }
        self.descriptors.get_mut(slot).unwrap().rwptr = loc;
        0
    }

    // -- remove ---------------------------------------------------------

    /// Removes `name`: scrubs its directory entry, closes any descriptor
    /// bound to it, and reclaims every data block and the indirect index
    /// block (if any) it owned. Returns the inode index on success, `-1`
    /// on a miss.
    pub fn remove(&mut self, name: &str) -> i32 {
        let Some(inode_idx) = self.find_entry(name) else {
            return -1;
        };

        self.directory[inode_idx - 1].clear();
        self.descriptors.close_by_inode(inode_idx);

        if self.inodes[inode_idx].is_allocated() {
            for i in 0..crate::fs::constants::NUM_DIRECT_POINTERS {
                let ptr = self.inodes[inode_idx].direct[i];
                if ptr.is_allocated() {
                    self.free_data_block(ptr);
                    self.inodes[inode_idx].direct[i] = crate::fs::inode::BlockId::UNALLOCATED;
                }
            }

            let indirect = self.inodes[inode_idx].indirect;
            if indirect.is_allocated() {
                if let Ok(mut slots) = self.read_indirect_block(indirect) {
                    for slot in &mut slots {
                        if slot.is_allocated() {
                            self.free_data_block(*slot);
                            *slot = crate::fs::inode::BlockId::UNALLOCATED;
                        }
                    }
                }
                self.free_data_block(indirect);
                self.inodes[inode_idx].indirect = crate::fs::inode::BlockId::UNALLOCATED;
            }
        }

        self.inodes[inode_idx].reset();

        let _ = self.persist_inode_table();
        let _ = self.persist_directory_table();
        let _ = self.persist_bitmap();

        inode_idx as i32
    }

    fn free_data_block(&mut self, block: crate::fs::inode::BlockId) {
        let slot = block.0 as usize - self.layout.data_blocks_offset as usize;
        self.bitmap.mark_free(slot);
        let zeroes = vec![0u8; BLOCK_SIZE];
        let _ = self.device.write_block(block.0, &zeroes);
    }

    fn read_indirect_block(
        &mut self,
        block: crate::fs::inode::BlockId,
    ) -> FsResult<Vec<crate::fs::inode::BlockId>> {
        let mut buf = vec![0u8; BLOCK_SIZE];
        self.device.read_block(block.0, &mut buf)?;
        Ok(cast_slice::<u8, crate::fs::inode::BlockId>(&buf).to_vec())
    }

    /// Validates that `fd` is in range and currently open; returns the
    /// slot index to use with the descriptor table.
    fn valid_fd(&self, fd: i32) -> Option<usize> {
        if fd <= 0 || fd as usize >= NUM_INODES {
            return None;
        }
        let slot = fd as usize;
        self.descriptors.get(slot).filter(|d| d.is_open())?;
        Some(slot)
    }
}

#[cfg(test)]
mod tests {
    use crate::device::{FileDisk, MemoryDisk};
    use crate::fs::Filesystem;

    fn fresh() -> Filesystem<MemoryDisk> {
        Filesystem::format(MemoryDisk::init_fresh(1024, 2148)).unwrap()
    }

    #[test]
    fn fresh_write_read_scenario() {
        let mut fs = fresh();
        let fd = fs.open("a");
        assert!((1..128).contains(&fd));
        assert_eq!(fs.write(fd, b"hello"), 5);
        assert_eq!(fs.seek(fd, 0), 0);
        let mut buf = [0u8; 5];
        assert_eq!(fs.read(fd, &mut buf), 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(fs.file_size("a"), 5);
    }

    #[test]
    fn persistence_survives_a_remount() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");

        {
            let disk = FileDisk::init_fresh(&path, 1024, 2148).unwrap();
            let mut fs = Filesystem::format(disk).unwrap();
            let fd = fs.open("a");
            fs.write(fd, b"hello");
            fs.close(fd);
        }

        let disk = FileDisk::init_existing(&path, 1024, 2148).unwrap();
        let mut fs = Filesystem::mount(disk).unwrap();
        let fd = fs.open("a");
        // Reopening an existing file positions the pointer at end-of-file
        // (append semantics, §4.4); rewind before reading it back.
        assert_eq!(fs.seek(fd, 0), 0);
        let mut buf = [0u8; 5];
        assert_eq!(fs.read(fd, &mut buf), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn reopen_positions_the_pointer_at_end_of_file_for_append() {
        let mut fs = fresh();
        let fd = fs.open("a");
        fs.write(fd, b"xxx");
        fs.close(fd);

        let fd = fs.open("a");
        fs.write(fd, b"y");
        fs.close(fd);

        let fd = fs.open("a");
        fs.seek(fd, 0);
        let mut buf = [0u8; 4];
        assert_eq!(fs.read(fd, &mut buf), 4);
        assert_eq!(&buf, b"xxxy");
        assert_eq!(fs.file_size("a"), 4);
    }

    #[test]
    fn remove_reclaims_every_block_the_file_owned() {
        let mut fs = fresh();
        let fd = fs.open("a");
        let payload = vec![1u8; 10_000];
        fs.write(fd, &payload);
        fs.close(fd);

        let free_before = fs.free_blocks();
        assert_eq!(fs.remove("a"), 1);
        let reclaimed = fs.free_blocks() - free_before;
        // ceil(10000 / 1024) data blocks plus the indirect index block,
        // since 10000 bytes spans past the 12 direct pointers.
        assert_eq!(reclaimed, 10_000usize.div_ceil(1024) + 1);
        assert!(!fs.exists("a"));
    }

    #[test]
    fn duplicate_open_is_rejected_while_the_first_is_still_open() {
        let mut fs = fresh();
        let fd = fs.open("a");
        assert!(fd > 0);
        assert_eq!(fs.open("a"), -1);
        fs.close(fd);
        assert!(fs.open("a") > 0);
    }

    #[test]
    fn close_is_not_idempotent() {
        let mut fs = fresh();
        let fd = fs.open("a");
        assert_eq!(fs.close(fd), 0);
        assert_eq!(fs.close(fd), -1);
    }

    #[test]
    fn seek_past_size_is_rejected() {
        let mut fs = fresh();
        let fd = fs.open("a");
        fs.write(fd, b"hi");
        assert_eq!(fs.seek(fd, 3), -1);
        assert_eq!(fs.seek(fd, 2), 0);
    }

    #[test]
    fn format_then_mount_round_trips_an_empty_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        let disk = FileDisk::init_fresh(&path, 1024, 2148).unwrap();
        let fs = Filesystem::format(disk).unwrap();
        assert_eq!(fs.total_blocks(), 2148);
        assert_eq!(fs.free_blocks(), 2128);

        let disk = FileDisk::init_existing(&path, 1024, 2148).unwrap();
        let remounted = Filesystem::mount(disk).unwrap();
        assert_eq!(remounted.free_blocks(), 2128);
        assert!(!remounted.exists("anything"));
    }
}
