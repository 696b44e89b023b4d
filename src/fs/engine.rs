//! The read/write engine: THE CORE of this crate.
//!
//! Translates a file-relative byte range into a sequence of block
//! identifiers through the hybrid direct+single-indirect pointer scheme,
//! allocating new blocks from the free-space bitmap on demand (including
//! lazy allocation of the indirect index block), merging partial-block
//! updates with on-disk contents via read-modify-write, and persisting all
//! modified metadata before returning.

use bytemuck::cast_slice_mut;

use crate::device::BlockDevice;
use crate::fs::constants::{BLOCK_SIZE, MAX_BLOCKS_PER_FILE, MAX_FILE_BYTES, NUM_DIRECT_POINTERS};
use crate::fs::inode::BlockId;
use crate::fs::Filesystem;
use crate::error;

impl<D: BlockDevice> Filesystem<D> {
    /// Reads up to `buf.len()` bytes from `fd` at its current read/write
    /// pointer, advancing it by the number of bytes actually read.
    ///
    /// Returns `0` if `fd` is not open, `buf` is empty, or the pointer is
    /// already at or past end-of-file. A short read (fewer bytes than
    /// requested, but more than zero) means the effective length reached
    /// end-of-file, or — on a corrupted disk only, since the no-hole
    /// invariant rules this out in normal operation — a sparse hole was
    /// encountered.
    pub fn read(&mut self, fd: i32, buf: &mut [u8]) -> i32 {
        let length = buf.len();
        if length == 0 {
            return 0;
        }
        let Some(slot) = self.valid_fd(fd) else {
            return 0;
        };
        let inode_idx = self.descriptors.get(slot).unwrap().inode.unwrap();
        let rwptr0 = self.descriptors.get(slot).unwrap().rwptr;
        let size = u64::from(self.inodes[inode_idx].size);
        if rwptr0 >= size {
            return 0;
        }

        let effective_len = std::cmp::min(length as u64, size - rwptr0) as usize;
        let mut rwptr = rwptr0;
        let mut remaining = effective_len;
        let mut out_off = 0usize;
        let mut indirect_buf: Option<Vec<BlockId>> = None;

        while remaining > 0 {
            let b = (rwptr / BLOCK_SIZE as u64) as usize;
            let block = match self.block_for_read(inode_idx, b, &mut indirect_buf) {
                Some(block) => block,
                None => break,
            };

            let block_offset = (rwptr % BLOCK_SIZE as u64) as usize;
            let chunk = std::cmp::min(BLOCK_SIZE - block_offset, remaining);

            let mut tmp = vec![0u8; BLOCK_SIZE];
            if self.device.read_block(block.0, &mut tmp).is_err() {
                break;
            }
            buf[out_off..out_off + chunk].copy_from_slice(&tmp[block_offset..block_offset + chunk]);

            rwptr += chunk as u64;
            remaining -= chunk;
            out_off += chunk;
        }

        self.descriptors.get_mut(slot).unwrap().rwptr = rwptr;
        out_off as i32
    }

    /// Writes `buf` to `fd` at its current read/write pointer, allocating
    /// data blocks (and, lazily, the indirect index block) as needed,
    /// advancing the pointer and growing the file's size monotonically.
    ///
    /// Returns the number of bytes actually written, which may be fewer
    /// than `buf.len()` if the filesystem ran out of free blocks or
    /// inodes — a capacity signal, not an error. Returns `0` if `fd` is not
    /// open, `buf` is empty, or the write would start past end-of-file or
    /// past `MAX_FILE_BYTES`.
    pub fn write(&mut self, fd: i32, buf: &[u8]) -> i32 {
        let length = buf.len();
        if length == 0 {
            return 0;
        }
        let Some(slot) = self.valid_fd(fd) else {
            return 0;
        };
        let inode_idx = self.descriptors.get(slot).unwrap().inode.unwrap();
        let rwptr0 = self.descriptors.get(slot).unwrap().rwptr;
        let size0 = u64::from(self.inodes[inode_idx].size);
        if rwptr0 > size0 || rwptr0 >= MAX_FILE_BYTES {
            return 0;
        }

        let mut rwptr = rwptr0;
        let mut remaining = length;
        let mut in_off = 0usize;
        let mut indirect_buf: Option<Vec<BlockId>> = None;
        let mut indirect_dirty = false;

        while remaining > 0 {
            let b = (rwptr / BLOCK_SIZE as u64) as usize;
            if b >= MAX_BLOCKS_PER_FILE {
                break;
            }

            let block =
                match self.locate_or_allocate_block(inode_idx, b, &mut indirect_buf, &mut indirect_dirty) {
                    Some(block) => block,
                    None => break,
                };

            let block_offset = (rwptr % BLOCK_SIZE as u64) as usize;
            let chunk = std::cmp::min(BLOCK_SIZE - block_offset, remaining);

            let mut tmp = vec![0u8; BLOCK_SIZE];
            if self.device.read_block(block.0, &mut tmp).is_err() {
                break;
            }
            tmp[block_offset..block_offset + chunk].copy_from_slice(&buf[in_off..in_off + chunk]);
            if self.device.write_block(block.0, &tmp).is_err() {
                break;
            }

            rwptr += chunk as u64;
            remaining -= chunk;
            in_off += chunk;
        }

        if in_off > 0 {
            self.inodes[inode_idx].size = std::cmp::max(size0, rwptr) as u32;
            self.descriptors.get_mut(slot).unwrap().rwptr = rwptr;

            if indirect_dirty {
                if let Some(slots) = &indirect_buf {
                    let indirect_block = self.inodes[inode_idx].indirect;
                    let mut raw = vec![0u8; BLOCK_SIZE];
                    cast_slice_mut::<u8, BlockId>(&mut raw).copy_from_slice(slots);
                    let _ = self.device.write_block(indirect_block.0, &raw);
                }
            }

            let _ = self.persist_inode_table();
            let _ = self.persist_bitmap();
        }

        in_off as i32
    }

    /// Block lookup for the read path: never allocates. Returns `None` on
    /// a hole (an unallocated direct slot, or no indirect block at all, or
    /// an unallocated slot inside it). A hole cannot occur for any `b`
    /// within `[0, size)` as long as every prior write went through
    /// `locate_or_allocate_block`, barring disk corruption.
    fn block_for_read(
        &mut self,
        inode_idx: usize,
        b: usize,
        indirect_buf: &mut Option<Vec<BlockId>>,
    ) -> Option<BlockId> {
        if b < NUM_DIRECT_POINTERS {
            let ptr = self.inodes[inode_idx].direct[b];
            return ptr.is_allocated().then_some(ptr);
        }

        let indirect = self.inodes[inode_idx].indirect;
        if !indirect.is_allocated() {
            return None;
        }
        if indirect_buf.is_none() {
            *indirect_buf = self.read_indirect_block(indirect).ok();
        }
        let slots = indirect_buf.as_ref()?;
        let ptr = slots[b - NUM_DIRECT_POINTERS];
        ptr.is_allocated().then_some(ptr)
    }

    /// Block lookup for the write path: allocates on demand, including the
    /// indirect index block itself on first need. Returns `None` when
    /// allocation failed (bitmap exhausted) — the caller short-returns.
    fn locate_or_allocate_block(
        &mut self,
        inode_idx: usize,
        b: usize,
        indirect_buf: &mut Option<Vec<BlockId>>,
        indirect_dirty: &mut bool,
    ) -> Option<BlockId> {
        if b < NUM_DIRECT_POINTERS {
            let ptr = self.inodes[inode_idx].direct[b];
            if ptr.is_allocated() {
                return Some(ptr);
            }
            let block = self.allocate_data_block()?;
            self.inodes[inode_idx].direct[b] = block;
            return Some(block);
        }

        if !self.inodes[inode_idx].indirect.is_allocated() {
            let block = self.allocate_data_block()?;
            self.inodes[inode_idx].indirect = block;
            *indirect_buf = Some(vec![BlockId::UNALLOCATED; crate::fs::constants::POINTERS_PER_INDIRECT_BLOCK]);
        }

        if indirect_buf.is_none() {
            *indirect_buf = Some(
                self.read_indirect_block(self.inodes[inode_idx].indirect)
                    .unwrap_or_else(|_| {
                        vec![BlockId::UNALLOCATED; crate::fs::constants::POINTERS_PER_INDIRECT_BLOCK]
                    }),
            );
        }

        let slot_index = b - NUM_DIRECT_POINTERS;
        let slots = indirect_buf.as_mut().unwrap();
        if slots[slot_index].is_allocated() {
            return Some(slots[slot_index]);
        }

        let block = self.allocate_data_block()?;
        slots[slot_index] = block;
        *indirect_dirty = true;
        Some(block)
    }

    /// Allocates one data block from the free-space bitmap, first-fit.
    /// Returns `None` (and logs a diagnostic) if the bitmap is exhausted.
    fn allocate_data_block(&mut self) -> Option<BlockId> {
        match self.bitmap.allocate() {
            Some(slot) => Some(BlockId(self.layout.data_blocks_offset + slot as u32)),
            None => {
                error!("alloc", "bitmap exhausted, short-returning");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::device::MemoryDisk;
    use crate::fs::constants::Layout;
    use crate::fs::Filesystem;

    /// A layout whose data region holds only 21 blocks instead of the
    /// production 2128, so exhausting the bitmap or crossing into the
    /// indirect block doesn't require writing gigabytes of filler.
    fn small_layout_fs() -> Filesystem<MemoryDisk> {
        let layout = Layout::compute(1700);
        Filesystem::format_with_layout(MemoryDisk::init_fresh(1024, layout.total_blocks), layout).unwrap()
    }

    #[test]
    fn write_exactly_one_block_allocates_one_block() {
        let mut fs = Filesystem::format(MemoryDisk::init_fresh(1024, 2148)).unwrap();
        let fd = fs.open("a");
        assert!(fd > 0);
        let data = vec![7u8; 1024];
        assert_eq!(fs.write(fd, &data), 1024);
        assert_eq!(fs.file_size("a"), 1024);
    }

    #[test]
    fn write_past_one_block_allocates_two_blocks() {
        let mut fs = Filesystem::format(MemoryDisk::init_fresh(1024, 2148)).unwrap();
        let fd = fs.open("a");
        let data = vec![7u8; 1025];
        assert_eq!(fs.write(fd, &data), 1025);
        assert_eq!(fs.file_size("a"), 1025);
    }

    #[test]
    fn round_trip_hello() {
        let mut fs = Filesystem::format(MemoryDisk::init_fresh(1024, 2148)).unwrap();
        let fd = fs.open("a");
        assert_eq!(fs.write(fd, b"hello"), 5);
        assert_eq!(fs.seek(fd, 0), 0);
        let mut out = [0u8; 5];
        assert_eq!(fs.read(fd, &mut out), 5);
        assert_eq!(&out, b"hello");
        assert_eq!(fs.file_size("a"), 5);
    }

    #[test]
    fn crossing_into_indirect_block_uses_slot_zero() {
        let mut fs = small_layout_fs();
        let fd = fs.open("a");
        let payload: Vec<u8> = (0..13 * 1024).map(|i| (i % 251) as u8).collect();
        assert_eq!(fs.write(fd, &payload), payload.len() as i32);
        assert_eq!(fs.file_size("a"), payload.len() as i64);

        fs.seek(fd, 0);
        let mut out = vec![0u8; payload.len()];
        assert_eq!(fs.read(fd, &mut out), payload.len() as i32);
        assert_eq!(out, payload);
    }

    #[test]
    fn partial_trailing_block_is_read_modify_written() {
        let mut fs = Filesystem::format(MemoryDisk::init_fresh(1024, 2148)).unwrap();
        let fd = fs.open("a");
        fs.write(fd, &[1u8; 100]);
        fs.seek(fd, 0);
        fs.write(fd, &[2u8; 50]);
        fs.seek(fd, 0);
        let mut out = [0u8; 100];
        fs.read(fd, &mut out);
        assert!(out[..50].iter().all(|&b| b == 2));
        assert!(out[50..].iter().all(|&b| b == 1));
    }

    #[test]
    fn write_short_returns_when_blocks_are_exhausted() {
        let mut fs = small_layout_fs();
        let fd = fs.open("a");

        // The 21-block data region holds 20 data blocks plus the one
        // indirect index block a file past 12 direct pointers needs;
        // writing exactly that many bytes drains it via real writes.
        let data_blocks = (fs.free_blocks() - 1) as usize;
        let payload = vec![9u8; data_blocks * 1024];
        assert_eq!(fs.write(fd, &payload), payload.len() as i32);
        assert_eq!(fs.free_blocks(), 0);

        assert_eq!(fs.write(fd, &[9u8; 10]), 0);
    }
}
