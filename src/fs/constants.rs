//! Compile-time constants and the derived on-disk layout.
//!
//! Single source of truth for every size used elsewhere in the engine. In
//! particular [`POINTERS_PER_INDIRECT_BLOCK`] is pinned at the exact value
//! `BLOCK_SIZE / POINTER_WIDTH` (256): the academic source this engine is
//! modeled on computed it as `BLOCK_SIZE / PTR_SIZE + 1` and then used a
//! `- 1` offset in some call sites, an off-by-one this engine does not
//! inherit (see `DESIGN.md`).

use crate::fs::inode::Inode;
use crate::fs::directory::DirectoryEntry;

/// Size in bytes of one disk block.
pub const BLOCK_SIZE: usize = 1024;

/// Total number of inode slots. Inode 0 is the root directory inode and is
/// never handed out for a user file.
pub const NUM_INODES: usize = 128;

/// Number of inode slots usable for user files.
pub const NUM_FILE_INODES: usize = NUM_INODES - 1;

/// Direct block pointers stored inside each inode.
pub const NUM_DIRECT_POINTERS: usize = 12;

/// Width in bytes of one on-disk block pointer.
pub const POINTER_WIDTH: usize = 4;

/// Usable block pointers in one indirect index block. Exactly
/// `BLOCK_SIZE / POINTER_WIDTH`; see the module docs for why this is not
/// "that, plus or minus one".
pub const POINTERS_PER_INDIRECT_BLOCK: usize = BLOCK_SIZE / POINTER_WIDTH;

/// Maximum length of a file name, including the null terminator.
pub const MAX_FILENAME: usize = 60;

/// Maximum number of data blocks addressable by a single file.
pub const MAX_BLOCKS_PER_FILE: usize = NUM_DIRECT_POINTERS + POINTERS_PER_INDIRECT_BLOCK;

/// Maximum file size in bytes.
pub const MAX_FILE_BYTES: u64 = (MAX_BLOCKS_PER_FILE * BLOCK_SIZE) as u64;

/// The filesystem identifier stamped into the superblock.
pub const MAGIC: u32 = 0xACBD_0005;

const fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

/// Fixed on-disk layout, derived from the constants above. There is exactly
/// one possible [`Layout`] for the production constants; a second one with
/// a much smaller data region is used in tests so that allocator exhaustion
/// and indirect-block crossings are cheap to exercise without inflating
/// test run time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Layout {
    pub num_inode_blocks: u32,
    pub num_dir_blocks: u32,
    pub num_data_blocks: u32,
    pub num_bitmap_blocks: u32,
    pub data_blocks_offset: u32,
    pub total_blocks: u32,
}

impl Layout {
    /// The layout implied by the production constants: block 0 holds the
    /// superblock, followed by
    /// the inode table, the directory table, the data region (scaled down
    /// from the theoretical maximum, since real filesystems never fill
    /// every inode to `MAX_FILE_BYTES`), and finally the bitmap.
    pub const fn production() -> Self {
        Self::compute(16)
    }

    /// Builds a layout with a data region scaled by `1 / data_scale_down`
    /// instead of the production `1/16`. The inode table and directory
    /// table are always sized for the fixed `NUM_INODES`/`NUM_FILE_INODES`
    /// slot counts — those arrays never shrink, only the data region does —
    /// so a larger `data_scale_down` gives a disk small enough to exhaust
    /// its bitmap quickly in tests without inflating test run time.
    pub const fn compute(data_scale_down: usize) -> Self {
        let inode_table_bytes = NUM_INODES * core::mem::size_of::<Inode>();
        let num_inode_blocks = ceil_div(inode_table_bytes, BLOCK_SIZE);

        let dir_table_bytes = NUM_FILE_INODES * core::mem::size_of::<DirectoryEntry>();
        let num_dir_blocks = ceil_div(dir_table_bytes, BLOCK_SIZE);

        let num_data_blocks = ceil_div(
            MAX_BLOCKS_PER_FILE * NUM_FILE_INODES,
            data_scale_down,
        );

        let num_bitmap_blocks = ceil_div(num_data_blocks, BLOCK_SIZE);

        let data_blocks_offset = 1 + num_inode_blocks + num_dir_blocks;
        let total_blocks = data_blocks_offset + num_data_blocks + num_bitmap_blocks;

        Self {
            num_inode_blocks: num_inode_blocks as u32,
            num_dir_blocks: num_dir_blocks as u32,
            num_data_blocks: num_data_blocks as u32,
            num_bitmap_blocks: num_bitmap_blocks as u32,
            data_blocks_offset: data_blocks_offset as u32,
            total_blocks: total_blocks as u32,
        }
    }

    pub const fn inode_table_start(&self) -> u32 {
        1
    }

    pub const fn dir_table_start(&self) -> u32 {
        1 + self.num_inode_blocks
    }

    pub const fn bitmap_start(&self) -> u32 {
        self.data_blocks_offset + self.num_data_blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_layout_matches_spec_budget() {
        let layout = Layout::production();
        assert_eq!(layout.num_inode_blocks, 8);
        assert_eq!(layout.num_dir_blocks, 8);
        assert_eq!(layout.num_data_blocks, 2128);
        assert_eq!(layout.num_bitmap_blocks, 3);
        assert_eq!(layout.data_blocks_offset, 17);
        assert_eq!(layout.total_blocks, 2148);
    }

    #[test]
    fn compute_shrinks_only_the_data_region() {
        let small = Layout::compute(1700);
        let production = Layout::production();
        assert_eq!(small.num_inode_blocks, production.num_inode_blocks);
        assert_eq!(small.num_dir_blocks, production.num_dir_blocks);
        assert_eq!(small.num_data_blocks, 21);
        assert_eq!(small.total_blocks, 39);
    }

    #[test]
    fn pointers_per_indirect_block_is_256_not_257() {
        assert_eq!(POINTERS_PER_INDIRECT_BLOCK, 256);
        assert_eq!(MAX_BLOCKS_PER_FILE, 268);
    }
}
