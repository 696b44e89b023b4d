//! Inode table: one fixed-size record per file slot.
//!
//! An inode's `link_cnt` flips `0 -> 1` on `open` of a new name and back to
//! `0` on `remove`; nothing else changes it. `size` is monotonically
//! non-decreasing for the life of one allocation (a free'd and reused slot
//! starts back at 0).

use bytemuck::{Pod, Zeroable};

use crate::fs::constants::NUM_DIRECT_POINTERS;

/// A block pointer stored in an inode or in an indirect index block.
///
/// `0` means "unallocated"; real data blocks always live at an absolute
/// index past the metadata regions, so `0` can never collide with one.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct BlockId(pub u32);

impl BlockId {
    pub const UNALLOCATED: Self = Self(0);

    pub const fn is_allocated(self) -> bool {
        self.0 != 0
    }
}

/// On-disk inode record.
///
/// Fixed width, `#[repr(C)]`, `Pod`: the byte image written to disk is
/// exactly this struct's memory layout with no implicit padding beyond
/// what's declared, little-endian (the host and on-disk byte order match on
/// every platform this engine targets).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Inode {
    /// `0` = unused-for-directory-purposes, `1` = in-use-as-file.
    pub mode: u32,
    /// `0` = free slot, `1` = allocated.
    pub link_cnt: u32,
    /// Size in bytes, `0 <= size <= MAX_FILE_BYTES`.
    pub size: u32,
    /// Direct block pointers; `0` = unallocated.
    pub direct: [BlockId; NUM_DIRECT_POINTERS],
    /// Block index of the single indirect index block; `0` = unallocated.
    pub indirect: BlockId,
}

impl Inode {
    pub const fn is_free(&self) -> bool {
        self.link_cnt == 0
    }

    pub const fn is_allocated(&self) -> bool {
        self.link_cnt == 1
    }

    /// Resets this slot to the free state, dropping every pointer.
    pub fn reset(&mut self) {
        *self = Inode::default();
    }

    /// Initializes this slot for a freshly-opened file: in use, empty,
    /// with no data blocks allocated yet.
    pub fn init_new_file(&mut self) {
        self.mode = 1;
        self.link_cnt = 1;
        self.size = 0;
        self.direct = [BlockId::UNALLOCATED; NUM_DIRECT_POINTERS];
        self.indirect = BlockId::UNALLOCATED;
    }

    /// Number of blocks a file of `size` bytes occupies, rounding up.
    pub fn blocks_for_size(size: u32) -> u32 {
        if size == 0 {
            return 0;
        }
        (size as u64).div_ceil(crate::fs::constants::BLOCK_SIZE as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn inode_has_no_implicit_padding_surprises() {
        // 4 (mode) + 4 (link_cnt) + 4 (size) + 12*4 (direct) + 4 (indirect)
        assert_eq!(size_of::<Inode>(), 4 + 4 + 4 + 12 * 4 + 4);
    }

    #[test]
    fn fresh_slot_is_free() {
        let inode = Inode::default();
        assert!(inode.is_free());
        assert!(!inode.is_allocated());
    }

    #[test]
    fn init_new_file_clears_pointers() {
        let mut inode = Inode::default();
        inode.direct[0] = BlockId(42);
        inode.indirect = BlockId(7);
        inode.init_new_file();
        assert!(inode.is_allocated());
        assert_eq!(inode.size, 0);
        assert!(inode.direct.iter().all(|p| !p.is_allocated()));
        assert!(!inode.indirect.is_allocated());
    }

    #[test]
    fn blocks_for_size_rounds_up() {
        assert_eq!(Inode::blocks_for_size(0), 0);
        assert_eq!(Inode::blocks_for_size(1), 1);
        assert_eq!(Inode::blocks_for_size(1024), 1);
        assert_eq!(Inode::blocks_for_size(1025), 2);
    }
}
