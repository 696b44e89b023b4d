//! The file descriptor table: in-memory only, never persisted.
//!
//! Indexed by descriptor number; descriptor `0` is reserved for the root
//! directory inode and is never handed out by `open`.

/// A single open-file handle: which inode it refers to, and the current
/// read/write pointer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FileDescriptor {
    /// `None` when this slot is free.
    pub inode: Option<usize>,
    /// Byte offset used by read, write, and seek.
    pub rwptr: u64,
}

impl FileDescriptor {
    pub const fn is_open(&self) -> bool {
        self.inode.is_some()
    }
}

/// Fixed-size table of descriptors, one slot per inode index.
#[derive(Clone, Debug)]
pub struct DescriptorTable {
    slots: Vec<FileDescriptor>,
}

impl DescriptorTable {
    /// Builds a table with `num_slots` entries, binding slot 0 to the root
    /// directory inode (index 0) and leaving every other slot free.
    pub fn new(num_slots: usize) -> Self {
        let mut slots = vec![FileDescriptor::default(); num_slots];
        slots[0] = FileDescriptor {
            inode: Some(0),
            rwptr: 0,
        };
        Self { slots }
    }

    pub fn get(&self, fd: usize) -> Option<&FileDescriptor> {
        self.slots.get(fd)
    }

    pub fn get_mut(&mut self, fd: usize) -> Option<&mut FileDescriptor> {
        self.slots.get_mut(fd)
    }

    /// Returns the first free slot index in `1..num_slots` (slot 0 is
    /// reserved), or `None` if every descriptor is in use.
    pub fn first_free(&self) -> Option<usize> {
        (1..self.slots.len()).find(|&i| !self.slots[i].is_open())
    }

    /// Returns the descriptor index currently bound to `inode`, if any.
    pub fn find_by_inode(&self, inode: usize) -> Option<usize> {
        (1..self.slots.len()).find(|&i| self.slots[i].inode == Some(inode))
    }

    /// Closes any descriptor bound to `inode`. Used by `remove`, which must
    /// not leave a dangling descriptor pointing at a freed inode.
    pub fn close_by_inode(&mut self, inode: usize) {
        if let Some(fd) = self.find_by_inode(inode) {
            self.slots[fd] = FileDescriptor::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_zero_is_bound_to_root_on_construction() {
        let table = DescriptorTable::new(8);
        assert_eq!(table.get(0).unwrap().inode, Some(0));
        assert!(table.first_free().unwrap() >= 1);
    }

    #[test]
    fn close_by_inode_frees_the_matching_slot_only() {
        let mut table = DescriptorTable::new(8);
        let fd = table.first_free().unwrap();
        table.get_mut(fd).unwrap().inode = Some(5);
        table.close_by_inode(5);
        assert!(!table.get(fd).unwrap().is_open());
        assert!(table.get(0).unwrap().is_open());
    }
}
