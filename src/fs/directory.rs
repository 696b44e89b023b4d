//! The root directory table: a fixed-size array of name/flag records.
//!
//! Directory entry `i` (0-indexed) is permanently bound to inode `i + 1`;
//! there is no separate allocation step for directory slots, which is why
//! `RootDirectoryTable` has no "allocate a slot" method of its own — the
//! slot to use is always `inode_index - 1`.

use bytemuck::{Pod, Zeroable};

use crate::fs::constants::MAX_FILENAME;

/// On-disk directory entry.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct DirectoryEntry {
    /// Null-terminated name, zero-padded to [`MAX_FILENAME`] bytes.
    pub name: [u8; MAX_FILENAME],
    /// Mirrors the owning inode's in-use flag: `1` = active, `0` = free.
    pub mode: u32,
}

impl Default for DirectoryEntry {
    fn default() -> Self {
        Self {
            name: [0u8; MAX_FILENAME],
            mode: 0,
        }
    }
}

impl std::fmt::Debug for DirectoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryEntry")
            .field("name", &self.name_str())
            .field("mode", &self.mode)
            .finish()
    }
}

impl DirectoryEntry {
    pub const fn is_active(&self) -> bool {
        self.mode == 1
    }

    /// Returns this entry's name, stopping at the first null byte.
    pub fn name_str(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        std::str::from_utf8(&self.name[..len]).unwrap_or("")
    }

    /// Binds this entry to `name`, marking it active.
    ///
    /// `name` must be at most `MAX_FILENAME - 1` bytes (room for the null
    /// terminator); the caller is expected to have validated this already.
    pub fn bind(&mut self, name: &str) {
        self.name = [0u8; MAX_FILENAME];
        let bytes = name.as_bytes();
        self.name[..bytes.len()].copy_from_slice(bytes);
        self.mode = 1;
    }

    /// Clears the name and marks this entry free.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Stateful iterator over active directory entries, as specified by the
/// directory enumeration component: it walks the table in order, skipping
/// inactive slots, and wraps back to the start once it reaches the end.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectoryCursor {
    next_index: usize,
}

impl DirectoryCursor {
    /// Returns the name of the next active entry, advancing the cursor, or
    /// `None` if the table has been fully walked (in which case the cursor
    /// resets to the start for the next call).
    pub fn next_name(&mut self, table: &[DirectoryEntry]) -> Option<String> {
        while self.next_index < table.len() {
            let entry = &table[self.next_index];
            self.next_index += 1;
            if entry.is_active() {
                return Some(entry.name_str().to_string());
            }
        }
        self.next_index = 0;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_then_clear_round_trips() {
        let mut entry = DirectoryEntry::default();
        assert!(!entry.is_active());
        entry.bind("hello.txt");
        assert!(entry.is_active());
        assert_eq!(entry.name_str(), "hello.txt");
        entry.clear();
        assert!(!entry.is_active());
        assert_eq!(entry.name_str(), "");
    }

    #[test]
    fn cursor_skips_inactive_and_wraps() {
        let mut table = vec![DirectoryEntry::default(); 4];
        table[1].bind("a");
        table[3].bind("b");

        let mut cursor = DirectoryCursor::default();
        assert_eq!(cursor.next_name(&table).as_deref(), Some("a"));
        assert_eq!(cursor.next_name(&table).as_deref(), Some("b"));
        assert_eq!(cursor.next_name(&table), None);
        // Wrapped: walking again from the start produces the same sequence.
        assert_eq!(cursor.next_name(&table).as_deref(), Some("a"));
    }
}
