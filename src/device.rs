//! Standard API to interact with block storage devices, regardless of
//! whether they are backed by a real file or held entirely in memory.
//!
//! The engine (`crate::fs`) never does sub-block I/O except by reading a
//! whole block and merging it in memory (read-modify-write); every method
//! here operates on whole blocks.

use crate::error::DeviceError;

/// Standard methods through which the engine interacts with a disk,
/// regardless of the backing technology.
///
/// Mirrors the disk emulator contract: fresh vs. existing initialization,
/// and whole-block reads/writes.
pub trait BlockDevice {
    /// Total number of addressable blocks on this device.
    fn num_blocks(&self) -> u32;

    /// Size in bytes of a single block.
    fn block_size(&self) -> usize;

    /// Reads `count` whole blocks starting at `start_block` into `buffer`.
    ///
    /// `buffer` must be at least `count * block_size()` bytes long.
    fn read_blocks(
        &mut self,
        start_block: u32,
        count: u32,
        buffer: &mut [u8],
    ) -> Result<(), DeviceError>;

    /// Writes `count` whole blocks starting at `start_block` from `buffer`.
    ///
    /// `buffer` must be at least `count * block_size()` bytes long.
    fn write_blocks(
        &mut self,
        start_block: u32,
        count: u32,
        buffer: &[u8],
    ) -> Result<(), DeviceError>;

    /// Reads exactly one block.
    fn read_block(&mut self, block: u32, buffer: &mut [u8]) -> Result<(), DeviceError> {
        self.read_blocks(block, 1, buffer)
    }

    /// Writes exactly one block.
    fn write_block(&mut self, block: u32, buffer: &[u8]) -> Result<(), DeviceError> {
        self.write_blocks(block, 1, buffer)
    }

    fn check_bounds(&self, start_block: u32, count: u32) -> Result<(), DeviceError> {
        let end = u64::from(start_block) + u64::from(count);
        if count == 0 || end > u64::from(self.num_blocks()) {
            return Err(DeviceError::OutOfBounds);
        }
        Ok(())
    }
}

/// A disk emulator that keeps its entire backing store in a `Vec<u8>`.
///
/// Useful for tests: it has no filesystem fixtures to clean up and its
/// contents can be inspected directly.
pub struct MemoryDisk {
    block_size: usize,
    num_blocks: u32,
    storage: Vec<u8>,
}

impl MemoryDisk {
    /// Creates a fresh, zeroed in-memory disk of `num_blocks` blocks of
    /// `block_size` bytes each.
    pub fn init_fresh(block_size: usize, num_blocks: u32) -> Self {
        Self {
            block_size,
            num_blocks,
            storage: vec![0u8; block_size * num_blocks as usize],
        }
    }
}

impl BlockDevice for MemoryDisk {
    fn num_blocks(&self) -> u32 {
        self.num_blocks
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_blocks(
        &mut self,
        start_block: u32,
        count: u32,
        buffer: &mut [u8],
    ) -> Result<(), DeviceError> {
        self.check_bounds(start_block, count)?;
        let want = count as usize * self.block_size;
        if buffer.len() < want {
            return Err(DeviceError::BadBufferLen);
        }
        let offset = start_block as usize * self.block_size;
        buffer[..want].copy_from_slice(&self.storage[offset..offset + want]);
        Ok(())
    }

    fn write_blocks(
        &mut self,
        start_block: u32,
        count: u32,
        buffer: &[u8],
    ) -> Result<(), DeviceError> {
        self.check_bounds(start_block, count)?;
        let want = count as usize * self.block_size;
        if buffer.len() < want {
            return Err(DeviceError::BadBufferLen);
        }
        let offset = start_block as usize * self.block_size;
        self.storage[offset..offset + want].copy_from_slice(&buffer[..want]);
        Ok(())
    }
}

/// A disk emulator backed by a regular file on the host filesystem.
///
/// `init_fresh` truncates and preallocates the backing file; `init_existing`
/// attaches to a file created by a previous `init_fresh` call, so the
/// filesystem built on top of it can remount across process restarts.
pub struct FileDisk {
    block_size: usize,
    num_blocks: u32,
    file: std::fs::File,
}

impl FileDisk {
    /// Creates a fresh backing file at `path`, zeroed to
    /// `block_size * num_blocks` bytes, truncating any previous contents.
    pub fn init_fresh(path: &std::path::Path, block_size: usize, num_blocks: u32) -> Result<Self, DeviceError> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len((block_size * num_blocks as usize) as u64)?;
        Ok(Self {
            block_size,
            num_blocks,
            file,
        })
    }

    /// Attaches to a backing file previously created by [`Self::init_fresh`].
    pub fn init_existing(
        path: &std::path::Path,
        block_size: usize,
        num_blocks: u32,
    ) -> Result<Self, DeviceError> {
        let file = std::fs::OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            block_size,
            num_blocks,
            file,
        })
    }
}

impl BlockDevice for FileDisk {
    fn num_blocks(&self) -> u32 {
        self.num_blocks
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_blocks(
        &mut self,
        start_block: u32,
        count: u32,
        buffer: &mut [u8],
    ) -> Result<(), DeviceError> {
        use std::io::{Read, Seek, SeekFrom};

        self.check_bounds(start_block, count)?;
        let want = count as usize * self.block_size;
        if buffer.len() < want {
            return Err(DeviceError::BadBufferLen);
        }
        let offset = start_block as u64 * self.block_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buffer[..want])?;
        Ok(())
    }

    fn write_blocks(
        &mut self,
        start_block: u32,
        count: u32,
        buffer: &[u8],
    ) -> Result<(), DeviceError> {
        use std::io::{Seek, SeekFrom, Write};

        self.check_bounds(start_block, count)?;
        let want = count as usize * self.block_size;
        if buffer.len() < want {
            return Err(DeviceError::BadBufferLen);
        }
        let offset = start_block as u64 * self.block_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&buffer[..want])?;
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_disk_round_trips_a_block() {
        let mut disk = MemoryDisk::init_fresh(512, 4);
        let mut data = vec![0xAB; 512];
        disk.write_block(2, &data).unwrap();
        data.fill(0);
        disk.read_block(2, &mut data).unwrap();
        assert!(data.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn memory_disk_rejects_out_of_bounds_access() {
        let mut disk = MemoryDisk::init_fresh(512, 4);
        let mut data = vec![0u8; 512];
        assert!(matches!(
            disk.read_block(4, &mut data),
            Err(DeviceError::OutOfBounds)
        ));
    }

    #[test]
    fn file_disk_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");

        {
            let mut disk = FileDisk::init_fresh(&path, 512, 4).unwrap();
            disk.write_block(1, &[0x42; 512]).unwrap();
        }

        let mut disk = FileDisk::init_existing(&path, 512, 4).unwrap();
        let mut buf = vec![0u8; 512];
        disk.read_block(1, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0x42));
    }
}
