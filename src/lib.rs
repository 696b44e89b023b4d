//! On-disk file system engine of a mountable, single-root-directory
//! filesystem built atop a block-addressable disk emulator.
//!
//! The hard part lives in [`fs::engine`]: translating a file-relative byte
//! range into a sequence of block identifiers through a hybrid
//! direct+single-indirect pointer scheme, allocating new blocks from a
//! free-space bitmap on demand, and persisting every mutation synchronously
//! so the filesystem survives a crash between calls.
//!
//! Out of scope: any kernel-level VFS glue, journaling / crash-atomic
//! transactions, caching beyond the mandatory in-memory metadata tables,
//! multi-directory hierarchy, permissions, timestamps, links, and
//! concurrent multi-process access.

pub mod device;
pub mod error;
pub mod fs;
pub mod log;
