//! Error types shared across the engine.
//!
//! Every subsystem (the block device, the engine itself) defines its own
//! error enum implementing [`std::error::Error`]. `FsResult` is the common
//! return type used internally; the public [`crate::fs::Filesystem`] methods
//! flatten these into the integer sentinels their callers expect.

use std::fmt;
use std::io;

/// Errors raised by a [`crate::device::BlockDevice`] implementation.
#[derive(Debug)]
pub enum DeviceError {
    /// The requested block range falls outside the device's bounds.
    OutOfBounds,

    /// The buffer passed to a read or write did not match the requested
    /// byte count.
    BadBufferLen,

    /// The underlying storage (file, memory region) could not be read from
    /// or written to.
    Io(io::Error),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "block index out of bounds"),
            Self::BadBufferLen => write!(f, "buffer length does not match requested block count"),
            Self::Io(e) => write!(f, "disk I/O error: {e}"),
        }
    }
}

impl std::error::Error for DeviceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for DeviceError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Errors raised while translating a call into block-device operations.
///
/// These never cross the public API, which maps every failure mode onto an
/// integer sentinel instead, but they are useful internally to distinguish
/// "this call's preconditions were not met" from "the disk itself
/// misbehaved", and they carry enough context for tests and for the
/// diagnostic logging the allocator does on exhaustion.
#[derive(Debug)]
pub enum FsError {
    /// A precondition for the call was not satisfied (bad descriptor, name
    /// too long, seek past EOF, and so on).
    InvalidArgument,

    /// No free inode or descriptor slot remained.
    Exhausted,

    /// The disk layer itself failed. This is never retried or caught here:
    /// in-memory and on-disk state may now diverge, and recovery requires a
    /// remount.
    Device(DeviceError),
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument or precondition not met"),
            Self::Exhausted => write!(f, "no free inode, descriptor, or data block available"),
            Self::Device(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for FsError {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}

/// Internal result type used throughout the engine before flattening to a
/// legacy integer sentinel at the public API boundary.
pub type FsResult<T> = Result<T, FsError>;
