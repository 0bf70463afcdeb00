//! Block device abstraction shared by the filesystem and its hosts.

#![no_std]

use core::any::Any;
use core::fmt;

/// A transfer failure reported by the underlying driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceError;

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("block device transfer failed")
    }
}

pub type Result<T> = core::result::Result<T, DeviceError>;

/// A storage medium addressed in whole 512-byte blocks.
pub trait BlockDevice: Send + Sync + Any {
    /// Read the block `block_id` into `buf`.
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<()>;

    /// Write `buf` over the block `block_id`.
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<()>;
}
