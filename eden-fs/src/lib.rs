//! # EdenFS
//!
//! A disk-resident filesystem over any [`BlockDevice`]: directories and
//! file contents are chains of 512-byte "parts", free space is tracked by
//! a multi-level bitmap, and all device traffic goes through a write-back
//! block cache.
//!
//! The crate is `no_std + alloc`; hosts plug in a device driver and mount
//! with [`EdenFileSystem::mount`] or create a fresh volume with
//! [`EdenFileSystem::format`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod block_cache;
mod chain;
mod efs;
mod error;
mod layout;
mod path;
mod vfs;

pub use block_dev::BlockDevice;

pub use self::efs::EdenFileSystem;
pub use self::error::{Error, Result};
pub use self::layout::EntryKind;
pub use self::vfs::{File, OpenMode};

/// Size of one device block in bytes.
pub const BLOCK_SIZE: usize = 512;
/// Bits covered by one bitmap block.
pub const BLOCK_BITS: usize = BLOCK_SIZE * 8;
/// Maximum stored length of a path component.
pub const NAME_LEN: usize = 11;
/// Directory entry slots in one directory part.
pub const DIR_ENTRIES_PER_PART: usize = 31;
/// Payload bytes in one file part.
pub const FILE_DATA_PER_PART: usize = 506;

/// Volume signature kept in the boot block.
pub const SIGNATURE: [u8; 9] = *b"EDENFS100";

type DataBlock = [u8; BLOCK_SIZE];

#[cfg(test)]
pub(crate) mod test_util {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use alloc::sync::Arc;
    use alloc::vec;
    use alloc::vec::Vec;
    use block_dev::{BlockDevice, DeviceError};

    use crate::BLOCK_SIZE;

    /// In-memory block device backing the unit tests.
    pub struct MemDisk(Mutex<Vec<u8>>);

    impl MemDisk {
        pub fn new(blocks: usize) -> Arc<Self> {
            Arc::new(Self(Mutex::new(vec![0; blocks * BLOCK_SIZE])))
        }
    }

    /// In-memory device whose transfers can be switched to failing, for
    /// exercising error propagation out of mid-operation device faults.
    pub struct FaultyDisk {
        disk: MemDisk,
        broken: AtomicBool,
    }

    impl FaultyDisk {
        pub fn new(blocks: usize) -> Arc<Self> {
            Arc::new(Self {
                disk: MemDisk(Mutex::new(vec![0; blocks * BLOCK_SIZE])),
                broken: AtomicBool::new(false),
            })
        }

        /// Every transfer from now on reports [`DeviceError`].
        pub fn fail_transfers(&self) {
            self.broken.store(true, Ordering::SeqCst);
        }
    }

    impl BlockDevice for FaultyDisk {
        fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(DeviceError);
            }
            self.disk.read_block(block_id, buf)
        }

        fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(DeviceError);
            }
            self.disk.write_block(block_id, buf)
        }
    }

    impl BlockDevice for MemDisk {
        fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
            let data = self.0.lock().map_err(|_| DeviceError)?;
            let start = block_id * BLOCK_SIZE;
            let block = data.get(start..start + BLOCK_SIZE).ok_or(DeviceError)?;
            buf.copy_from_slice(block);
            Ok(())
        }

        fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
            let mut data = self.0.lock().map_err(|_| DeviceError)?;
            let start = block_id * BLOCK_SIZE;
            let block = data
                .get_mut(start..start + BLOCK_SIZE)
                .ok_or(DeviceError)?;
            block.copy_from_slice(buf);
            Ok(())
        }
    }
}
