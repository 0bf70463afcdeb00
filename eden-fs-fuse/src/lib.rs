//! Host-side plumbing for EdenFS images: a file-backed block device.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use block_dev::{BlockDevice, DeviceError};
use eden_fs::BLOCK_SIZE;

/// A host file acting as the block device behind an EdenFS image.
pub struct BlockFile(Mutex<File>);

impl BlockFile {
    pub fn new(fd: File) -> Self {
        Self(Mutex::new(fd))
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        let mut file = self.0.lock().map_err(|_| DeviceError)?;
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .map_err(|_| DeviceError)?;
        file.read_exact(buf).map_err(|_| DeviceError)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        let mut file = self.0.lock().map_err(|_| DeviceError)?;
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .map_err(|_| DeviceError)?;
        file.write_all(buf).map_err(|_| DeviceError)
    }
}
