//! On-disk data structures.
//!
//! A volume is laid out as: boot block | bitmap levels, coarsest first |
//! everything else, allocated on demand as 512-byte chained parts.

mod bitmap;
mod boot;
mod dir_part;
mod file_part;

pub use self::bitmap::BitmapTree;
pub use self::boot::BootBlock;
pub use self::dir_part::{DirEntry, DirPart, DiskAddr, EntryFlag, EntryKind};
pub use self::file_part::FilePart;

/// Little-endian `u16` stored as bytes, keeping on-disk structures
/// alignment-1 so they can be overlaid on a raw block buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct U16Le([u8; 2]);

impl U16Le {
    pub const ZERO: Self = Self([0; 2]);

    pub fn get(self) -> u16 {
        u16::from_le_bytes(self.0)
    }

    pub fn set(&mut self, value: u16) {
        self.0 = value.to_le_bytes();
    }
}

/// Little-endian `u32` stored as bytes; see [`U16Le`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct U32Le([u8; 4]);

impl U32Le {
    pub fn get(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    pub fn set(&mut self, value: u32) {
        self.0 = value.to_le_bytes();
    }
}

#[cfg(test)]
mod tests {
    use core::mem;

    use super::*;
    use crate::BLOCK_SIZE;

    #[test]
    fn on_disk_sizes() {
        assert_eq!(16, mem::size_of::<DirEntry>());
        assert_eq!(BLOCK_SIZE, mem::size_of::<DirPart>());
        assert_eq!(BLOCK_SIZE, mem::size_of::<FilePart>());
        assert_eq!(BLOCK_SIZE, mem::size_of::<BootBlock>());
    }

    #[test]
    fn on_disk_alignment() {
        assert_eq!(1, mem::align_of::<DirPart>());
        assert_eq!(1, mem::align_of::<FilePart>());
        assert_eq!(1, mem::align_of::<BootBlock>());
    }
}
