use super::{DiskAddr, U16Le};
use crate::FILE_DATA_PER_PART;

/// One block of a file chain: valid-byte count, payload, continuation.
///
/// The continuation sits at the same byte offset as in a directory part,
/// so chain deletion can walk either kind through this view.
#[repr(C)]
pub struct FilePart {
    size: U16Le,
    pub data: [u8; FILE_DATA_PER_PART],
    pub next: DiskAddr,
}

impl FilePart {
    pub const EMPTY: Self = Self {
        size: U16Le::ZERO,
        data: [0; FILE_DATA_PER_PART],
        next: DiskAddr::EMPTY,
    };

    /// Valid payload bytes, `0..=506`. Less than the maximum only in the
    /// final part of a chain.
    pub fn len(&self) -> usize {
        usize::from(self.size.get())
    }

    pub fn set_len(&mut self, len: usize) {
        debug_assert!(len <= FILE_DATA_PER_PART);
        self.size.set(len as u16);
    }
}
