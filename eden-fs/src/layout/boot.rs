use super::{U16Le, U32Le};
use crate::SIGNATURE;

const BOOT_CODE_LEN: usize = 488;
const BOOT_SIGN: u16 = 0xAA55;

/// Block 0 of a volume: boot code plus the filesystem superblock fields.
///
/// The boot code area is opaque and preserved by formatting.
#[repr(C)]
pub struct BootBlock {
    boot_code: [u8; BOOT_CODE_LEN],
    block_count: U32Le,
    signature: [u8; SIGNATURE.len()],
    levels: u8,
    root_part: U32Le,
    first_bitmap: U32Le,
    boot_sign: U16Le,
}

impl BootBlock {
    pub fn is_valid(&self) -> bool {
        self.signature == SIGNATURE
    }

    pub fn block_count(&self) -> u32 {
        self.block_count.get()
    }

    /// Bitmap tree depth.
    pub fn levels(&self) -> u8 {
        self.levels
    }

    /// LBA of the root directory's chain head.
    pub fn root_part(&self) -> u32 {
        self.root_part.get()
    }

    /// LBA of the first (coarsest) bitmap block.
    pub fn first_bitmap(&self) -> u32 {
        self.first_bitmap.get()
    }

    /// Fill in the superblock fields, leaving the boot code untouched.
    pub fn init(&mut self, block_count: u32, levels: u8, root_part: u32, first_bitmap: u32) {
        self.block_count.set(block_count);
        self.signature = SIGNATURE;
        self.levels = levels;
        self.root_part.set(root_part);
        self.first_bitmap.set(first_bitmap);
        self.boot_sign.set(BOOT_SIGN);
    }
}
