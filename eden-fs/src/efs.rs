//! Mounting, formatting and block allocation.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use spin::Mutex;

use crate::block_cache::{BlockCache, BlockCacheManager};
use crate::layout::{BitmapTree, BootBlock, DirPart};
use crate::{DataBlock, Error, Result, BLOCK_BITS, BLOCK_SIZE};

/// A mounted EdenFS volume.
///
/// All mount state lives here, so several images can be open in one
/// process. Operations take `&mut self`; callers serialize access.
pub struct EdenFileSystem {
    pub(crate) cache: BlockCacheManager,
    bitmap: BitmapTree,
    root_lba: u32,
    block_count: u32,
}

impl EdenFileSystem {
    /// Mount an already formatted device.
    ///
    /// Rejects anything whose boot block lacks the EdenFS signature.
    pub fn mount(device: Arc<dyn BlockDevice>) -> Result<Self> {
        let mut cache = BlockCacheManager::new(device);

        let (block_count, levels, root_lba, first_bitmap) = cache
            .get(0)?
            .lock()
            .map(0, |boot: &BootBlock| {
                boot.is_valid().then(|| {
                    (
                        boot.block_count(),
                        boot.levels(),
                        boot.root_part(),
                        boot.first_bitmap(),
                    )
                })
            })
            .ok_or(Error::BadSignature)?;

        log::debug!(
            "mount: {block_count} blocks, {levels} bitmap levels, root part at {root_lba}"
        );

        Ok(Self {
            cache,
            bitmap: BitmapTree::new(block_count, levels, first_bitmap),
            root_lba,
            block_count,
        })
    }

    /// Format `total_blocks` blocks of `device` as an empty volume and
    /// mount it.
    ///
    /// The bitmap tree starts at LBA 1. Its deepest level is prefilled
    /// with the reserved prefix (boot block + bitmaps) and with every bit
    /// past the device end, so those blocks can never be handed out; the
    /// root directory part is then claimed through the allocator itself.
    pub fn format(device: Arc<dyn BlockDevice>, total_blocks: u32) -> Result<Self> {
        let levels = BitmapTree::depth_for(total_blocks);
        let first_bitmap = 1u32;
        let bitmap = BitmapTree::new(total_blocks, levels, first_bitmap);
        let reserved = first_bitmap + bitmap.total_blocks();

        let sizes = bitmap.level_sizes();
        let depth = sizes.len();
        let mut level_bits: Vec<Vec<u8>> = sizes
            .iter()
            .map(|&blocks| vec![0u8; blocks as usize * BLOCK_SIZE])
            .collect();

        {
            let deepest = &mut level_bits[depth - 1];
            for block in 0..reserved as usize {
                set_bit(deepest, block);
            }
            let capacity = sizes[depth - 1] as usize * BLOCK_BITS;
            for block in total_blocks as usize..capacity {
                set_bit(deepest, block);
            }
        }

        // An upper bit is set when the child bitmap block below it is
        // full, or covers nothing at all.
        for level in (0..depth - 1).rev() {
            let (uppers, lowers) = level_bits.split_at_mut(level + 1);
            let children = &lowers[0];
            let this = &mut uppers[level];
            let child_blocks = sizes[level + 1] as usize;

            for pos in 0..sizes[level] as usize * BLOCK_BITS {
                let full = pos >= child_blocks
                    || children[pos * BLOCK_SIZE..(pos + 1) * BLOCK_SIZE]
                        .iter()
                        .all(|&byte| byte == 0xFF);
                if full {
                    set_bit(this, pos);
                }
            }
        }

        let mut cache = BlockCacheManager::new(device);
        let mut lba = first_bitmap as usize;
        for bits in &level_bits {
            for chunk in bits.chunks(BLOCK_SIZE) {
                cache.get(lba)?.lock().map_mut(0, |block: &mut DataBlock| {
                    block.copy_from_slice(chunk);
                });
                lba += 1;
            }
        }

        let mut fs = Self {
            cache,
            bitmap,
            root_lba: 0,
            block_count: total_blocks,
        };

        let root_lba = fs.balloc()?;
        fs.block(root_lba)?.lock().map_mut(0, |part: &mut DirPart| {
            *part = DirPart::EMPTY;
        });
        fs.root_lba = root_lba;

        fs.block(0)?.lock().map_mut(0, |boot: &mut BootBlock| {
            boot.init(total_blocks, levels, root_lba, first_bitmap);
        });
        fs.sync_all()?;

        log::debug!("format: {total_blocks} blocks, {levels} bitmap levels, root part at {root_lba}");

        Ok(fs)
    }

    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    pub(crate) fn root_lba(&self) -> u32 {
        self.root_lba
    }

    /// Allocate one free block.
    pub(crate) fn balloc(&mut self) -> Result<u32> {
        match self.bitmap.alloc(&mut self.cache)? {
            Some(lba) => Ok(lba),
            None => {
                log::warn!("device exhausted");
                Err(Error::NoSpace)
            }
        }
    }

    /// Release a block back to the bitmap.
    pub(crate) fn bfree(&mut self, lba: u32) -> Result<()> {
        self.bitmap.dealloc(&mut self.cache, lba)
    }

    pub(crate) fn block(&mut self, lba: u32) -> Result<Arc<Mutex<BlockCache>>> {
        self.cache.get(lba as usize)
    }

    /// Flush every dirty cached block to the device.
    pub fn sync_all(&mut self) -> Result<()> {
        self.cache.sync_all()
    }
}

fn set_bit(bits: &mut [u8], pos: usize) {
    bits[pos / 8] |= 1 << (pos % 8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MemDisk;

    #[test]
    fn mount_rejects_unformatted_device() {
        let disk = MemDisk::new(16);
        assert!(matches!(
            EdenFileSystem::mount(disk),
            Err(Error::BadSignature)
        ));
    }

    #[test]
    fn format_then_mount() {
        let disk = MemDisk::new(16);
        drop(EdenFileSystem::format(disk.clone(), 16).unwrap());

        let fs = EdenFileSystem::mount(disk).unwrap();
        assert_eq!(16, fs.block_count());
        // Boot block + one bitmap block precede the root part.
        assert_eq!(2, fs.root_lba());
    }

    #[test]
    fn alloc_is_unique_until_exhaustion() {
        let disk = MemDisk::new(16);
        let mut fs = EdenFileSystem::format(disk, 16).unwrap();

        // 16 blocks minus boot, bitmap and root part.
        let mut allocated = Vec::new();
        for _ in 0..13 {
            let lba = fs.balloc().unwrap();
            assert!(!allocated.contains(&lba));
            assert!(lba >= 3 && lba < 16);
            allocated.push(lba);
        }
        assert_eq!(fs.balloc(), Err(Error::NoSpace));
    }

    #[test]
    fn freed_blocks_are_reused() {
        let disk = MemDisk::new(16);
        let mut fs = EdenFileSystem::format(disk, 16).unwrap();

        while fs.balloc().is_ok() {}
        fs.bfree(7).unwrap();
        assert_eq!(fs.balloc(), Ok(7));
        assert_eq!(fs.balloc(), Err(Error::NoSpace));
    }

    #[test]
    fn exhaustion_marks_upper_levels_lazily() {
        // Two deepest-level bitmap blocks under one coarse block.
        let blocks = 4096 + 64;
        let disk = MemDisk::new(blocks);
        let mut fs = EdenFileSystem::format(disk, blocks as u32).unwrap();

        // boot + 1 coarse + 2 deep bitmap blocks + root part reserved.
        let mut count = 0;
        while fs.balloc().is_ok() {
            count += 1;
        }
        assert_eq!(blocks - 5, count);

        // A block in the second deepest-level group comes back after
        // the whole device was exhausted.
        fs.bfree(4100).unwrap();
        assert_eq!(fs.balloc(), Ok(4100));
    }
}
