use alloc::vec::Vec;

use crate::block_cache::BlockCacheManager;
use crate::{DataBlock, Result, BLOCK_BITS, BLOCK_SIZE};

type BitmapBlock = DataBlock;

/// The multi-level free-block bitmap.
///
/// Levels are stored on disk back to back, coarsest first. A set bit at
/// the deepest level marks a device block allocated; a set bit at any
/// upper level marks the child bitmap block below it completely full, so
/// a descent can skip it.
#[derive(Debug)]
pub struct BitmapTree {
    /// LBA of the coarsest level's first block.
    first_bitmap: u32,
    /// Blocks occupied by each level, coarsest first.
    level_sizes: Vec<u32>,
}

impl BitmapTree {
    /// Derive the level geometry for a device of `block_count` blocks.
    ///
    /// Sizes come from repeated ceiling division by the bits of one bitmap
    /// block, deepest level first, then reversed so descent starts at the
    /// coarsest level.
    pub fn new(block_count: u32, levels: u8, first_bitmap: u32) -> Self {
        let mut sizes = Vec::with_capacity(usize::from(levels));
        let mut covered = block_count;
        for _ in 0..levels {
            covered = covered.div_ceil(BLOCK_BITS as u32);
            sizes.push(covered);
        }
        sizes.reverse();

        Self {
            first_bitmap,
            level_sizes: sizes,
        }
    }

    /// Levels needed until a single bitmap block covers the whole device.
    pub fn depth_for(block_count: u32) -> u8 {
        let mut levels = 0;
        let mut covered = block_count;
        loop {
            covered = covered.div_ceil(BLOCK_BITS as u32);
            levels += 1;
            if covered <= 1 {
                return levels;
            }
        }
    }

    pub fn level_sizes(&self) -> &[u32] {
        &self.level_sizes
    }

    /// Blocks occupied by the whole tree.
    pub fn total_blocks(&self) -> u32 {
        self.level_sizes.iter().sum()
    }

    /// Allocate one block; `None` when the device is exhausted.
    ///
    /// The block is not zeroed. Callers that store a part in it must write
    /// the whole block before linking it into a chain.
    pub fn alloc(&self, cache: &mut BlockCacheManager) -> Result<Option<u32>> {
        self.alloc_in_level(cache, 0, self.first_bitmap, 0)
    }

    /// Scan one bitmap block of `level` for a clear bit, byte order,
    /// least-significant bit first.
    ///
    /// At the deepest level a clear bit is the allocation: set it and
    /// return the block index. Above that, a clear bit selects a child
    /// bitmap block to descend into; when the child comes back exhausted
    /// the bit is set here and the scan moves on.
    fn alloc_in_level(
        &self,
        cache: &mut BlockCacheManager,
        level: usize,
        level_base: u32,
        offset: u32,
    ) -> Result<Option<u32>> {
        let deepest = level == self.level_sizes.len() - 1;

        let block = cache.get((level_base + offset) as usize)?;
        let mut guard = block.lock();
        let bitmap: &mut BitmapBlock = guard.get_mut(0);

        for byte in 0..BLOCK_SIZE {
            while bitmap[byte] != 0xFF {
                let bit = bitmap[byte].trailing_ones() as usize;
                let pos = (byte * 8 + bit) as u32;

                if deepest {
                    bitmap[byte] |= 1 << bit;
                    return Ok(Some(offset * BLOCK_BITS as u32 + pos));
                }

                let child_base = level_base + self.level_sizes[level];
                match self.alloc_in_level(cache, level + 1, child_base, pos)? {
                    Some(block) => return Ok(Some(block)),
                    // Child group full: remember that and keep scanning.
                    None => bitmap[byte] |= 1 << bit,
                }
            }
        }

        Ok(None)
    }

    /// Release `block`, clearing its bit at every level.
    pub fn dealloc(&self, cache: &mut BlockCacheManager, block: u32) -> Result<()> {
        let depth = self.level_sizes.len();
        let mut level_base = self.first_bitmap;

        for (level, &size) in self.level_sizes.iter().enumerate() {
            let mut pos = block;
            for _ in 0..depth - 1 - level {
                pos /= BLOCK_BITS as u32;
            }
            let offset = pos / BLOCK_BITS as u32;
            let byte = (pos as usize % BLOCK_BITS) / 8;
            let bit = pos as usize % 8;

            cache
                .get((level_base + offset) as usize)?
                .lock()
                .map_mut(0, |bitmap: &mut BitmapBlock| {
                    bitmap[byte] &= !(1 << bit);
                });

            level_base += size;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_grows_with_device_size() {
        assert_eq!(1, BitmapTree::depth_for(16));
        assert_eq!(1, BitmapTree::depth_for(4096));
        assert_eq!(2, BitmapTree::depth_for(4097));
        assert_eq!(2, BitmapTree::depth_for(4096 * 4096));
    }

    #[test]
    fn level_sizes_cover_every_block() {
        // 4097 blocks: two deepest-level blocks under one coarse block.
        // A truncating division would lose the second one.
        let tree = BitmapTree::new(4097, 2, 1);
        assert_eq!(tree.level_sizes(), [1, 2]);
        assert_eq!(3, tree.total_blocks());

        let tree = BitmapTree::new(16, 1, 1);
        assert_eq!(tree.level_sizes(), [1]);
    }
}
