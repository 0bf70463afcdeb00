//! # Block cache layer
//!
//! Every block the filesystem touches is staged in memory first: reads hit
//! the cache when possible, writes mark the cached copy dirty and reach the
//! device on eviction or on an explicit [`BlockCacheManager::sync_all`].
//!
//! The manager belongs to one mounted filesystem, so several images can be
//! mounted in the same process without sharing state.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem;

use block_dev::BlockDevice;
use spin::Mutex;

use crate::Result;
use crate::BLOCK_SIZE;

/// Owns the cached blocks of one device and schedules evictions.
pub struct BlockCacheManager {
    device: Arc<dyn BlockDevice>,
    queue: Vec<(usize, Arc<Mutex<BlockCache>>)>,
}

/// One device block held in memory.
pub struct BlockCache {
    data: [u8; BLOCK_SIZE],
    block_id: usize,
    device: Arc<dyn BlockDevice>,
    modified: bool,
}

impl BlockCacheManager {
    /// Upper bound on resident blocks.
    const CAPACITY: usize = 16;

    pub fn new(device: Arc<dyn BlockDevice>) -> Self {
        Self {
            device,
            queue: Vec::new(),
        }
    }

    /// Fetch the cache of `block_id`, reading it from the device on a miss.
    ///
    /// Eviction policy: write back a block nobody else holds.
    pub fn get(&mut self, block_id: usize) -> Result<Arc<Mutex<BlockCache>>> {
        if let Some(cache) = self
            .queue
            .iter()
            .find_map(|(id, cache)| (block_id == *id).then_some(cache))
        {
            return Ok(Arc::clone(cache));
        }

        if self.queue.len() == Self::CAPACITY {
            let index = self
                .queue
                .iter()
                .position(|(_, cache)| Arc::strong_count(cache) == 1)
                .expect("run out of block cache");
            let (_, evicted) = self.queue.remove(index);
            evicted.lock().sync()?;
        }

        let cache = Arc::new(Mutex::new(BlockCache::new(block_id, self.device.clone())?));
        self.queue.push((block_id, cache.clone()));

        Ok(cache)
    }

    /// Write every dirty cached block back to the device.
    pub fn sync_all(&mut self) -> Result<()> {
        for (_, cache) in &self.queue {
            cache.lock().sync()?;
        }
        Ok(())
    }
}

impl BlockCache {
    fn new(block_id: usize, device: Arc<dyn BlockDevice>) -> Result<Self> {
        let mut data = [0; BLOCK_SIZE];
        device.read_block(block_id, &mut data)?;

        Ok(Self {
            data,
            block_id,
            device,
            modified: false,
        })
    }

    pub fn sync(&mut self) -> Result<()> {
        if self.modified {
            self.modified = false;
            self.device.write_block(self.block_id, &self.data)?;
        }
        Ok(())
    }

    pub fn get<T: Sized>(&self, offset: usize) -> &T {
        let type_size = mem::size_of::<T>();
        assert!(type_size + offset <= BLOCK_SIZE);
        let addr = self.offset(offset).cast();
        unsafe { &*addr }
    }

    pub fn get_mut<T: Sized>(&mut self, offset: usize) -> &mut T {
        let type_size = mem::size_of::<T>();
        assert!(type_size + offset <= BLOCK_SIZE);
        self.modified = true;
        let addr = self.offset(offset).cast_mut().cast();
        unsafe { &mut *addr }
    }

    #[inline]
    pub fn map<T: Sized, V>(&self, offset: usize, f: impl FnOnce(&T) -> V) -> V {
        f(self.get(offset))
    }

    #[inline]
    pub fn map_mut<T: Sized, V>(&mut self, offset: usize, f: impl FnOnce(&mut T) -> V) -> V {
        f(self.get_mut(offset))
    }

    #[inline]
    fn offset(&self, count: usize) -> *const u8 {
        &self.data[count]
    }
}

impl Drop for BlockCache {
    fn drop(&mut self) {
        let _ = self.sync();
    }
}
