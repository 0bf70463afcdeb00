//! Chain manager: claiming directory slots, sizing and freeing chains.

use crate::efs::EdenFileSystem;
use crate::layout::{DirEntry, DirPart, DiskAddr, EntryFlag, FilePart};
use crate::Result;

/// Location of a directory entry: owning part block plus slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntryPos {
    pub part_lba: u32,
    pub slot: usize,
}

impl EdenFileSystem {
    /// Claim a free slot in the directory chain rooted at `dir_lba`.
    ///
    /// Slots left behind by deletions are reused before the chain grows.
    /// The claimed slot is zeroed and marked present with its live count
    /// bumped; the caller fills in name and type.
    pub(crate) fn find_empty_entry(&mut self, dir_lba: u32) -> Result<EntryPos> {
        let mut lba = dir_lba;
        loop {
            let block = self.block(lba)?;
            let mut guard = block.lock();
            let part: &mut DirPart = guard.get_mut(0);

            if let Some(slot) = part
                .entries
                .iter()
                .position(|entry| !entry.addr.contains(EntryFlag::Present))
            {
                part.entries[slot] = DirEntry::EMPTY;
                part.entries[slot].addr = DiskAddr::from_flags(EntryFlag::Present.into());
                let live = part.live();
                part.set_live(live + 1);
                return Ok(EntryPos {
                    part_lba: lba,
                    slot,
                });
            }

            lba = match part.next.chain() {
                Some(next) => next,
                None => {
                    // Every slot taken: extend the chain.
                    let new_lba = self.new_dir_part()?;
                    part.next = DiskAddr::chained(
                        new_lba,
                        EntryFlag::Present | EntryFlag::Directory | EntryFlag::NotEmpty,
                    );
                    new_lba
                }
            };
        }
    }

    /// Free every block of the chain starting at `head`.
    ///
    /// Works for both part kinds since the continuation shares its offset.
    pub(crate) fn delete_chain_parts(&mut self, head: u32) -> Result<()> {
        let mut lba = head;
        loop {
            let next = self
                .block(lba)?
                .lock()
                .map(0, |part: &FilePart| part.next.chain());
            self.bfree(lba)?;
            match next {
                Some(next) => lba = next,
                None => return Ok(()),
            }
        }
    }

    /// Bytes held by the file chain starting at `head`: the sum of every
    /// part's valid count.
    pub(crate) fn file_chain_size(&mut self, head: u32) -> Result<u32> {
        let mut size = 0;
        let mut lba = head;
        loop {
            let (len, next) = self
                .block(lba)?
                .lock()
                .map(0, |part: &FilePart| (part.len() as u32, part.next.chain()));
            size += len;
            match next {
                Some(next) => lba = next,
                None => return Ok(size),
            }
        }
    }

    /// Allocate and zero a fresh directory part. Linking it into a chain
    /// is the caller's job.
    pub(crate) fn new_dir_part(&mut self) -> Result<u32> {
        let lba = self.balloc()?;
        self.block(lba)?
            .lock()
            .map_mut(0, |fresh: &mut DirPart| *fresh = DirPart::EMPTY);
        Ok(lba)
    }

    /// Allocate and zero a fresh file part. Linking it into a chain is
    /// the caller's job.
    pub(crate) fn new_file_part(&mut self) -> Result<u32> {
        let lba = self.balloc()?;
        self.block(lba)?
            .lock()
            .map_mut(0, |fresh: &mut FilePart| *fresh = FilePart::EMPTY);
        Ok(lba)
    }
}
