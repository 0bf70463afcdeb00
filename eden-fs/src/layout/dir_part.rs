use enumflags2::{bitflags, BitFlags};

use super::U16Le;
use crate::path::Name;
use crate::{DIR_ENTRIES_PER_PART, NAME_LEN};

/// Flags packed into the low bits of an on-disk address field.
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFlag {
    /// The slot is in use.
    Present = 1 << 0,
    /// The entry names a directory.
    Directory = 1 << 1,
    /// A content chain exists; the block index is meaningful.
    NotEmpty = 1 << 2,
}

/// What a directory entry names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Packed `(block << 9) | flags`, stored little-endian.
///
/// The block index is only valid when the entry is both present and
/// non-empty; [`DiskAddr::chain`] enforces that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct DiskAddr([u8; 4]);

impl DiskAddr {
    const FLAG_BITS: u32 = 9;

    pub const EMPTY: Self = Self([0; 4]);

    /// An address with no chain behind it.
    pub fn from_flags(flags: BitFlags<EntryFlag>) -> Self {
        Self(flags.bits().to_le_bytes())
    }

    /// An address pointing at the chain head `block`.
    pub fn chained(block: u32, flags: BitFlags<EntryFlag>) -> Self {
        debug_assert!(flags.contains(EntryFlag::NotEmpty));
        Self(((block << Self::FLAG_BITS) | flags.bits()).to_le_bytes())
    }

    pub fn flags(self) -> BitFlags<EntryFlag> {
        let bits = u32::from_le_bytes(self.0) & ((1 << Self::FLAG_BITS) - 1);
        BitFlags::from_bits_truncate(bits)
    }

    #[inline]
    pub fn contains(self, flag: EntryFlag) -> bool {
        self.flags().contains(flag)
    }

    /// Block index of the chain head, when one exists.
    pub fn chain(self) -> Option<u32> {
        (self.contains(EntryFlag::Present) && self.contains(EntryFlag::NotEmpty))
            .then(|| u32::from_le_bytes(self.0) >> Self::FLAG_BITS)
    }
}

/// One 16-byte slot of a directory part.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DirEntry {
    name: [u8; NAME_LEN + 1],
    pub addr: DiskAddr,
}

impl DirEntry {
    pub const EMPTY: Self = Self {
        name: [0; NAME_LEN + 1],
        addr: DiskAddr::EMPTY,
    };

    pub fn name(&self) -> Name {
        let mut name = [0; NAME_LEN];
        name.copy_from_slice(&self.name[..NAME_LEN]);
        Name::from_bytes(name)
    }

    pub fn set_name(&mut self, name: Name) {
        self.name[..NAME_LEN].copy_from_slice(name.as_bytes());
        self.name[NAME_LEN] = 0;
    }

    pub fn kind(&self) -> EntryKind {
        if self.addr.contains(EntryFlag::Directory) {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }
}

/// One block of a directory chain: live-entry count, 31 slots, 10 reserved
/// bytes, continuation address.
#[repr(C)]
pub struct DirPart {
    live: U16Le,
    pub entries: [DirEntry; DIR_ENTRIES_PER_PART],
    _reserved: [u8; 10],
    pub next: DiskAddr,
}

impl DirPart {
    pub const EMPTY: Self = Self {
        live: U16Le::ZERO,
        entries: [DirEntry::EMPTY; DIR_ENTRIES_PER_PART],
        _reserved: [0; 10],
        next: DiskAddr::EMPTY,
    };

    /// Entries currently in use, possibly scattered across the slots.
    pub fn live(&self) -> usize {
        usize::from(self.live.get())
    }

    pub fn set_live(&mut self, count: usize) {
        self.live.set(count as u16);
    }

    /// Present entries in slot order; stops once the live count is seen.
    pub fn live_slots(&self) -> impl Iterator<Item = (usize, &DirEntry)> {
        let live = self.live();
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.addr.contains(EntryFlag::Present))
            .take(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_packs_flags_below_block() {
        let addr = DiskAddr::chained(
            0x1234,
            EntryFlag::Present | EntryFlag::Directory | EntryFlag::NotEmpty,
        );
        assert_eq!(addr.chain(), Some(0x1234));
        assert_eq!(
            addr.flags(),
            EntryFlag::Present | EntryFlag::Directory | EntryFlag::NotEmpty
        );
    }

    #[test]
    fn chain_needs_present_and_not_empty() {
        assert_eq!(DiskAddr::EMPTY.chain(), None);
        assert_eq!(DiskAddr::from_flags(EntryFlag::Present.into()).chain(), None);
        // Stale block bits without NotEmpty must be ignored.
        let stale = DiskAddr((7 << 9 | 0b001u32).to_le_bytes());
        assert_eq!(stale.chain(), None);
        assert_eq!(
            DiskAddr::chained(7, EntryFlag::Present | EntryFlag::NotEmpty).chain(),
            Some(7)
        );
    }

    #[test]
    fn live_slots_skips_holes() {
        let mut part = DirPart::EMPTY;
        part.entries[1].addr = DiskAddr::from_flags(EntryFlag::Present.into());
        part.entries[4].addr = DiskAddr::from_flags(EntryFlag::Present | EntryFlag::Directory);
        part.set_live(2);

        let slots: alloc::vec::Vec<usize> = part.live_slots().map(|(i, _)| i).collect();
        assert_eq!(slots, [1, 4]);
        assert_eq!(part.entries[4].kind(), EntryKind::Directory);
        assert_eq!(part.entries[1].kind(), EntryKind::File);
    }
}
