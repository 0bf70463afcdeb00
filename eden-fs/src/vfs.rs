//! Public filesystem operations.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use enumflags2::BitFlags;

use crate::chain::EntryPos;
use crate::efs::EdenFileSystem;
use crate::layout::{DirEntry, DirPart, DiskAddr, EntryFlag, EntryKind, FilePart};
use crate::path::{to_path_parts, Name};
use crate::{Error, Result, FILE_DATA_PER_PART};

/// How [`EdenFileSystem::open`] treats the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Resolve an existing file.
    Read,
    /// (Re)create the file first, truncating any previous content.
    Write,
}

/// An open file: the location of its directory entry plus two independent
/// byte cursors.
///
/// The filesystem never moves the cursors; advancing them after a read or
/// write is the caller's job. A handle does not pin the entry; deleting
/// or recreating the path invalidates it silently.
#[derive(Debug, Clone, Copy)]
pub struct File {
    pos: EntryPos,
    /// Next byte to read.
    pub r_seek: usize,
    /// Next byte to write.
    pub w_seek: usize,
}

fn kind_flags(kind: EntryKind) -> BitFlags<EntryFlag> {
    match kind {
        EntryKind::File => EntryFlag::Present.into(),
        EntryKind::Directory => EntryFlag::Present | EntryFlag::Directory,
    }
}

impl EdenFileSystem {
    /// Create a file or directory at `path`.
    ///
    /// An existing entry of any kind is overwritten in place: its content
    /// chain is freed, the slot keeps its position and the type flags are
    /// recomputed for `kind`. Intermediate directories must already exist.
    pub fn create(&mut self, path: &str, kind: EntryKind) -> Result<()> {
        let mut parts = to_path_parts(path);

        if let Some(pos) = self.resolve(&parts, None, false)? {
            log::debug!("create {path}: overwriting existing entry");
            let entry = self.entry(pos)?;
            if let Some(head) = entry.addr.chain() {
                self.delete_chain_parts(head)?;
            }
            self.update_entry(pos, |entry| {
                entry.addr = DiskAddr::from_flags(kind_flags(kind));
            })?;
            return self.sync_all();
        }

        let Some(name) = parts.pop() else {
            return Err(Error::InvalidPath);
        };

        let dir_lba = if parts.is_empty() {
            self.root_lba()
        } else {
            let Some(pos) = self.resolve(&parts, Some(EntryKind::Directory), false)? else {
                log::debug!("create {path}: parent directory not found");
                return Err(Error::NotFound);
            };
            match self.entry(pos)?.addr.chain() {
                Some(lba) => lba,
                None => {
                    // First child of an empty directory: give the parent
                    // its chain head.
                    let lba = self.new_dir_part()?;
                    self.update_entry(pos, |entry| {
                        entry.addr = DiskAddr::chained(
                            lba,
                            EntryFlag::Present | EntryFlag::Directory | EntryFlag::NotEmpty,
                        );
                    })?;
                    lba
                }
            }
        };

        let pos = self.find_empty_entry(dir_lba)?;
        self.update_entry(pos, |entry| {
            entry.set_name(name);
            entry.addr = DiskAddr::from_flags(kind_flags(kind));
        })?;
        self.sync_all()
    }

    /// Remove the entry at `path` along with its content chain.
    ///
    /// A missing path is a silent no-op.
    pub fn delete(&mut self, path: &str) -> Result<()> {
        let Some(pos) = self.find_path(path, None, false)? else {
            return Ok(());
        };

        let entry = self.entry(pos)?;
        if let Some(head) = entry.addr.chain() {
            self.delete_chain_parts(head)?;
        }
        self.block(pos.part_lba)?
            .lock()
            .map_mut(0, |part: &mut DirPart| {
                part.entries[pos.slot] = DirEntry::EMPTY;
                let live = part.live();
                part.set_live(live - 1);
            });
        self.sync_all()
    }

    /// Open the file at `path`; `Ok(None)` when it does not resolve.
    ///
    /// [`OpenMode::Write`] creates the file unconditionally first, so an
    /// existing file (or directory) at that path is truncated away.
    pub fn open(&mut self, path: &str, mode: OpenMode) -> Result<Option<File>> {
        if mode == OpenMode::Write {
            self.create(path, EntryKind::File)?;
        }

        let Some(pos) = self.find_path(path, Some(EntryKind::File), false)? else {
            return Ok(None);
        };
        Ok(Some(File {
            pos,
            r_seek: 0,
            w_seek: 0,
        }))
    }

    /// Whether `path` resolves, optionally constrained to a `kind` and to
    /// entries with a content chain.
    pub fn is_path(
        &mut self,
        path: &str,
        kind: Option<EntryKind>,
        not_empty: bool,
    ) -> Result<bool> {
        Ok(self.find_path(path, kind, not_empty)?.is_some())
    }

    /// Render the contents of the directory at `path` (`""` or `"/"` for
    /// the root), one entry per line.
    ///
    /// `tree` recurses into subdirectories with bar/branch indentation;
    /// `with_size` appends ` (N bytes)`, where a directory's size is the
    /// recursive sum of its files.
    pub fn list(&mut self, path: &str, tree: bool, with_size: bool) -> Result<String> {
        let parts = to_path_parts(path);
        let lba = if parts.is_empty() {
            self.root_lba()
        } else {
            let Some(pos) = self.resolve(&parts, Some(EntryKind::Directory), false)? else {
                return Err(Error::NotFound);
            };
            match self.entry(pos)?.addr.chain() {
                Some(lba) => lba,
                None => return Ok(String::new()),
            }
        };

        let mut out = String::new();
        self.list_dir(lba, tree, with_size, 0, &mut out)?;
        Ok(out)
    }

    /// Read from `file` at its read cursor into `buf`; returns the bytes
    /// copied, stopping early at the end of the chain.
    ///
    /// A cursor at or past the valid length of a short final part reads
    /// nothing.
    pub fn read_from_file(&mut self, file: &File, buf: &mut [u8]) -> Result<usize> {
        let entry = self.entry(file.pos)?;
        let Some(head) = entry.addr.chain() else {
            return Ok(0);
        };

        let mut lba = head;
        let mut total = 0;
        let mut count = buf.len();
        let mut seek = file.r_seek;

        // Walk off the cursor first.
        while seek > 0 {
            let block = self.block(lba)?;
            let guard = block.lock();
            let part: &FilePart = guard.get(0);
            let len = part.len();

            if len < FILE_DATA_PER_PART {
                // Short part: the chain ends here.
                if seek >= len {
                    return Ok(0);
                }
                let n = count.min(len - seek);
                buf[..n].copy_from_slice(&part.data[seek..seek + n]);
                return Ok(n);
            }

            if seek < FILE_DATA_PER_PART {
                let tail = FILE_DATA_PER_PART - seek;
                if count <= tail {
                    buf[..count].copy_from_slice(&part.data[seek..seek + count]);
                    return Ok(count);
                }
                buf[..tail].copy_from_slice(&part.data[seek..]);
                total = tail;
                count -= tail;
                seek = 0;
            } else {
                seek -= FILE_DATA_PER_PART;
            }

            lba = match part.next.chain() {
                Some(next) => next,
                None => return Ok(total),
            };
        }

        while count > 0 {
            let block = self.block(lba)?;
            let guard = block.lock();
            let part: &FilePart = guard.get(0);
            let len = part.len();

            if len < FILE_DATA_PER_PART {
                let n = count.min(len);
                buf[total..total + n].copy_from_slice(&part.data[..n]);
                return Ok(total + n);
            }
            if count <= FILE_DATA_PER_PART {
                buf[total..total + count].copy_from_slice(&part.data[..count]);
                return Ok(total + count);
            }

            buf[total..total + FILE_DATA_PER_PART].copy_from_slice(&part.data);
            total += FILE_DATA_PER_PART;
            count -= FILE_DATA_PER_PART;

            lba = match part.next.chain() {
                Some(next) => next,
                None => return Ok(total),
            };
        }

        Ok(total)
    }

    /// Write `buf` at `file`'s write cursor, extending the chain with
    /// zeroed parts as the cursor or the data runs past the end.
    ///
    /// A write contained inside existing content never shrinks a part's
    /// valid count.
    pub fn write_to_file(&mut self, file: &File, buf: &[u8]) -> Result<()> {
        let entry = self.entry(file.pos)?;
        let mut lba = match entry.addr.chain() {
            Some(lba) => lba,
            None => {
                // First write: materialize the content chain head.
                let lba = self.new_file_part()?;
                self.update_entry(file.pos, |entry| {
                    entry.addr =
                        DiskAddr::chained(lba, EntryFlag::Present | EntryFlag::NotEmpty);
                })?;
                lba
            }
        };

        let mut written = 0;
        let mut count = buf.len();
        let mut seek = file.w_seek;

        while seek > 0 {
            let block = self.block(lba)?;
            let mut guard = block.lock();
            let part: &mut FilePart = guard.get_mut(0);

            if seek < FILE_DATA_PER_PART {
                let tail = FILE_DATA_PER_PART - seek;
                if count <= tail {
                    part.data[seek..seek + count].copy_from_slice(buf);
                    if seek + count > part.len() {
                        part.set_len(seek + count);
                    }
                    drop(guard);
                    return self.sync_all();
                }
                part.data[seek..].copy_from_slice(&buf[..tail]);
                written = tail;
                count -= tail;
                seek = 0;
                part.set_len(FILE_DATA_PER_PART);
            } else {
                // The cursor skips this part entirely; gaps read as the
                // zeroes the parts were initialized with.
                seek -= FILE_DATA_PER_PART;
                part.set_len(FILE_DATA_PER_PART);
            }

            lba = match part.next.chain() {
                Some(next) => next,
                None => {
                    let new_lba = self.new_file_part()?;
                    part.next =
                        DiskAddr::chained(new_lba, EntryFlag::Present | EntryFlag::NotEmpty);
                    new_lba
                }
            };
        }

        while count > 0 {
            let block = self.block(lba)?;
            let mut guard = block.lock();
            let part: &mut FilePart = guard.get_mut(0);

            if count <= FILE_DATA_PER_PART {
                part.data[..count].copy_from_slice(&buf[written..]);
                if count > part.len() {
                    part.set_len(count);
                }
                drop(guard);
                return self.sync_all();
            }

            part.data
                .copy_from_slice(&buf[written..written + FILE_DATA_PER_PART]);
            written += FILE_DATA_PER_PART;
            count -= FILE_DATA_PER_PART;
            part.set_len(FILE_DATA_PER_PART);

            lba = match part.next.chain() {
                Some(next) => next,
                None => {
                    let new_lba = self.new_file_part()?;
                    part.next =
                        DiskAddr::chained(new_lba, EntryFlag::Present | EntryFlag::NotEmpty);
                    new_lba
                }
            };
        }

        self.sync_all()
    }
}

// Resolution internals.
impl EdenFileSystem {
    pub(crate) fn entry(&mut self, pos: EntryPos) -> Result<DirEntry> {
        self.block(pos.part_lba)?
            .lock()
            .map(0, |part: &DirPart| Ok(part.entries[pos.slot]))
    }

    fn update_entry(&mut self, pos: EntryPos, f: impl FnOnce(&mut DirEntry)) -> Result<()> {
        self.block(pos.part_lba)?
            .lock()
            .map_mut(0, |part: &mut DirPart| f(&mut part.entries[pos.slot]));
        Ok(())
    }

    /// Search one directory chain for `name`, first match wins.
    ///
    /// Entries are filtered by `kind` and, when `not_empty` is set, by the
    /// presence of a content chain, before names are compared.
    fn find_in_dir(
        &mut self,
        dir_lba: u32,
        name: Name,
        kind: Option<EntryKind>,
        not_empty: bool,
    ) -> Result<Option<EntryPos>> {
        let mut lba = dir_lba;
        loop {
            let block = self.block(lba)?;
            let guard = block.lock();
            let part: &DirPart = guard.get(0);

            for (slot, entry) in part.live_slots() {
                if let Some(kind) = kind {
                    if entry.kind() != kind {
                        continue;
                    }
                }
                if not_empty && !entry.addr.contains(EntryFlag::NotEmpty) {
                    continue;
                }
                if entry.name() == name {
                    return Ok(Some(EntryPos {
                        part_lba: lba,
                        slot,
                    }));
                }
            }

            lba = match part.next.chain() {
                Some(next) => next,
                None => return Ok(None),
            };
        }
    }

    /// Resolve `parts` from the root: intermediates must be non-empty
    /// directories, the final component obeys the caller's constraints.
    ///
    /// `Ok(None)` at the first component that fails, with no partial
    /// result.
    fn resolve(
        &mut self,
        parts: &[Name],
        kind: Option<EntryKind>,
        not_empty: bool,
    ) -> Result<Option<EntryPos>> {
        let Some((last, dirs)) = parts.split_last() else {
            return Ok(None);
        };

        let mut dir_lba = self.root_lba();
        for part in dirs {
            let Some(pos) =
                self.find_in_dir(dir_lba, *part, Some(EntryKind::Directory), true)?
            else {
                return Ok(None);
            };
            let Some(lba) = self.entry(pos)?.addr.chain() else {
                return Ok(None);
            };
            dir_lba = lba;
        }

        self.find_in_dir(dir_lba, *last, kind, not_empty)
    }

    pub(crate) fn find_path(
        &mut self,
        path: &str,
        kind: Option<EntryKind>,
        not_empty: bool,
    ) -> Result<Option<EntryPos>> {
        let parts = to_path_parts(path);
        self.resolve(&parts, kind, not_empty)
    }

    fn list_dir(
        &mut self,
        head: u32,
        tree: bool,
        with_size: bool,
        depth: usize,
        out: &mut String,
    ) -> Result<()> {
        let mut lba = head;
        loop {
            let (items, next) = {
                let block = self.block(lba)?;
                let guard = block.lock();
                let part: &DirPart = guard.get(0);
                let items: Vec<(Name, EntryKind, Option<u32>)> = part
                    .live_slots()
                    .map(|(_, entry)| (entry.name(), entry.kind(), entry.addr.chain()))
                    .collect();
                (items, part.next.chain())
            };

            for (name, kind, chain) in items {
                if depth > 0 {
                    for _ in 0..depth - 1 {
                        out.push_str("    |");
                    }
                    out.push_str("    +--- ");
                }
                out.push_str(&format!("{name}"));
                out.push_str(match kind {
                    EntryKind::Directory => " (DIR)",
                    EntryKind::File => " (FILE)",
                });
                if with_size {
                    let size = self.entry_size(kind, chain)?;
                    out.push_str(&format!(" ({size} bytes)"));
                }
                out.push('\n');

                if tree && kind == EntryKind::Directory {
                    if let Some(child) = chain {
                        for _ in 0..depth + 1 {
                            out.push_str("    |");
                        }
                        out.push('\n');
                        self.list_dir(child, tree, with_size, depth + 1, out)?;
                    }
                }
            }

            match next {
                Some(next) => lba = next,
                None => return Ok(()),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn file_chain(&mut self, file: &File) -> Result<Vec<(usize, u32)>> {
        let Some(head) = self.entry(file.pos)?.addr.chain() else {
            return Ok(Vec::new());
        };
        let mut parts = Vec::new();
        let mut lba = head;
        loop {
            let (len, next) = self
                .block(lba)?
                .lock()
                .map(0, |part: &FilePart| (part.len(), part.next.chain()));
            parts.push((len, lba));
            match next {
                Some(next) => lba = next,
                None => return Ok(parts),
            }
        }
    }

    /// Content bytes behind an entry; directories sum their files
    /// recursively, an empty entry is 0.
    fn entry_size(&mut self, kind: EntryKind, chain: Option<u32>) -> Result<u32> {
        let Some(head) = chain else {
            return Ok(0);
        };
        match kind {
            EntryKind::File => self.file_chain_size(head),
            EntryKind::Directory => {
                let mut size = 0;
                let mut lba = head;
                loop {
                    let (items, next) = {
                        let block = self.block(lba)?;
                        let guard = block.lock();
                        let part: &DirPart = guard.get(0);
                        let items: Vec<(EntryKind, Option<u32>)> = part
                            .live_slots()
                            .map(|(_, entry)| (entry.kind(), entry.addr.chain()))
                            .collect();
                        (items, part.next.chain())
                    };
                    for (kind, chain) in items {
                        size += self.entry_size(kind, chain)?;
                    }
                    match next {
                        Some(next) => lba = next,
                        None => return Ok(size),
                    }
                }
            }
        }
    }
}
