//! Directory of virtual files
//!
//! A flat, hash-keyed table kept as an ascending vector so lookups are a
//! binary search and the persisted order is the in-memory order.

use crate::sector::{SectorIndex, END_OF_CHAIN};
use serde::Serialize;

/// Metadata for one virtual file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// 64-bit key derived from the file name
    pub hash: u64,

    /// Bytes occupied in the sector chain (after compression)
    pub stored_size: u64,

    /// Length of the file as written by the caller
    pub uncompressed_size: u64,

    /// Head of the sector chain, [`END_OF_CHAIN`] for empty files
    pub start_sector: SectorIndex,
}

impl FileEntry {
    pub fn new(hash: u64, stored_size: u64, uncompressed_size: u64, start_sector: SectorIndex) -> Self {
        FileEntry {
            hash,
            stored_size,
            uncompressed_size,
            start_sector,
        }
    }

    /// Entry for a zero-length file, which owns no sectors
    pub fn empty(hash: u64) -> Self {
        FileEntry::new(hash, 0, 0, END_OF_CHAIN)
    }

    pub fn is_empty(&self) -> bool {
        self.start_sector == END_OF_CHAIN
    }

    /// Serialized size in the header
    pub const fn encoded_size() -> usize {
        8 + 8 + 8 + 8 // hash + stored_size + start_sector + uncompressed_size
    }
}

/// Sorted hash → entry table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    entries: Vec<FileEntry>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted entries, returning `None` unless they are
    /// strictly ascending by hash
    pub fn from_sorted(entries: Vec<FileEntry>) -> Option<Self> {
        if entries.windows(2).all(|w| w[0].hash < w[1].hash) {
            Some(Directory { entries })
        } else {
            None
        }
    }

    /// Position of the entry for `hash`
    ///
    /// Among equal hashes the lowest position is returned.
    pub fn find(&self, hash: u64) -> Option<usize> {
        let pos = self.entries.partition_point(|entry| entry.hash < hash);
        match self.entries.get(pos) {
            Some(entry) if entry.hash == hash => Some(pos),
            _ => None,
        }
    }

    pub fn get(&self, hash: u64) -> Option<&FileEntry> {
        self.find(hash).map(|pos| &self.entries[pos])
    }

    /// Insert keeping hash order; returns the position used
    ///
    /// An existing entry with the same hash is replaced rather than
    /// duplicated.
    pub fn insert(&mut self, entry: FileEntry) -> usize {
        let pos = self.entries.partition_point(|e| e.hash < entry.hash);
        match self.entries.get(pos) {
            Some(existing) if existing.hash == entry.hash => self.entries[pos] = entry,
            _ => self.entries.insert(pos, entry),
        }
        pos
    }

    pub fn remove(&mut self, pos: usize) -> FileEntry {
        self.entries.remove(pos)
    }

    /// Overwrite the entry at `pos`
    ///
    /// The hash must not change, or the ordering would break.
    pub fn replace(&mut self, pos: usize, entry: FileEntry) {
        debug_assert_eq!(self.entries[pos].hash, entry.hash);
        self.entries[pos] = entry;
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
