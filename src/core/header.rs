//! Persisted store header
//!
//! The header lives in an ordinary sector chain that always starts at
//! sector 0. Layout of the serialized blob (all integers little-endian):
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ header_len: u64       total blob length including itself   │
//! │ sector_size: u32                                           │
//! │ compression_tag: u32                                       │
//! │ file_count: u64                                            │
//! │ file_count × { hash, stored_size, start_sector,            │
//! │                uncompressed_size }   (4 × u64 each)        │
//! │ free_count: u64                                            │
//! │ free_count × sector_index: u64                             │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The first 16 bytes always sit in sector 0 (the minimum sector size leaves
//! 24 payload bytes), so a reader learns the sector size before following
//! any link.

use crate::allocator::free_list::FreeSectorList;
use crate::allocator::Allocator;
use crate::chain;
use crate::compression::CompressionMethod;
use crate::directory::{Directory, FileEntry};
use crate::error::{Result, VfsError};
use crate::io::ContainerFile;
use crate::sector::{
    self, SectorIndex, SectorStore, BOOTSTRAP_SECTOR, END_OF_CHAIN, MIN_SECTOR_SIZE,
};

/// Bytes holding `header_len`, `sector_size` and `compression_tag`
pub const HEADER_PREFIX_LEN: usize = 8 + 4 + 4;

/// Length of a header with no files and no free sectors
pub const MIN_HEADER_LEN: u64 = HEADER_PREFIX_LEN as u64 + 8 + 8;

/// Decoded store header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub sector_size: u32,
    pub compression: CompressionMethod,
    pub directory: Directory,
    pub free_sectors: FreeSectorList,
}

impl Header {
    /// Deserialize header from a complete blob
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);

        let declared_len = reader.u64()?;
        if declared_len != bytes.len() as u64 {
            return Err(VfsError::CorruptHeader(format!(
                "Declared length {} does not match blob length {}",
                declared_len,
                bytes.len()
            )));
        }

        let sector_size = reader.u32()?;
        if sector_size < MIN_SECTOR_SIZE {
            return Err(VfsError::CorruptHeader(format!(
                "Sector size {} is below the minimum of {}",
                sector_size, MIN_SECTOR_SIZE
            )));
        }
        let compression = CompressionMethod::from_tag(reader.u32()?)?;

        let file_count = reader.count(FileEntry::encoded_size())?;
        let mut entries = Vec::with_capacity(file_count);
        for _ in 0..file_count {
            let hash = reader.u64()?;
            let stored_size = reader.u64()?;
            let start_sector = reader.u64()?;
            let uncompressed_size = reader.u64()?;
            entries.push(FileEntry::new(hash, stored_size, uncompressed_size, start_sector));
        }
        let directory = Directory::from_sorted(entries).ok_or_else(|| {
            VfsError::CorruptHeader("Directory entries are not strictly ascending".to_string())
        })?;

        let free_count = reader.count(8)?;
        let mut free = Vec::with_capacity(free_count);
        for _ in 0..free_count {
            free.push(reader.u64()?);
        }
        let free_sectors = FreeSectorList::from_sorted(free).ok_or_else(|| {
            VfsError::CorruptHeader("Free sector list is not strictly ascending".to_string())
        })?;

        if !reader.is_done() {
            return Err(VfsError::CorruptHeader(format!(
                "{} trailing bytes after free sector list",
                reader.remaining()
            )));
        }

        Ok(Header {
            sector_size,
            compression,
            directory,
            free_sectors,
        })
    }
}

/// Serialized length of a header with the given counts
pub fn encoded_len(file_count: usize, free_count: usize) -> u64 {
    MIN_HEADER_LEN
        + file_count as u64 * FileEntry::encoded_size() as u64
        + free_count as u64 * 8
}

/// Serialize the header fields in their persisted order
pub fn encode(
    sector_size: u32,
    compression: CompressionMethod,
    directory: &Directory,
    free: &FreeSectorList,
) -> Vec<u8> {
    let len = encoded_len(directory.len(), free.len());
    let mut bytes = Vec::with_capacity(len as usize);

    bytes.extend_from_slice(&len.to_le_bytes());
    bytes.extend_from_slice(&sector_size.to_le_bytes());
    bytes.extend_from_slice(&compression.tag().to_le_bytes());

    bytes.extend_from_slice(&(directory.len() as u64).to_le_bytes());
    for entry in directory.entries() {
        bytes.extend_from_slice(&entry.hash.to_le_bytes());
        bytes.extend_from_slice(&entry.stored_size.to_le_bytes());
        bytes.extend_from_slice(&entry.start_sector.to_le_bytes());
        bytes.extend_from_slice(&entry.uncompressed_size.to_le_bytes());
    }

    bytes.extend_from_slice(&(free.len() as u64).to_le_bytes());
    for sector in free.as_slice() {
        bytes.extend_from_slice(&sector.to_le_bytes());
    }

    debug_assert_eq!(bytes.len() as u64, len);
    bytes
}

/// Sequential little-endian reader over a header blob
struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        ByteReader { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        let slice = self.bytes.get(self.pos..end).ok_or_else(|| {
            VfsError::CorruptHeader(format!("Header truncated at byte {}", self.pos))
        })?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    /// Read an element count and check the elements can fit in what is left
    fn count(&mut self, element_size: usize) -> Result<usize> {
        let count = self.u64()?;
        let needed = count.checked_mul(element_size as u64);
        match needed {
            Some(needed) if needed <= self.remaining() as u64 => Ok(count as usize),
            _ => Err(VfsError::CorruptHeader(format!(
                "Count {} overruns the header",
                count
            ))),
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn is_done(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

/// Reads and writes the header chain
///
/// Remembers which sectors the header currently occupies so a rewrite can
/// reuse them and only grow or shrink at the tail.
#[derive(Debug, Clone, Default)]
pub struct HeaderCodec {
    chain: Vec<SectorIndex>,
}

impl HeaderCodec {
    /// Codec for a store whose header has not been written yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Sectors occupied by the header chain
    pub fn chain(&self) -> &[SectorIndex] {
        &self.chain
    }

    /// Read the header of an existing container
    ///
    /// Returns the sector store (now that the sector size is known), the
    /// decoded header and a codec positioned on the header chain.
    pub fn read(mut file: ContainerFile) -> Result<(SectorStore, Header, HeaderCodec)> {
        let file_len = file.len()?;
        if file_len < HEADER_PREFIX_LEN as u64 {
            return Err(VfsError::CorruptHeader(format!(
                "Container is only {} bytes long",
                file_len
            )));
        }

        let prefix = file.read_at(0, HEADER_PREFIX_LEN)?;
        let mut reader = ByteReader::new(&prefix);
        let header_len = reader.u64()?;
        let sector_size = reader.u32()?;
        let tag = reader.u32()?;

        if header_len > file_len {
            return Err(VfsError::CorruptHeader(format!(
                "Declared header length {} exceeds container length {}",
                header_len, file_len
            )));
        }
        if header_len < MIN_HEADER_LEN {
            return Err(VfsError::CorruptHeader(format!(
                "Declared header length {} is below the minimum of {}",
                header_len, MIN_HEADER_LEN
            )));
        }
        if sector::validate_sector_size(sector_size).is_err() {
            return Err(VfsError::CorruptHeader(format!(
                "Invalid sector size {}",
                sector_size
            )));
        }
        CompressionMethod::from_tag(tag)?;

        let mut store = SectorStore::new(file, sector_size)?;
        let limit = store.sector_count()?;

        let blob = chain::read(&mut store, BOOTSTRAP_SECTOR, header_len, limit)
            .map_err(corrupt_chain)?;
        let header = Header::from_bytes(&blob)?;
        let sectors = chain::collect(&mut store, BOOTSTRAP_SECTOR, limit).map_err(corrupt_chain)?;

        for &free in header.free_sectors.as_slice() {
            if free >= limit || sectors.contains(&free) {
                return Err(VfsError::CorruptHeader(format!(
                    "Free sector {} is out of range or used by the header",
                    free
                )));
            }
        }

        tracing::debug!(
            "Read header: {} bytes over {} sectors, {} files, {} free sectors",
            header_len,
            sectors.len(),
            header.directory.len(),
            header.free_sectors.len()
        );

        Ok((store, header, HeaderCodec { chain: sectors }))
    }

    /// Persist the header through the chain starting at sector 0
    ///
    /// The chain is settled before serializing: sectors needed for growth
    /// come from the allocator (which may shrink the free list being
    /// written) and surplus tail sectors are returned to it only while the
    /// header still fits. The free list written out therefore never names a
    /// sector of the header chain.
    pub fn write(
        &mut self,
        store: &mut SectorStore,
        alloc: &mut Allocator,
        compression: CompressionMethod,
        directory: &Directory,
    ) -> Result<()> {
        let sector_size = store.sector_size();
        let needed = |free_count: usize| {
            sector::sectors_for(encoded_len(directory.len(), free_count), sector_size).max(1)
        };

        let mut sectors = if self.chain.is_empty() {
            vec![BOOTSTRAP_SECTOR]
        } else {
            self.chain.clone()
        };

        // Acquiring from the free list only shrinks the header, so this ends
        while (sectors.len() as u64) < needed(alloc.free_list().len()) {
            sectors.push(alloc.acquire_sector());
        }

        while sectors.len() > 1 && needed(alloc.free_list().len() + 1) < sectors.len() as u64 {
            if let Some(surplus) = sectors.pop() {
                store.write_next(surplus, END_OF_CHAIN)?;
                alloc.release_sector(surplus);
            }
        }

        let bytes = encode(sector_size, compression, directory, alloc.free_list());
        chain::write(store, &sectors, &bytes)?;

        tracing::debug!(
            "Wrote header: {} bytes over {} sectors",
            bytes.len(),
            sectors.len()
        );

        self.chain = sectors;
        Ok(())
    }
}

fn corrupt_chain(err: VfsError) -> VfsError {
    match err {
        VfsError::BrokenChain { sector } => VfsError::CorruptHeader(format!(
            "Header chain ends early at sector {:#x}",
            sector
        )),
        other => other,
    }
}
