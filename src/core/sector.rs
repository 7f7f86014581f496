//! Fixed-size sectors over the container file
//!
//! Every sector is laid out as `[payload][next: u64 LE]`, where the payload
//! takes `sector_size - POINTER_WIDTH` bytes. The link width is part of the
//! format and never depends on the host.
//!
//! ```text
//! ┌──────────────────────────────────────┬──────────────┐
//! │ payload (sector_size - 8 bytes)      │ next (u64)   │
//! └──────────────────────────────────────┴──────────────┘
//! ```

use crate::error::{Result, VfsError};
use crate::io::ContainerFile;

/// Position of a sector in the container; byte offset is `index * sector_size`
pub type SectorIndex = u64;

/// Width of the trailing next-sector link in bytes
pub const POINTER_WIDTH: usize = 8;

/// Link value terminating a chain
pub const END_OF_CHAIN: SectorIndex = u64::MAX;

/// Sector holding the start of the header chain
pub const BOOTSTRAP_SECTOR: SectorIndex = 0;

/// Smallest sector size accepted at creation and on open
pub const MIN_SECTOR_SIZE: u32 = 32;

/// Largest sector size accepted at creation and on open (16 MiB)
pub const MAX_SECTOR_SIZE: u32 = 16 * 1024 * 1024;

/// Sector size used when none is configured
pub const DEFAULT_SECTOR_SIZE: u32 = 512;

/// A sector read back from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sector {
    pub payload: Vec<u8>,
    pub next: SectorIndex,
}

/// Raw sector read/write/append over a [`ContainerFile`]
///
/// Knows nothing about files or directories, only sectors and links.
pub struct SectorStore {
    file: ContainerFile,
    sector_size: u32,
}

impl SectorStore {
    pub fn new(file: ContainerFile, sector_size: u32) -> Result<Self> {
        validate_sector_size(sector_size)?;
        Ok(SectorStore { file, sector_size })
    }

    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// Payload bytes carried by each sector
    pub fn payload_size(&self) -> usize {
        payload_size(self.sector_size)
    }

    fn offset(&self, index: SectorIndex) -> u64 {
        index * self.sector_size as u64
    }

    /// Number of whole sectors currently in the container
    pub fn sector_count(&self) -> Result<u64> {
        Ok(self.file.len()? / self.sector_size as u64)
    }

    /// Read a sector's payload and link
    pub fn read_sector(&mut self, index: SectorIndex) -> Result<Sector> {
        let offset = self.offset(index);
        let raw = self.file.read_at(offset, self.sector_size as usize)?;

        let split = self.payload_size();
        let mut link = [0u8; POINTER_WIDTH];
        link.copy_from_slice(&raw[split..]);

        let mut payload = raw;
        payload.truncate(split);

        Ok(Sector {
            payload,
            next: SectorIndex::from_le_bytes(link),
        })
    }

    /// Read only the link of a sector
    pub fn read_next(&mut self, index: SectorIndex) -> Result<SectorIndex> {
        let offset = self.offset(index) + self.payload_size() as u64;
        let raw = self.file.read_at(offset, POINTER_WIDTH)?;

        let mut link = [0u8; POINTER_WIDTH];
        link.copy_from_slice(&raw);
        Ok(SectorIndex::from_le_bytes(link))
    }

    /// Write a full sector; short payloads are zero-padded
    pub fn write_sector(
        &mut self,
        index: SectorIndex,
        payload: &[u8],
        next: SectorIndex,
    ) -> Result<()> {
        let split = self.payload_size();
        if payload.len() > split {
            return Err(VfsError::InvalidConfiguration(format!(
                "Sector payload must be at most {} bytes, got {}",
                split,
                payload.len()
            )));
        }

        let mut raw = Vec::with_capacity(self.sector_size as usize);
        raw.extend_from_slice(payload);
        raw.resize(split, 0);
        raw.extend_from_slice(&next.to_le_bytes());

        let offset = self.offset(index);
        self.file.write_at(offset, &raw)
    }

    /// Overwrite only the link of an existing sector
    pub fn write_next(&mut self, index: SectorIndex, next: SectorIndex) -> Result<()> {
        let offset = self.offset(index) + self.payload_size() as u64;
        self.file.write_at(offset, &next.to_le_bytes())
    }

    /// Grow the container by exactly one sector
    pub fn append_sector(&mut self, payload: &[u8], next: SectorIndex) -> Result<SectorIndex> {
        let index = self.sector_count()?;
        self.write_sector(index, payload, next)?;
        Ok(index)
    }

    pub fn file(&self) -> &ContainerFile {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut ContainerFile {
        &mut self.file
    }
}

/// Payload bytes carried by a sector of the given size
pub fn payload_size(sector_size: u32) -> usize {
    sector_size as usize - POINTER_WIDTH
}

/// Number of sectors needed to hold `len` payload bytes
pub fn sectors_for(len: u64, sector_size: u32) -> u64 {
    len.div_ceil(payload_size(sector_size) as u64)
}

pub fn validate_sector_size(sector_size: u32) -> Result<()> {
    if sector_size < MIN_SECTOR_SIZE {
        return Err(VfsError::InvalidConfiguration(format!(
            "Sector size {} is below the minimum of {}",
            sector_size, MIN_SECTOR_SIZE
        )));
    }
    if sector_size > MAX_SECTOR_SIZE {
        return Err(VfsError::InvalidConfiguration(format!(
            "Sector size {} exceeds the maximum of {}",
            sector_size, MAX_SECTOR_SIZE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir, sector_size: u32) -> SectorStore {
        let file = ContainerFile::open_or_create(temp_dir.path().join("sectors.vfs")).unwrap();
        SectorStore::new(file, sector_size).unwrap()
    }

    #[test]
    fn test_append_grows_by_one_sector() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store(&temp_dir, 48);

        assert_eq!(store.sector_count().unwrap(), 0);
        assert_eq!(store.append_sector(b"first", END_OF_CHAIN).unwrap(), 0);
        assert_eq!(store.append_sector(b"second", 0).unwrap(), 1);
        assert_eq!(store.sector_count().unwrap(), 2);
        assert_eq!(store.file().len().unwrap(), 96);
    }

    #[test]
    fn test_short_payload_is_zero_padded() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store(&temp_dir, 32);

        store.write_sector(0, b"abc", 7).unwrap();
        let sector = store.read_sector(0).unwrap();

        assert_eq!(sector.payload.len(), 24);
        assert_eq!(&sector.payload[..3], b"abc");
        assert!(sector.payload[3..].iter().all(|&b| b == 0));
        assert_eq!(sector.next, 7);
        assert_ne!(sector.next, END_OF_CHAIN);
    }

    #[test]
    fn test_link_is_little_endian_u64() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store(&temp_dir, 32);

        store.write_sector(0, &[], 0x0102_0304).unwrap();
        let raw = store.file_mut().read_at(24, 8).unwrap();
        assert_eq!(raw, vec![0x04, 0x03, 0x02, 0x01, 0, 0, 0, 0]);

        store.write_next(0, END_OF_CHAIN).unwrap();
        assert_eq!(store.read_next(0).unwrap(), END_OF_CHAIN);
        assert_eq!(store.read_sector(0).unwrap().next, END_OF_CHAIN);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store(&temp_dir, 32);

        assert!(store.write_sector(0, &[0u8; 25], END_OF_CHAIN).is_err());
    }

    #[test]
    fn test_read_missing_sector_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store(&temp_dir, 32);

        assert!(matches!(store.read_sector(3), Err(VfsError::Io(_))));
    }

    #[test]
    fn test_sector_size_bounds() {
        assert!(validate_sector_size(31).is_err());
        assert!(validate_sector_size(32).is_ok());
        assert!(validate_sector_size(MAX_SECTOR_SIZE).is_ok());
        assert!(validate_sector_size(MAX_SECTOR_SIZE + 1).is_err());
    }

    #[test]
    fn test_sectors_for() {
        assert_eq!(sectors_for(0, 48), 0);
        assert_eq!(sectors_for(1, 48), 1);
        assert_eq!(sectors_for(40, 48), 1);
        assert_eq!(sectors_for(41, 48), 2);
        assert_eq!(sectors_for(100, 48), 3);
    }
}
