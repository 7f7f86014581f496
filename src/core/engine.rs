//! Main VFS engine
//!
//! Owns the container file and the in-memory copy of the header (directory
//! and free list). Every mutating call rewrites the header before returning.
//!
//! There is no journal. If a mutating call fails after data sectors were
//! written but before the header was persisted, the directory in memory and
//! the bytes on disk can disagree. Callers that need to recover should drop
//! the engine and reopen the container.

use crate::allocator::free_list::FreeSectorList;
use crate::allocator::{Allocator, ReleaseMode};
use crate::chain;
use crate::compression::CompressionMethod;
use crate::config::{VfsConfig, WriteOverflow};
use crate::directory::{Directory, FileEntry};
use crate::error::{Result, VfsError};
use crate::header::HeaderCodec;
use crate::integrity::{self, IntegrityReport};
use crate::io::ContainerFile;
use crate::sector::{self, SectorIndex, SectorStore, BOOTSTRAP_SECTOR};
use crate::session::{Session, SessionMode};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Single-file virtual store
///
/// Files are keyed by a 64-bit hash (see [`crate::hash`]).
pub struct VfsEngine {
    store: SectorStore,
    codec: HeaderCodec,
    allocator: Allocator,
    directory: Directory,
    compression: CompressionMethod,
    write_overflow: WriteOverflow,
    session: Session,
}

impl VfsEngine {
    /// Create a new container at `path`
    ///
    /// Fails if `path` already holds a non-empty file.
    pub fn create<P: AsRef<Path>>(path: P, config: &VfsConfig) -> Result<Self> {
        config.validate()?;

        let file = ContainerFile::open_or_create(path.as_ref())?;
        if !file.is_empty()? {
            return Err(VfsError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("Container already exists: {}", path.as_ref().display()),
            )));
        }

        Self::initialize(file, config)
    }

    /// Open an existing container
    ///
    /// Sector size and compression come from the persisted header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Opening container at {:?}", path.as_ref());

        let file = ContainerFile::open(path.as_ref())?;
        let (store, header, codec) = HeaderCodec::read(file)?;
        let allocator = Allocator::new(header.free_sectors, store.sector_count()?);

        info!(
            "Opened container: sector size {}, {} files, {} free sectors",
            header.sector_size,
            header.directory.len(),
            allocator.free_list().len()
        );

        Ok(VfsEngine {
            store,
            codec,
            allocator,
            directory: header.directory,
            compression: header.compression,
            write_overflow: WriteOverflow::default(),
            session: Session::Closed,
        })
    }

    /// Open the container at `path`, creating it if it is missing or empty
    ///
    /// The overflow policy from `config` applies either way.
    pub fn open_or_create<P: AsRef<Path>>(path: P, config: &VfsConfig) -> Result<Self> {
        let file = ContainerFile::open_or_create(path.as_ref())?;
        if file.is_empty()? {
            config.validate()?;
            return Self::initialize(file, config);
        }
        drop(file);

        let mut engine = Self::open(path)?;
        engine.write_overflow = config.write_overflow;
        Ok(engine)
    }

    fn initialize(file: ContainerFile, config: &VfsConfig) -> Result<Self> {
        info!(
            "Creating container at {:?} (sector size {}, compression tag {})",
            file.path(),
            config.sector_size,
            config.compression.tag()
        );

        let store = SectorStore::new(file, config.sector_size)?;

        let mut engine = VfsEngine {
            store,
            codec: HeaderCodec::new(),
            // Sector 0 is reserved for the header
            allocator: Allocator::new(FreeSectorList::new(), BOOTSTRAP_SECTOR + 1),
            directory: Directory::new(),
            compression: config.compression,
            write_overflow: config.write_overflow,
            session: Session::Closed,
        };
        engine.persist_header()?;

        Ok(engine)
    }

    fn persist_header(&mut self) -> Result<()> {
        self.codec.write(
            &mut self.store,
            &mut self.allocator,
            self.compression,
            &self.directory,
        )
    }

    fn sectors_for(&self, len: u64) -> u64 {
        sector::sectors_for(len, self.store.sector_size())
    }

    /// Acquire and fill a fresh chain, returning its head
    fn write_new_chain(&mut self, encoded: &[u8]) -> Result<SectorIndex> {
        let needed = self.sectors_for(encoded.len() as u64);
        let mut sectors = Vec::new();
        chain::extend(&mut self.allocator, &mut sectors, needed);
        chain::write(&mut self.store, &sectors, encoded)?;
        Ok(sectors[0])
    }

    /// Store `data` under `hash`, replacing any existing content
    ///
    /// Rewrites with the same sector count keep the existing chain. Writing
    /// empty data releases the chain and leaves a zero-length entry.
    ///
    /// On error the directory and the container may be left inconsistent.
    pub fn write_file(&mut self, hash: u64, data: &[u8]) -> Result<()> {
        let encoded = self.compression.encode(data)?;
        let stored_size = encoded.len() as u64;
        let uncompressed_size = data.len() as u64;

        match self.directory.find(hash) {
            None if encoded.is_empty() => {
                self.directory.insert(FileEntry::empty(hash));
            }
            None => {
                let start = self.write_new_chain(&encoded)?;
                self.directory
                    .insert(FileEntry::new(hash, stored_size, uncompressed_size, start));
            }
            Some(pos) => {
                let old = self.directory.entries()[pos];
                let entry = if encoded.is_empty() {
                    if !old.is_empty() {
                        self.allocator.release_chain(
                            &mut self.store,
                            old.start_sector,
                            ReleaseMode::Whole,
                        )?;
                    }
                    FileEntry::empty(hash)
                } else if old.is_empty() {
                    let start = self.write_new_chain(&encoded)?;
                    FileEntry::new(hash, stored_size, uncompressed_size, start)
                } else {
                    let old_sectors = self.sectors_for(old.stored_size);
                    let needed = self.sectors_for(stored_size);
                    let sectors = chain::plan_rewrite(
                        &mut self.store,
                        &mut self.allocator,
                        old.start_sector,
                        old_sectors,
                        needed,
                    )?;
                    chain::write(&mut self.store, &sectors, &encoded)?;
                    FileEntry::new(hash, stored_size, uncompressed_size, old.start_sector)
                };
                self.directory.replace(pos, entry);
            }
        }

        debug!(
            "Wrote {:#018x}: {} bytes ({} stored)",
            hash, uncompressed_size, stored_size
        );

        self.persist_header()
    }

    /// Append `data` to the file under `hash`, creating it if missing
    pub fn append_file(&mut self, hash: u64, data: &[u8]) -> Result<()> {
        let mut content = match self.read_file(hash) {
            Ok(content) => content,
            Err(VfsError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        content.extend_from_slice(data);
        self.write_file(hash, &content)
    }

    /// Read the whole file under `hash`
    pub fn read_file(&mut self, hash: u64) -> Result<Vec<u8>> {
        let entry = *self.directory.get(hash).ok_or(VfsError::NotFound(hash))?;

        let stored = if entry.is_empty() {
            Vec::new()
        } else {
            chain::read(
                &mut self.store,
                entry.start_sector,
                entry.stored_size,
                self.allocator.sector_count(),
            )?
        };

        debug!("Read {:#018x}: {} bytes", hash, entry.uncompressed_size);

        self.compression
            .decode(&stored, entry.uncompressed_size as usize)
    }

    /// Remove the file under `hash` and free its sectors
    ///
    /// On error the directory and the container may be left inconsistent.
    pub fn delete_file(&mut self, hash: u64) -> Result<()> {
        let pos = self.directory.find(hash).ok_or(VfsError::NotFound(hash))?;
        let entry = self.directory.remove(pos);

        let released = if entry.is_empty() {
            0
        } else {
            self.allocator
                .release_chain(&mut self.store, entry.start_sector, ReleaseMode::Whole)?
                .len()
        };

        debug!("Deleted {:#018x}, released {} sectors", hash, released);

        self.persist_header()
    }

    /// Uncompressed length of the file under `hash`
    pub fn get_len_file(&self, hash: u64) -> Result<u64> {
        self.directory
            .get(hash)
            .map(|entry| entry.uncompressed_size)
            .ok_or(VfsError::NotFound(hash))
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.directory.find(hash).is_some()
    }

    pub fn entry(&self, hash: u64) -> Option<&FileEntry> {
        self.directory.get(hash)
    }

    // Streaming sessions

    /// Start a read or write session on `hash`
    ///
    /// A read session loads the whole file now and fails if it is missing.
    pub fn open_session(&mut self, hash: u64, mode: SessionMode) -> Result<()> {
        if self.session.is_open() {
            return Err(VfsError::SessionState(format!(
                "A session is already open for {:#018x}",
                self.session.hash().unwrap_or_default()
            )));
        }

        self.session = match mode {
            SessionMode::Read => Session::reading(hash, self.read_file(hash)?),
            SessionMode::Write => Session::writing(hash),
        };

        debug!("Opened {:?} session for {:#018x}", mode, hash);
        Ok(())
    }

    /// Size the write buffer; allowed once per write session
    pub fn reserve(&mut self, expected_size: usize) -> Result<()> {
        self.session.reserve(expected_size)
    }

    /// Append to the write buffer, returning the number of bytes taken
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.session.write(data, self.write_overflow)
    }

    /// Read from the session cursor; fewer bytes than asked means end of file
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        self.session.read(out)
    }

    pub fn get_size(&self) -> Result<u64> {
        self.session.size()
    }

    pub fn session_mode(&self) -> Option<SessionMode> {
        self.session.mode()
    }

    /// End the session, committing a write session's buffer
    ///
    /// The session is closed afterwards even if the commit fails.
    pub fn close_session(&mut self) -> Result<()> {
        let session = std::mem::take(&mut self.session);
        match &session {
            Session::Closed => Err(VfsError::SessionState("No open session".to_string())),
            Session::Reading { hash, .. } => {
                debug!("Closed read session for {:#018x}", hash);
                Ok(())
            }
            Session::Writing { hash, .. } => {
                debug!("Committing write session for {:#018x}", hash);
                self.write_file(*hash, session.committed())
            }
        }
    }

    /// End the session without committing anything
    ///
    /// Returns whether a session was open.
    pub fn abort_session(&mut self) -> bool {
        match std::mem::take(&mut self.session) {
            Session::Closed => false,
            Session::Writing { hash, cursor, .. } if cursor > 0 => {
                warn!(
                    "Discarding {} uncommitted bytes for {:#018x}",
                    cursor, hash
                );
                true
            }
            _ => true,
        }
    }

    // Introspection

    pub fn entries(&self) -> &[FileEntry] {
        self.directory.entries()
    }

    pub fn free_sectors(&self) -> &[SectorIndex] {
        self.allocator.free_sectors()
    }

    pub fn sector_size(&self) -> u32 {
        self.store.sector_size()
    }

    pub fn compression(&self) -> CompressionMethod {
        self.compression
    }

    pub fn write_overflow(&self) -> WriteOverflow {
        self.write_overflow
    }

    pub fn set_write_overflow(&mut self, policy: WriteOverflow) {
        self.write_overflow = policy;
    }

    /// Number of sectors in the container
    pub fn sector_count(&self) -> u64 {
        self.allocator.sector_count()
    }

    /// Sectors holding the header, starting with sector 0
    pub fn header_sectors(&self) -> &[SectorIndex] {
        self.codec.chain()
    }

    pub fn path(&self) -> &Path {
        self.store.file().path()
    }

    /// Snapshot of the store's layout
    pub fn info(&self) -> StoreInfo {
        let entries = self.directory.entries();
        StoreInfo {
            path: self.path().to_path_buf(),
            sector_size: self.sector_size(),
            compression_tag: self.compression.tag(),
            sector_count: self.sector_count(),
            header_sectors: self.codec.chain().len() as u64,
            file_count: entries.len() as u64,
            free_sector_count: self.allocator.free_list().len() as u64,
            stored_bytes: entries.iter().map(|e| e.stored_size).sum(),
            uncompressed_bytes: entries.iter().map(|e| e.uncompressed_size).sum(),
        }
    }

    /// Walk every chain and cross-check it against the free list
    pub fn check_integrity(&mut self) -> Result<IntegrityReport> {
        integrity::check(
            &mut self.store,
            self.codec.chain(),
            &self.directory,
            self.allocator.free_list(),
            self.allocator.sector_count(),
        )
    }

    /// Flush container data to stable storage
    pub fn sync(&mut self) -> Result<()> {
        self.store.file_mut().sync()
    }
}

impl Drop for VfsEngine {
    fn drop(&mut self) {
        if let Session::Writing { hash, cursor, .. } = &self.session {
            warn!(
                "Dropping engine with an open write session for {:#018x}, {} bytes not committed",
                hash, cursor
            );
        }
    }
}

/// Store statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreInfo {
    pub path: PathBuf,
    pub sector_size: u32,
    pub compression_tag: u32,
    pub sector_count: u64,
    pub header_sectors: u64,
    pub file_count: u64,
    pub free_sector_count: u64,
    pub stored_bytes: u64,
    pub uncompressed_bytes: u64,
}
