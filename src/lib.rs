//! # sector-vfs - Virtual File Store in a Single Container File
//!
//! `sector-vfs` keeps many small virtual files inside one host file. The
//! container is split into fixed-size sectors; each file is a chain of
//! sectors linked by a trailing 8-byte index, and a header chain rooted at
//! sector 0 records the directory and the free sectors.
//!
//! - **Name-keyed access** through 64-bit XXH3 hashes of file names
//! - **Sector reuse**: freed sectors are handed out before the file grows
//! - **Whole-file compression** with zlib, Zstd or LZ4 (`compression` feature)
//! - **Streaming sessions** for reading and writing in chunks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sector_vfs::{Vfs, VfsConfig, Result};
//!
//! # fn main() -> Result<()> {
//! let mut vfs = Vfs::open_or_create("assets.vfs", &VfsConfig::default())?;
//!
//! vfs.write("textures/grass.png", b"...")?;
//! let content = vfs.read("textures/grass.png")?;
//! assert_eq!(vfs.len("textures/grass.png")?, content.len() as u64);
//!
//! vfs.delete("textures/grass.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Builder
//!
//! ```rust,no_run
//! use sector_vfs::{CompressionMethod, Result, VfsBuilder};
//!
//! # fn main() -> Result<()> {
//! let mut vfs = VfsBuilder::new()
//!     .path("/data/levels.vfs")
//!     .sector_size(4096)
//!     .compression(CompressionMethod::Zstd)
//!     .create()?;
//!
//! vfs.write("level1.bin", &[0u8; 10_000])?;
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use crate::core::{
    allocator, chain, compression, config, directory, engine, error, hash, header, integrity, io,
    sector, session,
};

// Re-export core types that users need
pub use crate::core::{
    compression::CompressionMethod,
    config::{VfsConfig, WriteOverflow},
    directory::FileEntry,
    engine::{StoreInfo, VfsEngine},
    error::{Result, VfsError},
    hash::{hash_bytes, hash_name},
    integrity::IntegrityReport,
    sector::{SectorIndex, DEFAULT_SECTOR_SIZE, END_OF_CHAIN, MIN_SECTOR_SIZE},
    session::SessionMode,
};

use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name-keyed store
///
/// Wraps [`VfsEngine`] and hashes file names on the way in.
///
/// # Examples
///
/// ```rust,no_run
/// use sector_vfs::{Vfs, VfsConfig};
///
/// let mut vfs = Vfs::create("data.vfs", &VfsConfig::default())?;
/// vfs.write("file.txt", b"content")?;
/// let data = vfs.read("file.txt")?;
/// # Ok::<(), sector_vfs::VfsError>(())
/// ```
pub struct Vfs {
    inner: VfsEngine,
}

impl Vfs {
    /// Create a new container; fails if `path` holds a non-empty file
    pub fn create<P: AsRef<Path>>(path: P, config: &VfsConfig) -> Result<Self> {
        let inner = VfsEngine::create(path, config)?;
        Ok(Vfs { inner })
    }

    /// Open an existing container
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = VfsEngine::open(path)?;
        Ok(Vfs { inner })
    }

    /// Open the container at `path`, creating it if it is missing or empty
    pub fn open_or_create<P: AsRef<Path>>(path: P, config: &VfsConfig) -> Result<Self> {
        let inner = VfsEngine::open_or_create(path, config)?;
        Ok(Vfs { inner })
    }

    /// Write a whole file, replacing any previous content
    ///
    /// ```rust,no_run
    /// # use sector_vfs::{Vfs, VfsConfig};
    /// # let mut vfs = Vfs::create("data.vfs", &VfsConfig::default())?;
    /// vfs.write("documents/report.txt", b"Hello, World!")?;
    /// # Ok::<(), sector_vfs::VfsError>(())
    /// ```
    pub fn write<N: AsRef<str>>(&mut self, name: N, content: &[u8]) -> Result<()> {
        let name = name.as_ref();
        debug!("Writing {} bytes to {}", content.len(), name);
        self.inner.write_file(hash_name(name), content)
    }

    /// Append to a file, creating it if missing
    pub fn append<N: AsRef<str>>(&mut self, name: N, content: &[u8]) -> Result<()> {
        let name = name.as_ref();
        debug!("Appending {} bytes to {}", content.len(), name);
        self.inner.append_file(hash_name(name), content)
    }

    pub fn read<N: AsRef<str>>(&mut self, name: N) -> Result<Vec<u8>> {
        let name = name.as_ref();
        debug!("Reading {}", name);
        self.inner.read_file(hash_name(name))
    }

    pub fn delete<N: AsRef<str>>(&mut self, name: N) -> Result<()> {
        let name = name.as_ref();
        debug!("Deleting {}", name);
        self.inner.delete_file(hash_name(name))
    }

    /// Uncompressed length of a file
    pub fn len<N: AsRef<str>>(&self, name: N) -> Result<u64> {
        self.inner.get_len_file(hash_name(name.as_ref()))
    }

    pub fn exists<N: AsRef<str>>(&self, name: N) -> bool {
        self.inner.contains(hash_name(name.as_ref()))
    }

    /// Stream a file out in chunks
    ///
    /// The whole file is loaded when the reader is created. Dropping the
    /// reader ends the session.
    ///
    /// ```rust,no_run
    /// # use sector_vfs::{Vfs, VfsConfig};
    /// # use std::io::Read;
    /// # let mut vfs = Vfs::open("data.vfs")?;
    /// let mut reader = vfs.open_read("big.bin")?;
    /// let mut chunk = [0u8; 256];
    /// while reader.read(&mut chunk)? > 0 {}
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open_read<N: AsRef<str>>(&mut self, name: N) -> Result<FileReader<'_>> {
        self.inner
            .open_session(hash_name(name.as_ref()), SessionMode::Read)?;
        let size = self.inner.get_size()?;
        Ok(FileReader {
            engine: &mut self.inner,
            size,
        })
    }

    /// Stream a file in with a buffer of `expected_size` bytes
    ///
    /// Nothing is stored until [`FileWriter::commit`]. Dropping the writer
    /// without committing discards the buffer.
    pub fn open_write<N: AsRef<str>>(
        &mut self,
        name: N,
        expected_size: usize,
    ) -> Result<FileWriter<'_>> {
        self.inner
            .open_session(hash_name(name.as_ref()), SessionMode::Write)?;
        if let Err(e) = self.inner.reserve(expected_size) {
            self.inner.abort_session();
            return Err(e);
        }
        Ok(FileWriter {
            engine: &mut self.inner,
        })
    }

    pub fn entries(&self) -> &[FileEntry] {
        self.inner.entries()
    }

    pub fn info(&self) -> StoreInfo {
        self.inner.info()
    }

    pub fn check_integrity(&mut self) -> Result<IntegrityReport> {
        self.inner.check_integrity()
    }

    pub fn sync(&mut self) -> Result<()> {
        self.inner.sync()
    }

    /// Hash-keyed engine underneath
    pub fn engine(&self) -> &VfsEngine {
        &self.inner
    }

    pub fn engine_mut(&mut self) -> &mut VfsEngine {
        &mut self.inner
    }
}

fn to_io_error(err: VfsError) -> std::io::Error {
    match err {
        VfsError::Io(e) => e,
        other => std::io::Error::other(other),
    }
}

/// Read side of a streaming session
pub struct FileReader<'a> {
    engine: &'a mut VfsEngine,
    size: u64,
}

impl FileReader<'_> {
    /// Length of the file being read
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl std::io::Read for FileReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.engine.read(buf).map_err(to_io_error)
    }
}

impl Drop for FileReader<'_> {
    fn drop(&mut self) {
        self.engine.abort_session();
    }
}

/// Write side of a streaming session
pub struct FileWriter<'a> {
    engine: &'a mut VfsEngine,
}

impl FileWriter<'_> {
    /// Bytes written so far
    pub fn written(&self) -> u64 {
        self.engine.get_size().unwrap_or(0)
    }

    /// Store what was written and end the session
    pub fn commit(self) -> Result<()> {
        self.engine.close_session()
    }
}

impl std::io::Write for FileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.engine.write(buf).map_err(to_io_error)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for FileWriter<'_> {
    fn drop(&mut self) {
        self.engine.abort_session();
    }
}

/// Builder for opening or creating a store
///
/// Explicit settings win over values from a config file.
///
/// # Examples
///
/// ```rust,no_run
/// use sector_vfs::{VfsBuilder, WriteOverflow};
///
/// # fn main() -> sector_vfs::Result<()> {
/// let vfs = VfsBuilder::new()
///     .path("/data/store.vfs")
///     .config_file("/etc/store.toml")
///     .write_overflow(WriteOverflow::Reject)
///     .open_or_create()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct VfsBuilder {
    path: Option<PathBuf>,
    config_file: Option<PathBuf>,
    sector_size: Option<u32>,
    compression: Option<CompressionMethod>,
    write_overflow: Option<WriteOverflow>,
}

impl VfsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Container file location (required)
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Load defaults from a TOML file
    pub fn config_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Sector size for a new container
    pub fn sector_size(mut self, sector_size: u32) -> Self {
        self.sector_size = Some(sector_size);
        self
    }

    /// Compression for a new container
    pub fn compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn write_overflow(mut self, policy: WriteOverflow) -> Self {
        self.write_overflow = Some(policy);
        self
    }

    /// Resolve the effective configuration
    pub fn config(&self) -> Result<VfsConfig> {
        let mut config = match &self.config_file {
            Some(path) => {
                debug!("Loading config from {:?}", path);
                VfsConfig::from_toml_file(path)?
            }
            None => VfsConfig::default(),
        };

        if let Some(sector_size) = self.sector_size {
            config.sector_size = sector_size;
        }
        if let Some(compression) = self.compression {
            config.compression = compression;
        }
        if let Some(policy) = self.write_overflow {
            config.write_overflow = policy;
        }

        config.validate()?;
        Ok(config)
    }

    fn require_path(&self) -> Result<&Path> {
        self.path.as_deref().ok_or_else(|| {
            VfsError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path must be set",
            ))
        })
    }

    pub fn create(self) -> Result<Vfs> {
        let config = self.config()?;
        let path = self.require_path()?;
        info!("Building store at {:?}", path);
        Vfs::create(path, &config)
    }

    /// Open an existing container; only the overflow policy is applied
    pub fn open(self) -> Result<Vfs> {
        let config = self.config()?;
        let path = self.require_path()?;
        let mut vfs = Vfs::open(path)?;
        vfs.engine_mut().set_write_overflow(config.write_overflow);
        Ok(vfs)
    }

    pub fn open_or_create(self) -> Result<Vfs> {
        let config = self.config()?;
        let path = self.require_path()?;
        Vfs::open_or_create(path, &config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_create_and_write() -> Result<()> {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("test.vfs");

        let mut vfs = Vfs::create(&path, &VfsConfig::default())?;
        vfs.write("test.txt", b"hello")?;

        assert_eq!(vfs.read("test.txt")?, b"hello");
        assert!(vfs.exists("test.txt"));
        assert!(!vfs.exists("other.txt"));
        assert_eq!(vfs.len("test.txt")?, 5);

        Ok(())
    }

    #[test]
    fn test_builder() -> Result<()> {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("builder.vfs");

        let vfs = VfsBuilder::new().path(&path).sector_size(128).create()?;
        assert_eq!(vfs.info().sector_size, 128);
        assert_eq!(vfs.info().sector_count, 1);

        Ok(())
    }

    #[test]
    fn test_builder_requires_path() {
        assert!(matches!(VfsBuilder::new().create(), Err(VfsError::Io(_))));
    }

    #[test]
    fn test_builder_config_file_overrides() -> Result<()> {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let toml_path = temp_dir.path().join("vfs.toml");
        std::fs::write(&toml_path, "sector_size = 64\nwrite_overflow = \"reject\"\n").unwrap();

        let builder = VfsBuilder::new()
            .config_file(&toml_path)
            .write_overflow(WriteOverflow::Truncate);
        let config = builder.config()?;
        assert_eq!(config.sector_size, 64);
        assert_eq!(config.write_overflow, WriteOverflow::Truncate);

        Ok(())
    }

    #[test]
    fn test_stream_reader_and_writer() -> Result<()> {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut vfs = Vfs::create(temp_dir.path().join("stream.vfs"), &VfsConfig::default())?;

        let data: Vec<u8> = (0..=255).cycle().take(1000).collect();
        let mut writer = vfs.open_write("stream.bin", data.len())?;
        for chunk in data.chunks(7) {
            writer.write_all(chunk)?;
        }
        assert_eq!(writer.written(), 1000);
        writer.commit()?;

        let mut reader = vfs.open_read("stream.bin")?;
        assert_eq!(reader.size(), 1000);
        let mut out = Vec::new();
        reader.read_to_end(&mut out)?;
        drop(reader);

        assert_eq!(out, data);
        assert!(vfs.engine().session_mode().is_none());
        Ok(())
    }

    #[test]
    fn test_dropped_writer_discards() -> Result<()> {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut vfs = Vfs::create(temp_dir.path().join("drop.vfs"), &VfsConfig::default())?;

        {
            let mut writer = vfs.open_write("never.bin", 4)?;
            writer.write_all(b"data")?;
        }

        assert!(!vfs.exists("never.bin"));
        assert!(vfs.engine().session_mode().is_none());
        Ok(())
    }

    #[test]
    fn test_writer_overflow_surfaces_as_io_error() -> Result<()> {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut vfs = Vfs::create(temp_dir.path().join("full.vfs"), &VfsConfig::default())?;

        let mut writer = vfs.open_write("small.bin", 3)?;
        let err = writer.write_all(b"too long").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::WriteZero);
        writer.commit()?;

        assert_eq!(vfs.read("small.bin")?, b"too");
        Ok(())
    }
}
