//! Store configuration
//!
//! Creation parameters can come from code or from a TOML file:
//!
//! ```toml
//! sector_size = 4096
//! compression = 100      # zstd
//! write_overflow = "reject"
//! ```
//!
//! `sector_size` and `compression` only matter when a container is created.
//! Opening an existing container always uses the persisted values.

use crate::compression::CompressionMethod;
use crate::error::{Result, VfsError};
use crate::sector::{self, DEFAULT_SECTOR_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a streaming write does with bytes that do not fit the reserved buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOverflow {
    /// Copy what fits and report the short count
    #[default]
    Truncate,
    /// Fail with [`VfsError::CapacityExceeded`] and copy nothing
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Bytes per sector including the 8-byte link
    pub sector_size: u32,

    /// Compression applied to every file, persisted as its tag
    pub compression: CompressionMethod,

    pub write_overflow: WriteOverflow,
}

impl Default for VfsConfig {
    fn default() -> Self {
        VfsConfig {
            sector_size: DEFAULT_SECTOR_SIZE,
            compression: CompressionMethod::None,
            write_overflow: WriteOverflow::Truncate,
        }
    }
}

impl VfsConfig {
    pub fn new(sector_size: u32, compression: CompressionMethod) -> Self {
        VfsConfig {
            sector_size,
            compression,
            ..Default::default()
        }
    }

    pub fn with_write_overflow(mut self, policy: WriteOverflow) -> Self {
        self.write_overflow = policy;
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: VfsConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Check the values are usable for creating a container
    pub fn validate(&self) -> Result<()> {
        sector::validate_sector_size(self.sector_size)?;
        CompressionMethod::from_tag(self.compression.tag()).map_err(|_| {
            VfsError::InvalidConfiguration(format!(
                "Compression tag {} is not supported by this build",
                self.compression.tag()
            ))
        })?;
        Ok(())
    }
}
