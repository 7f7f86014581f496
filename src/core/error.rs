use thiserror::Error;

#[derive(Error, Debug)]
pub enum VfsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt header: {0}")]
    CorruptHeader(String),

    #[error("File not found: {0:#018x}")]
    NotFound(u64),

    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("Unsupported compression tag: {0}")]
    UnsupportedCompressionTag(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid session state: {0}")]
    SessionState(String),

    #[error("Session buffer full: {requested} bytes requested, {remaining} remaining")]
    CapacityExceeded { requested: usize, remaining: usize },

    #[error("Sector chain broken at sector {sector}")]
    BrokenChain { sector: u64 },

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, VfsError>;
