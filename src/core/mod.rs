//! Storage engine internals
//!
//! - [`sector`] - fixed-size sectors with a trailing 8-byte link
//! - [`allocator`] - free list and sector reuse
//! - [`chain`] - reading and writing linked sector chains
//! - [`directory`] - sorted hash → file entry table
//! - [`header`] - persisted header in the chain at sector 0
//! - [`compression`] - whole-file codecs selected by tag
//! - [`engine`] - whole-buffer and streaming file API
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Sector 0..: header chain                     │
//! │  - sector size, compression tag              │
//! │  - directory entries, free sector list       │
//! ├──────────────────────────────────────────────┤
//! │ Sector N: [payload ........][next: u64 LE]   │
//! │  - one chain per non-empty file              │
//! │  - u64::MAX ends a chain                     │
//! └──────────────────────────────────────────────┘
//! ```

pub mod allocator;
pub mod chain;
pub mod compression;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod hash;
pub mod header;
pub mod integrity;
pub mod io;
pub mod sector;
pub mod session;

pub use engine::VfsEngine;
