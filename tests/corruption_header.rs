//! Header and chain corruption detection
//!
//! Damaged containers must be reported as errors, never read as garbage.

use sector_vfs::{hash_name, CompressionMethod, Vfs, VfsConfig, VfsError};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SECTOR: u64 = 48;

/// Helper: overwrite bytes at an absolute offset
fn patch(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
}

/// Helper: build a container with a multi-sector header and one file chain
fn populated(temp_dir: &TempDir) -> PathBuf {
    let path = temp_dir.path().join("corrupt.vfs");
    let mut vfs = Vfs::create(&path, &VfsConfig::new(48, CompressionMethod::None)).unwrap();
    vfs.write("a", &[7u8; 100]).unwrap();
    for i in 0..3 {
        vfs.write(format!("extra{}", i), b"x").unwrap();
    }
    assert!(vfs.engine().header_sectors().len() > 1);
    path
}

#[test]
fn test_clean_container_opens() {
    let temp_dir = TempDir::new().unwrap();
    let path = populated(&temp_dir);
    let mut vfs = Vfs::open(&path).unwrap();
    assert_eq!(vfs.read("a").unwrap(), vec![7u8; 100]);
}

#[test]
fn test_missing_file_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = Vfs::open(temp_dir.path().join("missing.vfs"));
    assert!(matches!(result, Err(VfsError::Io(_))));
}

#[test]
fn test_tiny_file_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tiny.vfs");
    std::fs::write(&path, [1u8, 2, 3]).unwrap();

    assert!(matches!(Vfs::open(&path), Err(VfsError::CorruptHeader(_))));
}

#[test]
fn test_header_length_beyond_container() {
    let temp_dir = TempDir::new().unwrap();
    let path = populated(&temp_dir);
    patch(&path, 0, &(1u64 << 40).to_le_bytes());

    assert!(matches!(Vfs::open(&path), Err(VfsError::CorruptHeader(_))));
}

#[test]
fn test_header_length_below_minimum() {
    let temp_dir = TempDir::new().unwrap();
    let path = populated(&temp_dir);
    patch(&path, 0, &8u64.to_le_bytes());

    assert!(matches!(Vfs::open(&path), Err(VfsError::CorruptHeader(_))));
}

#[test]
fn test_sector_size_below_minimum() {
    let temp_dir = TempDir::new().unwrap();
    let path = populated(&temp_dir);
    patch(&path, 8, &16u32.to_le_bytes());

    assert!(matches!(Vfs::open(&path), Err(VfsError::CorruptHeader(_))));
}

#[test]
fn test_unknown_compression_tag() {
    let temp_dir = TempDir::new().unwrap();
    let path = populated(&temp_dir);
    patch(&path, 12, &7777u32.to_le_bytes());

    assert!(matches!(
        Vfs::open(&path),
        Err(VfsError::UnsupportedCompressionTag(7777))
    ));
}

#[test]
fn test_header_chain_ends_early() {
    let temp_dir = TempDir::new().unwrap();
    let path = populated(&temp_dir);
    // Cut the header chain after sector 0
    patch(&path, SECTOR - 8, &u64::MAX.to_le_bytes());

    assert!(matches!(Vfs::open(&path), Err(VfsError::CorruptHeader(_))));
}

#[test]
fn test_header_chain_points_outside() {
    let temp_dir = TempDir::new().unwrap();
    let path = populated(&temp_dir);
    patch(&path, SECTOR - 8, &10_000u64.to_le_bytes());

    assert!(matches!(Vfs::open(&path), Err(VfsError::CorruptHeader(_))));
}

#[test]
fn test_header_chain_cycle() {
    let temp_dir = TempDir::new().unwrap();
    let path = populated(&temp_dir);
    // Sector 0 links to itself
    patch(&path, SECTOR - 8, &0u64.to_le_bytes());

    assert!(Vfs::open(&path).is_err());
}

#[test]
fn test_broken_file_chain() {
    let temp_dir = TempDir::new().unwrap();
    let path = populated(&temp_dir);

    let start = {
        let vfs = Vfs::open(&path).unwrap();
        vfs.engine().entry(hash_name("a")).unwrap().start_sector
    };
    patch(&path, start * SECTOR + SECTOR - 8, &9_999u64.to_le_bytes());

    let mut vfs = Vfs::open(&path).unwrap();
    assert!(matches!(
        vfs.read("a"),
        Err(VfsError::BrokenChain { sector: 9_999 })
    ));

    let report = vfs.check_integrity().unwrap();
    assert_eq!(report.broken, vec![hash_name("a")]);
    assert!(!report.is_clean());

    // Untouched files are still readable
    assert_eq!(vfs.read("extra0").unwrap(), b"x");
}

#[test]
fn test_truncated_container() {
    let temp_dir = TempDir::new().unwrap();
    let path = populated(&temp_dir);
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(SECTOR + 4).unwrap();
    drop(file);

    assert!(matches!(Vfs::open(&path), Err(VfsError::CorruptHeader(_))));
}
