#![no_main]
use libfuzzer_sys::fuzz_target;
use sector_vfs::Vfs;

// Arbitrary bytes as a container: opening and reading must fail cleanly, never panic
fuzz_target!(|data: &[u8]| {
    let temp_dir = match tempfile::TempDir::new() {
        Ok(dir) => dir,
        Err(_) => return,
    };
    let path = temp_dir.path().join("fuzz.vfs");
    if std::fs::write(&path, data).is_err() {
        return;
    }

    let mut vfs = match Vfs::open(&path) {
        Ok(vfs) => vfs,
        Err(_) => return,
    };

    let hashes: Vec<u64> = vfs.entries().iter().map(|e| e.hash).collect();
    for hash in hashes {
        let _ = vfs.engine_mut().read_file(hash);
    }
    let _ = vfs.check_integrity();
});
