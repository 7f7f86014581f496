#![no_main]
use libfuzzer_sys::{fuzz_target, arbitrary::{Arbitrary, Unstructured}};
use sector_vfs::{CompressionMethod, VfsConfig, VfsEngine};

#[derive(Debug, Arbitrary)]
enum FileOp {
    Write { key: u8, data: Vec<u8> },
    Delete { key: u8 },
}

// Random write/delete sequences must keep every sector accounted for
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);

    let ops: Vec<FileOp> = match u.arbitrary() {
        Ok(ops) => ops,
        Err(_) => return,
    };

    let temp_dir = match tempfile::TempDir::new() {
        Ok(dir) => dir,
        Err(_) => return,
    };
    let config = VfsConfig::new(32, CompressionMethod::None);
    let mut engine = match VfsEngine::create(temp_dir.path().join("fuzz.vfs"), &config) {
        Ok(engine) => engine,
        Err(_) => return,
    };

    for op in ops.iter().take(32) {
        match op {
            FileOp::Write { key, data } => {
                engine.write_file(*key as u64 % 8, data).unwrap();
                assert_eq!(engine.read_file(*key as u64 % 8).unwrap(), *data);
            }
            FileOp::Delete { key } => {
                let _ = engine.delete_file(*key as u64 % 8);
            }
        }
    }

    assert!(engine.check_integrity().unwrap().is_clean());
});
