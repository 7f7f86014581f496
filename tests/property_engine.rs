//! Property-based tests for engine correctness
//!
//! Random write/delete sequences are checked against an in-memory model.

use proptest::prelude::*;
use sector_vfs::{CompressionMethod, SessionMode, VfsConfig, VfsEngine, VfsError};
use std::collections::HashMap;
use tempfile::TempDir;

#[derive(Debug, Clone)]
enum Op {
    Write(u64, Vec<u8>),
    Delete(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u64..8, prop::collection::vec(any::<u8>(), 0..300))
            .prop_map(|(key, data)| Op::Write(key, data)),
        1 => (0u64..8).prop_map(Op::Delete),
    ]
}

fn sector_size_strategy() -> impl Strategy<Value = u32> {
    prop_oneof![Just(32u32), Just(48), Just(100), Just(512)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_round_trip(
        sector_size in sector_size_strategy(),
        data in prop::collection::vec(any::<u8>(), 0..2000)
    ) {
        let temp_dir = TempDir::new().unwrap();
        let config = VfsConfig::new(sector_size, CompressionMethod::None);
        let mut engine = VfsEngine::create(temp_dir.path().join("rt.vfs"), &config).unwrap();

        engine.write_file(42, &data).unwrap();
        prop_assert_eq!(engine.read_file(42).unwrap(), data.clone());
        prop_assert_eq!(engine.get_len_file(42).unwrap(), data.len() as u64);
    }

    #[test]
    fn prop_operations_match_model(
        sector_size in sector_size_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..40)
    ) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.vfs");
        let config = VfsConfig::new(sector_size, CompressionMethod::None);
        let mut engine = VfsEngine::create(&path, &config).unwrap();
        let mut model: HashMap<u64, Vec<u8>> = HashMap::new();

        for op in &ops {
            match op {
                Op::Write(key, data) => {
                    engine.write_file(*key, data).unwrap();
                    model.insert(*key, data.clone());
                }
                Op::Delete(key) => {
                    let result = engine.delete_file(*key);
                    if model.remove(key).is_some() {
                        prop_assert!(result.is_ok());
                    } else {
                        prop_assert!(matches!(result, Err(VfsError::NotFound(_))));
                    }
                }
            }

            let hashes: Vec<u64> = engine.entries().iter().map(|e| e.hash).collect();
            prop_assert!(hashes.windows(2).all(|w| w[0] < w[1]), "directory not ascending");
            prop_assert_eq!(hashes.len(), model.len());
        }

        let report = engine.check_integrity().unwrap();
        prop_assert!(report.is_clean(), "{:?}", report);
        drop(engine);

        let mut engine = VfsEngine::open(&path).unwrap();
        for (key, data) in &model {
            prop_assert_eq!(&engine.read_file(*key).unwrap(), data);
        }
        prop_assert!(engine.check_integrity().unwrap().is_clean());
    }

    #[test]
    fn prop_streaming_equivalence(
        data in prop::collection::vec(any::<u8>(), 0..1500),
        write_chunk in 1usize..200,
        read_chunk in 1usize..200
    ) {
        let temp_dir = TempDir::new().unwrap();
        let config = VfsConfig::new(64, CompressionMethod::None);
        let mut engine = VfsEngine::create(temp_dir.path().join("stream.vfs"), &config).unwrap();

        engine.write_file(1, &data).unwrap();

        engine.open_session(2, SessionMode::Write).unwrap();
        engine.reserve(data.len()).unwrap();
        for chunk in data.chunks(write_chunk) {
            prop_assert_eq!(engine.write(chunk).unwrap(), chunk.len());
        }
        engine.close_session().unwrap();

        prop_assert_eq!(engine.entry(1).unwrap().stored_size, engine.entry(2).unwrap().stored_size);
        prop_assert_eq!(engine.read_file(2).unwrap(), data.clone());

        engine.open_session(2, SessionMode::Read).unwrap();
        let mut out = Vec::new();
        let mut buf = vec![0u8; read_chunk];
        loop {
            let n = engine.read(&mut buf).unwrap();
            out.extend_from_slice(&buf[..n]);
            if n < read_chunk {
                break;
            }
        }
        engine.close_session().unwrap();
        prop_assert_eq!(out, data);
    }
}

#[cfg(feature = "compression")]
proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_compressed_round_trip(
        tag in prop_oneof![Just(1u32), Just(9), Just(100), Just(200)],
        data in prop::collection::vec(0u8..4, 0..3000)
    ) {
        let temp_dir = TempDir::new().unwrap();
        let method = CompressionMethod::from_tag(tag).unwrap();
        let config = VfsConfig::new(64, method);
        let mut engine = VfsEngine::create(temp_dir.path().join("packed.vfs"), &config).unwrap();

        engine.write_file(7, &data).unwrap();
        let entry = *engine.entry(7).unwrap();
        prop_assert_eq!(entry.uncompressed_size, data.len() as u64);
        prop_assert_eq!(entry.stored_size, method.encode(&data).unwrap().len() as u64);
        prop_assert_eq!(engine.read_file(7).unwrap(), data);
    }
}
