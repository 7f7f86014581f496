//! File name keys
//!
//! Virtual files are addressed by a 64-bit XXH3 hash of their name. Two
//! names with the same hash share one directory entry; nothing detects that.

use xxhash_rust::xxh3::xxh3_64;

/// Key for a UTF-8 file name
pub fn hash_name(name: &str) -> u64 {
    hash_bytes(name.as_bytes())
}

/// Key for an arbitrary byte-string name
pub fn hash_bytes(name: &[u8]) -> u64 {
    xxh3_64(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_name("docs/readme.txt"), hash_name("docs/readme.txt"));
        assert_eq!(hash_name("a"), hash_bytes(b"a"));
    }

    #[test]
    fn test_distinct_names_distinct_keys() {
        let names = ["a", "b", "A", "a ", "file1", "file2", ""];
        let mut keys: Vec<u64> = names.iter().map(|n| hash_name(n)).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), names.len());
    }
}
