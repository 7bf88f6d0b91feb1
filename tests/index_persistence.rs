//! Index Persistence and Lifecycle Tests
//!
//! Tests for:
//! - Reopening an index restores the same elements in the same order
//! - Signature and variant checks on open
//! - Read-only indexes reject mutation
//! - Sibling indexes over one shared flat file
//! - An index that hits a storage failure closes itself
//! - A bad position argument is rejected without closing the index

use std::fs;

use flatdex::index::{
    IndexConfig, IndexError, IndexMap, IndexMultiset, IndexSet, Natural, Reverse,
};
use flatdex::storage::{OpenMode, StorageError};
use flatdex::tree::VariantKind;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn create_config(dir: &TempDir, name: &str) -> IndexConfig {
    IndexConfig::in_dir(dir.path(), name).mode(OpenMode::Truncate)
}

const NAMES: [(&str, u32); 5] = [
    ("mercury", 1),
    ("venus", 2),
    ("earth", 3),
    ("mars", 4),
    ("jupiter", 5),
];

// =============================================================================
// Reopen
// =============================================================================

#[test]
fn test_reopen_restores_order() {
    let dir = TempDir::new().unwrap();
    let config = create_config(&dir, "planets");

    let before: Vec<(String, u32)> = {
        let mut map: IndexMap<str, u32> = IndexMap::new();
        map.open(&config).unwrap();
        for (name, n) in NAMES {
            map.insert(name, &n).unwrap();
        }
        let items = map
            .iter()
            .unwrap()
            .map(|r| r.map(|(k, v)| (k.to_string(), v)).unwrap())
            .collect();
        map.close().unwrap();
        items
    };

    let mut map: IndexMap<str, u32> = IndexMap::new();
    map.open(&config.clone().mode(OpenMode::ReadWrite)).unwrap();
    let after: Vec<(String, u32)> = map
        .iter()
        .unwrap()
        .map(|r| r.map(|(k, v)| (k.to_string(), v)).unwrap())
        .collect();

    assert_eq!(before, after);
    assert_eq!(after[0].0, "earth");
    assert_eq!(map.get("mars").unwrap(), Some(4));
}

#[test]
fn test_drop_persists_like_close() {
    let dir = TempDir::new().unwrap();
    let config = create_config(&dir, "dropped");
    {
        let mut set: IndexSet<u32> = IndexSet::new();
        set.open(&config).unwrap();
        for k in [3, 1, 2] {
            set.insert(&k).unwrap();
        }
    }

    let mut set: IndexSet<u32> = IndexSet::new();
    set.open(&config.clone().mode(OpenMode::ReadOnly)).unwrap();
    assert_eq!(set.len().unwrap(), 3);
    assert_eq!(set.header().unwrap().stats.element_count, 3);
}

#[test]
fn test_truncate_discards_previous_contents() {
    let dir = TempDir::new().unwrap();
    let config = create_config(&dir, "fresh");
    {
        let mut set: IndexSet<u32> = IndexSet::new();
        set.open(&config).unwrap();
        set.insert(&1).unwrap();
        set.close().unwrap();
    }

    let mut set: IndexSet<u32> = IndexSet::new();
    set.open(&config).unwrap();
    assert!(set.is_empty().unwrap());
    assert_eq!(set.file_size().unwrap(), flatdex::storage::HEADER_LEN);
}

#[test]
fn test_signature_mismatch_rejected() {
    let dir = TempDir::new().unwrap();
    let config = create_config(&dir, "signed").signature(7);
    {
        let mut set: IndexSet<u32> = IndexSet::new();
        set.open(&config).unwrap();
        set.close().unwrap();
    }

    let mut set: IndexSet<u32> = IndexSet::new();
    let err = set
        .open(&config.clone().mode(OpenMode::ReadWrite).signature(8))
        .unwrap_err();
    assert!(matches!(
        err,
        IndexError::SignatureMismatch {
            expected: 8,
            found: 7
        }
    ));
    assert_eq!(err.code(), "FLATDEX_SIGNATURE_MISMATCH");
    assert!(!set.is_open());
}

#[test]
fn test_kind_mismatch_rejected() {
    let dir = TempDir::new().unwrap();
    let config = create_config(&dir, "kinds");
    {
        let mut set: IndexSet<u32> = IndexSet::new();
        set.open(&config).unwrap();
        set.close().unwrap();
    }

    let mut multiset: IndexMultiset<u32> = IndexMultiset::new();
    let err = multiset
        .open(&config.clone().mode(OpenMode::ReadWrite))
        .unwrap_err();
    assert!(matches!(
        err,
        IndexError::KindMismatch {
            expected: VariantKind::Multiset,
            found: VariantKind::Set
        }
    ));
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_operations_before_open_and_after_close() {
    let dir = TempDir::new().unwrap();
    let mut set: IndexSet<u32> = IndexSet::new();
    assert!(matches!(set.len(), Err(IndexError::NotOpen)));
    set.close().unwrap();

    set.open(&create_config(&dir, "cycle")).unwrap();
    assert!(set.is_open());
    set.flush().unwrap();
    assert!(set.is_open());

    set.close().unwrap();
    set.close().unwrap();
    assert!(!set.is_open());
    assert!(matches!(set.insert(&1), Err(IndexError::NotOpen)));
}

#[test]
#[should_panic(expected = "already open")]
fn test_open_twice_panics() {
    let dir = TempDir::new().unwrap();
    let mut set: IndexSet<u32> = IndexSet::new();
    set.open(&create_config(&dir, "twice")).unwrap();
    let _ = set.open(&create_config(&dir, "twice"));
}

#[test]
fn test_read_only_rejects_mutation() {
    let dir = TempDir::new().unwrap();
    let config = create_config(&dir, "frozen");
    {
        let mut set: IndexSet<u32> = IndexSet::new();
        set.open(&config).unwrap();
        set.insert(&5).unwrap();
        set.close().unwrap();
    }

    let mut set: IndexSet<u32> = IndexSet::new();
    set.open(&config.clone().mode(OpenMode::ReadOnly)).unwrap();
    assert!(set.is_read_only().unwrap());
    assert!(set.contains(&5).unwrap());

    assert!(matches!(set.insert(&6), Err(IndexError::ReadOnly)));
    assert!(matches!(set.erase_key(&5), Err(IndexError::ReadOnly)));
    assert!(matches!(set.clear(), Err(IndexError::ReadOnly)));
    assert!(set.is_open());
    assert_eq!(set.len().unwrap(), 1);
}

#[test]
fn test_config_from_json_opens_index() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("index.json");
    let json = format!(
        r#"{{ "index_path": "{}", "file_path": "{}", "mode": "truncate", "node_size": 256 }}"#,
        dir.path().join("j.idx").display(),
        dir.path().join("j.dat").display()
    );
    fs::write(&config_path, json).unwrap();

    let config = IndexConfig::from_json_file(&config_path).unwrap();
    let mut set: IndexSet<u8> = IndexSet::new();
    set.open(&config).unwrap();
    set.insert(&1).unwrap();
    assert_eq!(set.stats().unwrap().node_size, 256);
}

// =============================================================================
// Shared Flat File
// =============================================================================

#[test]
fn test_sibling_indexes_share_one_file() {
    let dir = TempDir::new().unwrap();
    let by_name = create_config(&dir, "people").file_reserve(64 * 1024);
    let by_name_desc = IndexConfig::new(dir.path().join("people_desc.idx"), &by_name.file_path)
        .mode(OpenMode::Truncate);

    let mut names: IndexMap<str, u32> = IndexMap::new();
    names.open(&by_name).unwrap();
    let mut desc: IndexMap<str, u32, Reverse<Natural>> = IndexMap::new();
    desc.open_with_file(names.file().unwrap().clone(), &by_name_desc)
        .unwrap();

    names.insert("ada", &36).unwrap();
    let first = names.begin().unwrap().value().unwrap();
    let segments_before = names.file().unwrap().segment_count();

    // Grow the shared file past its first mapping while `first` is held.
    let padding = "x".repeat(1024);
    for i in 0..100u32 {
        let key = format!("{:03}-{}", i, padding);
        desc.insert(key.as_str(), &i).unwrap();
    }

    assert!(names.file().unwrap().segment_count() > segments_before);
    assert_eq!(first, ("ada", 36));
    assert_eq!(names.file_size().unwrap(), desc.file_size().unwrap());

    // A record written through one index can be indexed by the other.
    let newest = desc.begin().unwrap().position().unwrap();
    let (_, inserted) = names.insert_position(newest).unwrap();
    assert!(inserted);
    assert_eq!(names.len().unwrap(), 2);
    // Digits order before letters, so the new record comes first.
    assert_eq!(names.begin().unwrap().value().unwrap().1, 99);
}

#[test]
fn test_push_back_then_index() {
    let dir = TempDir::new().unwrap();
    let mut set: IndexMultiset<str> = IndexMultiset::new();
    set.open(&create_config(&dir, "pushed")).unwrap();

    let pos = set.push_back("later").unwrap();
    assert!(set.is_empty().unwrap());

    set.insert_position(pos).unwrap();
    assert_eq!(set.find("later").unwrap().position(), Some(pos));
}

// =============================================================================
// Fail-Closed
// =============================================================================

#[test]
fn test_storage_failure_closes_index() {
    let index_dir = TempDir::new().unwrap();
    let file_dir = TempDir::new().unwrap();
    let config = IndexConfig::new(
        index_dir.path().join("fragile.idx"),
        file_dir.path().join("fragile.dat"),
    )
    .mode(OpenMode::Truncate);

    let mut set: IndexSet<u32> = IndexSet::new();
    set.open(&config).unwrap();
    set.insert(&1).unwrap();

    fs::remove_dir_all(index_dir.path()).unwrap();

    let err = set.flush().unwrap_err();
    assert!(matches!(err, IndexError::Storage(_)));
    assert!(!set.is_open());
    assert!(matches!(set.len(), Err(IndexError::NotOpen)));
    assert!(matches!(set.insert(&2), Err(IndexError::NotOpen)));
}

#[test]
fn test_out_of_range_position_keeps_index_open() {
    let dir = TempDir::new().unwrap();
    let config = create_config(&dir, "bad_position");
    {
        let mut set: IndexSet<u32> = IndexSet::new();
        set.open(&config).unwrap();
        set.insert(&1).unwrap();
        let size = set.file_size().unwrap();

        for position in [1_000_000, size, 0] {
            let err = set.insert_position(position).unwrap_err();
            assert!(matches!(
                err,
                IndexError::Storage(StorageError::PositionOutOfRange { .. })
            ));
            assert!(!err.is_fatal());
        }

        assert!(set.is_open());
        set.insert(&2).unwrap();
    }

    let mut set: IndexSet<u32> = IndexSet::new();
    set.open(&config.clone().mode(OpenMode::ReadWrite)).unwrap();
    let keys: Vec<u32> = set.iter().unwrap().map(Result::unwrap).collect();
    assert_eq!(keys, vec![1, 2]);
}

#[test]
fn test_failed_index_persists_tree_on_close() {
    let index_dir = TempDir::new().unwrap();
    let file_dir = TempDir::new().unwrap();
    let config = IndexConfig::new(
        index_dir.path().join("salvaged.idx"),
        file_dir.path().join("salvaged.dat"),
    )
    .mode(OpenMode::Truncate);

    let mut set: IndexSet<u32> = IndexSet::new();
    set.open(&config).unwrap();
    for k in [3, 1, 2] {
        set.insert(&k).unwrap();
    }

    fs::remove_dir_all(index_dir.path()).unwrap();
    assert!(set.flush().is_err());
    assert!(!set.is_open());

    // The directory is back by the time the index is closed.
    fs::create_dir_all(index_dir.path()).unwrap();
    set.close().unwrap();

    let mut set: IndexSet<u32> = IndexSet::new();
    set.open(&config.clone().mode(OpenMode::ReadWrite)).unwrap();
    let keys: Vec<u32> = set.iter().unwrap().map(Result::unwrap).collect();
    assert_eq!(keys, vec![1, 2, 3]);
}
