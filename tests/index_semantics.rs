//! Index Semantics Tests
//!
//! Tests for the ordered-container contract of every variant:
//! - Elements iterate in comparator order
//! - Unique variants reject equal keys, multi variants keep them in
//!   insertion order
//! - Search operations agree with each other
//! - Erasing elements never touches the flat file
//! - Searching by a type other than the stored key

use std::cmp::Ordering;
use std::ops::Bound;

use flatdex::index::{
    FnCompare, IndexConfig, IndexMap, IndexMultimap, IndexMultiset, IndexSet, KeyCompare, Natural,
    Reverse,
};
use flatdex::storage::OpenMode;
use proptest::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn create_config(dir: &TempDir, name: &str) -> IndexConfig {
    IndexConfig::in_dir(dir.path(), name).mode(OpenMode::Truncate)
}

fn create_map(dir: &TempDir, entries: &[(i32, i32)]) -> IndexMap<i32, i32> {
    let mut map = IndexMap::new();
    map.open(&create_config(dir, "map")).unwrap();
    for (k, v) in entries {
        map.insert(k, v).unwrap();
    }
    map
}

fn case_insensitive(a: &str, b: &str) -> Ordering {
    a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase())
}

type CaseInsensitive = FnCompare<fn(&str, &str) -> Ordering>;

/// Orders `i64` keys and searches them by `i32`.
#[derive(Debug, Default, Clone, Copy)]
struct Widening;

impl KeyCompare<i64> for Widening {
    fn compare(&self, key: &i64, search: &i64) -> Ordering {
        key.cmp(search)
    }
}

impl KeyCompare<i64, i32> for Widening {
    fn compare(&self, key: &i64, search: &i32) -> Ordering {
        key.cmp(&i64::from(*search))
    }
}

/// Matches every key that starts with the wrapped string.
struct Prefix<'a>(&'a str);

#[derive(Debug, Default, Clone, Copy)]
struct ByPrefix;

impl KeyCompare<str> for ByPrefix {
    fn compare(&self, key: &str, search: &str) -> Ordering {
        key.cmp(search)
    }
}

impl<'p> KeyCompare<str, Prefix<'p>> for ByPrefix {
    fn compare(&self, key: &str, search: &Prefix<'p>) -> Ordering {
        let n = key.len().min(search.0.len());
        key.as_bytes()[..n].cmp(search.0.as_bytes())
    }
}

// =============================================================================
// Map Scenario
// =============================================================================

#[test]
fn test_map_search_and_erase() {
    let dir = TempDir::new().unwrap();
    let mut map = create_map(&dir, &[(5, 50), (1, 10), (3, 30)]);

    assert_eq!(map.begin().unwrap().value().unwrap(), (1, 10));
    assert_eq!(map.lower_bound(&3).unwrap().value().unwrap(), (3, 30));
    assert_eq!(map.lower_bound(&2).unwrap().value().unwrap(), (3, 30));
    assert_eq!(map.upper_bound(&3).unwrap().value().unwrap(), (5, 50));
    assert!(map.upper_bound(&5).unwrap().is_end());

    assert_eq!(map.erase_key(&3).unwrap(), 1);
    assert_eq!(map.find(&3).unwrap(), map.end().unwrap());
    assert_eq!(map.erase_key(&3).unwrap(), 0);
    assert_eq!(map.len().unwrap(), 2);
}

#[test]
fn test_erase_leaves_flat_file_untouched() {
    let dir = TempDir::new().unwrap();
    let mut map = create_map(&dir, &[(1, 1), (2, 2), (3, 3)]);
    let size = map.file_size().unwrap();

    let slot = map.find(&2).unwrap().slot();
    let next = map.erase(slot).unwrap();
    assert_eq!(map.cursor_at(next).unwrap().value().unwrap(), (3, 3));

    map.clear().unwrap();
    assert!(map.is_empty().unwrap());
    assert_eq!(map.file_size().unwrap(), size);
}

#[test]
fn test_erase_range_of_slots() {
    let dir = TempDir::new().unwrap();
    let mut map = create_map(&dir, &[(1, 1), (2, 2), (3, 3), (4, 4)]);

    let first = map.lower_bound(&2).unwrap().slot();
    let last = map.upper_bound(&3).unwrap().slot();
    map.erase_range(first, last).unwrap();

    let keys: Vec<i32> = map.iter().unwrap().map(|r| r.unwrap().0).collect();
    assert_eq!(keys, vec![1, 4]);
}

// =============================================================================
// Uniqueness and Multiplicity
// =============================================================================

#[test]
fn test_multiset_of_strings() {
    let dir = TempDir::new().unwrap();
    let mut set: IndexMultiset<str> = IndexMultiset::new();
    set.open(&create_config(&dir, "words")).unwrap();

    set.insert("ab").unwrap();
    set.insert("ab").unwrap();
    set.insert("a").unwrap();

    assert_eq!(set.count("ab").unwrap(), 2);
    let words: Vec<&str> = set.iter().unwrap().map(Result::unwrap).collect();
    assert_eq!(words, vec!["a", "ab", "ab"]);
}

#[test]
fn test_unique_set_rejects_equal_key_but_appends_record() {
    let dir = TempDir::new().unwrap();
    let mut set: IndexSet<u64> = IndexSet::new();
    set.open(&create_config(&dir, "ids")).unwrap();

    let (first, inserted) = set.insert(&9).unwrap();
    assert!(inserted);
    let size = set.file_size().unwrap();

    let (again, inserted) = set.insert(&9).unwrap();
    assert!(!inserted);
    assert_eq!(again, first);
    assert_eq!(set.len().unwrap(), 1);
    assert_eq!(set.file_size().unwrap(), size + 8);
}

#[test]
fn test_equal_range_spans_every_duplicate() {
    let dir = TempDir::new().unwrap();
    let mut map: IndexMultimap<u32, str> = IndexMultimap::new();
    map.open(&create_config(&dir, "multimap")).unwrap();

    for (k, v) in [(2, "x"), (1, "a"), (2, "y"), (3, "c"), (2, "z")] {
        map.insert(&k, v).unwrap();
    }

    let (mut lower, upper) = map.equal_range(&2).unwrap();
    let mut values = Vec::new();
    while lower != upper {
        values.push(lower.value().unwrap().1);
        lower.move_next();
    }
    assert_eq!(values, vec!["x", "y", "z"]);
    assert_eq!(map.count(&2).unwrap(), 3);
    assert_eq!(map.count(&4).unwrap(), 0);

    let (lower, upper) = map.equal_range(&4).unwrap();
    assert_eq!(lower, upper);
    assert!(lower.is_end());
}

#[test]
fn test_erase_key_removes_all_duplicates() {
    let dir = TempDir::new().unwrap();
    let mut set: IndexMultiset<i16> = IndexMultiset::new();
    set.open(&create_config(&dir, "dups")).unwrap();
    for k in [4, -1, 4, 7, 4] {
        set.insert(&k).unwrap();
    }

    assert_eq!(set.erase_key(&4).unwrap(), 3);
    assert!(!set.contains(&4).unwrap());
    let rest: Vec<i16> = set.iter().unwrap().map(Result::unwrap).collect();
    assert_eq!(rest, vec![-1, 7]);
}

// =============================================================================
// Traversal
// =============================================================================

#[test]
fn test_forward_and_backward_agree() {
    let dir = TempDir::new().unwrap();
    let entries: Vec<(i32, i32)> = (0..200).map(|i| ((i * 37) % 101, i)).collect();
    let mut map: IndexMultimap<i32, i32> = IndexMultimap::new();
    map.open(&create_config(&dir, "walk")).unwrap();
    for (k, v) in &entries {
        map.insert(k, v).unwrap();
    }

    let forward: Vec<(i32, i32)> = map.iter().unwrap().map(Result::unwrap).collect();
    let mut backward: Vec<(i32, i32)> = map.iter().unwrap().rev().map(Result::unwrap).collect();
    backward.reverse();
    assert_eq!(forward, backward);
    assert_eq!(forward.len(), entries.len());
    assert!(forward.windows(2).all(|w| w[0].0 <= w[1].0));

    let mut cursor = map.end().unwrap();
    let mut walked = Vec::new();
    while cursor != map.begin().unwrap() {
        cursor.move_prev();
        walked.push(cursor.value().unwrap());
    }
    walked.reverse();
    assert_eq!(walked, forward);
}

#[test]
fn test_range_bounds() {
    let dir = TempDir::new().unwrap();
    let map = create_map(&dir, &[(10, 1), (20, 2), (30, 3), (40, 4)]);

    let keys = |lower: Bound<&i32>, upper: Bound<&i32>| -> Vec<i32> {
        map.range(lower, upper)
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect()
    };

    assert_eq!(keys(Bound::Included(&20), Bound::Included(&30)), vec![20, 30]);
    assert_eq!(keys(Bound::Excluded(&20), Bound::Unbounded), vec![30, 40]);
    assert_eq!(keys(Bound::Unbounded, Bound::Excluded(&20)), vec![10]);
    assert_eq!(keys(Bound::Included(&25), Bound::Excluded(&26)), Vec::<i32>::new());
    assert_eq!(keys(Bound::Included(&40), Bound::Included(&10)), Vec::<i32>::new());
}

// =============================================================================
// Comparators
// =============================================================================

#[test]
fn test_reverse_comparator_orders_descending() {
    let dir = TempDir::new().unwrap();
    let mut set: IndexSet<u32, Reverse<Natural>> = IndexSet::new();
    set.open(&create_config(&dir, "desc")).unwrap();
    for k in [5, 9, 1] {
        set.insert(&k).unwrap();
    }

    let keys: Vec<u32> = set.iter().unwrap().map(Result::unwrap).collect();
    assert_eq!(keys, vec![9, 5, 1]);
    assert_eq!(set.lower_bound(&6).unwrap().value().unwrap(), 5);
}

#[test]
fn test_custom_comparator_defines_equality() {
    let dir = TempDir::new().unwrap();
    let comp: CaseInsensitive = FnCompare(case_insensitive as fn(&str, &str) -> Ordering);
    let mut set: IndexSet<str, CaseInsensitive> = IndexSet::with_comparator(comp);
    set.open(&create_config(&dir, "ci")).unwrap();

    assert!(set.insert("Apple").unwrap().1);
    assert!(!set.insert("APPLE").unwrap().1);
    assert!(set.insert("banana").unwrap().1);

    assert_eq!(set.find("apple").unwrap().value().unwrap(), "Apple");
    assert_eq!(set.len().unwrap(), 2);
}

// =============================================================================
// Heterogeneous Search
// =============================================================================

#[test]
fn test_search_wide_keys_by_narrow_type() {
    let dir = TempDir::new().unwrap();
    let mut set: IndexSet<i64, Widening> = IndexSet::new();
    set.open(&create_config(&dir, "wide")).unwrap();
    for k in [1i64 << 40, -7, 12] {
        set.insert(&k).unwrap();
    }

    assert_eq!(set.find(&12i32).unwrap().value().unwrap(), 12);
    assert!(set.find(&13i32).unwrap().is_end());
    assert_eq!(set.lower_bound(&13i32).unwrap().value().unwrap(), 1 << 40);
    assert_eq!(set.upper_bound(&-7i32).unwrap().value().unwrap(), 12);
    assert!(set.upper_bound(&i32::MAX).unwrap().is_end());
    assert_eq!(set.erase_key(&-7i32).unwrap(), 1);
    assert_eq!(set.len().unwrap(), 2);
}

#[test]
fn test_prefix_search_spans_matching_keys() {
    let dir = TempDir::new().unwrap();
    let mut map: IndexMap<str, u32, ByPrefix> = IndexMap::new();
    map.open(&create_config(&dir, "prefix")).unwrap();
    for (name, n) in [("mars", 4), ("mercury", 1), ("maple", 9), ("venus", 2), ("earth", 3)] {
        map.insert(name, &n).unwrap();
    }

    assert_eq!(map.count(&Prefix("ma")).unwrap(), 2);
    let (mut lower, upper) = map.equal_range(&Prefix("ma")).unwrap();
    let mut names = Vec::new();
    while lower != upper {
        names.push(lower.value().unwrap().0);
        lower.move_next();
    }
    assert_eq!(names, vec!["maple", "mars"]);

    assert_eq!(map.get(&Prefix("ve")).unwrap(), Some(2));
    assert_eq!(map.get("earth").unwrap(), Some(3));
    assert_eq!(map.count(&Prefix("m")).unwrap(), 3);
    assert_eq!(map.count(&Prefix("z")).unwrap(), 0);
}

// =============================================================================
// Ordering Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_multiset_order_matches_sorted_vec(keys in prop::collection::vec(any::<i32>(), 0..200)) {
        let dir = TempDir::new().unwrap();
        let mut set: IndexMultiset<i32> = IndexMultiset::new();
        set.open(&create_config(&dir, "sorted")).unwrap();
        for k in &keys {
            set.insert(k).unwrap();
        }

        let mut expected = keys.clone();
        expected.sort();
        let actual: Vec<i32> = set.iter().unwrap().map(Result::unwrap).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn test_string_multiset_keeps_every_duplicate(
        keys in prop::collection::vec("[a-c]{0,3}", 0..100)
    ) {
        let dir = TempDir::new().unwrap();
        let mut set: IndexMultiset<str> = IndexMultiset::new();
        set.open(&create_config(&dir, "words")).unwrap();
        for k in &keys {
            set.insert(k.as_str()).unwrap();
        }

        let mut expected = keys.clone();
        expected.sort();
        let actual: Vec<String> = set
            .iter()
            .unwrap()
            .map(|r| r.unwrap().to_string())
            .collect();
        prop_assert_eq!(&actual, &expected);
        for k in &keys {
            let n = keys.iter().filter(|other| *other == k).count();
            prop_assert_eq!(set.count(k.as_str()).unwrap(), n);
        }
    }
}
