//! Ordered-unique path list operations.
//!
//! `files_touched` is an ordered sequence without duplicates; these helpers
//! keep that shape while merging checkpoint results and computing commit
//! overlap.

use std::collections::HashSet;

/// Merge newly touched paths into `existing`, preserving first-seen order,
/// then drop every path in `deleted`.
pub fn merge_touched(existing: &mut Vec<String>, added: &[String], deleted: &[String]) {
    let mut seen: HashSet<String> = existing.iter().cloned().collect();
    for path in added {
        if seen.insert(path.clone()) {
            existing.push(path.clone());
        }
    }
    if !deleted.is_empty() {
        let gone: HashSet<&str> = deleted.iter().map(String::as_str).collect();
        existing.retain(|p| !gone.contains(p.as_str()));
    }
}

/// `files \ exclude`, preserving the order of `files` for survivors.
pub fn subtract(files: &[String], exclude: &[String]) -> Vec<String> {
    if exclude.is_empty() {
        return files.to_vec();
    }
    let excluded: HashSet<&str> = exclude.iter().map(String::as_str).collect();
    files
        .iter()
        .filter(|p| !excluded.contains(p.as_str()))
        .cloned()
        .collect()
}

/// Whether any touched path appears in the changed set.
///
/// Empty-safe: an empty `touched` list means no overlap, never "all".
pub fn overlap(touched: &[String], changed: &[String]) -> bool {
    if touched.is_empty() || changed.is_empty() {
        return false;
    }
    let changed_set: HashSet<&str> = changed.iter().map(String::as_str).collect();
    touched.iter().any(|p| changed_set.contains(p.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_preserves_order_and_dedupes() {
        let mut touched = paths(&["a.txt", "b.txt"]);
        merge_touched(&mut touched, &paths(&["b.txt", "c.txt", "c.txt"]), &[]);
        assert_eq!(touched, paths(&["a.txt", "b.txt", "c.txt"]));
    }

    #[test]
    fn test_merge_drops_deleted_paths() {
        let mut touched = paths(&["a.txt", "b.txt"]);
        merge_touched(&mut touched, &paths(&["c.txt"]), &paths(&["a.txt"]));
        assert_eq!(touched, paths(&["b.txt", "c.txt"]));
    }

    #[test]
    fn test_merge_into_empty() {
        let mut touched = Vec::new();
        merge_touched(&mut touched, &paths(&["x", "y"]), &[]);
        assert_eq!(touched, paths(&["x", "y"]));
    }

    #[test]
    fn test_subtract_keeps_order() {
        let result = subtract(&paths(&["a", "b", "c", "d"]), &paths(&["b", "d"]));
        assert_eq!(result, paths(&["a", "c"]));
    }

    #[test]
    fn test_subtract_empty_exclude_is_identity() {
        let files = paths(&["a", "b"]);
        assert_eq!(subtract(&files, &[]), files);
    }

    #[test]
    fn test_subtract_full_exclusion_is_empty() {
        let files = paths(&["a", "b"]);
        assert!(subtract(&files, &files).is_empty());
    }

    #[test]
    fn test_overlap_empty_touched_never_overlaps() {
        assert!(!overlap(&[], &paths(&["a"])));
    }

    #[test]
    fn test_overlap_disjoint() {
        assert!(!overlap(&paths(&["a"]), &paths(&["b"])));
    }

    #[test]
    fn test_overlap_shared_path() {
        assert!(overlap(&paths(&["a", "b"]), &paths(&["b", "c"])));
    }
}

#[cfg(test)]
mod subtract_laws {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn survivors_keep_relative_order(
            files in proptest::collection::vec("[a-d]{1,3}", 0..12),
            exclude in proptest::collection::vec("[a-d]{1,3}", 0..6),
        ) {
            let result = subtract(&files, &exclude);
            // Every survivor comes from `files`, none is excluded, and the
            // original order is preserved.
            let mut cursor = files.iter();
            for item in &result {
                prop_assert!(!exclude.contains(item));
                prop_assert!(cursor.any(|f| f == item));
            }
        }

        #[test]
        fn empty_exclude_is_identity(files in proptest::collection::vec("[a-z]{1,5}", 0..10)) {
            prop_assert_eq!(subtract(&files, &[]), files);
        }

        #[test]
        fn full_exclusion_is_empty(files in proptest::collection::vec("[a-z]{1,5}", 0..10)) {
            prop_assert!(subtract(&files, &files).is_empty());
        }
    }
}
