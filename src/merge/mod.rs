//! Folding a snapshot into a master table.
//!
//! The merge is a full rewrite, not an append:
//!   1. align both tables on the union of their column names
//!   2. concatenate rows (master first under `KeepExisting`)
//!   3. keep the first row seen for each key (first column)
//!   4. sort descending by key
//!
//! Re-merging the same snapshot is a no-op.

use crate::config::DuplicatePolicy;
use crate::error::TableError;
use crate::models::Table;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use tracing::{debug, warn};

/// What a merge did, for logging and callers that care.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Snapshot keys that were not in the master before.
    pub added: usize,
    /// Rows dropped because their key was already taken.
    pub duplicates: usize,
    /// Dropped rows whose cells differed from the row that was kept.
    pub conflicts: usize,
}

pub fn merge_tables(
    master: &Table,
    snapshot: &Table,
    policy: DuplicatePolicy,
) -> Result<(Table, MergeReport), TableError> {
    let headers = union_headers(master.headers(), snapshot.headers());
    let master_rows = align(master, &headers);
    let snapshot_rows = align(snapshot, &headers);

    let master_keys: HashSet<Key> = master_rows.iter().map(|r| Key::of(r)).collect();
    let snapshot_keys: HashSet<Key> = snapshot_rows.iter().map(|r| Key::of(r)).collect();
    let added = snapshot_keys.difference(&master_keys).count();

    let (first, second) = match policy {
        DuplicatePolicy::KeepExisting => (&master_rows, &snapshot_rows),
        DuplicatePolicy::PreferSnapshot => (&snapshot_rows, &master_rows),
    };

    let mut kept: Vec<(Key, Vec<String>)> = Vec::with_capacity(first.len() + second.len());
    let mut index: HashMap<Key, usize> = HashMap::new();
    let mut report = MergeReport { added, ..Default::default() };

    for row in first.iter().chain(second.iter()) {
        let key = Key::of(row);
        match index.get(&key) {
            Some(&at) => {
                report.duplicates += 1;
                if kept[at].1 != *row {
                    report.conflicts += 1;
                    debug!("Key {:?}: dropped {:?}, kept {:?}", key, row, kept[at].1);
                }
            }
            None => {
                index.insert(key.clone(), kept.len());
                kept.push((key, row.clone()));
            }
        }
    }

    if report.conflicts > 0 && policy == DuplicatePolicy::KeepExisting {
        warn!(
            "{} scraped rows differ from stored rows with the same key; stored rows kept",
            report.conflicts
        );
    }

    kept.sort_by(|a, b| b.0.cmp(&a.0));
    let rows = kept.into_iter().map(|(_, row)| row).collect();
    Ok((Table::new(headers, rows)?, report))
}

/// Master columns first, then snapshot-only columns in their own order.
fn union_headers(master: &[String], snapshot: &[String]) -> Vec<String> {
    let mut headers = master.to_vec();
    for h in snapshot {
        if !headers.contains(h) {
            headers.push(h.clone());
        }
    }
    headers
}

/// Re-project rows onto `headers`; absent columns become empty cells.
fn align(table: &Table, headers: &[String]) -> Vec<Vec<String>> {
    let sources: Vec<Option<usize>> = headers.iter().map(|h| table.column_index(h)).collect();
    table
        .rows()
        .iter()
        .map(|row| {
            sources
                .iter()
                .map(|src| src.map(|i| row[i].clone()).unwrap_or_default())
                .collect()
        })
        .collect()
}

// ── Row key ───────────────────────────────────────────────────────────────────

/// A row's first cell as the merge sees it: trimmed, and numeric where it
/// parses, so `20250101`, ` 20250101` and `20250101.0` are one key.
///
/// Ascending order: empty < text (lexicographic) < numbers (by value).
#[derive(Debug, Clone)]
enum Key {
    Empty,
    Text(String),
    Num(f64),
}

impl Key {
    fn of(row: &[String]) -> Self {
        let raw = row.first().map(|c| c.trim()).unwrap_or("");
        if raw.is_empty() {
            return Key::Empty;
        }
        match raw.parse::<f64>() {
            // -0.0 and 0.0 must hash alike
            Ok(v) if v == 0.0 => Key::Num(0.0),
            Ok(v) if v.is_finite() => Key::Num(v),
            _ => Key::Text(raw.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Key::Empty => 0,
            Key::Text(_) => 1,
            Key::Num(_) => 2,
        }
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Num(a), Key::Num(b)) => a.total_cmp(b),
            (Key::Text(a), Key::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Key::Empty => {}
            Key::Text(s) => s.hash(state),
            Key::Num(v) => v.to_bits().hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    fn dated(rows: &[(&str, &str)]) -> Table {
        let rows: Vec<[&str; 2]> = rows.iter().map(|(d, v)| [*d, *v]).collect();
        let refs: Vec<&[&str]> = rows.iter().map(|r| &r[..]).collect();
        t(&["date", "holders"], &refs)
    }

    fn keep(m: &Table, s: &Table) -> Table {
        merge_tables(m, s, DuplicatePolicy::KeepExisting).unwrap().0
    }

    fn fixtures() -> Vec<(Table, Table)> {
        vec![
            (Table::default(), dated(&[("20250101", "10"), ("20250102", "12")])),
            (dated(&[("20250101", "10")]), dated(&[("20250101", "99")])),
            (
                dated(&[("20250115", "3"), ("20250108", "2"), ("20250101", "1")]),
                dated(&[("20250122", "4"), ("20250115", "3"), ("20250108", "7")]),
            ),
            (dated(&[("20250101", "1")]), dated(&[("20250201", "5"), ("20250201", "6")])),
            (dated(&[("20250101", "1")]), Table::default()),
        ]
    }

    #[test]
    fn empty_master_takes_snapshot_sorted_descending() {
        let merged = keep(&Table::default(), &dated(&[("20250101", "10"), ("20250102", "12")]));
        assert_eq!(merged, dated(&[("20250102", "12"), ("20250101", "10")]));
    }

    #[test]
    fn existing_row_wins_by_default() {
        let (merged, report) = merge_tables(
            &dated(&[("20250101", "10")]),
            &dated(&[("20250101", "99")]),
            DuplicatePolicy::KeepExisting,
        )
        .unwrap();
        assert_eq!(merged, dated(&[("20250101", "10")]));
        assert_eq!(report, MergeReport { added: 0, duplicates: 1, conflicts: 1 });
    }

    #[test]
    fn prefer_snapshot_replaces_stored_row() {
        let (merged, _) = merge_tables(
            &dated(&[("20250101", "10"), ("20241225", "8")]),
            &dated(&[("20250101", "99")]),
            DuplicatePolicy::PreferSnapshot,
        )
        .unwrap();
        assert_eq!(merged, dated(&[("20250101", "99"), ("20241225", "8")]));
    }

    #[test]
    fn merged_is_superset_of_master_and_new_snapshot_keys() {
        for (m, s) in fixtures() {
            let merged = keep(&m, &s);
            for row in m.rows() {
                assert!(merged.rows().contains(row), "lost master row {:?}", row);
            }
            let master_keys = m.keys();
            for row in s.rows() {
                if !master_keys.contains(&row[0].as_str()) {
                    assert!(merged.keys().contains(&row[0].as_str()), "missing key {}", row[0]);
                }
            }
        }
    }

    #[test]
    fn merged_keys_are_unique_and_descending() {
        for (m, s) in fixtures() {
            let merged = keep(&m, &s);
            let keys = merged.keys();
            let unique: HashSet<&str> = keys.iter().copied().collect();
            assert_eq!(unique.len(), keys.len());
            assert!(keys.windows(2).all(|w| w[0] > w[1]), "{:?}", keys);
        }
    }

    #[test]
    fn remerging_same_snapshot_is_idempotent() {
        for policy in [DuplicatePolicy::KeepExisting, DuplicatePolicy::PreferSnapshot] {
            for (m, s) in fixtures() {
                let once = merge_tables(&m, &s, policy).unwrap().0;
                let twice = merge_tables(&once, &s, policy).unwrap().0;
                assert_eq!(once, twice);
            }
        }
    }

    #[test]
    fn columns_are_aligned_by_name() {
        let master = t(&["date", "a"], &[&["20250101", "1"]]);
        let snap = t(&["date", "b", "a"], &[&["20250108", "x", "2"]]);
        let merged = keep(&master, &snap);
        assert_eq!(merged.headers(), &["date", "a", "b"]);
        assert_eq!(
            merged.rows(),
            &[
                vec!["20250108".to_string(), "2".into(), "x".into()],
                vec!["20250101".to_string(), "1".into(), "".into()],
            ]
        );
    }

    #[test]
    fn keys_compare_numerically_then_text_then_empty() {
        let snap = t(&["k"], &[&["9"], &[""], &["abc"], &["10"], &["1e1x"]]);
        let merged = keep(&Table::default(), &snap);
        assert_eq!(merged.keys(), vec!["10", "9", "abc", "1e1x", ""]);
    }

    #[test]
    fn padded_and_decimal_spellings_are_one_key() {
        let master = dated(&[("20250101", "10")]);
        let snap = dated(&[(" 20250101", "x"), ("20250101.0", "y"), ("20250108", "11")]);

        let (merged, report) =
            merge_tables(&master, &snap, DuplicatePolicy::KeepExisting).unwrap();
        assert_eq!(merged, dated(&[("20250108", "11"), ("20250101", "10")]));
        assert_eq!(report, MergeReport { added: 1, duplicates: 2, conflicts: 2 });

        let (merged, _) = merge_tables(&master, &snap, DuplicatePolicy::PreferSnapshot).unwrap();
        assert_eq!(merged, dated(&[("20250108", "11"), (" 20250101", "x")]));
    }

    #[test]
    fn equal_keys_hash_alike() {
        let keys: HashSet<Key> = ["7", " 7", "7.0", "0", "-0", " ", "", "abc", "abc "]
            .iter()
            .map(|k| Key::of(&[k.to_string()]))
            .collect();
        assert_eq!(keys.len(), 4);
    }
}
