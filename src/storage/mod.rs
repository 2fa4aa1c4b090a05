use crate::config::{DuplicatePolicy, StorageConfig};
use crate::error::StoreError;
use crate::loader::{code_from_filename, discover_csv_files, load_table, save_table};
use crate::merge::{merge_tables, MergeReport};
use crate::models::{Snapshot, Table};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Summary of one master-table file.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterInfo {
    pub code: String,
    pub rows: usize,
    pub latest: Option<String>,
}

// ── Repository ────────────────────────────────────────────────────────────────

/// File-backed store: dated snapshots under one directory, one master
/// table per code under another. No locking; the last writer wins.
pub struct Repository {
    snapshot_dir: PathBuf,
    master_dir: PathBuf,
}

impl Repository {
    pub fn open(config: &StorageConfig) -> Self {
        Self {
            snapshot_dir: config.snapshot_dir.clone(),
            master_dir: config.master_dir.clone(),
        }
    }

    pub fn snapshot_path(&self, code: &str, date_stamp: &str) -> Result<PathBuf, StoreError> {
        let code = checked_code(code)?;
        Ok(self.snapshot_dir.join(format!("{}_{}.csv", code, date_stamp)))
    }

    pub fn master_path(&self, code: &str) -> Result<PathBuf, StoreError> {
        let code = checked_code(code)?;
        Ok(self.master_dir.join(format!("{}.csv", code)))
    }

    // ── Snapshots ─────────────────────────────────────────────────────────────

    /// Write today's table as `<snapshot_dir>/<code>_<YYYYMMDD>.csv`.
    pub fn write_snapshot(&self, snapshot: &Snapshot) -> Result<PathBuf, StoreError> {
        let path = self.snapshot_path(&snapshot.code, &snapshot.date_stamp())?;
        save_table(&path, &snapshot.table)?;
        Ok(path)
    }

    // ── Master tables ─────────────────────────────────────────────────────────

    /// The stored master for `code`, or `None` if none has been written yet.
    pub fn load_master(&self, code: &str) -> Result<Option<Table>, StoreError> {
        let path = self.master_path(code)?;
        if !path.exists() {
            return Ok(None);
        }
        load_table(&path).map(Some)
    }

    /// Fold the snapshot file at `snapshot_path` into the master for `code`
    /// and rewrite the master in full.
    pub fn update_master(
        &self,
        code: &str,
        snapshot_path: &Path,
        policy: DuplicatePolicy,
    ) -> Result<(PathBuf, MergeReport), StoreError> {
        if !snapshot_path.exists() {
            warn!("{:?} does not exist, master for {} not updated", snapshot_path, code);
            return Err(StoreError::MissingFile(snapshot_path.to_path_buf()));
        }

        let snapshot = load_table(snapshot_path)?;
        let master = self.load_master(code)?.unwrap_or_default();
        let (merged, report) = merge_tables(&master, &snapshot, policy)?;

        let master_path = self.master_path(code)?;
        save_table(&master_path, &merged)?;
        info!(
            "{}: master now {} rows ({} added, {} duplicates dropped)",
            code, merged.len(), report.added, report.duplicates
        );
        Ok((master_path, report))
    }

    /// Codes with a master table on disk, sorted.
    pub fn list_codes(&self) -> Result<Vec<String>, StoreError> {
        Ok(discover_csv_files(&self.master_dir)?
            .iter()
            .filter_map(|p| code_from_filename(p))
            .collect())
    }

    pub fn master_info(&self, code: &str) -> Result<MasterInfo, StoreError> {
        let path = self.master_path(code)?;
        let table = self.load_master(code)?.ok_or(StoreError::MissingFile(path))?;
        Ok(MasterInfo {
            code: code.to_string(),
            rows: table.len(),
            latest: table.keys().first().map(|k| k.to_string()),
        })
    }
}

/// Reject codes that would escape the storage directories.
fn checked_code(code: &str) -> Result<&str, StoreError> {
    let trimmed = code.trim();
    if trimmed.is_empty()
        || trimmed.contains(['/', '\\'])
        || trimmed.contains("..")
    {
        return Err(StoreError::InvalidCode(code.to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn repo(root: &Path) -> Repository {
        Repository::open(&StorageConfig {
            snapshot_dir: root.join("log_file"),
            master_dir: root.join("master"),
        })
    }

    fn table(rows: &[(&str, &str)]) -> Table {
        Table::new(
            vec!["資料日期".into(), "總股東人數".into()],
            rows.iter().map(|(d, v)| vec![d.to_string(), v.to_string()]).collect(),
        )
        .unwrap()
    }

    fn snapshot(code: &str, rows: &[(&str, &str)]) -> Snapshot {
        Snapshot {
            code: code.into(),
            date: NaiveDate::from_ymd_opt(2025, 2, 13).unwrap(),
            table: table(rows),
        }
    }

    #[test]
    fn snapshot_is_namespaced_by_code_and_date() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let path = repo.write_snapshot(&snapshot("2330", &[("20250101", "10")])).unwrap();
        assert_eq!(path, dir.path().join("log_file").join("2330_20250213.csv"));
        assert!(path.exists());
    }

    #[test]
    fn first_update_creates_master_sorted_descending() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let snap = repo
            .write_snapshot(&snapshot("2330", &[("20250101", "10"), ("20250102", "12")]))
            .unwrap();

        let (path, report) = repo.update_master("2330", &snap, DuplicatePolicy::KeepExisting).unwrap();
        assert_eq!(path, dir.path().join("master").join("2330.csv"));
        assert_eq!(report.added, 2);

        let master = repo.load_master("2330").unwrap().unwrap();
        assert_eq!(master, table(&[("20250102", "12"), ("20250101", "10")]));
    }

    #[test]
    fn existing_master_row_wins_on_update() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let first = repo.write_snapshot(&snapshot("2330", &[("20250101", "10")])).unwrap();
        repo.update_master("2330", &first, DuplicatePolicy::KeepExisting).unwrap();

        let second = repo.write_snapshot(&snapshot("2330", &[("20250101", "99")])).unwrap();
        let (_, report) = repo.update_master("2330", &second, DuplicatePolicy::KeepExisting).unwrap();

        assert_eq!(report.duplicates, 1);
        assert_eq!(report.conflicts, 1);
        let master = repo.load_master("2330").unwrap().unwrap();
        assert_eq!(master, table(&[("20250101", "10")]));
    }

    #[test]
    fn missing_snapshot_leaves_master_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let err = repo
            .update_master("2330", &dir.path().join("absent.csv"), DuplicatePolicy::KeepExisting)
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingFile(_)));
        assert!(repo.load_master("2330").unwrap().is_none());
    }

    #[test]
    fn lists_codes_and_info() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        assert!(repo.list_codes().unwrap().is_empty());

        for code in ["2330", "0050"] {
            let snap = repo
                .write_snapshot(&snapshot(code, &[("20250101", "1"), ("20250108", "2")]))
                .unwrap();
            repo.update_master(code, &snap, DuplicatePolicy::KeepExisting).unwrap();
        }

        assert_eq!(repo.list_codes().unwrap(), vec!["0050", "2330"]);
        let info = repo.master_info("2330").unwrap();
        assert_eq!(info.rows, 2);
        assert_eq!(info.latest.as_deref(), Some("20250108"));
    }

    #[test]
    fn path_escaping_codes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        for bad in ["", "  ", "../etc", "a/b", "a\\b"] {
            assert!(matches!(repo.master_path(bad), Err(StoreError::InvalidCode(_))), "{bad:?}");
        }
    }
}
