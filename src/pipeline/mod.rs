//! Pipeline orchestrator: ties scraper → snapshot → master together.
//!
//! `run(code)`:
//!   1. Fetch the holder-distribution table for one code (no retry)
//!   2. Write it as today's snapshot under the snapshot dir
//!   3. Merge that snapshot file into the code's master table
//!
//! Nothing is written when step 1 yields no data.

use crate::config::AppConfig;
use crate::merge::MergeReport;
use crate::models::Snapshot;
use crate::scraper::{extract, HolderSource, TwsthrScraper};
use crate::storage::Repository;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct Pipeline {
    config: AppConfig,
    source: Arc<dyn HolderSource>,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// Nothing extracted; no files touched.
    NoData,
    Updated(RunStats),
}

#[derive(Debug)]
pub struct RunStats {
    pub snapshot_path: PathBuf,
    pub master_path: PathBuf,
    pub snapshot_rows: usize,
    pub merge: MergeReport,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Result<Self> {
        let scraper = TwsthrScraper::new(&config.scraper).context("Failed to build scraper")?;
        Ok(Self::with_source(config, Arc::new(scraper)))
    }

    pub fn with_source(config: AppConfig, source: Arc<dyn HolderSource>) -> Self {
        Self { config, source }
    }

    pub async fn run(&self, code: &str) -> Result<RunOutcome> {
        self.run_on(code, Local::now().date_naive()).await
    }

    /// Same as [`run`](Self::run) with an explicit snapshot date.
    pub async fn run_on(&self, code: &str, date: NaiveDate) -> Result<RunOutcome> {
        let Some(table) = extract(self.source.as_ref(), code).await else {
            return Ok(RunOutcome::NoData);
        };

        let repo = Repository::open(&self.config.storage);
        let snapshot = Snapshot {
            code: code.to_string(),
            date,
            table,
        };
        let snapshot_path = repo
            .write_snapshot(&snapshot)
            .with_context(|| format!("write snapshot for {}", code))?;
        println!("Saved today's data to {}", snapshot_path.display());

        let (master_path, merge) = repo
            .update_master(code, &snapshot_path, self.config.merge.duplicate_policy)
            .with_context(|| format!("update master for {}", code))?;
        println!("Updated master file {}", master_path.display());

        info!("{}: snapshot {:?} merged into {:?}", code, snapshot_path, master_path);
        Ok(RunOutcome::Updated(RunStats {
            snapshot_path,
            master_path,
            snapshot_rows: snapshot.table.len(),
            merge,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::error::ExtractError;
    use crate::models::Table;
    use async_trait::async_trait;
    use std::path::Path;

    struct Fixed(Option<Table>);

    #[async_trait]
    impl HolderSource for Fixed {
        async fn fetch_table(&self, _code: &str) -> Result<Table, ExtractError> {
            self.0
                .clone()
                .ok_or_else(|| ExtractError::TableNotFound("Details".into()))
        }
    }

    fn config(root: &Path) -> AppConfig {
        AppConfig {
            storage: StorageConfig {
                snapshot_dir: root.join("log_file"),
                master_dir: root.join("master"),
            },
            ..Default::default()
        }
    }

    fn count_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn unknown_code_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::with_source(config(dir.path()), Arc::new(Fixed(None)));

        let outcome = tokio_test::block_on(pipeline.run("NOPE")).unwrap();

        assert!(matches!(outcome, RunOutcome::NoData));
        assert_eq!(count_files(&dir.path().join("log_file")), 0);
        assert_eq!(count_files(&dir.path().join("master")), 0);
    }

    #[test]
    fn extracted_table_lands_in_snapshot_and_master() {
        let dir = tempfile::tempdir().unwrap();
        let table = Table::new(
            vec!["資料日期".into(), "總股東人數".into()],
            vec![
                vec!["20250207".into(), "10".into()],
                vec!["20250214".into(), "12".into()],
            ],
        )
        .unwrap();
        let pipeline = Pipeline::with_source(config(dir.path()), Arc::new(Fixed(Some(table))));
        let date = NaiveDate::from_ymd_opt(2025, 2, 15).unwrap();

        let outcome = tokio_test::block_on(pipeline.run_on("2330", date)).unwrap();

        let RunOutcome::Updated(stats) = outcome else {
            panic!("expected an update");
        };
        assert_eq!(stats.snapshot_path, dir.path().join("log_file/2330_20250215.csv"));
        assert_eq!(stats.master_path, dir.path().join("master/2330.csv"));
        assert_eq!(stats.snapshot_rows, 2);
        assert_eq!(stats.merge.added, 2);

        let master = Repository::open(&config(dir.path()).storage)
            .load_master("2330")
            .unwrap()
            .unwrap();
        assert_eq!(master.keys(), vec!["20250214", "20250207"]);
    }
}
