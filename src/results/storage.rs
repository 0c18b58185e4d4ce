//! Raw result set persistence (I/O)

use crate::infra::FileSystem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::record::RunRecord;

/// Fixed name of the raw results file inside an output directory
pub const RAW_RESULTS_FILE: &str = "raw-results.json";

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

/// Every run of one session, in execution order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResultSet {
    /// On-disk format version
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    /// Unique id of the session that produced the set
    #[serde(default)]
    pub session_id: String,
    /// Project the runs were made against
    pub project_identity: String,
    /// Build configuration (e.g. `Release`)
    pub configuration: String,
    /// Application package / bundle id
    pub package_name: String,
    /// Unix timestamp (seconds) the set was assembled
    pub created_at: u64,
    /// Commit of the project, when it is a git checkout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    /// Requested repetition count
    #[serde(default)]
    pub repetitions: u32,
    /// Session stopped early by the failure policy
    #[serde(default)]
    pub aborted: bool,
    /// Session stopped early by the operator
    #[serde(default)]
    pub cancelled: bool,
    /// Runs in execution order, failed ones included
    pub runs: Vec<RunRecord>,
}

impl RawResultSet {
    /// Empty set for a project, stamped with a fresh session id
    pub fn new(
        project_identity: impl Into<String>,
        configuration: impl Into<String>,
        package_name: impl Into<String>,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            session_id: uuid::Uuid::new_v4().to_string(),
            project_identity: project_identity.into(),
            configuration: configuration.into(),
            package_name: package_name.into(),
            created_at: 0,
            git_commit: None,
            repetitions: 0,
            aborted: false,
            cancelled: false,
            runs: Vec::new(),
        }
    }

    /// Runs that succeeded
    pub fn successful_runs(&self) -> impl Iterator<Item = &RunRecord> {
        self.runs.iter().filter(|r| r.succeeded)
    }

    /// Number of successful runs
    pub fn success_count(&self) -> usize {
        self.successful_runs().count()
    }

    /// Number of failed runs
    pub fn failure_count(&self) -> usize {
        self.runs.len() - self.success_count()
    }

    /// Every key reported by a successful run, sorted
    pub fn metric_keys(&self) -> BTreeSet<&str> {
        self.successful_runs()
            .flat_map(|r| r.samples.iter().map(|s| s.key.as_str()))
            .collect()
    }
}

/// Errors reading or writing a raw results file
#[derive(Debug, Error)]
pub enum StoreError {
    /// Directory does not exist
    #[error("directory not found: {0}")]
    MissingDirectory(PathBuf),

    /// Directory exists but holds no raw results file
    #[error("no {RAW_RESULTS_FILE} in {0}")]
    MissingFile(PathBuf),

    /// A raw results file is already there; sets are write-once
    #[error("{0} already exists")]
    AlreadyExists(PathBuf),

    /// File could not be read or written
    #[error("I/O error on {path}")]
    Io {
        /// File involved
        path: PathBuf,
        #[source]
        /// Underlying error
        source: io::Error,
    },

    /// File is not valid raw results JSON
    #[error("failed to parse {path}")]
    Parse {
        /// File involved
        path: PathBuf,
        #[source]
        /// Underlying error
        source: serde_json::Error,
    },

    /// Set could not be serialized
    #[error("failed to serialize raw results")]
    Serialize(#[source] serde_json::Error),
}

/// Reads and writes `raw-results.json` in output directories
pub struct RawResultStore<FS: FileSystem> {
    fs: FS,
}

impl<FS: FileSystem> RawResultStore<FS> {
    /// Create a store over the given filesystem
    pub fn new(fs: FS) -> Self {
        Self { fs }
    }

    /// Location of the raw results file in `dir`
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(RAW_RESULTS_FILE)
    }

    /// Whether `dir` already holds a raw results file
    pub fn exists_in(&self, dir: &Path) -> bool {
        self.fs.exists(&Self::path_in(dir))
    }

    /// Persist `set` into `dir`, refusing to replace an existing file
    pub fn save(&self, dir: &Path, set: &RawResultSet) -> Result<PathBuf, StoreError> {
        self.fs.create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = Self::path_in(dir);
        let contents = serde_json::to_string_pretty(set).map_err(StoreError::Serialize)?;
        self.fs
            .write_new(&path, contents)
            .map_err(|source| match source.kind() {
                io::ErrorKind::AlreadyExists => StoreError::AlreadyExists(path.clone()),
                _ => StoreError::Io {
                    path: path.clone(),
                    source,
                },
            })?;

        log::info!("Saved raw results to {}", path.display());
        Ok(path)
    }

    /// Load the raw results file from `dir`
    pub fn load(&self, dir: &Path) -> Result<RawResultSet, StoreError> {
        if !self.fs.exists(dir) {
            return Err(StoreError::MissingDirectory(dir.to_path_buf()));
        }

        let path = Self::path_in(dir);
        let contents = match self.fs.read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::MissingFile(dir.to_path_buf()));
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        serde_json::from_str(&contents).map_err(|source| StoreError::Parse { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::RealFileSystem;
    use crate::results::{MetricSample, Phase, Unit};
    use tempfile::TempDir;

    fn sample_set() -> RawResultSet {
        RawResultSet {
            format_version: FORMAT_VERSION,
            session_id: "abc".to_string(),
            project_identity: "demo-app".to_string(),
            configuration: "Release".to_string(),
            package_name: "com.example.demo".to_string(),
            created_at: 1_700_000_000,
            git_commit: None,
            repetitions: 2,
            aborted: false,
            cancelled: false,
            runs: vec![
                RunRecord {
                    run_index: 0,
                    started_at: 1_700_000_000,
                    duration_ms: 1500,
                    succeeded: true,
                    failure: None,
                    samples: vec![MetricSample::new(
                        "launch.total-time",
                        512.0,
                        Unit::Ms,
                        Phase::ColdStart,
                    )],
                    managed_profile_artifact: None,
                    native_profile_artifact: None,
                },
                RunRecord {
                    run_index: 1,
                    started_at: 1_700_000_010,
                    duration_ms: 300,
                    succeeded: false,
                    failure: Some(crate::results::RunFailure::exit(
                        crate::results::Stage::Build,
                        Some(1),
                    )),
                    samples: Vec::new(),
                    managed_profile_artifact: None,
                    native_profile_artifact: None,
                },
            ],
        }
    }

    #[test]
    fn test_save_and_load_preserves_runs_in_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RawResultStore::new(RealFileSystem);

        let set = sample_set();
        let path = store.save(temp_dir.path(), &set).expect("save");
        assert_eq!(path, temp_dir.path().join(RAW_RESULTS_FILE));

        let loaded = store.load(temp_dir.path()).expect("load");
        assert_eq!(loaded, set);
        assert_eq!(loaded.runs[0].run_index, 0);
        assert_eq!(loaded.runs[1].run_index, 1);
    }

    #[test]
    fn test_save_refuses_to_overwrite_existing_set() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RawResultStore::new(RealFileSystem);

        store.save(temp_dir.path(), &sample_set()).expect("save");
        let err = store.save(temp_dir.path(), &sample_set()).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn test_load_missing_directory_and_missing_file_are_distinct() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RawResultStore::new(RealFileSystem);

        let missing_dir = temp_dir.path().join("nope");
        assert!(matches!(
            store.load(&missing_dir),
            Err(StoreError::MissingDirectory(_))
        ));
        assert!(matches!(
            store.load(temp_dir.path()),
            Err(StoreError::MissingFile(_))
        ));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::write(temp_dir.path().join(RAW_RESULTS_FILE), "{ not json").unwrap();

        let store = RawResultStore::new(RealFileSystem);
        assert!(matches!(
            store.load(temp_dir.path()),
            Err(StoreError::Parse { .. })
        ));
    }

    #[test]
    fn test_counts_and_keys_ignore_failed_runs() {
        let set = sample_set();
        assert_eq!(set.success_count(), 1);
        assert_eq!(set.failure_count(), 1);
        assert_eq!(
            set.metric_keys().into_iter().collect::<Vec<_>>(),
            vec!["launch.total-time"]
        );
    }
}
