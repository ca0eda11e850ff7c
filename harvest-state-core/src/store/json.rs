/*!
JSON file harvest state store.
*/

use super::MemoryStateStore;
use crate::state::{HarvestStateStore, StateSnapshot, StateValue};
use crate::{HarvestStateError, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[cfg(feature = "metrics")]
use crate::observability::StateMetrics;

/// Name of the canonical state file inside the store directory
pub const STATE_FILENAME: &str = "state.json";

/// Name of the temporary file written before the canonical file is replaced
pub const STATE_TMP_FILENAME: &str = "state.json.tmp";

/// When a [`JsonStateStore`] goes back to disk before answering a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadPolicy {
    /// Reload the whole file before every `get` and `set`
    #[default]
    ReloadEveryCall,
    /// Reload on the first `get` and before every `set`; later reads use memory
    Cached,
}

/// A harvest state store persisted as JSON.
///
/// The state is written to `<dir>/state.json`. By default the file is loaded
/// before every get and set, so separate instances pointed at the same
/// directory (for example consecutive harvester runs) see each other's
/// updates. Every set saves the full snapshot by writing
/// `<dir>/state.json.tmp` and renaming it over `state.json`, so the canonical
/// file always holds a complete snapshot even if the process dies mid-write.
///
/// Concurrent writers are not coordinated: the last successful rename wins.
///
/// # Example
/// ```rust
/// use harvest_state::{HarvestStateStore, JsonStateStore};
/// use serde_json::json;
///
/// let dir = tempfile::TempDir::new()?;
/// let mut store = JsonStateStore::new(dir.path().join("harvest"));
/// store.set_state("twitter_timeline", "last_id", Some(json!("1001")))?;
///
/// let mut reopened = JsonStateStore::new(dir.path().join("harvest"));
/// assert_eq!(reopened.get_state("twitter_timeline", "last_id")?, Some(json!("1001")));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    dir: PathBuf,
    state_path: PathBuf,
    tmp_path: PathBuf,
    read_policy: ReadPolicy,
    memory: MemoryStateStore,
    /// Whether `memory` reflects the file as of the last load or save
    fresh: bool,
}

impl JsonStateStore {
    /// Create a store rooted at `dir`
    ///
    /// Nothing touches the filesystem until the first get or set; the
    /// directory is created on the first save.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref().to_path_buf();
        Self {
            state_path: dir.join(STATE_FILENAME),
            tmp_path: dir.join(STATE_TMP_FILENAME),
            dir,
            read_policy: ReadPolicy::default(),
            memory: MemoryStateStore::new(),
            fresh: false,
        }
    }

    /// Set how reads consult the file
    pub fn with_read_policy(mut self, read_policy: ReadPolicy) -> Self {
        self.read_policy = read_policy;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn temp_path(&self) -> &Path {
        &self.tmp_path
    }

    pub fn read_policy(&self) -> ReadPolicy {
        self.read_policy
    }

    /// Reload from disk and return a copy of the full snapshot
    pub fn snapshot(&mut self) -> Result<StateSnapshot> {
        self.load()?;
        Ok(self.memory.snapshot().clone())
    }

    /// Replace the in-memory snapshot with the file contents
    ///
    /// A missing file yields an empty snapshot. A file that cannot be parsed
    /// is an error and leaves the in-memory snapshot untouched.
    fn load(&mut self) -> Result<()> {
        let snapshot = read_snapshot(&self.state_path)?;
        self.memory.replace_snapshot(snapshot);
        self.fresh = true;
        Ok(())
    }

    /// Write the in-memory snapshot to disk atomically
    fn save(&mut self) -> Result<()> {
        let result = self.stage().and_then(|_| self.commit());

        #[cfg(feature = "metrics")]
        {
            let metrics = StateMetrics::global();
            match &result {
                Ok(_) => metrics.record_save(),
                Err(_) => metrics.record_save_failure(),
            }
        }

        // Memory now holds a mutation the file may not; force the next read to reload.
        if result.is_err() {
            self.fresh = false;
        }
        result
    }

    /// Write the snapshot to the temporary file, creating the directory if needed
    ///
    /// The canonical file is not touched.
    pub(crate) fn stage(&self) -> Result<()> {
        self.ensure_dir()?;

        let data = serde_json::to_vec(self.memory.snapshot())?;

        if self.tmp_path.exists() {
            warn!(
                "Overwriting leftover temporary state file {}",
                self.tmp_path.display()
            );
        }

        write_synced(&self.tmp_path, &data).map_err(|e| {
            HarvestStateError::storage(format!(
                "Failed to write temporary state file {}: {}",
                self.tmp_path.display(),
                e
            ))
        })?;

        #[cfg(feature = "metrics")]
        StateMetrics::global().record_snapshot_size(data.len());

        debug!(
            "Staged {} bytes of state to {}",
            data.len(),
            self.tmp_path.display()
        );
        Ok(())
    }

    /// Rename the temporary file over the canonical state file
    pub(crate) fn commit(&self) -> Result<()> {
        fs::rename(&self.tmp_path, &self.state_path).map_err(|e| {
            HarvestStateError::storage(format!(
                "Failed to replace state file {}: {}",
                self.state_path.display(),
                e
            ))
        })?;

        debug!("Saved state to {}", self.state_path.display());
        Ok(())
    }

    /// Ensure the store directory exists, creating parents as necessary
    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| {
                HarvestStateError::storage(format!(
                    "Failed to create directory {}: {}",
                    self.dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

impl HarvestStateStore for JsonStateStore {
    fn get_state(&mut self, resource_type: &str, key: &str) -> Result<Option<StateValue>> {
        if self.read_policy == ReadPolicy::ReloadEveryCall || !self.fresh {
            self.load()?;
        }
        Ok(self.memory.get(resource_type, key).cloned())
    }

    fn set_state(
        &mut self,
        resource_type: &str,
        key: &str,
        value: Option<StateValue>,
    ) -> Result<()> {
        self.load()?;
        self.memory.set(resource_type, key, value);
        self.save()
    }
}

/// Read and parse a snapshot file, treating a missing file as empty
fn read_snapshot(path: &Path) -> Result<StateSnapshot> {
    let data = match fs::read(path) {
        Ok(data) => data,
        // A parent that is a regular file also means "no state yet".
        Err(e) if matches!(
            e.kind(),
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
        ) =>
        {
            debug!("No state file at {}, starting empty", path.display());
            return Ok(StateSnapshot::new());
        }
        Err(e) => {
            return Err(HarvestStateError::storage(format!(
                "Failed to read state file {}: {}",
                path.display(),
                e
            )))
        }
    };

    let snapshot = serde_json::from_slice(&data).map_err(|e| {
        #[cfg(feature = "metrics")]
        StateMetrics::global().record_corrupt_load();
        HarvestStateError::corrupt_state(path, e)
    })?;

    #[cfg(feature = "metrics")]
    StateMetrics::global().record_load();

    debug!("Loaded {} bytes of state from {}", data.len(), path.display());
    Ok(snapshot)
}

/// Write `data` to `path` and flush it to the device before returning
fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn read_file(path: &Path) -> serde_json::Value {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonStateStore::new(temp_dir.path());

        assert_eq!(store.get_state("twitter_timeline", "last_id").unwrap(), None);
        assert!(store.snapshot().unwrap().is_empty());
        assert!(!store.state_path().exists());
    }

    #[test]
    fn test_paths() {
        let store = JsonStateStore::new("/var/harvest");
        assert_eq!(store.directory(), Path::new("/var/harvest"));
        assert_eq!(store.state_path(), Path::new("/var/harvest/state.json"));
        assert_eq!(store.temp_path(), Path::new("/var/harvest/state.json.tmp"));
        assert_eq!(store.read_policy(), ReadPolicy::ReloadEveryCall);
    }

    #[test]
    fn test_set_writes_full_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonStateStore::new(temp_dir.path());

        store
            .set_state("twitter_timeline", "last_id", Some(json!("1001")))
            .unwrap();
        store
            .set_state("web_crawl", "depth", Some(json!(3)))
            .unwrap();

        assert_eq!(
            read_file(store.state_path()),
            json!({
                "twitter_timeline": {"last_id": "1001"},
                "web_crawl": {"depth": 3}
            })
        );
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_set_creates_nested_directories() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("collections/abc123/state");
        let mut store = JsonStateStore::new(&dir);

        store
            .set_state("twitter_timeline", "last_id", Some(json!(1)))
            .unwrap();
        assert!(dir.join(STATE_FILENAME).is_file());
    }

    #[test]
    fn test_clearing_last_key_removes_namespace_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonStateStore::new(temp_dir.path());

        store
            .set_state("twitter_timeline", "last_id", Some(json!("1001")))
            .unwrap();
        store.clear_state("twitter_timeline", "last_id").unwrap();

        assert_eq!(read_file(store.state_path()), json!({}));
    }

    #[test]
    fn test_reload_sees_other_instance_writes() {
        let temp_dir = TempDir::new().unwrap();
        let mut first = JsonStateStore::new(temp_dir.path());
        let mut second = JsonStateStore::new(temp_dir.path());

        first
            .set_state("twitter_timeline", "last_id", Some(json!("1001")))
            .unwrap();
        assert_eq!(
            second.get_state("twitter_timeline", "last_id").unwrap(),
            Some(json!("1001"))
        );

        second
            .set_state("twitter_timeline", "last_id", Some(json!("1002")))
            .unwrap();
        assert_eq!(
            first.get_state("twitter_timeline", "last_id").unwrap(),
            Some(json!("1002"))
        );
    }

    #[test]
    fn test_set_merges_with_file_written_by_other_instance() {
        let temp_dir = TempDir::new().unwrap();
        let mut first = JsonStateStore::new(temp_dir.path());
        let mut second = JsonStateStore::new(temp_dir.path());

        first.set_state("a", "k", Some(json!(1))).unwrap();
        second.set_state("b", "k", Some(json!(2))).unwrap();

        assert_eq!(read_file(first.state_path()), json!({"a": {"k": 1}, "b": {"k": 2}}));
    }

    #[test]
    fn test_cached_reads_skip_reload_until_set() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JsonStateStore::new(temp_dir.path());
        let mut cached = JsonStateStore::new(temp_dir.path()).with_read_policy(ReadPolicy::Cached);

        writer.set_state("ns", "k", Some(json!(1))).unwrap();
        assert_eq!(cached.get_state("ns", "k").unwrap(), Some(json!(1)));

        writer.set_state("ns", "k", Some(json!(2))).unwrap();
        assert_eq!(cached.get_state("ns", "k").unwrap(), Some(json!(1)));

        cached.set_state("ns", "other", Some(json!(true))).unwrap();
        assert_eq!(cached.get_state("ns", "k").unwrap(), Some(json!(2)));
        assert_eq!(read_file(writer.state_path()), json!({"ns": {"k": 2, "other": true}}));
    }

    #[test]
    fn test_corrupt_file_fails_get_and_set() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonStateStore::new(temp_dir.path());
        fs::write(store.state_path(), b"{\"twitter_timeline\": {\"last_").unwrap();

        let err = store.get_state("twitter_timeline", "last_id").unwrap_err();
        assert!(err.is_corrupt_state());

        let err = store
            .set_state("twitter_timeline", "last_id", Some(json!("1001")))
            .unwrap_err();
        assert!(err.is_corrupt_state());

        assert_eq!(
            fs::read(store.state_path()).unwrap(),
            b"{\"twitter_timeline\": {\"last_"
        );
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_parent_file_means_no_state_yet() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("occupied");
        fs::write(&blocker, b"not a directory").unwrap();

        let mut store = JsonStateStore::new(blocker.join("state"));
        assert_eq!(store.get_state("ns", "k").unwrap(), None);
    }

    #[test]
    fn test_unreadable_state_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonStateStore::new(temp_dir.path());
        fs::create_dir(store.state_path()).unwrap();

        let err = store.get_state("ns", "k").unwrap_err();
        assert!(err.is_storage_failure());
        assert!(err.to_string().contains("Failed to read state file"));

        let err = store.set_state("ns", "k", Some(json!(1))).unwrap_err();
        assert!(err.is_storage_failure());
        assert!(store.state_path().is_dir());
    }

    #[test]
    fn test_wrong_shape_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonStateStore::new(temp_dir.path());
        fs::write(store.state_path(), b"[1, 2, 3]").unwrap();

        assert!(store.get_state("ns", "k").unwrap_err().is_corrupt_state());
    }

    #[test]
    fn test_directory_creation_failure_leaves_no_state() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("occupied");
        fs::write(&blocker, b"not a directory").unwrap();

        let mut store = JsonStateStore::new(blocker.join("state"));
        let err = store.set_state("ns", "k", Some(json!(1))).unwrap_err();

        assert!(err.is_storage_failure());
        assert!(err.to_string().contains("Failed to create directory"));
        assert_eq!(fs::read(&blocker).unwrap(), b"not a directory");
    }

    #[test]
    fn test_failed_temp_write_keeps_previous_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonStateStore::new(temp_dir.path());
        store.set_state("ns", "k", Some(json!(1))).unwrap();

        // A directory in place of the temporary file makes the write fail.
        fs::create_dir(store.temp_path()).unwrap();
        let err = store.set_state("ns", "k", Some(json!(2))).unwrap_err();

        assert!(err.is_storage_failure());
        assert_eq!(read_file(store.state_path()), json!({"ns": {"k": 1}}));
        assert_eq!(store.get_state("ns", "k").unwrap(), Some(json!(1)));
    }

    #[test]
    fn test_failed_save_invalidates_cached_reads() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonStateStore::new(temp_dir.path()).with_read_policy(ReadPolicy::Cached);
        store.set_state("ns", "k", Some(json!(1))).unwrap();

        fs::create_dir(store.temp_path()).unwrap();
        assert!(store.set_state("ns", "k", Some(json!(2))).is_err());

        assert_eq!(store.get_state("ns", "k").unwrap(), Some(json!(1)));
    }

    #[test]
    fn test_interrupted_before_rename_keeps_previous_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonStateStore::new(temp_dir.path());
        store.set_state("ns", "k", Some(json!("old"))).unwrap();

        store.memory.set("ns", "k", Some(json!("new")));
        store.stage().unwrap();

        let mut reopened = JsonStateStore::new(temp_dir.path());
        assert_eq!(reopened.get_state("ns", "k").unwrap(), Some(json!("old")));
        assert!(reopened.temp_path().exists());

        store.commit().unwrap();
        assert_eq!(reopened.get_state("ns", "k").unwrap(), Some(json!("new")));
        assert!(!reopened.temp_path().exists());
    }

    #[test]
    fn test_leftover_temp_file_is_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonStateStore::new(temp_dir.path());
        fs::write(store.temp_path(), b"garbage from a crashed run").unwrap();

        assert_eq!(store.get_state("ns", "k").unwrap(), None);

        store.set_state("ns", "k", Some(json!(1))).unwrap();
        assert_eq!(read_file(store.state_path()), json!({"ns": {"k": 1}}));
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_read_policy_serde() {
        assert_eq!(
            serde_json::to_string(&ReadPolicy::ReloadEveryCall).unwrap(),
            "\"reload_every_call\""
        );
        assert_eq!(
            serde_json::from_str::<ReadPolicy>("\"cached\"").unwrap(),
            ReadPolicy::Cached
        );
    }
}
