//! Sharded file store for cache entries.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use branchdrift_core::{DiffRecord, DriftError, HistoryPoint};

use crate::codec::{self, CacheRecord};
use crate::CacheKey;

const ENTRY_EXTENSION: &str = "cache";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Persistent key/value store mapping a [`CacheKey`] to a [`CacheRecord`].
///
/// Entries live at `<root>/<first two hex chars>/<rest>.cache`. Writes go to a
/// temporary file in the same directory and are renamed into place, so a
/// reader never sees a half-written entry. Anything that fails to decode is
/// reported as a miss.
///
/// # Examples
///
/// ```
/// use branchdrift_cache::{CacheKey, DiffCache};
/// use branchdrift_core::{CommitRef, DiffRecord};
///
/// let dir = tempfile::tempdir().unwrap();
/// let cache = DiffCache::new(dir.path());
/// let (base, compare) = (CommitRef::new("a"), CommitRef::new("b"));
/// let key = CacheKey::for_diff(&base, &compare, "src");
///
/// assert!(cache.get_diff(&key).is_none());
/// let record = DiffRecord::new(base, compare, "src", 2, 1, 1);
/// cache.put_diff(&key, &record).unwrap();
/// assert_eq!(cache.get_diff(&key), Some(record));
/// ```
#[derive(Debug, Clone)]
pub struct DiffCache {
    root: PathBuf,
}

impl DiffCache {
    /// Open a store rooted at `root`. Directories are created lazily on write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the entry for `key` lives on disk.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(key.shard())
            .join(format!("{}.{ENTRY_EXTENSION}", key.file_stem()))
    }

    /// Look up `key`. Missing, unreadable, and corrupt entries all return `None`.
    pub fn get(&self, key: &CacheKey) -> Option<CacheRecord> {
        let path = self.path_for(key);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable cache entry");
                return None;
            }
        };

        match codec::decode(&text) {
            Ok(record) => {
                tracing::debug!(key = %key, "cache hit");
                Some(record)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt cache entry");
                None
            }
        }
    }

    /// Store `record` under `key`, replacing any existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::Io`] if the shard directory or entry cannot be
    /// written.
    pub fn put(&self, key: &CacheKey, record: &CacheRecord) -> Result<(), DriftError> {
        let path = self.path_for(key);
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&dir)?;

        let temp = dir.join(format!(
            ".{}.{}.{}.tmp",
            key.file_stem(),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let written = write_entry(&temp, &codec::encode(record)).and_then(|()| fs::rename(&temp, &path));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        tracing::debug!(key = %key, "cache store");
        Ok(())
    }

    /// Typed lookup for a single diff. An entry of another kind is a miss.
    pub fn get_diff(&self, key: &CacheKey) -> Option<DiffRecord> {
        match self.get(key)? {
            CacheRecord::Diff(record) => Some(record),
            CacheRecord::History(_) => {
                tracing::warn!(key = %key, "expected a diff entry, found history");
                None
            }
        }
    }

    /// Typed lookup for a history series. An entry of another kind is a miss.
    pub fn get_history(&self, key: &CacheKey) -> Option<Vec<HistoryPoint>> {
        match self.get(key)? {
            CacheRecord::History(points) => Some(points),
            CacheRecord::Diff(_) => {
                tracing::warn!(key = %key, "expected a history entry, found diff");
                None
            }
        }
    }

    /// Store a single diff.
    ///
    /// # Errors
    ///
    /// See [`DiffCache::put`].
    pub fn put_diff(&self, key: &CacheKey, record: &DiffRecord) -> Result<(), DriftError> {
        self.put(key, &CacheRecord::Diff(record.clone()))
    }

    /// Store a history series.
    ///
    /// # Errors
    ///
    /// See [`DiffCache::put`].
    pub fn put_history(&self, key: &CacheKey, points: &[HistoryPoint]) -> Result<(), DriftError> {
        self.put(key, &CacheRecord::History(points.to_vec()))
    }
}

fn write_entry(path: &Path, contents: &str) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchdrift_core::{CommitRef, SamplingOptions};
    use chrono::NaiveDate;

    fn key(dir: &str) -> CacheKey {
        CacheKey::for_diff(&CommitRef::new("base"), &CommitRef::new("cmp"), dir)
    }

    fn record(dir: &str) -> DiffRecord {
        DiffRecord::new(CommitRef::new("base"), CommitRef::new("cmp"), dir, 5, 6, 2)
    }

    #[test]
    fn missing_key_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiffCache::new(tmp.path());
        assert!(cache.get(&key("x")).is_none());
    }

    #[test]
    fn entries_are_sharded_by_key_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiffCache::new(tmp.path());
        let k = key("x");
        cache.put_diff(&k, &record("x")).unwrap();

        let path = cache.path_for(&k);
        assert!(path.exists());
        assert_eq!(path.parent().unwrap(), tmp.path().join(k.shard()));
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("{}.cache", k.file_stem())
        );
    }

    #[test]
    fn put_overwrites_and_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiffCache::new(tmp.path());
        let k = key("x");
        cache.put_diff(&k, &record("x")).unwrap();
        let updated = DiffRecord::new(CommitRef::new("base"), CommitRef::new("cmp"), "x", 1, 1, 1);
        cache.put_diff(&k, &updated).unwrap();

        assert_eq!(cache.get_diff(&k), Some(updated));
        let shard = tmp.path().join(k.shard());
        let names: Vec<_> = fs::read_dir(shard)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiffCache::new(tmp.path());
        let k = key("x");
        cache.put_diff(&k, &record("x")).unwrap();

        let path = cache.path_for(&k);
        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, &text[..text.len() / 2]).unwrap();

        assert!(cache.get(&k).is_none());
    }

    #[test]
    fn garbage_entry_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiffCache::new(tmp.path());
        let k = key("x");
        let path = cache.path_for(&k);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"\x00\xffnot a cache entry").unwrap();

        assert!(cache.get(&k).is_none());
    }

    #[test]
    fn kind_mismatch_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiffCache::new(tmp.path());
        let k = key("x");
        cache.put_history(&k, &[]).unwrap();

        assert!(cache.get_diff(&k).is_none());
        assert_eq!(cache.get_history(&k), Some(Vec::new()));
    }

    #[test]
    fn history_survives_a_new_handle() {
        let tmp = tempfile::tempdir().unwrap();
        let base = CommitRef::new("base");
        let compare = CommitRef::new("cmp");
        let k = CacheKey::for_history(&base, &compare, "x", SamplingOptions::default());
        let points = vec![HistoryPoint {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            total: 9,
            base_commit: base,
            compare_commit: compare,
            directory: "x".into(),
        }];

        DiffCache::new(tmp.path()).put_history(&k, &points).unwrap();
        let reopened = DiffCache::new(tmp.path());
        assert_eq!(reopened.get_history(&k), Some(points));
    }

    #[test]
    fn unwritable_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, "not a dir").unwrap();
        let cache = DiffCache::new(&blocker);

        let err = cache.put_diff(&key("x"), &record("x")).unwrap_err();
        assert!(matches!(err, DriftError::Io(_)));
    }
}
