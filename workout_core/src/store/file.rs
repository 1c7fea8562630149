//! JSON file document store with file locking.
//!
//! The whole tree is one JSON file. A sidecar `<file>.lock` is locked
//! shared for reads and exclusive for transactions, so several processes can
//! use the same store. Writes go to a temp file that is synced and renamed
//! over the original.

use super::{ChildWatch, DocPath, DocumentStore, DocumentTree, SharedWatches, WatchRegistry};
use crate::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
    watches: SharedWatches,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "store".into());
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);

        Self {
            path,
            lock_path,
            watches: SharedWatches::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn open_lock(&self) -> Result<File> {
        std::fs::create_dir_all(self.parent_dir())
            .map_err(|e| Error::storage("create store directory", e))?;
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| Error::storage("open store lock", e))
    }

    /// Read the tree; the caller holds the lock
    fn load(&self) -> Result<DocumentTree> {
        if !self.path.exists() {
            return Ok(DocumentTree::default());
        }

        let mut contents = String::new();
        File::open(&self.path)
            .and_then(|mut f| f.read_to_string(&mut contents))
            .map_err(|e| Error::storage("read store file", e))?;

        if contents.trim().is_empty() {
            return Ok(DocumentTree::default());
        }

        match serde_json::from_str(&contents) {
            Ok(value) => DocumentTree::from_value(value),
            Err(e) => {
                tracing::warn!("Store file {:?} is corrupt: {}", self.path, e);
                Err(Error::storage("parse store file", e))
            }
        }
    }

    /// Atomically replace the file; the caller holds the exclusive lock
    fn save(&self, tree: &DocumentTree) -> Result<()> {
        let temp = NamedTempFile::new_in(self.parent_dir())
            .map_err(|e| Error::storage("create temp file", e))?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, tree.as_value())
                .map_err(|e| Error::storage("serialize store", e))?;
            writer
                .flush()
                .map_err(|e| Error::storage("write store file", e))?;
        }

        temp.as_file()
            .sync_all()
            .map_err(|e| Error::storage("sync store file", e))?;
        temp.persist(&self.path)
            .map_err(|e| Error::storage("replace store file", e.error))?;

        tracing::debug!("Saved store to {:?}", self.path);
        Ok(())
    }

    fn with_shared_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.open_lock()?;
        lock.lock_shared()
            .map_err(|e| Error::storage("lock store for reading", e))?;
        let result = f();
        lock.unlock()
            .map_err(|e| Error::storage("unlock store", e))?;
        result
    }

    fn with_exclusive_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.open_lock()?;
        lock.lock_exclusive()
            .map_err(|e| Error::storage("lock store for writing", e))?;
        let result = f();
        lock.unlock()
            .map_err(|e| Error::storage("unlock store", e))?;
        result
    }
}

impl DocumentStore for JsonFileStore {
    fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&DocumentTree) -> T,
    {
        let tree = self.with_shared_lock(|| self.load())?;
        Ok(f(&tree))
    }

    fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut DocumentTree) -> Result<T>,
    {
        let (result, before, after) = self.with_exclusive_lock(|| {
            let before = self.load()?;
            let mut working = before.clone();
            let result = f(&mut working)?;
            if working != before {
                self.save(&working)?;
            }
            Ok((result, before, working))
        })?;

        if before != after {
            WatchRegistry::publish(&self.watches, &before, &after);
        }
        Ok(result)
    }

    fn watch_children(&self, path: &DocPath) -> Result<ChildWatch> {
        path.validate()?;
        let tree = self.with_shared_lock(|| self.load())?;
        WatchRegistry::subscribe(&self.watches, path, &tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(p: &str) -> DocPath {
        DocPath::parse(p).unwrap()
    }

    #[test]
    fn test_write_then_read_from_new_handle() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("store.json");

        let store = JsonFileStore::new(&file);
        store
            .write(&path("templates/5x5"), json!({"name": "5x5"}))
            .unwrap();

        let reopened = JsonFileStore::new(&file);
        assert_eq!(
            reopened.read(&path("templates/5x5/name")).unwrap(),
            Some(json!("5x5"))
        );
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("nested/dir/store.json"));

        assert!(store.children(&DocPath::root()).unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_corrupted_file_reports_unavailable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("store.json");
        std::fs::write(&file, "{ invalid json }").unwrap();

        let store = JsonFileStore::new(&file);
        let err = store.read(&path("templates")).unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable(_)));

        // corrupt data is not overwritten by a later write
        assert!(store.write(&path("a"), json!(1)).is_err());
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "{ invalid json }");
    }

    #[test]
    fn test_failed_transaction_does_not_touch_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("store.json");
        let store = JsonFileStore::new(&file);
        store.write(&path("a"), json!(1)).unwrap();
        let before = std::fs::read_to_string(&file).unwrap();

        let result: Result<()> = store.transact(|tree| {
            tree.remove(&path("a"));
            Err(Error::EmptyExerciseList)
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&file).unwrap(), before);
    }

    #[test]
    fn test_no_stray_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("store.json"));
        store.write(&path("a"), json!(1)).unwrap();
        store.write(&path("b"), json!(2)).unwrap();

        let mut names: Vec<String> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["store.json", "store.json.lock"]);
    }

    #[test]
    fn test_watch_sees_changes_from_same_handle() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("store.json"));
        let watch = store.watch_children(&path("planner")).unwrap();
        assert_eq!(watch.initial_len(), 0);

        store
            .write(&path("planner/monday"), json!({"name": "Legs"}))
            .unwrap();

        let event = watch.try_next().unwrap();
        assert_eq!(event.key, "monday");
    }
}
