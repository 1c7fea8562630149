//! In-memory document store.
//!
//! Cloned handles share the same tree and watches, which is how tests model
//! several sessions of one user.

use super::{ChildWatch, DocPath, DocumentStore, DocumentTree, SharedWatches, WatchRegistry};
use crate::{Error, Result};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

struct MemoryState {
    tree: DocumentTree,
    available: bool,
}

#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    watches: SharedWatches,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_tree(DocumentTree::default())
    }

    /// Store pre-loaded with `value` as the root document
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(Self::with_tree(DocumentTree::from_value(value)?))
    }

    fn with_tree(tree: DocumentTree) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                tree,
                available: true,
            })),
            watches: SharedWatches::default(),
        }
    }

    /// Simulate losing (or regaining) the connection to the store
    pub fn set_available(&self, available: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.available = available;
        }
    }

    /// Copy of the whole document
    pub fn to_value(&self) -> Result<Value> {
        self.view(|tree| tree.as_value().clone())
    }

    /// Number of watches still subscribed
    pub fn active_watches(&self) -> usize {
        self.watches.lock().map(|w| w.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        let state = self
            .state
            .lock()
            .map_err(|e| Error::storage("lock memory store", e))?;
        if !state.available {
            return Err(Error::StorageUnavailable("store is offline".into()));
        }
        Ok(state)
    }
}

impl DocumentStore for MemoryStore {
    fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&DocumentTree) -> T,
    {
        let state = self.lock()?;
        Ok(f(&state.tree))
    }

    fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut DocumentTree) -> Result<T>,
    {
        let mut state = self.lock()?;
        let mut working = state.tree.clone();
        let result = f(&mut working)?;

        if working != state.tree {
            let before = std::mem::replace(&mut state.tree, working);
            WatchRegistry::publish(&self.watches, &before, &state.tree);
        }
        Ok(result)
    }

    fn watch_children(&self, path: &DocPath) -> Result<ChildWatch> {
        path.validate()?;
        let state = self.lock()?;
        WatchRegistry::subscribe(&self.watches, path, &state.tree)
    }
}
