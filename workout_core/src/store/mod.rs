//! Document store abstraction.
//!
//! Data lives in a single JSON document tree addressed by `/`-separated
//! keys (`users/{uid}/workouts/{title}`). Stores expose one-shot reads and
//! writes, child watches, and an atomic [`DocumentStore::transact`] that
//! applies a closure to the whole tree under the store's exclusive lock.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

/// Characters a document key may not contain
const FORBIDDEN_KEY_CHARS: &[char] = &['.', '#', '$', '[', ']', '/'];

/// Check that `key` can be used as a single path segment
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidPath("empty key".into()));
    }
    if let Some(c) = key.chars().find(|c| FORBIDDEN_KEY_CHARS.contains(c) || c.is_control()) {
        return Err(Error::InvalidPath(format!(
            "key {:?} contains forbidden character {:?}",
            key, c
        )));
    }
    Ok(())
}

// ============================================================================
// Paths
// ============================================================================

/// Location of a node in the document tree
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DocPath {
    segments: Vec<String>,
}

impl DocPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/`-separated path; leading/trailing slashes are ignored
    pub fn parse(path: &str) -> Result<Self> {
        let segments: Vec<String> = path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let parsed = Self { segments };
        parsed.validate()?;
        Ok(parsed)
    }

    /// Path of a direct child. Keys are checked when the path is used.
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(key.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, `None` for the root
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn validate(&self) -> Result<()> {
        for segment in &self.segments {
            validate_key(segment)
                .map_err(|e| Error::InvalidPath(format!("{} in path {}", e, self)))?;
        }
        Ok(())
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

// ============================================================================
// Document tree
// ============================================================================

/// The whole stored document.
///
/// Null values and empty objects are never stored: writing `null` deletes,
/// and removing the last child of a node removes the node.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentTree {
    root: Value,
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }
}

impl DocumentTree {
    pub fn from_value(mut value: Value) -> Result<Self> {
        prune(&mut value);
        match value {
            Value::Object(_) => Ok(Self { root: value }),
            Value::Null => Ok(Self::default()),
            other => Err(Error::storage(
                "load document",
                format!("root must be an object, found {}", type_name(&other)),
            )),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    pub fn get(&self, path: &DocPath) -> Option<&Value> {
        let mut node = &self.root;
        for segment in path.segments() {
            node = node.as_object()?.get(segment)?;
        }
        Some(node)
    }

    pub fn contains(&self, path: &DocPath) -> bool {
        self.get(path).is_some()
    }

    /// Upsert `value` at `path`, creating intermediate nodes
    pub fn set(&mut self, path: &DocPath, mut value: Value) -> Result<()> {
        prune(&mut value);
        if is_empty_node(&value) {
            self.remove(path);
            return Ok(());
        }

        let Some((last, parents)) = path.segments().split_last() else {
            return match value {
                Value::Object(_) => {
                    self.root = value;
                    Ok(())
                }
                other => Err(Error::InvalidPath(format!(
                    "cannot store {} at the root",
                    type_name(&other)
                ))),
            };
        };

        let mut node = &mut self.root;
        for segment in parents {
            node = object_mut(node)
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        object_mut(node).insert(last.clone(), value);
        Ok(())
    }

    /// Remove the node at `path`, returning what was there
    pub fn remove(&mut self, path: &DocPath) -> Option<Value> {
        if path.is_root() {
            let old = std::mem::replace(&mut self.root, Value::Object(Map::new()));
            return if is_empty_node(&old) { None } else { Some(old) };
        }
        remove_at(&mut self.root, path.segments())
    }

    /// Direct children of `path` in key order
    pub fn children(&self, path: &DocPath) -> Vec<(String, Value)> {
        self.get(path)
            .and_then(Value::as_object)
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }
}

fn object_mut(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced by an object"),
    }
}

fn remove_at(node: &mut Value, segments: &[String]) -> Option<Value> {
    let (first, rest) = segments.split_first()?;
    let map = node.as_object_mut()?;
    if rest.is_empty() {
        return map.remove(first);
    }

    let child = map.get_mut(first)?;
    let removed = remove_at(child, rest);
    let now_empty = is_empty_node(child);
    if removed.is_some() && now_empty {
        map.remove(first);
    }
    removed
}

fn prune(value: &mut Value) {
    if let Value::Object(map) = value {
        for child in map.values_mut() {
            prune(child);
        }
        map.retain(|_, child| !is_empty_node(child));
    } else if let Value::Array(items) = value {
        for item in items.iter_mut() {
            prune(item);
        }
    }
}

fn is_empty_node(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Deserialize a stored node, treating malformed data as a storage failure
pub fn decode<T: DeserializeOwned>(path: &DocPath, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::storage(&format!("decode {}", path), e))
}

/// Serialize a value for storage
pub fn encode<T: serde::Serialize>(path: &DocPath, value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::storage(&format!("encode {}", path), e))
}

// ============================================================================
// Child watches
// ============================================================================

/// What happened to a child node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildEventKind {
    Added,
    Changed,
    Removed,
    /// Child changed position. Key-ordered stores never emit this.
    Moved,
}

/// One change to a direct child of a watched path.
///
/// For `Removed` the value is the last one stored.
#[derive(Clone, Debug, PartialEq)]
pub struct ChildEvent {
    pub kind: ChildEventKind,
    pub key: String,
    pub value: Value,
}

/// Subscription to the children of one path.
///
/// Starts with one `Added` event per child that existed when the watch was
/// opened, followed by live changes. Ends on [`ChildWatch::unsubscribe`] or
/// drop.
pub struct ChildWatch {
    path: DocPath,
    initial: usize,
    events: Receiver<ChildEvent>,
    on_unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl ChildWatch {
    /// Build a watch over an event channel.
    ///
    /// `initial` is the number of events already queued for the children
    /// present at subscription time.
    pub fn new(
        path: DocPath,
        initial: usize,
        events: Receiver<ChildEvent>,
        on_unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            path,
            initial,
            events,
            on_unsubscribe: Some(Box::new(on_unsubscribe)),
        }
    }

    pub fn path(&self) -> &DocPath {
        &self.path
    }

    /// Number of children present when the watch was opened
    pub fn initial_len(&self) -> usize {
        self.initial
    }

    /// Next queued event without waiting
    pub fn try_next(&self) -> Option<ChildEvent> {
        self.events.try_recv().ok()
    }

    /// Collect the initial `Added` events, failing if they do not all
    /// arrive within `timeout`. Call before consuming any other event.
    pub fn snapshot(&self, timeout: Duration) -> Result<Vec<ChildEvent>> {
        let deadline = Instant::now() + timeout;
        let mut events = Vec::with_capacity(self.initial);
        while events.len() < self.initial {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(event) => events.push(event),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(Error::StorageUnavailable(format!(
                        "timed out reading children of {} ({} of {} received)",
                        self.path,
                        events.len(),
                        self.initial
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::StorageUnavailable(format!(
                        "watch on {} closed during scan",
                        self.path
                    )));
                }
            }
        }
        Ok(events)
    }

    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(on_unsubscribe) = self.on_unsubscribe.take() {
            on_unsubscribe();
            tracing::debug!("Unsubscribed from children of {}", self.path);
        }
    }
}

impl Drop for ChildWatch {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for ChildWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildWatch")
            .field("path", &self.path)
            .field("initial", &self.initial)
            .finish()
    }
}

struct Watch {
    id: u64,
    path: DocPath,
    sender: Sender<ChildEvent>,
}

/// Watches registered on one store, shared between its handles
#[derive(Default)]
pub(crate) struct WatchRegistry {
    next_id: u64,
    watches: Vec<Watch>,
}

pub(crate) type SharedWatches = Arc<Mutex<WatchRegistry>>;

impl WatchRegistry {
    pub(crate) fn len(&self) -> usize {
        self.watches.len()
    }

    /// Register a watch on `path` and queue the children currently in `tree`
    pub(crate) fn subscribe(
        registry: &SharedWatches,
        path: &DocPath,
        tree: &DocumentTree,
    ) -> Result<ChildWatch> {
        let (sender, receiver) = mpsc::channel();
        let children = tree.children(path);
        let initial = children.len();
        for (key, value) in children {
            // receiver is alive, send cannot fail here
            let _ = sender.send(ChildEvent {
                kind: ChildEventKind::Added,
                key,
                value,
            });
        }

        let id = {
            let mut guard = registry
                .lock()
                .map_err(|e| Error::storage("register watch", e))?;
            guard.next_id += 1;
            let id = guard.next_id;
            guard.watches.push(Watch {
                id,
                path: path.clone(),
                sender,
            });
            id
        };

        tracing::debug!("Watching children of {} ({} present)", path, initial);
        let weak: Weak<Mutex<WatchRegistry>> = Arc::downgrade(registry);
        Ok(ChildWatch::new(path.clone(), initial, receiver, move || {
            if let Some(registry) = weak.upgrade() {
                if let Ok(mut guard) = registry.lock() {
                    guard.watches.retain(|w| w.id != id);
                }
            }
        }))
    }

    /// Send the child-level differences between two trees to every watch
    pub(crate) fn publish(registry: &SharedWatches, before: &DocumentTree, after: &DocumentTree) {
        let Ok(mut guard) = registry.lock() else {
            tracing::warn!("Watch registry poisoned, change notifications dropped");
            return;
        };
        guard.watches.retain(|watch| {
            diff_children(before, after, &watch.path)
                .into_iter()
                .all(|event| watch.sender.send(event).is_ok())
        });
    }
}

/// Child-level changes under `path` between two trees
fn diff_children(before: &DocumentTree, after: &DocumentTree, path: &DocPath) -> Vec<ChildEvent> {
    let empty = Map::new();
    let old = before.get(path).and_then(Value::as_object).unwrap_or(&empty);
    let new = after.get(path).and_then(Value::as_object).unwrap_or(&empty);

    let mut events = Vec::new();
    for (key, value) in new {
        let kind = match old.get(key) {
            None => ChildEventKind::Added,
            Some(previous) if previous != value => ChildEventKind::Changed,
            Some(_) => continue,
        };
        events.push(ChildEvent {
            kind,
            key: key.clone(),
            value: value.clone(),
        });
    }
    for (key, value) in old {
        if !new.contains_key(key) {
            events.push(ChildEvent {
                kind: ChildEventKind::Removed,
                key: key.clone(),
                value: value.clone(),
            });
        }
    }
    events
}

// ============================================================================
// Store trait
// ============================================================================

/// Storage collaborator holding users' workouts, planners and templates
pub trait DocumentStore {
    /// Run `f` against a consistent snapshot of the tree
    fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&DocumentTree) -> T;

    /// Run `f` against the tree under the store's exclusive lock.
    ///
    /// Changes made by `f` are published only if it returns `Ok`.
    fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut DocumentTree) -> Result<T>;

    /// Subscribe to the direct children of `path`
    fn watch_children(&self, path: &DocPath) -> Result<ChildWatch>;

    fn read(&self, path: &DocPath) -> Result<Option<Value>> {
        path.validate()?;
        self.view(|tree| tree.get(path).cloned())
    }

    fn exists(&self, path: &DocPath) -> Result<bool> {
        path.validate()?;
        self.view(|tree| tree.contains(path))
    }

    /// Create or replace; writing `null` deletes
    fn write(&self, path: &DocPath, value: Value) -> Result<()> {
        path.validate()?;
        self.transact(|tree| tree.set(path, value))
    }

    fn delete(&self, path: &DocPath) -> Result<()> {
        path.validate()?;
        self.transact(|tree| {
            tree.remove(path);
            Ok(())
        })
    }

    /// One-shot listing of the direct children of `path`
    fn children(&self, path: &DocPath) -> Result<Vec<(String, Value)>> {
        path.validate()?;
        self.view(|tree| tree.children(path))
    }
}
