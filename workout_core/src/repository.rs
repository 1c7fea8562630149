//! Per-user workouts and planner.
//!
//! Layout:
//! - `users/{uid}/workouts/{title}` holds each workout
//! - `users/{uid}/planner/{slot}` holds a copy of the workout planned there

use crate::auth::AuthProvider;
use crate::store::{decode, encode, validate_key, DocPath, DocumentStore};
use crate::{Error, Result, SlotKey, UserId, Workout};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// How long a planner scan waits for the planner's children by default
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_millis(500);

/// What a commit changed besides writing the workout itself
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Title the workout was stored under before a rename
    pub renamed_from: Option<String>,
    /// Planner slots rewritten with the renamed workout
    pub planner_slots: Vec<SlotKey>,
}

pub struct WorkoutRepository<'s, S: DocumentStore> {
    store: &'s S,
    user: UserId,
    scan_timeout: Duration,
}

impl<'s, S: DocumentStore> WorkoutRepository<'s, S> {
    pub fn new(store: &'s S, user: UserId) -> Self {
        Self {
            store,
            user,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }

    /// Repository of whoever `auth` reports as signed in
    pub fn for_current_user(store: &'s S, auth: &impl AuthProvider) -> Result<Self> {
        let user = auth.current_user_id().ok_or(Error::NotSignedIn)?;
        Ok(Self::new(store, user))
    }

    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn store(&self) -> &'s S {
        self.store
    }

    fn workouts_root(&self) -> DocPath {
        DocPath::root()
            .child("users")
            .child(self.user.as_str())
            .child("workouts")
    }

    fn planner_root(&self) -> DocPath {
        DocPath::root()
            .child("users")
            .child(self.user.as_str())
            .child("planner")
    }

    fn workout_path(&self, title: &str) -> Result<DocPath> {
        validate_key(title)?;
        Ok(self.workouts_root().child(title))
    }

    fn slot_path(&self, slot: &SlotKey) -> DocPath {
        self.planner_root().child(slot.as_str())
    }

    // ------------------------------------------------------------------
    // Workouts
    // ------------------------------------------------------------------

    pub fn exists(&self, title: &str) -> Result<bool> {
        self.store.exists(&self.workout_path(title)?)
    }

    pub fn get(&self, title: &str) -> Result<Option<Workout>> {
        let path = self.workout_path(title)?;
        self.store
            .read(&path)?
            .map(|value| decode(&path, value))
            .transpose()
    }

    /// All workouts in title order
    pub fn list(&self) -> Result<Vec<Workout>> {
        let root = self.workouts_root();
        self.store
            .children(&root)?
            .into_iter()
            .map(|(key, value)| decode(&root.child(key), value))
            .collect()
    }

    /// Create or replace the workout stored under its title
    pub fn put(&self, workout: &Workout) -> Result<()> {
        let path = self.workout_path(&workout.title)?;
        self.store.write(&path, encode(&path, workout)?)
    }

    /// Remove a workout. Planner copies are snapshots and stay.
    ///
    /// Returns whether the workout existed.
    pub fn delete(&self, title: &str) -> Result<bool> {
        let path = self.workout_path(title)?;
        let existed = self.store.transact(|tree| Ok(tree.remove(&path).is_some()))?;
        if existed {
            tracing::info!("Deleted workout {:?} for {}", title, self.user);
        }
        Ok(existed)
    }

    /// Save `workout`, optionally in place of the workout titled `replacing`.
    ///
    /// Runs as one transaction: the title must be free (or be `replacing`
    /// itself), an old title is removed on rename, and every planner slot
    /// holding the old title is rewritten with the new workout.
    pub fn commit(&self, workout: &Workout, replacing: Option<&str>) -> Result<CommitReport> {
        let new_path = self.workout_path(&workout.title)?;
        let renamed_from = replacing.filter(|old| *old != workout.title);
        let old_path = renamed_from.map(|old| self.workout_path(old)).transpose()?;
        let value = encode(&new_path, workout)?;
        let planner_root = self.planner_root();
        let in_place = replacing == Some(workout.title.as_str());

        let report = self.store.transact(|tree| {
            if tree.contains(&new_path) && !in_place {
                return Err(Error::DuplicateTitle(workout.title.clone()));
            }

            let mut report = CommitReport::default();
            if let (Some(old), Some(old_path)) = (renamed_from, &old_path) {
                tree.remove(old_path);
                report.renamed_from = Some(old.to_string());
            }

            tree.set(&new_path, value.clone())?;

            if let Some(old) = renamed_from {
                for (key, slot) in tree.children(&planner_root) {
                    if slot.get("name").and_then(Value::as_str) == Some(old) {
                        tree.set(&planner_root.child(key.as_str()), value.clone())?;
                        report.planner_slots.push(SlotKey::new(key)?);
                    }
                }
            }
            Ok(report)
        })?;

        match &report.renamed_from {
            Some(old) => tracing::info!(
                "Renamed workout {:?} to {:?} for {} ({} planner slots updated)",
                old,
                workout.title,
                self.user,
                report.planner_slots.len()
            ),
            None => tracing::info!("Saved workout {:?} for {}", workout.title, self.user),
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Planner
    // ------------------------------------------------------------------

    /// Every planned slot with its workout copy
    pub fn planner(&self) -> Result<BTreeMap<SlotKey, Workout>> {
        let root = self.planner_root();
        self.store
            .children(&root)?
            .into_iter()
            .map(|(key, value)| {
                let workout = decode(&root.child(key.as_str()), value)?;
                Ok((SlotKey::new(key)?, workout))
            })
            .collect()
    }

    /// Store a copy of `workout` in `slot`
    pub fn assign(&self, slot: &SlotKey, workout: &Workout) -> Result<()> {
        let path = self.slot_path(slot);
        self.store.write(&path, encode(&path, workout)?)?;
        tracing::info!("Planned {:?} on {} for {}", workout.title, slot, self.user);
        Ok(())
    }

    /// Empty a slot, returning whether anything was planned there
    pub fn clear_slot(&self, slot: &SlotKey) -> Result<bool> {
        let path = self.slot_path(slot);
        self.store.transact(|tree| Ok(tree.remove(&path).is_some()))
    }

    /// Slots whose copy is titled `title`.
    ///
    /// Reads the planner through a watch bounded by the scan timeout and
    /// unsubscribes before returning.
    pub fn slots_referencing(&self, title: &str) -> Result<Vec<SlotKey>> {
        let watch = self.store.watch_children(&self.planner_root())?;
        let events = watch.snapshot(self.scan_timeout);
        watch.unsubscribe();

        events?
            .into_iter()
            .filter(|event| event.value.get("name").and_then(Value::as_str) == Some(title))
            .map(|event| SlotKey::new(event.key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticAuth;
    use crate::store::{ChildEventKind, MemoryStore};
    use crate::Exercise;

    fn user() -> UserId {
        UserId::new("u1").unwrap()
    }

    fn workout(title: &str) -> Workout {
        Workout::new(
            title,
            vec![
                Exercise::new("back_squat", "Back Squat"),
                Exercise::new("deadlift", "Deadlift"),
            ],
        )
    }

    fn slot(key: &str) -> SlotKey {
        SlotKey::new(key).unwrap()
    }

    #[test]
    fn test_put_then_get_roundtrip() {
        let store = MemoryStore::new();
        let repo = WorkoutRepository::new(&store, user());

        repo.put(&workout("Leg Day")).unwrap();

        assert!(repo.exists("Leg Day").unwrap());
        assert_eq!(repo.get("Leg Day").unwrap(), Some(workout("Leg Day")));
        assert_eq!(repo.get("Arm Day").unwrap(), None);
    }

    #[test]
    fn test_list_in_title_order() {
        let store = MemoryStore::new();
        let repo = WorkoutRepository::new(&store, user());
        repo.put(&workout("Pull")).unwrap();
        repo.put(&workout("Legs")).unwrap();

        let titles: Vec<String> = repo.list().unwrap().into_iter().map(|w| w.title).collect();
        assert_eq!(titles, vec!["Legs", "Pull"]);
    }

    #[test]
    fn test_users_are_isolated() {
        let store = MemoryStore::new();
        let alice = WorkoutRepository::new(&store, UserId::new("alice").unwrap());
        let bob = WorkoutRepository::new(&store, UserId::new("bob").unwrap());

        alice.put(&workout("Legs")).unwrap();
        assert!(!bob.exists("Legs").unwrap());
    }

    #[test]
    fn test_for_current_user_requires_sign_in() {
        let store = MemoryStore::new();
        assert!(matches!(
            WorkoutRepository::for_current_user(&store, &StaticAuth::signed_out()),
            Err(Error::NotSignedIn)
        ));
        let repo =
            WorkoutRepository::for_current_user(&store, &StaticAuth::signed_in(user())).unwrap();
        assert_eq!(repo.user(), &user());
    }

    #[test]
    fn test_delete_keeps_planner_copies() {
        let store = MemoryStore::new();
        let repo = WorkoutRepository::new(&store, user());
        repo.put(&workout("Legs")).unwrap();
        repo.assign(&slot("monday"), &workout("Legs")).unwrap();

        assert!(repo.delete("Legs").unwrap());
        assert!(!repo.delete("Legs").unwrap());
        assert_eq!(repo.planner().unwrap().len(), 1);
    }

    #[test]
    fn test_assign_stores_a_copy() {
        let store = MemoryStore::new();
        let repo = WorkoutRepository::new(&store, user());
        repo.put(&workout("Legs")).unwrap();
        repo.assign(&slot("monday"), &workout("Legs")).unwrap();

        let changed = Workout::new("Legs", vec![Exercise::new("plank", "Plank")]);
        repo.put(&changed).unwrap();

        let planner = repo.planner().unwrap();
        assert_eq!(planner[&slot("monday")], workout("Legs"));
    }

    #[test]
    fn test_clear_slot() {
        let store = MemoryStore::new();
        let repo = WorkoutRepository::new(&store, user());
        repo.assign(&slot("monday"), &workout("Legs")).unwrap();

        assert!(repo.clear_slot(&slot("monday")).unwrap());
        assert!(!repo.clear_slot(&slot("monday")).unwrap());
        assert!(repo.planner().unwrap().is_empty());
    }

    #[test]
    fn test_slots_referencing() {
        let store = MemoryStore::new();
        let repo = WorkoutRepository::new(&store, user());
        repo.assign(&slot("monday"), &workout("Legs")).unwrap();
        repo.assign(&slot("tuesday"), &workout("Arms")).unwrap();
        repo.assign(&slot("friday"), &workout("Legs")).unwrap();

        assert_eq!(
            repo.slots_referencing("Legs").unwrap(),
            vec![slot("friday"), slot("monday")]
        );
        assert!(repo.slots_referencing("Core").unwrap().is_empty());
        assert_eq!(store.active_watches(), 0);
    }

    #[test]
    fn test_slots_referencing_offline_leaves_no_watch() {
        let store = MemoryStore::new();
        let repo = WorkoutRepository::new(&store, user());
        repo.assign(&slot("monday"), &workout("Legs")).unwrap();
        store.set_available(false);

        assert!(matches!(
            repo.slots_referencing("Legs"),
            Err(Error::StorageUnavailable(_))
        ));
        assert_eq!(store.active_watches(), 0);
    }

    #[test]
    fn test_commit_create_rejects_taken_title() {
        let store = MemoryStore::new();
        let repo = WorkoutRepository::new(&store, user());
        repo.commit(&workout("Legs"), None).unwrap();

        assert!(matches!(
            repo.commit(&workout("Legs"), None),
            Err(Error::DuplicateTitle(title)) if title == "Legs"
        ));
    }

    #[test]
    fn test_commit_rename_rewrites_matching_slots() {
        let store = MemoryStore::new();
        let repo = WorkoutRepository::new(&store, user());
        repo.put(&workout("Legs")).unwrap();
        repo.assign(&slot("monday"), &workout("Legs")).unwrap();
        repo.assign(&slot("tuesday"), &workout("Arms")).unwrap();
        repo.assign(&slot("thursday"), &workout("Legs")).unwrap();

        let renamed = workout("Leg Day");
        let report = repo.commit(&renamed, Some("Legs")).unwrap();

        assert_eq!(report.renamed_from.as_deref(), Some("Legs"));
        assert_eq!(report.planner_slots, vec![slot("monday"), slot("thursday")]);
        assert!(!repo.exists("Legs").unwrap());
        let planner = repo.planner().unwrap();
        assert_eq!(planner[&slot("monday")], renamed);
        assert_eq!(planner[&slot("thursday")], renamed);
        assert_eq!(planner[&slot("tuesday")], workout("Arms"));
    }

    #[test]
    fn test_commit_in_place_never_deletes() {
        let store = MemoryStore::new();
        let repo = WorkoutRepository::new(&store, user());
        repo.put(&workout("Legs")).unwrap();
        repo.assign(&slot("monday"), &workout("Legs")).unwrap();

        let workouts = store
            .watch_children(&DocPath::parse("users/u1/workouts").unwrap())
            .unwrap();
        workouts.snapshot(Duration::from_millis(100)).unwrap();

        let edited = Workout::new("Legs", vec![Exercise::new("lunge", "Lunge")]);
        let report = repo.commit(&edited, Some("Legs")).unwrap();

        assert_eq!(report, CommitReport::default());
        let event = workouts.try_next().unwrap();
        assert_eq!(event.kind, ChildEventKind::Changed);
        assert!(workouts.try_next().is_none());
        assert_eq!(repo.planner().unwrap()[&slot("monday")], workout("Legs"));
    }

    #[test]
    fn test_failed_rename_changes_nothing() {
        let store = MemoryStore::new();
        let repo = WorkoutRepository::new(&store, user());
        repo.put(&workout("Legs")).unwrap();
        repo.put(&workout("Arms")).unwrap();
        repo.assign(&slot("monday"), &workout("Legs")).unwrap();
        let before = store.to_value().unwrap();

        let err = repo.commit(&workout("Arms"), Some("Legs")).unwrap_err();

        assert!(matches!(err, Error::DuplicateTitle(_)));
        assert_eq!(store.to_value().unwrap(), before);
    }
}
