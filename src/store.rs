//! The task store: canonical in-memory collection plus its persistence and
//! one-time seeding.
//!
//! Every mutation replaces the collection with a new `Arc<[Task]>` and
//! writes it through to the key-value store before returning. Snapshots
//! handed out by [`TaskStore::snapshot`] never change afterwards.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::io::seed::{SeedError, SeedSource};
use crate::io::storage::{KeyValueStore, StorageError};
use crate::model::task::{STORAGE_KEY, Task};
use crate::ops::stats::{TaskStats, task_stats};
use crate::ops::task_ops;

/// Default number of tasks requested from the seed source
pub const DEFAULT_SEED_LIMIT: usize = 5;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not persist tasks under {key}: {source}")]
    Persist {
        key: &'static str,
        source: StorageError,
    },
    #[error("could not serialize tasks: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeedState {
    /// Collection was empty at open; no fetch issued yet
    Pending,
    /// Fetch issued, waiting for `complete_seed`
    InFlight,
    Settled,
}

/// Permission to apply one seed response to the store that issued it.
#[derive(Debug)]
pub struct SeedTicket {
    store: u64,
    limit: usize,
}

impl SeedTicket {
    /// Number of tasks to request
    pub fn limit(&self) -> usize {
        self.limit
    }
}

pub struct TaskStore<S: KeyValueStore> {
    storage: S,
    tasks: Arc<[Task]>,
    loading: bool,
    error: Option<String>,
    version: u64,
    seed: SeedState,
    seed_limit: usize,
    instance: u64,
    clock: fn() -> i64,
}

impl<S: KeyValueStore> TaskStore<S> {
    /// Open the store, loading the persisted collection.
    ///
    /// A missing or unreadable value loads as an empty collection. An empty
    /// collection leaves the store loading until a seed is applied or
    /// skipped.
    pub fn open(storage: S) -> Self {
        let tasks = load_tasks(&storage);
        let empty = tasks.is_empty();
        TaskStore {
            storage,
            tasks: tasks.into(),
            loading: empty,
            error: None,
            version: 0,
            seed: if empty {
                SeedState::Pending
            } else {
                SeedState::Settled
            },
            seed_limit: DEFAULT_SEED_LIMIT,
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            clock: task_ops::now_millis,
        }
    }

    pub fn with_seed_limit(mut self, limit: usize) -> Self {
        self.seed_limit = limit;
        self
    }

    /// Replace the millisecond clock used for new ids
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Shared handle to the current collection value
    pub fn snapshot(&self) -> Arc<[Task]> {
        Arc::clone(&self.tasks)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Initialization error message, if the seed fetch failed
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Incremented every time the collection is replaced
    pub fn version(&self) -> u64 {
        self.version
    }

    /// True until a seed has been requested, applied, or skipped
    pub fn needs_seed(&self) -> bool {
        self.seed == SeedState::Pending
    }

    pub fn stats(&self) -> TaskStats {
        task_stats(&self.tasks)
    }

    // -----------------------------------------------------------------------
    // Initialization
    // -----------------------------------------------------------------------

    /// Run the initialization protocol against `source`.
    ///
    /// Fetches only when the collection was empty at open, and only once per
    /// store. Fetch failures are recorded in [`error`](Self::error); only a
    /// failed write of the seeded collection is returned.
    pub fn initialize(&mut self, source: &dyn SeedSource) -> Result<(), StoreError> {
        match self.begin_seed() {
            Some(ticket) => {
                let result = source.fetch(ticket.limit());
                self.complete_seed(ticket, result)
            }
            None => Ok(()),
        }
    }

    /// Mark the seed fetch as issued. `None` when no fetch is needed.
    pub fn begin_seed(&mut self) -> Option<SeedTicket> {
        if self.seed != SeedState::Pending {
            return None;
        }
        self.seed = SeedState::InFlight;
        tracing::info!(limit = self.seed_limit, "collection empty, fetching seed tasks");
        Some(SeedTicket {
            store: self.instance,
            limit: self.seed_limit,
        })
    }

    /// Apply the outcome of a seed fetch started with [`begin_seed`](Self::begin_seed).
    ///
    /// Tickets from another store, or arriving after the store settled, are
    /// discarded. Seeded tasks replace the collection only while it is still
    /// empty, so tasks added during the fetch are kept.
    pub fn complete_seed(
        &mut self,
        ticket: SeedTicket,
        result: Result<Vec<Task>, SeedError>,
    ) -> Result<(), StoreError> {
        if ticket.store != self.instance || self.seed != SeedState::InFlight {
            tracing::debug!("discarding seed response for a settled store");
            return Ok(());
        }
        self.seed = SeedState::Settled;
        self.loading = false;

        match result {
            Ok(seeded) if self.tasks.is_empty() => {
                tracing::info!(count = seeded.len(), "seeded task list");
                self.replace(task_ops::dedup_by_id(seeded))
            }
            Ok(_) => {
                tracing::debug!("collection changed during seed fetch, keeping local tasks");
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = %e, "recording initialization error");
                self.error = Some(e.to_string());
                Ok(())
            }
        }
    }

    /// Settle initialization without fetching (seeding disabled).
    pub fn skip_seed(&mut self) {
        if matches!(self.seed, SeedState::Pending | SeedState::InFlight) {
            self.seed = SeedState::Settled;
            self.loading = false;
        }
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Append a new, not yet completed task. The title is stored as given.
    pub fn add_task(&mut self, title: impl Into<String>) -> Result<Task, StoreError> {
        let id = task_ops::next_id(&self.tasks, (self.clock)());
        let task = Task::new(id, title);
        let next = task_ops::with_added(&self.tasks, task.clone());
        self.replace(next)?;
        Ok(task)
    }

    /// Flip `completed` on the task with `id`. Returns whether one matched.
    pub fn toggle_task(&mut self, id: i64) -> Result<bool, StoreError> {
        let (next, matched) = task_ops::with_toggled(&self.tasks, id);
        self.replace(next)?;
        Ok(matched)
    }

    /// Remove the task with `id`. Returns whether one was removed.
    pub fn delete_task(&mut self, id: i64) -> Result<bool, StoreError> {
        let (next, removed) = task_ops::without(&self.tasks, id);
        self.replace(next)?;
        Ok(removed)
    }

    fn replace(&mut self, next: Vec<Task>) -> Result<(), StoreError> {
        self.tasks = next.into();
        self.version += 1;
        self.persist()
    }

    fn persist(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string(&*self.tasks)?;
        self.storage.set(STORAGE_KEY, &json).map_err(|e| {
            tracing::error!(context = "persist", error = %e, "could not save tasks");
            StoreError::Persist {
                key: STORAGE_KEY,
                source: e,
            }
        })
    }
}

/// Read the persisted collection, treating absence or corruption as empty.
fn load_tasks(storage: &impl KeyValueStore) -> Vec<Task> {
    let raw = match storage.get(STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(context = "load", error = %e, "could not read saved tasks");
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<Task>>(&raw) {
        Ok(tasks) => task_ops::dedup_by_id(tasks),
        Err(e) => {
            tracing::warn!(context = "load", error = %e, "saved tasks are malformed, starting empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::storage::MemoryStore;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn seeded(n: i64) -> Vec<Task> {
        (1..=n)
            .map(|i| Task {
                user_id: Some(1),
                ..Task::new(i, format!("seed {}", i))
            })
            .collect()
    }

    fn seed_of(n: i64) -> impl Fn(usize) -> Result<Vec<Task>, SeedError> {
        move |_| Ok(seeded(n))
    }

    fn fixed_clock() -> i64 {
        1_700_000_000_000
    }

    /// Seed source that must never be called
    fn no_fetch(_: usize) -> Result<Vec<Task>, SeedError> {
        panic!("seed fetch should not be issued");
    }

    fn server_error(_: usize) -> Result<Vec<Task>, SeedError> {
        Err(SeedError::Status {
            code: 500,
            text: "Internal Server Error".into(),
        })
    }

    /// Storage whose writes always fail
    struct FullStorage;

    impl KeyValueStore for FullStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(Some(r#"[{"id":1,"title":"x","completed":false}]"#.into()))
        }

        fn set(&self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Rejected {
                key: key.into(),
                reason: "quota exceeded".into(),
            })
        }
    }

    // --- Loading ---

    #[test]
    fn persisted_collection_skips_fetch() {
        let storage =
            MemoryStore::with_entry(STORAGE_KEY, r#"[{"id":1,"title":"x","completed":false}]"#);
        let mut store = TaskStore::open(&storage);
        assert!(!store.is_loading());
        assert!(!store.needs_seed());

        store.initialize(&no_fetch).unwrap();
        assert!(!store.is_loading());
        assert_eq!(store.tasks(), &[Task::new(1, "x")]);
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn malformed_storage_loads_empty() {
        let storage = MemoryStore::with_entry(STORAGE_KEY, "{ not json");
        let store = TaskStore::open(&storage);
        assert!(store.tasks().is_empty());
        assert!(store.is_loading());
        assert!(store.needs_seed());
        assert!(store.error().is_none());
    }

    #[test]
    fn wrong_shape_loads_empty() {
        let storage = MemoryStore::with_entry(STORAGE_KEY, r#"{"id":1}"#);
        assert!(TaskStore::open(&storage).tasks().is_empty());
    }

    #[test]
    fn persisted_empty_array_triggers_seed() {
        let storage = MemoryStore::with_entry(STORAGE_KEY, "[]");
        let store = TaskStore::open(&storage);
        assert!(store.needs_seed());
    }

    // --- Seeding ---

    #[test]
    fn empty_storage_is_seeded_in_response_order() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage);
        assert!(store.is_loading());

        let calls = Cell::new(0);
        let source = |limit: usize| -> Result<Vec<Task>, SeedError> {
            calls.set(calls.get() + 1);
            assert_eq!(limit, 5);
            Ok(seeded(5))
        };
        store.initialize(&source).unwrap();

        assert!(!store.is_loading());
        assert!(store.error().is_none());
        assert_eq!(calls.get(), 1);
        let ids: Vec<i64> = store.tasks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        let saved: Vec<Task> = serde_json::from_str(&storage.raw(STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(saved, store.tasks());
    }

    #[test]
    fn failed_seed_sets_error_and_stays_empty() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage);
        store.initialize(&server_error).unwrap();

        assert!(!store.is_loading());
        assert_eq!(
            store.error(),
            Some("Failed to fetch tasks: 500 Internal Server Error")
        );
        assert!(store.tasks().is_empty());
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn initialize_runs_once() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage);
        store.initialize(&server_error).unwrap();
        // No retry: the second call never reaches the source
        store.initialize(&no_fetch).unwrap();
        assert!(store.error().is_some());
    }

    #[test]
    fn seed_limit_is_passed_to_source() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage).with_seed_limit(2);
        let source = |limit: usize| -> Result<Vec<Task>, SeedError> { Ok(seeded(limit as i64)) };
        store.initialize(&source).unwrap();
        assert_eq!(store.tasks().len(), 2);
    }

    #[test]
    fn split_seed_applies_result() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage);
        let ticket = store.begin_seed().unwrap();
        assert!(store.is_loading());
        assert!(store.begin_seed().is_none());

        store.complete_seed(ticket, Ok(seeded(3))).unwrap();
        assert!(!store.is_loading());
        assert_eq!(store.tasks().len(), 3);
    }

    #[test]
    fn ticket_from_another_store_is_discarded() {
        let storage_a = MemoryStore::new();
        let storage_b = MemoryStore::new();
        let mut a = TaskStore::open(&storage_a);
        let mut b = TaskStore::open(&storage_b);

        let ticket_a = a.begin_seed().unwrap();
        let _ticket_b = b.begin_seed().unwrap();
        b.complete_seed(ticket_a, Ok(seeded(5))).unwrap();

        assert!(b.tasks().is_empty());
        assert!(b.is_loading());
        assert_eq!(storage_b.write_count(), 0);
    }

    #[test]
    fn late_ticket_after_skip_is_discarded() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage);
        let ticket = store.begin_seed().unwrap();
        store.skip_seed();

        store.complete_seed(ticket, Ok(seeded(5))).unwrap();
        assert!(store.tasks().is_empty());
        assert!(!store.is_loading());
    }

    #[test]
    fn tasks_added_during_fetch_are_kept() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage).with_clock(fixed_clock);
        let ticket = store.begin_seed().unwrap();
        store.add_task("mine").unwrap();

        store.complete_seed(ticket, Ok(seeded(5))).unwrap();
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.tasks()[0].title, "mine");
        assert!(!store.is_loading());
    }

    #[test]
    fn skip_seed_settles_without_fetch() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage);
        store.skip_seed();
        store.initialize(&no_fetch).unwrap();
        assert!(!store.is_loading());
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn duplicate_ids_are_dropped_on_load() {
        let storage = MemoryStore::with_entry(
            STORAGE_KEY,
            r#"[{"id":1,"title":"a","completed":false},{"id":1,"title":"b","completed":true}]"#,
        );
        let mut store = TaskStore::open(&storage);
        assert_eq!(store.tasks(), &[Task::new(1, "a")]);

        assert!(store.delete_task(1).unwrap());
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn duplicate_ids_are_dropped_from_seed() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage);
        let source = |_: usize| -> Result<Vec<Task>, SeedError> {
            Ok(vec![Task::new(1, "a"), Task::new(2, "b"), Task::new(1, "c")])
        };
        store.initialize(&source).unwrap();
        let ids: Vec<i64> = store.tasks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    // --- Operations ---

    #[test]
    fn add_appends_incomplete_task_and_persists() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage).with_clock(fixed_clock);
        store.skip_seed();

        let task = store.add_task("hello").unwrap();
        assert_eq!(task.id, fixed_clock());
        assert_eq!(task.title, "hello");
        assert!(!task.completed);
        assert_eq!(store.tasks(), &[task]);
        assert_eq!(
            storage.raw(STORAGE_KEY).as_deref(),
            Some(r#"[{"id":1700000000000,"title":"hello","completed":false}]"#)
        );
    }

    #[test]
    fn store_does_not_validate_titles() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage);
        let long = "x".repeat(500);
        let task = store.add_task(format!("  {}  ", long)).unwrap();
        assert_eq!(task.title.len(), 504);
    }

    #[test]
    fn rapid_adds_get_distinct_ids() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage).with_clock(fixed_clock);
        let a = store.add_task("a").unwrap();
        let b = store.add_task("b").unwrap();
        let c = store.add_task("c").unwrap();
        assert_eq!(a.id + 1, b.id);
        assert_eq!(b.id + 1, c.id);
    }

    #[test]
    fn add_after_max_id_does_not_overflow() {
        let storage = MemoryStore::with_entry(
            STORAGE_KEY,
            r#"[{"id":9223372036854775807,"title":"x","completed":false}]"#,
        );
        let mut store = TaskStore::open(&storage).with_clock(fixed_clock);
        let task = store.add_task("y").unwrap();
        assert_eq!(task.id, i64::MAX - 1);
        assert_eq!(store.tasks().len(), 2);
    }

    #[test]
    fn toggle_twice_restores_completed() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage);
        store.initialize(&seed_of(3)).unwrap();

        assert!(store.toggle_task(2).unwrap());
        assert!(store.tasks()[1].completed);
        assert!(store.toggle_task(2).unwrap());
        assert!(!store.tasks()[1].completed);
    }

    #[test]
    fn toggle_missing_id_is_a_noop() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage);
        store.initialize(&seed_of(3)).unwrap();
        let before = store.snapshot();

        assert!(!store.toggle_task(42).unwrap());
        assert_eq!(store.tasks(), &*before);
    }

    #[test]
    fn delete_removes_and_missing_id_is_a_noop() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage);
        store.initialize(&seed_of(3)).unwrap();

        assert!(store.delete_task(2).unwrap());
        let before = store.snapshot();
        assert!(!store.delete_task(2).unwrap());
        assert_eq!(store.tasks(), &*before);
        let ids: Vec<i64> = store.tasks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn snapshots_are_not_mutated_by_later_operations() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage);
        store.initialize(&seed_of(2)).unwrap();

        let before = store.snapshot();
        let version = store.version();
        store.toggle_task(1).unwrap();

        assert!(!before[0].completed);
        assert!(store.tasks()[0].completed);
        assert!(!Arc::ptr_eq(&before, &store.snapshot()));
        assert_eq!(store.version(), version + 1);
    }

    #[test]
    fn every_operation_writes_through() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage);
        store.skip_seed();
        let task = store.add_task("a").unwrap();
        store.toggle_task(task.id).unwrap();
        store.delete_task(task.id).unwrap();
        assert_eq!(storage.write_count(), 3);
        assert_eq!(storage.raw(STORAGE_KEY).as_deref(), Some("[]"));
    }

    #[test]
    fn persist_failure_is_returned() {
        let mut store = TaskStore::open(FullStorage);
        let err = store.toggle_task(1).unwrap_err();
        assert!(matches!(err, StoreError::Persist { key: STORAGE_KEY, .. }));
        assert!(err.to_string().contains("quota exceeded"));
        // In-memory state keeps the new value
        assert!(store.tasks()[0].completed);
    }

    #[test]
    fn stats_follow_the_collection() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::open(&storage);
        store.initialize(&seed_of(4)).unwrap();
        store.toggle_task(1).unwrap();
        let stats = store.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.progress_percent(), 25);
    }
}
