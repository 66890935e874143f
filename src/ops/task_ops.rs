use std::collections::HashSet;

use chrono::Utc;

use crate::model::task::Task;

// ---------------------------------------------------------------------------
// Id generation
// ---------------------------------------------------------------------------

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Pick an id for a new task.
///
/// Uses the clock reading when it is above every existing id, otherwise one
/// past the largest id, so two adds inside the same millisecond never
/// collide. When the largest id is `i64::MAX` the id goes below the
/// smallest one instead, or into the first free non-negative slot.
pub fn next_id(tasks: &[Task], now_ms: i64) -> i64 {
    let max = match tasks.iter().map(|t| t.id).max() {
        Some(max) if max >= now_ms => max,
        _ => return now_ms,
    };
    if let Some(id) = max.checked_add(1) {
        return id;
    }
    let min = tasks.iter().map(|t| t.id).min().unwrap_or(max);
    if let Some(id) = min.checked_sub(1) {
        return id;
    }
    let used: HashSet<i64> = tasks.iter().map(|t| t.id).collect();
    (0..=i64::MAX).find(|id| !used.contains(id)).unwrap_or(0)
}

/// Drop later tasks whose id already appeared, keeping the first.
pub fn dedup_by_id(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::with_capacity(tasks.len());
    tasks.into_iter().filter(|t| seen.insert(t.id)).collect()
}

// ---------------------------------------------------------------------------
// Collection transforms
// ---------------------------------------------------------------------------

/// New collection with `task` appended at the end.
pub fn with_added(tasks: &[Task], task: Task) -> Vec<Task> {
    let mut next = Vec::with_capacity(tasks.len() + 1);
    next.extend_from_slice(tasks);
    next.push(task);
    next
}

/// New collection with `completed` flipped on the task matching `id`.
/// Returns the collection and whether a task matched.
pub fn with_toggled(tasks: &[Task], id: i64) -> (Vec<Task>, bool) {
    let mut matched = false;
    let next = tasks
        .iter()
        .map(|t| {
            if t.id == id {
                matched = true;
                Task {
                    completed: !t.completed,
                    ..t.clone()
                }
            } else {
                t.clone()
            }
        })
        .collect();
    (next, matched)
}

/// New collection without the task matching `id`.
/// Returns the collection and whether a task was removed.
pub fn without(tasks: &[Task], id: i64) -> (Vec<Task>, bool) {
    let next: Vec<Task> = tasks.iter().filter(|t| t.id != id).cloned().collect();
    let removed = next.len() != tasks.len();
    (next, removed)
}

pub fn find_task(tasks: &[Task], id: i64) -> Option<&Task> {
    tasks.iter().find(|t| t.id == id)
}
