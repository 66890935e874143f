use serde::{Deserialize, Serialize};

/// Fixed storage key the task collection is persisted under
pub const STORAGE_KEY: &str = "taskManager.tasks";

/// A single to-do item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique within the collection
    pub id: i64,
    /// Task title text
    #[serde(default)]
    pub title: String,
    /// Completion flag
    #[serde(default)]
    pub completed: bool,
    /// Owner reported by the remote seed (seeded tasks only)
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

impl Task {
    /// Create a new, not yet completed task
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Task {
            id,
            title: title.into(),
            completed: false,
            user_id: None,
        }
    }

    /// Checkbox glyph used in list output
    pub fn checkbox_char(&self) -> char {
        if self.completed { 'x' } else { ' ' }
    }
}
