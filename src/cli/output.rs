use serde::Serialize;

use crate::model::task::Task;
use crate::ops::stats::TaskStats;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ListJson<'a> {
    pub tasks: &'a [Task],
    pub stats: StatsJson,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

#[derive(Serialize)]
pub struct StatsJson {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub progress_percent: u8,
    pub all_completed: bool,
}

/// Result of a toggle or delete
#[derive(Serialize)]
pub struct ChangeJson {
    pub id: i64,
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

pub fn stats_to_json(stats: &TaskStats) -> StatsJson {
    StatsJson {
        total: stats.total,
        completed: stats.completed,
        remaining: stats.remaining(),
        progress_percent: stats.progress_percent(),
        all_completed: stats.all_completed(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// Format a single task as a one-line summary
pub fn format_task_line(task: &Task) -> String {
    format!("[{}] {} {}", task.checkbox_char(), task.id, task.title)
}

pub fn format_progress(stats: &TaskStats) -> String {
    format!(
        "Progress: {}/{} completed ({}%)",
        stats.completed,
        stats.total,
        stats.progress_percent()
    )
}

/// Format the full list view: empty state, or progress followed by tasks
pub fn format_task_list(tasks: &[Task], stats: &TaskStats) -> Vec<String> {
    if tasks.is_empty() {
        return vec![
            "No tasks yet".to_string(),
            "Add a task to get started!".to_string(),
        ];
    }

    let mut lines = vec![format_progress(stats), String::new()];
    lines.extend(tasks.iter().map(format_task_line));
    if stats.all_completed() {
        lines.push(String::new());
        lines.push("All tasks completed! Great job!".to_string());
    }
    lines
}
