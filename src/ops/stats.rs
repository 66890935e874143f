use crate::model::task::Task;

/// Progress summary for a task collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
}

impl TaskStats {
    /// Completed share as a whole percentage, rounded half up. 0 when empty.
    pub fn progress_percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed * 200 + self.total) / (self.total * 2)) as u8
    }

    pub fn remaining(&self) -> usize {
        self.total - self.completed
    }

    pub fn all_completed(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

pub fn task_stats(tasks: &[Task]) -> TaskStats {
    TaskStats {
        total: tasks.len(),
        completed: tasks.iter().filter(|t| t.completed).count(),
    }
}
