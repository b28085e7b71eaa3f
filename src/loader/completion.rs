//! Completion list drained by the owning thread.
//!
//! Workers push finished tasks from any thread; `process_completed` pops
//! them in the order they finished.

use std::sync::Arc;

use crossbeam_queue::SegQueue;

use crate::loader::task::Task;

/// Lock-free queue of terminal tasks awaiting their callbacks.
pub(crate) struct CompletionQueue {
    queue: SegQueue<Arc<Task>>,
}

impl CompletionQueue {
    pub(crate) fn new() -> Self {
        Self {
            queue: SegQueue::new(),
        }
    }

    /// Called by a worker once the task is terminal.
    pub(crate) fn push(&self, task: Arc<Task>) {
        self.queue.push(task);
    }

    pub(crate) fn pop(&self) -> Option<Arc<Task>> {
        self.queue.pop()
    }

    /// Approximate number of undrained completions.
    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}

impl Default for CompletionQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::task::{TaskKind, TaskPriority, TaskResult};

    #[test]
    fn test_completion_order() {
        let queue = CompletionQueue::new();
        for id in 0..3 {
            queue.push(Arc::new(Task::new(
                id,
                TaskKind::Custom,
                TaskPriority::Normal,
                String::new(),
                Box::new(|| Ok(TaskResult::new(()))),
                None,
            )));
        }

        assert_eq!(queue.len(), 3);
        let ids: Vec<u64> = std::iter::from_fn(|| queue.pop()).map(|t| t.id()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }
}
