//! Priority task queue shared by the workers.
//!
//! Four FIFO lanes consulted from `Critical` down to `Low`. Claiming a task
//! (`Pending -> Running`) and cancelling one (`Pending -> Cancelled`) both
//! happen under the queue lock, so a task is never both.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::loader::error::SubmitError;
use crate::loader::task::{Task, TaskPriority, TaskStatus};
use crate::sync::mutex::{Condvar, Mutex};

/// Cancelled entries left in the lanes before a compaction pass.
const STALE_COMPACT_THRESHOLD: usize = 64;

struct QueueState {
    lanes: [VecDeque<Arc<Task>>; TaskPriority::COUNT],
    /// Pending tasks, excluding cancelled entries still sitting in a lane
    len: usize,
    /// Cancelled entries still sitting in a lane
    stale: usize,
    accepting: bool,
}

impl QueueState {
    /// Next entry in priority order, pending or cancelled.
    fn pop_front(&mut self) -> Option<Arc<Task>> {
        self.lanes.iter_mut().find_map(VecDeque::pop_front)
    }

    /// Drop cancelled entries once they outnumber live ones.
    fn compact(&mut self) {
        if self.stale < STALE_COMPACT_THRESHOLD || self.stale < self.len {
            return;
        }
        for lane in &mut self.lanes {
            lane.retain(|task| task.status() == TaskStatus::Pending);
        }
        self.stale = 0;
    }
}

pub(crate) struct TaskQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    max_size: usize,
    priority_enabled: bool,
}

impl TaskQueue {
    pub(crate) fn new(max_size: usize, priority_enabled: bool) -> Self {
        Self {
            state: Mutex::new(QueueState {
                lanes: Default::default(),
                len: 0,
                stale: 0,
                accepting: true,
            }),
            available: Condvar::new(),
            max_size,
            priority_enabled,
        }
    }

    fn lane_for(&self, priority: TaskPriority) -> usize {
        if self.priority_enabled {
            priority.lane()
        } else {
            0
        }
    }

    /// Queue a task. Never blocks beyond the queue lock.
    pub(crate) fn push(&self, task: Arc<Task>) -> Result<(), SubmitError> {
        let mut state = self.state.lock();
        if !state.accepting {
            return Err(SubmitError::ShutDown);
        }
        if self.max_size > 0 && state.len >= self.max_size {
            return Err(SubmitError::QueueFull);
        }
        let lane = self.lane_for(task.priority());
        state.lanes[lane].push_back(task);
        state.len += 1;
        drop(state);

        self.available.notify_one();
        Ok(())
    }

    /// Claim the next task, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue is empty and no longer accepting.
    pub(crate) fn pop(&self) -> Option<Arc<Task>> {
        let mut state = self.state.lock();
        loop {
            while let Some(task) = state.pop_front() {
                if task.try_start() {
                    state.len -= 1;
                    return Some(task);
                }
                state.stale = state.stale.saturating_sub(1);
            }
            if !state.accepting {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /// Cancel a still-pending task.
    ///
    /// The entry stays in its lane and is discarded by `pop`, so this never
    /// scans a lane.
    pub(crate) fn cancel(&self, task: &Arc<Task>) -> bool {
        let mut state = self.state.lock();
        if !task.try_cancel() {
            return false;
        }
        state.len -= 1;
        state.stale += 1;
        state.compact();
        true
    }

    /// Stop accepting work and wake every worker. Pending tasks stay queued.
    pub(crate) fn close(&self) {
        self.state.lock().accepting = false;
        self.available.notify_all();
    }

    /// Stop accepting work, cancel everything pending and return it.
    pub(crate) fn close_and_cancel(&self) -> Vec<Arc<Task>> {
        let mut cancelled = Vec::new();
        {
            let mut state = self.state.lock();
            state.accepting = false;
            while let Some(task) = state.pop_front() {
                if task.try_cancel() {
                    cancelled.push(task);
                }
            }
            state.len = 0;
            state.stale = 0;
        }
        self.available.notify_all();
        cancelled
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().len
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.state.lock().accepting
    }
}
