//! Tasks and their lifecycle.
//!
//! A task is claimed by exactly one worker. Its status is an atomic so the
//! owning thread can poll it without locking; waiting on completion goes
//! through a per-task mutex and condition variable.

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::loader::error::LoadError;
use crate::resource::handle::ResourceHandle;
use crate::sync::mutex::{Condvar, Mutex};

/// What a task does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Decode and register a texture.
    TextureLoad,
    /// Decode and register a scene.
    SceneLoad,
    /// Stage bytes and hand them to an upload function.
    BufferUpload,
    /// Run a caller-supplied function.
    Custom,
}

impl TaskKind {
    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::TextureLoad => "texture-load",
            TaskKind::SceneLoad => "scene-load",
            TaskKind::BufferUpload => "buffer-upload",
            TaskKind::Custom => "custom",
        }
    }
}

/// Scheduling priority. Higher priorities always start first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TaskPriority {
    /// Background work.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// Needed soon.
    High,
    /// Needed now.
    Critical,
}

impl TaskPriority {
    /// Number of priority lanes.
    pub const COUNT: usize = 4;

    /// Queue lane, 0 being served first.
    #[inline]
    pub(crate) fn lane(self) -> usize {
        match self {
            TaskPriority::Critical => 0,
            TaskPriority::High => 1,
            TaskPriority::Normal => 2,
            TaskPriority::Low => 3,
        }
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TaskStatus {
    /// Queued, not yet claimed.
    Pending = 0,
    /// Claimed by a worker.
    Running = 1,
    /// Finished successfully; the result is available.
    Completed = 2,
    /// Finished with an error message.
    Failed = 3,
    /// Removed from the queue before it ran.
    Cancelled = 4,
}

impl TaskStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskStatus::Pending,
            1 => TaskStatus::Running,
            2 => TaskStatus::Completed,
            3 => TaskStatus::Failed,
            _ => TaskStatus::Cancelled,
        }
    }

    /// Completed, failed or cancelled.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// Value produced by a completed task.
pub struct TaskResult {
    value: Box<dyn Any + Send>,
    size: usize,
}

impl TaskResult {
    /// Wrap a value, reporting its in-memory size.
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self::with_size(value, std::mem::size_of::<T>())
    }

    /// Wrap a value with an explicit size.
    pub fn with_size<T: Any + Send>(value: T, size: usize) -> Self {
        Self {
            value: Box::new(value),
            size,
        }
    }

    /// Size in bytes reported by the producer.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Borrow the value as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Take the value as `T`, or get the result back unchanged.
    pub fn downcast<T: Any>(self) -> Result<T, TaskResult> {
        let size = self.size;
        self.value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|value| TaskResult { value, size })
    }

    /// Take the registered resource of a built-in load task.
    pub fn into_resource(self) -> Option<ResourceHandle> {
        self.downcast::<ResourceHandle>().ok()
    }
}

impl fmt::Debug for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskResult").field("size", &self.size).finish()
    }
}

pub(crate) type TaskBody = Box<dyn FnOnce() -> Result<TaskResult, LoadError> + Send>;

/// Callback run on the owning thread by `process_completed`.
pub type TaskCallback = Box<dyn FnOnce(&Task) + Send>;

/// Box a closure as a completion callback.
pub fn on_complete<F>(callback: F) -> Option<TaskCallback>
where
    F: FnOnce(&Task) + Send + 'static,
{
    Some(Box::new(callback))
}

#[derive(Default)]
struct Timing {
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

/// One unit of loader work.
pub struct Task {
    id: u64,
    kind: TaskKind,
    priority: TaskPriority,
    label: String,
    status: AtomicU8,
    submitted_at: Instant,
    timing: Mutex<Timing>,
    body: Mutex<Option<TaskBody>>,
    callback: Mutex<Option<TaskCallback>>,
    result: Mutex<Option<TaskResult>>,
    error: Mutex<Option<String>>,
    done_lock: Mutex<()>,
    done: Condvar,
}

impl Task {
    pub(crate) fn new(
        id: u64,
        kind: TaskKind,
        priority: TaskPriority,
        label: String,
        body: TaskBody,
        callback: Option<TaskCallback>,
    ) -> Self {
        Self {
            id,
            kind,
            priority,
            label,
            status: AtomicU8::new(TaskStatus::Pending as u8),
            submitted_at: Instant::now(),
            timing: Mutex::new(Timing::default()),
            body: Mutex::new(Some(body)),
            callback: Mutex::new(callback),
            result: Mutex::new(None),
            error: Mutex::new(None),
            done_lock: Mutex::new(()),
            done: Condvar::new(),
        }
    }

    /// Loader-unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Task kind.
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Priority it was submitted with.
    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    /// Path or identifier the task works on (empty for custom tasks).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current status.
    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Error message of a failed task.
    pub fn error_message(&self) -> Option<String> {
        self.error.lock().clone()
    }

    /// Size of the result, if the task completed and it was not yet taken.
    pub fn result_size(&self) -> Option<usize> {
        self.result.lock().as_ref().map(TaskResult::size)
    }

    /// Take the result. Only a `Completed` task has one.
    pub fn take_result(&self) -> Option<TaskResult> {
        if self.status() != TaskStatus::Completed {
            return None;
        }
        self.result.lock().take()
    }

    /// When the task was submitted.
    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    /// Time spent queued, once a worker claimed it.
    pub fn queue_time(&self) -> Option<Duration> {
        self.timing
            .lock()
            .started_at
            .map(|started| started.duration_since(self.submitted_at))
    }

    /// Time spent running, once it finished.
    pub fn run_time(&self) -> Option<Duration> {
        let timing = self.timing.lock();
        Some(timing.finished_at?.duration_since(timing.started_at?))
    }

    /// Block until the task is terminal or `timeout` elapses.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut guard = self.done_lock.lock();
        loop {
            if self.status().is_terminal() {
                return true;
            }
            match deadline {
                None => self.done.wait(&mut guard),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.done.wait_for(&mut guard, deadline - now);
                }
            }
        }
    }

    fn transition(&self, from: TaskStatus, to: TaskStatus) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `Pending -> Running`. Called under the queue lock.
    pub(crate) fn try_start(&self) -> bool {
        if !self.transition(TaskStatus::Pending, TaskStatus::Running) {
            return false;
        }
        self.timing.lock().started_at = Some(Instant::now());
        true
    }

    /// `Pending -> Cancelled`. Called under the queue lock.
    pub(crate) fn try_cancel(&self) -> bool {
        self.transition(TaskStatus::Pending, TaskStatus::Cancelled)
    }

    pub(crate) fn take_body(&self) -> Option<TaskBody> {
        self.body.lock().take()
    }

    pub(crate) fn take_callback(&self) -> Option<TaskCallback> {
        self.callback.lock().take()
    }

    /// Store the outcome and wake waiters.
    ///
    /// `on_terminal` runs under the wait lock right after the status is
    /// stored, so anything it publishes is visible to a returning `wait`.
    pub(crate) fn finish(&self, outcome: Result<TaskResult, LoadError>, on_terminal: impl FnOnce()) {
        let status = match outcome {
            Ok(result) => {
                *self.result.lock() = Some(result);
                TaskStatus::Completed
            }
            Err(err) => {
                *self.error.lock() = Some(err.to_string());
                TaskStatus::Failed
            }
        };
        self.timing.lock().finished_at = Some(Instant::now());
        {
            let _guard = self.done_lock.lock();
            self.status.store(status as u8, Ordering::Release);
            on_terminal();
        }
        self.done.notify_all();
    }

    /// Drop the body and callback of a cancelled task and wake waiters.
    pub(crate) fn finish_cancelled(&self) {
        drop(self.take_body());
        drop(self.take_callback());
        self.timing.lock().finished_at = Some(Instant::now());
        let _guard = self.done_lock.lock();
        self.done.notify_all();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("label", &self.label)
            .field("status", &self.status())
            .finish()
    }
}

/// Caller-owned reference to a submitted task.
///
/// Not `Clone`: there is exactly one owner, who hands it back with
/// `AsyncLoader::free_task` once the task is terminal.
pub struct TaskHandle(pub(crate) Arc<Task>);

impl Deref for TaskHandle {
    type Target = Task;

    fn deref(&self) -> &Task {
        &self.0
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
