//! Asynchronous task loader.
//!
//! A fixed pool of worker threads services a priority queue. Built-in tasks
//! coordinate with the state tracker and the registry so each identifier is
//! decoded at most once; custom tasks run arbitrary closures. Finished tasks
//! are collected on a completion list and their callbacks run on the thread
//! that created the loader, inside `process_completed`.

pub mod decode;
pub mod error;
pub mod task;

pub(crate) mod completion;
pub(crate) mod queue;
pub(crate) mod worker;

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crate::api::config::LoaderConfig;
use crate::api::context::AssetContext;
use crate::loader::completion::CompletionQueue;
use crate::loader::queue::TaskQueue;
use crate::loader::worker::{LoadServices, LoaderCounters, LoaderShared};

pub use decode::{AssetDecoder, AssetKind, DecodedAsset};
pub use error::{LoadError, LoaderError, SubmitError};
pub use task::{on_complete, Task, TaskCallback, TaskHandle, TaskKind, TaskPriority, TaskResult, TaskStatus};

/// How `shutdown` treats queued work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownMode {
    /// Run every queued task, then stop.
    #[default]
    Graceful,
    /// Cancel queued tasks, let running ones finish, then stop.
    Immediate,
}

/// Snapshot of loader activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Tasks accepted by `submit_*`
    pub submitted: u64,
    /// Tasks that finished successfully
    pub completed: u64,
    /// Tasks that finished with an error
    pub failed: u64,
    /// Tasks cancelled before running
    pub cancelled: u64,
    /// Tasks still queued
    pub pending: usize,
    /// Tasks currently on a worker
    pub running: usize,
}

/// Worker pool with a priority queue and main-thread completion callbacks.
///
/// # Example
///
/// ```rust
/// use assetcore::{AssetContext, CoreConfig, LoaderConfig, TaskPriority, TaskStatus};
///
/// let ctx = AssetContext::new(CoreConfig::default());
/// let loader = ctx.spawn_loader_with(LoaderConfig::default().with_workers(2)).unwrap();
///
/// let task = loader
///     .submit_custom(|| Ok(6 * 7), TaskPriority::Normal, None)
///     .unwrap();
/// assert!(loader.wait_for_task(&task, None));
/// assert_eq!(task.status(), TaskStatus::Completed);
/// assert_eq!(task.take_result().unwrap().downcast::<i32>().unwrap(), 42);
///
/// loader.process_completed(0);
/// loader.free_task(task).unwrap();
/// ```
pub struct AsyncLoader {
    shared: Arc<LoaderShared>,
    services: Arc<LoadServices>,
    workers: Vec<JoinHandle<()>>,
    owner: ThreadId,
    next_id: AtomicU64,
    config: LoaderConfig,
}

impl AsyncLoader {
    /// Start a loader using the context's registry, tracker and allocator.
    ///
    /// The calling thread becomes the owning thread that drains completions.
    pub fn new(ctx: &AssetContext, config: LoaderConfig) -> Result<Self, LoaderError> {
        config.validate().map_err(LoaderError::InvalidConfig)?;
        let worker_count = config.resolved_worker_count();

        let shared = Arc::new(LoaderShared {
            queue: TaskQueue::new(config.max_queue_size, config.priority_enabled),
            completions: CompletionQueue::new(),
            counters: LoaderCounters::default(),
        });
        let services = Arc::new(LoadServices {
            registry: ctx.registry().clone(),
            tracker: ctx.tracker().clone(),
            memory: ctx.memory().clone(),
            decoders: Default::default(),
        });

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let worker_shared = shared.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name, index))
                .spawn(move || worker::worker_loop(worker_shared, index));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    shared.queue.close();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    crate::ac_log!(error, "failed to spawn loader worker {}: {}", index, err);
                    return Err(LoaderError::SpawnFailed(err));
                }
            }
        }

        crate::ac_log!(
            info,
            "loader started with {} workers (queue limit {}, priorities {})",
            worker_count,
            config.max_queue_size,
            config.priority_enabled
        );

        Ok(Self {
            shared,
            services,
            workers,
            owner: thread::current().id(),
            next_id: AtomicU64::new(1),
            config,
        })
    }

    /// Configuration the loader was started with.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Register the decoder for built-in loads of `kind`.
    pub fn set_decoder(&self, kind: AssetKind, decoder: impl AssetDecoder) {
        self.services.decoders.set(kind, Arc::new(decoder));
    }

    /// Remove the decoder for `kind`. Later loads of that kind fail.
    pub fn clear_decoder(&self, kind: AssetKind) -> bool {
        self.services.decoders.remove(kind)
    }

    fn enqueue(
        &self,
        kind: TaskKind,
        priority: TaskPriority,
        label: String,
        body: task::TaskBody,
        callback: Option<TaskCallback>,
    ) -> Result<TaskHandle, SubmitError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let task = Arc::new(Task::new(id, kind, priority, label, body, callback));

        match self.shared.queue.push(task.clone()) {
            Ok(()) => {
                self.shared.counters.submitted.increment();
                Ok(TaskHandle(task))
            }
            Err(err) => {
                if err == SubmitError::QueueFull {
                    crate::ac_emit_ctx!(
                        AC303,
                        "kind={}, label={:?}, limit={}",
                        kind.name(),
                        task.label(),
                        self.config.max_queue_size
                    );
                }
                Err(err)
            }
        }
    }

    fn submit_load(
        &self,
        kind: TaskKind,
        asset: AssetKind,
        path: String,
        priority: TaskPriority,
        callback: Option<TaskCallback>,
    ) -> Result<TaskHandle, SubmitError> {
        let services = self.services.clone();
        let label = path.clone();
        let body = Box::new(move || worker::load_asset(&services, asset, &path));
        self.enqueue(kind, priority, label, body, callback)
    }

    /// Load a texture through the texture decoder.
    ///
    /// On success the result holds a `ResourceHandle` (see
    /// [`TaskResult::into_resource`]).
    pub fn submit_texture_load(
        &self,
        path: impl Into<String>,
        priority: TaskPriority,
        callback: Option<TaskCallback>,
    ) -> Result<TaskHandle, SubmitError> {
        self.submit_load(
            TaskKind::TextureLoad,
            AssetKind::Texture,
            path.into(),
            priority,
            callback,
        )
    }

    /// Load a scene through the scene decoder.
    pub fn submit_scene_load(
        &self,
        path: impl Into<String>,
        priority: TaskPriority,
        callback: Option<TaskCallback>,
    ) -> Result<TaskHandle, SubmitError> {
        self.submit_load(
            TaskKind::SceneLoad,
            AssetKind::Scene,
            path.into(),
            priority,
            callback,
        )
    }

    /// Stage `bytes` in tracked memory on a worker and pass them to `upload`.
    ///
    /// The result holds the number of bytes uploaded.
    pub fn submit_buffer_upload<F>(
        &self,
        identifier: impl Into<String>,
        bytes: Vec<u8>,
        upload: F,
        priority: TaskPriority,
        callback: Option<TaskCallback>,
    ) -> Result<TaskHandle, SubmitError>
    where
        F: FnOnce(&str, &[u8]) -> Result<(), LoadError> + Send + 'static,
    {
        let identifier = identifier.into();
        let label = identifier.clone();
        let services = self.services.clone();
        let body = Box::new(move || worker::upload_buffer(&services, &identifier, &bytes, upload));
        self.enqueue(TaskKind::BufferUpload, priority, label, body, callback)
    }

    /// Run `f` on a worker. Its value becomes the task result.
    pub fn submit_custom<T, F>(
        &self,
        f: F,
        priority: TaskPriority,
        callback: Option<TaskCallback>,
    ) -> Result<TaskHandle, SubmitError>
    where
        T: Any + Send,
        F: FnOnce() -> Result<T, LoadError> + Send + 'static,
    {
        let body = Box::new(move || f().map(TaskResult::new));
        self.enqueue(TaskKind::Custom, priority, String::new(), body, callback)
    }

    /// Cancel a task that has not started. Its callback will never run.
    pub fn cancel(&self, task: &TaskHandle) -> bool {
        if !self.shared.queue.cancel(&task.0) {
            return false;
        }
        task.finish_cancelled();
        self.shared.counters.cancelled.increment();
        crate::ac_log!(debug, "cancelled task {}", task.id());
        true
    }

    /// Block until `task` is terminal or `timeout` elapses.
    pub fn wait_for_task(&self, task: &Task, timeout: Option<Duration>) -> bool {
        task.wait(timeout)
    }

    /// Run callbacks of finished tasks, in completion order.
    ///
    /// Drains at most `max_tasks` (0 means all) and returns how many were
    /// drained. Only the thread that created the loader may call this.
    pub fn process_completed(&self, max_tasks: usize) -> usize {
        if thread::current().id() != self.owner {
            crate::ac_emit_ctx!(AC302, "owner={:?}", self.owner);
            return 0;
        }

        let limit = if max_tasks == 0 { usize::MAX } else { max_tasks };
        let mut drained = 0;
        while drained < limit {
            let Some(task) = self.shared.completions.pop() else {
                break;
            };
            if let Some(callback) = task.take_callback() {
                callback(&task);
            }
            drained += 1;
        }
        drained
    }

    /// Release a terminal task. A task still pending or running is handed
    /// back unchanged.
    pub fn free_task(&self, task: TaskHandle) -> Result<(), TaskHandle> {
        let status = task.status();
        if !status.is_terminal() {
            crate::ac_emit_ctx!(AC301, "task={}, status={:?}", task.id(), status);
            return Err(task);
        }
        drop(task);
        Ok(())
    }

    /// Tasks waiting in the queue.
    pub fn get_pending_task_count(&self) -> usize {
        self.shared.queue.len()
    }

    /// Live worker threads.
    pub fn get_worker_thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Finished tasks whose callbacks have not been drained yet.
    pub fn completed_count(&self) -> usize {
        self.shared.completions.len()
    }

    /// Snapshot of activity counters.
    pub fn stats(&self) -> LoaderStats {
        let counters = &self.shared.counters;
        LoaderStats {
            submitted: counters.submitted.get(),
            completed: counters.completed.get(),
            failed: counters.failed.get(),
            cancelled: counters.cancelled.get(),
            pending: self.shared.queue.len(),
            running: counters.running.get(),
        }
    }

    /// Stop the workers and join them.
    ///
    /// New submissions fail with `SubmitError::ShutDown` afterwards. Tasks
    /// that finished remain drainable with `process_completed`.
    pub fn shutdown(&mut self, mode: ShutdownMode) {
        if self.workers.is_empty() {
            return;
        }

        match mode {
            ShutdownMode::Graceful => self.shared.queue.close(),
            ShutdownMode::Immediate => {
                let cancelled = self.shared.queue.close_and_cancel();
                for task in &cancelled {
                    task.finish_cancelled();
                }
                self.shared.counters.cancelled.add(cancelled.len() as u64);
            }
        }

        let count = self.workers.len();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                crate::ac_emit_ctx!(AC901, "loader worker exited by panic");
            }
        }
        crate::ac_log!(info, "loader shut down ({:?}, {} workers joined)", mode, count);
    }

    /// Whether `shutdown` has run.
    pub fn is_shut_down(&self) -> bool {
        !self.shared.queue.is_accepting()
    }
}

impl Drop for AsyncLoader {
    fn drop(&mut self) {
        self.shutdown(ShutdownMode::Immediate);
    }
}

impl std::fmt::Debug for AsyncLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncLoader")
            .field("workers", &self.workers.len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::config::CoreConfig;
    use std::sync::mpsc;

    fn loader(workers: usize) -> (AssetContext, AsyncLoader) {
        let ctx = AssetContext::new(CoreConfig::default());
        let loader = ctx
            .spawn_loader_with(LoaderConfig::default().with_workers(workers))
            .unwrap();
        (ctx, loader)
    }

    #[test]
    fn test_worker_count() {
        let (_ctx, loader) = loader(3);
        assert_eq!(loader.get_worker_thread_count(), 3);
    }

    #[test]
    fn test_invalid_config() {
        let ctx = AssetContext::new(CoreConfig::default());
        let err = AsyncLoader::new(&ctx, LoaderConfig::default().with_thread_name("a\0b")).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidConfig(_)));
    }

    #[test]
    fn test_custom_failure() {
        let (_ctx, loader) = loader(1);
        let task = loader
            .submit_custom(
                || -> Result<(), LoadError> { Err(LoadError::msg("bad input")) },
                TaskPriority::High,
                None,
            )
            .unwrap();

        assert!(loader.wait_for_task(&task, None));
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.error_message().as_deref(), Some("bad input"));
        assert!(task.take_result().is_none());
    }

    #[test]
    fn test_panicking_task_fails() {
        let (_ctx, loader) = loader(1);
        let task = loader
            .submit_custom(
                || -> Result<(), LoadError> { panic!("worker must survive") },
                TaskPriority::Normal,
                None,
            )
            .unwrap();
        assert!(loader.wait_for_task(&task, None));
        assert_eq!(task.status(), TaskStatus::Failed);

        // The worker is still alive.
        let next = loader.submit_custom(|| Ok(1u8), TaskPriority::Normal, None).unwrap();
        assert!(loader.wait_for_task(&next, Some(Duration::from_secs(5))));
        assert_eq!(next.status(), TaskStatus::Completed);
    }

    #[test]
    fn test_free_task_refuses_running() {
        let (_ctx, loader) = loader(1);
        let (release, gate) = mpsc::channel::<()>();

        let task = loader
            .submit_custom(
                move || {
                    let _ = gate.recv();
                    Ok(())
                },
                TaskPriority::Normal,
                None,
            )
            .unwrap();

        let task = loader.free_task(task).unwrap_err();
        release.send(()).unwrap();
        assert!(loader.wait_for_task(&task, None));
        assert!(loader.free_task(task).is_ok());
    }

    #[test]
    fn test_callbacks_run_in_drain() {
        let (_ctx, loader) = loader(2);
        let (tx, rx) = mpsc::channel();

        let mut tasks = Vec::new();
        for i in 0..5u32 {
            let tx = tx.clone();
            tasks.push(
                loader
                    .submit_custom(
                        move || Ok(i),
                        TaskPriority::Normal,
                        on_complete(move |task: &Task| {
                            tx.send(task.id()).unwrap();
                        }),
                    )
                    .unwrap(),
            );
        }
        for task in &tasks {
            assert!(loader.wait_for_task(task, None));
        }
        assert!(rx.try_recv().is_err());

        assert_eq!(loader.process_completed(2), 2);
        assert_eq!(loader.process_completed(0), 3);
        assert_eq!(rx.try_iter().count(), 5);
        assert_eq!(loader.process_completed(0), 0);
    }

    #[test]
    fn test_drain_off_owner_thread_rejected() {
        let (_ctx, loader) = loader(1);
        let task = loader.submit_custom(|| Ok(()), TaskPriority::Normal, None).unwrap();
        assert!(loader.wait_for_task(&task, None));

        let drained = thread::scope(|scope| scope.spawn(|| loader.process_completed(0)).join().unwrap());
        assert_eq!(drained, 0);
        assert_eq!(loader.process_completed(0), 1);
    }

    #[test]
    fn test_submit_after_shutdown() {
        let (_ctx, mut loader) = loader(1);
        loader.shutdown(ShutdownMode::Graceful);
        assert!(loader.is_shut_down());
        assert_eq!(
            loader
                .submit_custom(|| Ok(()), TaskPriority::Normal, None)
                .unwrap_err(),
            SubmitError::ShutDown
        );
    }
}
