//! Worker threads and the built-in task bodies.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::api::category::AllocCategory;
use crate::api::memory::MemorySystem;
use crate::loader::completion::CompletionQueue;
use crate::loader::decode::{AssetKind, DecoderTable};
use crate::loader::error::LoadError;
use crate::loader::queue::TaskQueue;
use crate::loader::task::{Task, TaskResult};
use crate::resource::registry::ResourceRegistry;
use crate::resource::state::{ResourceState, StateTracker};
use crate::sync::atomics::{AtomicCounter, AtomicGauge};

/// How long a load waits for a dying resource to start unloading before
/// giving up.
const STALE_ENTRY_WAIT: Duration = Duration::from_millis(250);

/// Counters behind `LoaderStats`.
#[derive(Default)]
pub(crate) struct LoaderCounters {
    pub(crate) submitted: AtomicCounter,
    pub(crate) completed: AtomicCounter,
    pub(crate) failed: AtomicCounter,
    pub(crate) cancelled: AtomicCounter,
    pub(crate) running: AtomicGauge,
}

/// State shared by the loader front end and its workers.
pub(crate) struct LoaderShared {
    pub(crate) queue: TaskQueue,
    pub(crate) completions: CompletionQueue,
    pub(crate) counters: LoaderCounters,
}

/// What built-in task bodies need, captured at submit time.
pub(crate) struct LoadServices {
    pub(crate) registry: ResourceRegistry,
    pub(crate) tracker: Arc<StateTracker>,
    pub(crate) memory: MemorySystem,
    pub(crate) decoders: DecoderTable,
}

pub(crate) fn worker_loop(shared: Arc<LoaderShared>, index: usize) {
    crate::ac_log!(debug, "loader worker {} started", index);

    while let Some(task) = shared.queue.pop() {
        shared.counters.running.add(1);
        run_task(&shared, &task);
        shared.counters.running.sub(1);
    }

    crate::ac_log!(debug, "loader worker {} stopped", index);
}

fn run_task(shared: &LoaderShared, task: &Arc<Task>) {
    let outcome = match task.take_body() {
        Some(body) => catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|panic| {
            let message = panic_message(panic.as_ref());
            crate::ac_emit_ctx!(
                AC304,
                "task={}, kind={}, label={:?}, panic={}",
                task.id(),
                task.kind().name(),
                task.label(),
                message
            );
            Err(LoadError::Panicked(message))
        }),
        None => Err(LoadError::msg("task body already taken")),
    };

    match &outcome {
        Ok(_) => shared.counters.completed.increment(),
        Err(err) => {
            crate::ac_log!(
                warn,
                "task {} ({} {:?}) failed: {}",
                task.id(),
                task.kind().name(),
                task.label(),
                err
            );
            shared.counters.failed.increment();
        }
    }
    task.finish(outcome, || shared.completions.push(task.clone()));
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Sets `Error` if a winning load bails out before reaching `Loaded`.
struct LoadingGuard<'a> {
    tracker: &'a StateTracker,
    path: &'a str,
    owner: ThreadId,
    armed: bool,
}

impl LoadingGuard<'_> {
    fn finish(mut self, state: ResourceState) {
        self.armed = false;
        self.tracker.set(self.path, state, self.owner);
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.tracker.set(self.path, ResourceState::Error, self.owner);
        }
    }
}

/// Built-in texture/scene load.
///
/// The thread that wins loading rights decodes and registers the resource.
/// Everyone else waits for the outcome and shares the registered entry.
pub(crate) fn load_asset(
    services: &LoadServices,
    kind: AssetKind,
    path: &str,
) -> Result<TaskResult, LoadError> {
    let decoder = services.decoders.get(kind).ok_or(LoadError::NoDecoder(kind))?;
    let me = thread::current().id();

    loop {
        if services.tracker.try_acquire_loading(path, me) {
            let guard = LoadingGuard {
                tracker: &services.tracker,
                path,
                owner: me,
                armed: true,
            };
            let decoded = decoder.decode(path)?;
            let size = decoded.size;
            let handle = services.registry.create_boxed(
                path,
                decoded.payload,
                decoded.size,
                decoded.destructor,
            );
            guard.finish(ResourceState::Loaded);
            crate::ac_log!(debug, "loaded {} {:?} ({} bytes)", kind, path, size);
            return Ok(TaskResult::with_size(handle, size));
        }

        let settled = services
            .tracker
            .wait_until(path, None, |state| state != ResourceState::Loading);

        match settled {
            Some(ResourceState::Loaded) => {
                if let Some(handle) = services.registry.acquire(path) {
                    let size = handle.size_hint();
                    return Ok(TaskResult::with_size(handle, size));
                }
                // Last handle is being dropped; its teardown leaves Loaded
                // shortly. Only a state stuck at Loaded is a real failure.
                let moved_on = services
                    .tracker
                    .wait_until(path, Some(STALE_ENTRY_WAIT), |state| {
                        state != ResourceState::Loaded
                    });
                if moved_on.is_none() {
                    return Err(LoadError::Unavailable(path.to_string()));
                }
            }
            Some(ResourceState::Error) => {
                return Err(LoadError::PreviousFailure(path.to_string()));
            }
            Some(ResourceState::Unloading) => {
                services.tracker.wait_for(path, ResourceState::Unloaded, None);
            }
            _ => {}
        }
    }
}

/// Built-in buffer upload: stage the bytes in tracked renderer memory and
/// hand them to `upload`.
pub(crate) fn upload_buffer<F>(
    services: &LoadServices,
    identifier: &str,
    bytes: &[u8],
    upload: F,
) -> Result<TaskResult, LoadError>
where
    F: FnOnce(&str, &[u8]) -> Result<(), LoadError>,
{
    if bytes.is_empty() {
        upload(identifier, bytes)?;
        return Ok(TaskResult::with_size(0usize, 0));
    }

    let mut staging = services
        .memory
        .linear(AllocCategory::Renderer, bytes.len())
        .ok_or(LoadError::OutOfMemory { size: bytes.len() })?;
    let ptr = staging.alloc_bytes(bytes.len(), 1);
    if ptr.is_null() {
        return Err(LoadError::OutOfMemory { size: bytes.len() });
    }

    // SAFETY: `ptr` has room for `bytes.len()` bytes and lives as long as `staging`.
    let staged = unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
        std::slice::from_raw_parts(ptr as *const u8, bytes.len())
    };
    upload(identifier, staged)?;

    Ok(TaskResult::with_size(bytes.len(), bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::config::RegistryConfig;
    use crate::loader::decode::DecodedAsset;

    fn services() -> LoadServices {
        let memory = MemorySystem::default();
        let tracker = Arc::new(StateTracker::new());
        LoadServices {
            registry: ResourceRegistry::with_tracker(
                RegistryConfig::default(),
                memory.clone(),
                tracker.clone(),
            ),
            tracker,
            memory,
            decoders: DecoderTable::default(),
        }
    }

    #[test]
    fn test_missing_decoder() {
        let services = services();
        let err = load_asset(&services, AssetKind::Scene, "level.scn").unwrap_err();
        assert!(matches!(err, LoadError::NoDecoder(AssetKind::Scene)));
        assert_eq!(services.tracker.get("level.scn"), ResourceState::Unloaded);
    }

    #[test]
    fn test_load_registers_and_sets_loaded() {
        let services = services();
        services.decoders.set(
            AssetKind::Texture,
            Arc::new(|path: &str| -> Result<DecodedAsset, LoadError> {
                Ok(DecodedAsset::new(path.to_string(), 64))
            }),
        );

        let result = load_asset(&services, AssetKind::Texture, "a.png").unwrap();
        assert_eq!(result.size(), 64);
        let handle = result.into_resource().unwrap();
        assert_eq!(handle.payload::<String>().map(String::as_str), Some("a.png"));
        assert_eq!(services.tracker.get("a.png"), ResourceState::Loaded);

        // A second load shares the entry.
        let again = load_asset(&services, AssetKind::Texture, "a.png")
            .unwrap()
            .into_resource()
            .unwrap();
        assert!(again.ptr_eq(&handle));
        assert_eq!(handle.ref_count(), 2);

        drop(handle);
        drop(again);
        assert_eq!(services.tracker.get("a.png"), ResourceState::Unloaded);
    }

    #[test]
    fn test_decode_failure_sets_error() {
        let services = services();
        services.decoders.set(
            AssetKind::Texture,
            Arc::new(|path: &str| -> Result<DecodedAsset, LoadError> {
                Err(LoadError::decode(path, "truncated"))
            }),
        );

        assert!(load_asset(&services, AssetKind::Texture, "bad.png").is_err());
        assert_eq!(services.tracker.get("bad.png"), ResourceState::Error);
        assert!(matches!(
            load_asset(&services, AssetKind::Texture, "bad.png"),
            Err(LoadError::PreviousFailure(_))
        ));
    }

    #[test]
    fn test_decoder_panic_sets_error() {
        let services = services();
        services.decoders.set(
            AssetKind::Scene,
            Arc::new(|_: &str| -> Result<DecodedAsset, LoadError> { panic!("decoder bug") }),
        );

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            load_asset(&services, AssetKind::Scene, "boom.scn")
        }));
        assert!(outcome.is_err());
        assert_eq!(services.tracker.get("boom.scn"), ResourceState::Error);
    }

    #[test]
    fn test_upload_stages_in_renderer_memory() {
        let services = services();
        let data = vec![7u8; 300];

        let result = upload_buffer(&services, "vb0", &data, |id, staged| {
            assert_eq!(id, "vb0");
            assert_eq!(staged, &[7u8; 300][..]);
            Ok(())
        })
        .unwrap();

        assert_eq!(result.downcast::<usize>().unwrap(), 300);
        let stats = services.memory.category_stats(AllocCategory::Renderer);
        assert_eq!(stats.allocation_count, 1);
        assert_eq!(stats.current_usage, 0);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
    }

    fn string_decoder(services: &LoadServices) {
        services.decoders.set(
            AssetKind::Texture,
            Arc::new(|path: &str| -> Result<DecodedAsset, LoadError> {
                Ok(DecodedAsset::new(path.to_string(), 8))
            }),
        );
    }

    #[test]
    fn test_slow_unload_is_waited_out() {
        let services = Arc::new(services());
        string_decoder(&services);
        let me = thread::current().id();

        // Marked Loaded with no registry entry: the window between the last
        // handle leaving the bucket and its unload walk starting.
        assert!(services.tracker.try_acquire_loading("slow.png", me));
        assert!(services.tracker.set("slow.png", ResourceState::Loaded, me));

        let teardown = {
            let services = services.clone();
            thread::spawn(move || {
                let id = thread::current().id();
                thread::sleep(Duration::from_millis(20));
                assert!(services.tracker.set("slow.png", ResourceState::Unloading, id));
                // Destructor slower than the stale-entry grace period.
                thread::sleep(STALE_ENTRY_WAIT + Duration::from_millis(150));
                assert!(services.tracker.set("slow.png", ResourceState::Unloaded, id));
            })
        };

        let handle = load_asset(&services, AssetKind::Texture, "slow.png")
            .unwrap()
            .into_resource()
            .unwrap();
        teardown.join().unwrap();

        assert_eq!(handle.payload::<String>().map(String::as_str), Some("slow.png"));
        assert_eq!(services.tracker.get("slow.png"), ResourceState::Loaded);
    }

    #[test]
    fn test_loaded_without_entry_gives_up() {
        let services = services();
        string_decoder(&services);
        let me = thread::current().id();

        assert!(services.tracker.try_acquire_loading("ghost.png", me));
        assert!(services.tracker.set("ghost.png", ResourceState::Loaded, me));

        let start = std::time::Instant::now();
        assert!(matches!(
            load_asset(&services, AssetKind::Texture, "ghost.png"),
            Err(LoadError::Unavailable(_))
        ));
        assert!(start.elapsed() >= STALE_ENTRY_WAIT);
    }
}
