//! Asset decoders supplied by the application.
//!
//! The loader never parses files itself. A decoder turns a path into a
//! payload plus its size, and optionally a destructor to run when the last
//! handle to the registered resource goes away.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::loader::error::LoadError;
use crate::resource::handle::{Destructor, Payload};
use crate::sync::mutex::RwLock;

/// Asset kinds with a built-in load task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// Images and other texture data.
    Texture,
    /// Scene or level descriptions.
    Scene,
}

impl AssetKind {
    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            AssetKind::Texture => "texture",
            AssetKind::Scene => "scene",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output of a decoder.
pub struct DecodedAsset {
    pub(crate) payload: Payload,
    pub(crate) size: usize,
    pub(crate) destructor: Option<Destructor>,
}

impl DecodedAsset {
    /// Wrap a decoded value occupying `size` bytes.
    pub fn new<T: Any + Send + Sync>(payload: T, size: usize) -> Self {
        Self {
            payload: Box::new(payload),
            size,
            destructor: None,
        }
    }

    /// Run `destructor` with the payload when the resource is released.
    pub fn with_destructor<T, F>(mut self, destructor: F) -> Self
    where
        T: Any + Send + Sync,
        F: FnOnce(T) + Send + 'static,
    {
        self.destructor = Some(Box::new(move |payload: Payload| {
            if let Ok(payload) = payload.downcast::<T>() {
                destructor(*payload);
            }
        }));
        self
    }

    /// Reported size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl fmt::Debug for DecodedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedAsset")
            .field("size", &self.size)
            .field("has_destructor", &self.destructor.is_some())
            .finish()
    }
}

/// Turns a path into a decoded asset.
///
/// Implemented for any `Fn(&str) -> Result<DecodedAsset, LoadError>`.
pub trait AssetDecoder: Send + Sync + 'static {
    /// Decode the asset at `path`.
    fn decode(&self, path: &str) -> Result<DecodedAsset, LoadError>;
}

impl<F> AssetDecoder for F
where
    F: Fn(&str) -> Result<DecodedAsset, LoadError> + Send + Sync + 'static,
{
    fn decode(&self, path: &str) -> Result<DecodedAsset, LoadError> {
        self(path)
    }
}

/// Registered decoders, looked up when a load task starts.
#[derive(Default)]
pub(crate) struct DecoderTable {
    decoders: RwLock<HashMap<AssetKind, Arc<dyn AssetDecoder>>>,
}

impl DecoderTable {
    pub(crate) fn set(&self, kind: AssetKind, decoder: Arc<dyn AssetDecoder>) {
        self.decoders.write().insert(kind, decoder);
    }

    pub(crate) fn remove(&self, kind: AssetKind) -> bool {
        self.decoders.write().remove(&kind).is_some()
    }

    pub(crate) fn get(&self, kind: AssetKind) -> Option<Arc<dyn AssetDecoder>> {
        self.decoders.read().get(&kind).cloned()
    }
}
