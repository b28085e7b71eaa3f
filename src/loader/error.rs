//! Loader error types.

use std::fmt;
use std::io;

use crate::loader::decode::AssetKind;

/// Why a task body failed.
#[derive(Debug)]
pub enum LoadError {
    /// No decoder is registered for the asset kind.
    NoDecoder(AssetKind),
    /// The decoder rejected the file.
    Decode {
        /// Path that failed to decode
        path: String,
        /// Decoder-supplied reason
        reason: String,
    },
    /// Another task's load of the same identifier failed.
    PreviousFailure(String),
    /// The identifier reports `Loaded` but nothing is registered under it.
    Unavailable(String),
    /// A tracked allocation could not be made.
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },
    /// The task body panicked.
    Panicked(String),
    /// An I/O error while reading input.
    Io(io::Error),
    /// Any other failure reported by a task body.
    Failed(String),
}

impl LoadError {
    /// Generic failure with a message.
    pub fn msg(message: impl Into<String>) -> Self {
        LoadError::Failed(message.into())
    }

    /// Decoder failure for `path`.
    pub fn decode(path: impl Into<String>, reason: impl Into<String>) -> Self {
        LoadError::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NoDecoder(kind) => write!(f, "no decoder registered for {} assets", kind),
            LoadError::Decode { path, reason } => write!(f, "failed to decode {:?}: {}", path, reason),
            LoadError::PreviousFailure(path) => {
                write!(f, "an earlier load of {:?} failed; reset it to retry", path)
            }
            LoadError::Unavailable(path) => {
                write!(f, "{:?} is marked loaded but is not registered", path)
            }
            LoadError::OutOfMemory { size } => write!(f, "could not allocate {} bytes", size),
            LoadError::Panicked(message) => write!(f, "task panicked: {}", message),
            LoadError::Io(err) => write!(f, "I/O error: {}", err),
            LoadError::Failed(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for LoadError {
    fn from(err: io::Error) -> Self {
        LoadError::Io(err)
    }
}

/// Why a task could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// The queue is at `max_queue_size`.
    QueueFull,
    /// The loader is shutting down or has shut down.
    ShutDown,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::QueueFull => f.write_str("task queue is full"),
            SubmitError::ShutDown => f.write_str("loader is shut down"),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Why a loader could not be started.
#[derive(Debug)]
pub enum LoaderError {
    /// A worker thread could not be spawned.
    SpawnFailed(io::Error),
    /// The configuration was rejected.
    InvalidConfig(String),
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderError::SpawnFailed(err) => write!(f, "failed to spawn worker thread: {}", err),
            LoaderError::InvalidConfig(reason) => write!(f, "invalid loader config: {}", reason),
        }
    }
}

impl std::error::Error for LoaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoaderError::SpawnFailed(err) => Some(err),
            LoaderError::InvalidConfig(_) => None,
        }
    }
}
