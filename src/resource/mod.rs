//! Shared resources: the reference-counted registry and the load state
//! machine layered on top of it.

pub mod handle;
pub mod registry;
pub mod state;

pub use handle::{Destructor, Payload, ResourceHandle};
pub use registry::ResourceRegistry;
pub use state::{ResourceState, StateTracker};
