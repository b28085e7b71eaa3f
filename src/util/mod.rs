//! Small helpers shared across modules.

pub(crate) mod layout;
pub mod size;
