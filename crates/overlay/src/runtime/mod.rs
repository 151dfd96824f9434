//! Mount registry and lifecycle management.

mod config;
mod manager;
mod registry;

pub use config::RuntimeConfig;
pub use manager::OverlayManager;
pub use registry::{DEFAULT_STATE_MODE, MountMap, Registry};
