//! # Overlay mount manager
//!
//! Creates, tracks and tears down OverlayFS mounts without having to manage
//! the upper, work and merge directories by hand.
//!
//! ## Features
//!
//! - **Registry**: every mount is recorded under a registry root and pruned
//!   automatically once its directories disappear
//! - **Conflict detection**: targets are checked against the live kernel
//!   mount table before anything is touched
//! - **setuid aware**: directories created while elevated are handed back to
//!   the invoking user
//!
//! ## Usage
//!
//! ```no_run
//! use overlay::runtime::{OverlayManager, RuntimeConfig};
//! use overlay::security::Credentials;
//!
//! # fn example() -> overlay_common::OverlayResult<()> {
//! let config = RuntimeConfig::default().with_root("/tmp/r");
//! let manager = OverlayManager::new(config, Credentials::current())?;
//!
//! let record = manager.create("/tmp/lower".as_ref(), None)?;
//! println!("mounted on {}", record.target.display());
//!
//! manager.remove(record.id.as_str(), true)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cli;
pub mod filesystem;
pub mod runtime;
pub mod security;

pub use runtime::{OverlayManager, Registry};
