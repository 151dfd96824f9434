//! # overlay-common
//!
//! Shared types for the overlay mount manager.
//!
//! This crate provides functionality used by every layer of the tool:
//! - Mount identifier generation
//! - Standard registry paths
//! - The mount record data type
//! - Common error types

#![warn(missing_docs)]

pub mod error;
pub mod id;
pub mod paths;
pub mod record;

pub use error::{OverlayError, OverlayResult};
pub use id::{MountId, generate_id};
pub use paths::OverlayPaths;
pub use record::MountRecord;
