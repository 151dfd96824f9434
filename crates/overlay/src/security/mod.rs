//! Privilege handling.
//!
//! This module handles:
//! - Real vs. effective identity detection
//! - Dropping ownership of created paths back to the invoking user

mod credentials;

pub use credentials::{Credentials, Identity};
