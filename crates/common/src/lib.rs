//! Shared types and utilities for rusty-multipart.
//!
//! This crate provides common functionality used across all rusty-multipart crates:
//! - Size limits and transport defaults
//! - MD5 content hashing (one-shot and streaming)
//! - Epoch-millisecond time conversion

pub mod constants;
pub mod hash;
pub mod time;

// Re-export commonly used items at crate root
pub use constants::*;
pub use hash::{hash_bytes, Md5Hasher};
pub use time::system_time_to_millis;
