//! File-backed render job queue.
//!
//! This crate provides:
//! - A JSON job list shared by every worker and front end
//! - Exclusive claim of pending jobs via an advisory lock file
//! - Atomic replace on every write (temp file + rename)
//! - Records of other job types kept verbatim

pub mod error;
pub mod lock;
pub mod queue;
mod records;

pub use error::{QueueError, QueueResult};
pub use queue::{JobStore, QueueConfig, QueueStats};
