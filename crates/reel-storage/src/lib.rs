//! Object storage for published renders.
//!
//! This crate provides:
//! - A `BlobStore` trait with Cloudflare R2 and local directory backends
//! - Backend selection from the environment
//! - Content-addressed publishing of encoded videos

pub mod client;
pub mod error;
pub mod local;
pub mod publish;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use local::LocalDirStore;
pub use publish::{publish_render, render_key, PublishedVideo};
pub use store::{BlobStore, StorageConfig};
