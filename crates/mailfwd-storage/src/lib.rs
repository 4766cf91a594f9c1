//! mailfwd Storage - Blob store abstraction
//!
//! This crate provides the blob store used to keep raw messages in their
//! incoming and outgoing states, with local filesystem and in-memory
//! backends.

pub mod blob;
pub mod file;
pub mod memory;

pub use blob::{create_storage, etag, BlobStore, StoredObject};
pub use file::LocalStorage;
pub use memory::MemoryStorage;
