//! Stream storage for repository values
//!
//! This module provides the stream storage contracts and the shipped backends:
//! - **In-memory storage** - Shared map of byte buffers, instrumented with call
//!   and stream counters
//! - **Local filesystem storage** - One file per key, with atomic writes and
//!   exclusive creation
//!
//! Both backends implement the synchronous [`StreamStorage`] contract and, with
//! the `async` feature, [`AsyncStreamStorage`].
//!
//! # Examples
//!
//! ## Local Storage
//!
//! ```rust
//! use kv_repository::storage::{CommitWrite, FileSystemStreamStorage, LocalConfig, StreamStorage};
//! use std::io::{Read, Write};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let dir = tempfile::tempdir()?;
//! let storage = FileSystemStreamStorage::new(LocalConfig::in_directory(dir.path()))?;
//!
//! // Store data; nothing is visible until the writer is committed
//! let mut writer = StreamStorage::<str>::try_create(&storage, "greeting").into_result()?;
//! writer.write_all(b"Hello, World!")?;
//! writer.commit()?;
//!
//! // Retrieve data
//! let mut reader = StreamStorage::<str>::try_open_for_read(&storage, "greeting").into_result()?;
//! let mut content = String::new();
//! reader.read_to_string(&mut content)?;
//! assert_eq!(content, "Hello, World!");
//!
//! // Delete data
//! assert!(StreamStorage::<str>::try_delete(&storage, "greeting").is_success());
//! # Ok(())
//! # }
//! ```

// Core storage API and types
pub mod path_provider;
pub mod storage_api;

// Storage backend implementations
pub mod storage_local;
pub mod storage_memory;

// Re-export main types for convenience
pub use path_provider::{ExtensionPathProvider, FilePathProvider};
pub use storage_api::{CommitWrite, StorageStats, StreamStorage, WriteMode};
pub use storage_local::{FileSystemStreamStorage, FileWriter, LocalConfig};
pub use storage_memory::{MemoryReader, MemoryStreamStorage, MemoryWriter};

#[cfg(feature = "async")]
pub use storage_api::{AsyncCommitWrite, AsyncStreamStorage};
#[cfg(feature = "async")]
pub use storage_local::AsyncFileWriter;

/// Storage constants
pub mod constants {
    //! Constants used throughout the storage module

    /// Maximum storage key length
    pub const MAX_KEY_LENGTH: usize = 1024;

    /// Default file extension for the filesystem backend
    pub const DEFAULT_EXTENSION: &str = "json";

    /// Default buffer size for streaming operations
    pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024; // 64KB
}
