//! # KV Repository
//!
//! A generic key-value repository: values of any type are stored under keys of
//! any type through three pluggable collaborators, a stream storage, a value
//! serializer and an optional validator.
//!
//! ## Features
//!
//! - **Result Module**: `OperationResult` / `OperationResultOf<T>`, the single
//!   return channel of every fallible operation
//! - **Storage Module**: stream storage contracts with in-memory and local
//!   filesystem backends
//! - **Serializer Module**: serializer contracts with JSON and bincode formats
//! - **Validator Module**: key/value validation contracts and combinators
//! - **Repository Module**: synchronous and asynchronous repositories
//!   implementing create, get, update and delete
//!
//! ## Optional Features
//!
//! - `async`: Asynchronous contracts and repository (tokio)
//! - `serde_support`: JSON/bincode serializers and serde-loadable configuration
//!
//! ## Example
//!
//! ```rust
//! use kv_repository::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! let people: StreamRepository<str, Person, _, _> =
//!     StreamRepository::new(MemoryStreamStorage::new(), JsonSerializer::new());
//!
//! assert!(people.try_create_with("a", |p| p.name = "x".into()).is_success());
//!
//! let duplicate = people.try_create("a");
//! assert_eq!(duplicate.error_message(), Some("a already exists in store"));
//!
//! let updated = people.try_update("a", |p| p.name = "y".into());
//! assert_eq!(updated.into_value().name, "y");
//!
//! assert_eq!(people.try_delete("a").into_value().name, "y");
//! assert!(people.try_get("a").is_failure());
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core error types
pub use error::{Error, Result};

// Core modules
pub mod config;
pub mod error;
pub mod repository;
pub mod result;
pub mod serializer;
pub mod storage;
pub mod telemetry;
pub mod validator;

// Re-export commonly used types
pub mod prelude {
    //! Common types and traits for convenient importing

    pub use crate::config::RepositoryConfig;
    pub use crate::error::{Error, Result};
    pub use crate::repository::{Repository, StreamRepository};
    pub use crate::result::{OperationResult, OperationResultOf};
    pub use crate::serializer::ValueSerializer;
    pub use crate::storage::{
        CommitWrite, FileSystemStreamStorage, LocalConfig, MemoryStreamStorage, StreamStorage,
    };
    pub use crate::validator::{AcceptAll, ChainedValidator, FnValidator, KeyValueValidator, StorageKeyValidator};

    #[cfg(feature = "async")]
    pub use crate::repository::{AsyncRepository, AsyncStreamRepository};
    #[cfg(feature = "async")]
    pub use crate::serializer::AsyncValueSerializer;
    #[cfg(feature = "async")]
    pub use crate::storage::{AsyncCommitWrite, AsyncStreamStorage};

    #[cfg(feature = "serde_support")]
    pub use crate::serializer::{BincodeSerializer, JsonSerializer};
}

// Version information
/// The version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
