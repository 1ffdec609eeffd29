//! Stream storage contracts
//!
//! A stream storage maps a key to a byte stream. Repositories use it to check
//! existence, open a stored value for reading, and obtain writers for new or
//! existing values.
//!
//! # Commit protocol
//!
//! Writers returned by `try_create` and `try_update` persist their content only
//! through [`CommitWrite::commit`] (or [`AsyncCommitWrite::commit`]), which the
//! repositories call once after a successful serialization. `flush` and
//! `shutdown` only push buffered bytes along; serializers may call them freely.
//! A writer that is dropped without being committed leaves the stored resource
//! untouched and releases any create reservation it holds.
//!
//! # Concurrency
//!
//! Storages give no cross-operation ordering guarantees. `try_create` performs
//! its existence check atomically with the reservation of the key and is the
//! authoritative source of "already exists" failures, so two racing creates of
//! the same key cannot both succeed.

use std::io::{self, Read, Write};

use crate::result::{OperationResult, OperationResultOf};

#[cfg(feature = "async")]
use std::future::Future;
#[cfg(feature = "async")]
use tokio::io::{AsyncRead, AsyncWrite};

/// Write stream whose content is persisted by an explicit commit
pub trait CommitWrite: Write {
    /// Persist everything written so far, consuming the writer
    fn commit(self) -> io::Result<()>;
}

/// Asynchronous write stream whose content is persisted by an explicit commit
#[cfg(feature = "async")]
pub trait AsyncCommitWrite: AsyncWrite + Unpin + Send {
    /// Persist everything written so far, consuming the writer
    fn commit(self) -> impl Future<Output = io::Result<()>> + Send;
}

/// Synchronous stream storage keyed by `K`
pub trait StreamStorage<K: ?Sized> {
    /// Stream positioned at the start of a stored value
    type Reader: Read;

    /// Stream receiving a serialized value
    type Writer: CommitWrite;

    /// Whether a value is stored under `key`. Never fails for a missing key.
    fn check_exists(&self, key: &K) -> bool;

    /// Open the stored value for reading. Never modifies or truncates it.
    fn try_open_for_read(&self, key: &K) -> OperationResultOf<Self::Reader>;

    /// Obtain a writer for a brand-new value. Fails if `key` already exists.
    fn try_create(&self, key: &K) -> OperationResultOf<Self::Writer>;

    /// Obtain a writer replacing the existing value under `key`.
    fn try_update(&self, key: &K) -> OperationResultOf<Self::Writer>;

    /// Remove the value under `key`. Fails if it does not exist.
    fn try_delete(&self, key: &K) -> OperationResult;
}

/// Asynchronous stream storage keyed by `K`
#[cfg(feature = "async")]
pub trait AsyncStreamStorage<K: ?Sized>: Send + Sync {
    /// Stream positioned at the start of a stored value
    type Reader: AsyncRead + Unpin + Send;

    /// Stream receiving a serialized value
    type Writer: AsyncCommitWrite;

    /// Whether a value is stored under `key`
    fn check_exists(&self, key: &K) -> impl Future<Output = bool> + Send;

    /// Open the stored value for reading
    fn try_open_for_read(
        &self,
        key: &K,
    ) -> impl Future<Output = OperationResultOf<Self::Reader>> + Send;

    /// Obtain a writer for a brand-new value
    fn try_create(&self, key: &K) -> impl Future<Output = OperationResultOf<Self::Writer>> + Send;

    /// Obtain a writer replacing the existing value under `key`
    fn try_update(&self, key: &K) -> impl Future<Output = OperationResultOf<Self::Writer>> + Send;

    /// Remove the value under `key`
    fn try_delete(&self, key: &K) -> impl Future<Output = OperationResult> + Send;
}

/// How a writer will persist its content on commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMode {
    /// The key must not exist yet
    Create,
    /// The key's existing content is replaced
    Update,
}

impl WriteMode {
    /// Short name used in log events and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Create => "create",
            WriteMode::Update => "update",
        }
    }
}

/// Snapshot of the calls a storage has served
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// `check_exists` calls
    pub exists_checks: usize,
    /// `try_open_for_read` calls
    pub reads: usize,
    /// `try_create` calls
    pub creates: usize,
    /// `try_update` calls
    pub updates: usize,
    /// `try_delete` calls
    pub deletes: usize,
    /// Streams handed out
    pub streams_opened: usize,
    /// Streams released
    pub streams_closed: usize,
    /// Writers that persisted their content
    pub commits: usize,
}

impl StorageStats {
    /// Total number of contract calls served
    pub fn calls(&self) -> usize {
        self.exists_checks + self.reads + self.creates + self.updates + self.deletes
    }

    /// Streams handed out and not yet released
    pub fn open_streams(&self) -> usize {
        self.streams_opened.saturating_sub(self.streams_closed)
    }
}
