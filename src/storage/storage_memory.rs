//! In-memory stream storage
//!
//! Values live in a shared map of `Bytes`. Every contract call and every stream
//! hand-out is counted, so the storage doubles as an instrumented test double
//! (see [`MemoryStreamStorage::stats`]).

use crate::error::StorageError;
use crate::result::{OperationResult, OperationResultOf};
use crate::storage::storage_api::{CommitWrite, StorageStats, StreamStorage, WriteMode};
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

#[cfg(feature = "async")]
use crate::storage::storage_api::{AsyncCommitWrite, AsyncStreamStorage};
#[cfg(feature = "async")]
use std::future::{ready, Future};
#[cfg(feature = "async")]
use std::pin::Pin;
#[cfg(feature = "async")]
use std::task::{Context, Poll};
#[cfg(feature = "async")]
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

#[derive(Debug, Default)]
struct Counters {
    exists_checks: AtomicUsize,
    reads: AtomicUsize,
    creates: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
    streams_opened: AtomicUsize,
    streams_closed: AtomicUsize,
    commits: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

#[derive(Debug, Default)]
struct MemoryInner {
    entries: RwLock<HashMap<String, Bytes>>,
    // keys with an outstanding create writer
    reserved: Mutex<HashSet<String>>,
    counters: Counters,
}

/// In-memory stream storage
///
/// Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStreamStorage {
    inner: Arc<MemoryInner>,
}

impl MemoryStreamStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters of the calls and streams served so far
    pub fn stats(&self) -> StorageStats {
        let c = &self.inner.counters;
        StorageStats {
            exists_checks: c.exists_checks.load(Ordering::SeqCst),
            reads: c.reads.load(Ordering::SeqCst),
            creates: c.creates.load(Ordering::SeqCst),
            updates: c.updates.load(Ordering::SeqCst),
            deletes: c.deletes.load(Ordering::SeqCst),
            streams_opened: c.streams_opened.load(Ordering::SeqCst),
            streams_closed: c.streams_closed.load(Ordering::SeqCst),
            commits: c.commits.load(Ordering::SeqCst),
        }
    }

    /// Whether `key` holds a committed value. Not counted in [`stats`](Self::stats).
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    /// Raw stored bytes under `key`
    pub fn raw(&self, key: &str) -> Option<Bytes> {
        self.entries().get(key).cloned()
    }

    /// Store raw bytes under `key`, bypassing the stream protocol
    pub fn insert_raw(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), data.into());
    }

    /// Stored keys in ascending order
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Bytes>> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn exists(&self, key: &str) -> bool {
        bump(&self.inner.counters.exists_checks);
        self.contains_key(key)
    }

    fn open(&self, key: &str) -> OperationResultOf<MemoryReader> {
        bump(&self.inner.counters.reads);
        match self.raw(key) {
            Some(data) => {
                tracing::trace!(key, bytes = data.len(), "memory stream opened for read");
                OperationResultOf::from_value(MemoryReader {
                    cursor: Cursor::new(data),
                    _lease: StreamLease::new(&self.inner),
                })
            }
            None => OperationResultOf::from_error(&StorageError::ResourceNotFound {
                resource: key.to_string(),
            }),
        }
    }

    fn writer(&self, key: &str, mode: WriteMode) -> OperationResultOf<MemoryWriter> {
        match mode {
            WriteMode::Create => {
                bump(&self.inner.counters.creates);
                let mut reserved = self
                    .inner
                    .reserved
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if reserved.contains(key) || self.contains_key(key) {
                    return OperationResultOf::from_error(&StorageError::AlreadyExists {
                        resource: key.to_string(),
                    });
                }
                reserved.insert(key.to_string());
            }
            WriteMode::Update => {
                bump(&self.inner.counters.updates);
                if !self.contains_key(key) {
                    return OperationResultOf::from_error(&StorageError::ResourceNotFound {
                        resource: key.to_string(),
                    });
                }
            }
        }

        tracing::trace!(key, mode = mode.as_str(), "memory stream opened for write");
        OperationResultOf::from_value(MemoryWriter {
            key: key.to_string(),
            mode,
            buffer: Vec::new(),
            storage: Arc::clone(&self.inner),
            _lease: StreamLease::new(&self.inner),
        })
    }

    fn remove(&self, key: &str) -> OperationResult {
        bump(&self.inner.counters.deletes);
        let removed = self
            .inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        match removed {
            Some(_) => {
                tracing::debug!(key, "memory entry deleted");
                OperationResult::successful()
            }
            None => OperationResult::from_error(&StorageError::ResourceNotFound {
                resource: key.to_string(),
            }),
        }
    }
}

/// Counts a stream as released when dropped
struct StreamLease {
    storage: Arc<MemoryInner>,
}

impl StreamLease {
    fn new(storage: &Arc<MemoryInner>) -> Self {
        bump(&storage.counters.streams_opened);
        Self {
            storage: Arc::clone(storage),
        }
    }
}

impl Drop for StreamLease {
    fn drop(&mut self) {
        bump(&self.storage.counters.streams_closed);
    }
}

impl fmt::Debug for StreamLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamLease")
    }
}

/// Read stream over a stored value
#[derive(Debug)]
pub struct MemoryReader {
    cursor: Cursor<Bytes>,
    _lease: StreamLease,
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

#[cfg(feature = "async")]
impl AsyncRead for MemoryReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().cursor).poll_read(cx, buf)
    }
}

/// Write stream buffering a value until it is committed
///
/// `commit` stores the buffered bytes; `flush` and `shutdown` store nothing.
/// Dropping the writer without committing discards them and releases a create
/// reservation.
#[derive(Debug)]
pub struct MemoryWriter {
    key: String,
    mode: WriteMode,
    buffer: Vec<u8>,
    storage: Arc<MemoryInner>,
    _lease: StreamLease,
}

impl MemoryWriter {
    fn persist(&self) -> io::Result<()> {
        let mut entries = self
            .storage
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        // a concurrent delete wins over a pending update
        if self.mode == WriteMode::Update && !entries.contains_key(&self.key) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                StorageError::ResourceNotFound {
                    resource: self.key.clone(),
                }
                .to_string(),
            ));
        }

        entries.insert(self.key.clone(), Bytes::copy_from_slice(&self.buffer));
        bump(&self.storage.counters.commits);
        tracing::trace!(key = %self.key, bytes = self.buffer.len(), mode = self.mode.as_str(), "memory stream committed");
        Ok(())
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CommitWrite for MemoryWriter {
    fn commit(self) -> io::Result<()> {
        self.persist()
    }
}

#[cfg(feature = "async")]
impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.get_mut().buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(feature = "async")]
impl AsyncCommitWrite for MemoryWriter {
    fn commit(self) -> impl Future<Output = io::Result<()>> + Send {
        ready(self.persist())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        if self.mode == WriteMode::Create {
            self.storage
                .reserved
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.key);
        }
    }
}

impl<K: fmt::Display + ?Sized> StreamStorage<K> for MemoryStreamStorage {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn check_exists(&self, key: &K) -> bool {
        self.exists(&key.to_string())
    }

    fn try_open_for_read(&self, key: &K) -> OperationResultOf<MemoryReader> {
        self.open(&key.to_string())
    }

    fn try_create(&self, key: &K) -> OperationResultOf<MemoryWriter> {
        self.writer(&key.to_string(), WriteMode::Create)
    }

    fn try_update(&self, key: &K) -> OperationResultOf<MemoryWriter> {
        self.writer(&key.to_string(), WriteMode::Update)
    }

    fn try_delete(&self, key: &K) -> OperationResult {
        self.remove(&key.to_string())
    }
}

#[cfg(feature = "async")]
impl<K: fmt::Display + ?Sized> AsyncStreamStorage<K> for MemoryStreamStorage {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn check_exists(&self, key: &K) -> impl Future<Output = bool> + Send {
        ready(self.exists(&key.to_string()))
    }

    fn try_open_for_read(
        &self,
        key: &K,
    ) -> impl Future<Output = OperationResultOf<MemoryReader>> + Send {
        ready(self.open(&key.to_string()))
    }

    fn try_create(&self, key: &K) -> impl Future<Output = OperationResultOf<MemoryWriter>> + Send {
        ready(self.writer(&key.to_string(), WriteMode::Create))
    }

    fn try_update(&self, key: &K) -> impl Future<Output = OperationResultOf<MemoryWriter>> + Send {
        ready(self.writer(&key.to_string(), WriteMode::Update))
    }

    fn try_delete(&self, key: &K) -> impl Future<Output = OperationResult> + Send {
        ready(self.remove(&key.to_string()))
    }
}
