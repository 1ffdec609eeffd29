//! Key-value repositories
//!
//! A repository stores values of type `V` under keys of type `K` by combining
//! three collaborators: a stream storage (where bytes live), a value serializer
//! (how values become bytes) and an optional validator (what the domain
//! accepts). It exposes four operations, each returning an
//! [`OperationResultOf<V>`](crate::result::OperationResultOf):
//!
//! - **create**: the key must be absent; a fresh value is built by the value
//!   factory, optionally initialized, validated and written
//! - **get**: reads and returns the stored value
//! - **update**: reads the stored value, applies a mutator, validates and
//!   writes it back
//! - **delete**: reads the stored value, removes it and returns it
//!
//! Every step short-circuits on the first failure and returns it unchanged.
//! Nothing is written unless serialization succeeded, and every stream a call
//! opens is released before the call returns.
//!
//! [`StreamRepository`] runs on the calling thread; with the `async` feature
//! [`AsyncStreamRepository`] runs the same protocol, suspending only while it
//! waits on storage or the serializer.

pub mod protocol;
pub mod repository_sync;

#[cfg(feature = "async")]
pub mod repository_async;

pub use protocol::Operation;
pub use repository_sync::StreamRepository;

#[cfg(feature = "async")]
pub use repository_async::{cancellable, AsyncStreamRepository};

use crate::result::OperationResultOf;

#[cfg(feature = "async")]
use std::future::Future;

/// Synchronous key-value repository
pub trait Repository<K: ?Sized, V> {
    /// Create a value under `key`, letting `initializer` fill it in before it
    /// is validated and stored. Fails if `key` already exists.
    fn try_create_with<F>(&self, key: &K, initializer: F) -> OperationResultOf<V>
    where
        F: FnOnce(&mut V);

    /// Create a value under `key` as built by the value factory
    fn try_create(&self, key: &K) -> OperationResultOf<V> {
        self.try_create_with(key, |_| {})
    }

    /// Read the value stored under `key`
    fn try_get(&self, key: &K) -> OperationResultOf<V>;

    /// Apply `mutator` to the stored value and write the result back
    fn try_update<F>(&self, key: &K, mutator: F) -> OperationResultOf<V>
    where
        F: FnOnce(&mut V);

    /// Remove the value under `key`, returning it
    fn try_delete(&self, key: &K) -> OperationResultOf<V>;
}

/// Asynchronous key-value repository
#[cfg(feature = "async")]
pub trait AsyncRepository<K: ?Sized, V>: Send + Sync {
    /// Create a value under `key`, letting `initializer` fill it in
    fn try_create_with<F>(
        &self,
        key: &K,
        initializer: F,
    ) -> impl Future<Output = OperationResultOf<V>> + Send
    where
        F: FnOnce(&mut V) + Send;

    /// Create a value under `key` as built by the value factory
    fn try_create(&self, key: &K) -> impl Future<Output = OperationResultOf<V>> + Send;

    /// Read the value stored under `key`
    fn try_get(&self, key: &K) -> impl Future<Output = OperationResultOf<V>> + Send;

    /// Apply `mutator` to the stored value and write the result back
    fn try_update<F>(&self, key: &K, mutator: F) -> impl Future<Output = OperationResultOf<V>> + Send
    where
        F: FnOnce(&mut V) + Send;

    /// Remove the value under `key`, returning it
    fn try_delete(&self, key: &K) -> impl Future<Output = OperationResultOf<V>> + Send;
}
