//! Asynchronous repository over an [`AsyncStreamStorage`]
//!
//! Runs the same protocol as [`StreamRepository`](crate::repository::StreamRepository),
//! suspending only while it waits on storage or the serializer. Writers are
//! committed once the serializer has succeeded.
//!
//! Dropping an operation's future cancels it: the in-flight storage or
//! serializer call is abandoned and any open stream is released uncommitted.
//! The `*_cancellable` methods and the configured operation timeout turn such
//! an interruption into a failure result instead.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::RepositoryConfig;
use crate::error::RepositoryError;
use crate::repository::protocol::{Operation, RepositoryCore};
use crate::repository::AsyncRepository;
use crate::result::{OperationResult, OperationResultOf};
use crate::serializer::AsyncValueSerializer;
use crate::storage::{AsyncCommitWrite, AsyncStreamStorage};
use crate::validator::KeyValueValidator;

/// Await `operation`, or fail with "Operation cancelled" as soon as `token`
/// is cancelled. Cancellation wins when both are ready.
pub async fn cancellable<T, F>(token: &CancellationToken, operation: &str, future: F) -> OperationResultOf<T>
where
    F: Future<Output = OperationResultOf<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            tracing::debug!(operation, "operation cancelled");
            OperationResultOf::from_error(&RepositoryError::Cancelled {
                operation: operation.to_string(),
            })
        }
        result = future => result,
    }
}

/// Repository storing serialized values in an asynchronous stream storage
pub struct AsyncStreamRepository<K: ?Sized, V, S, Z> {
    storage: S,
    serializer: Z,
    core: RepositoryCore<K, V>,
}

impl<K: ?Sized, V: Default + 'static, S, Z> AsyncStreamRepository<K, V, S, Z> {
    /// Create a repository whose new values start as `V::default()`
    pub fn new(storage: S, serializer: Z) -> Self {
        Self::with_factory(storage, serializer, V::default)
    }
}

impl<K: ?Sized, V, S, Z> AsyncStreamRepository<K, V, S, Z> {
    /// Create a repository whose new values are built by `factory`
    pub fn with_factory<F>(storage: S, serializer: Z, factory: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        Self {
            storage,
            serializer,
            core: RepositoryCore::new(Arc::new(factory)),
        }
    }

    /// Check keys and values with `validator` before touching storage
    pub fn with_validator<T>(self, validator: T) -> Self
    where
        T: KeyValueValidator<K, V> + 'static,
    {
        self.with_shared_validator(Arc::new(validator))
    }

    /// Check keys and values with a validator shared with other repositories
    pub fn with_shared_validator(mut self, validator: Arc<dyn KeyValueValidator<K, V>>) -> Self {
        self.core.set_validator(validator);
        self
    }

    /// Replace the repository settings, including the operation timeout
    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.core.set_config(config);
        self
    }

    /// Underlying storage
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Underlying serializer
    pub fn serializer(&self) -> &Z {
        &self.serializer
    }

    /// Repository settings
    pub fn config(&self) -> &RepositoryConfig {
        self.core.config()
    }

    async fn with_deadline<T, F>(&self, operation: Operation, future: F) -> Result<T, OperationResult>
    where
        F: Future<Output = Result<T, OperationResult>>,
    {
        let Some(limit) = self.core.config().operation_timeout() else {
            return future.await;
        };
        match tokio::time::timeout(limit, future).await {
            Ok(outcome) => outcome,
            Err(_) => Err(OperationResult::from_error(&RepositoryError::TimedOut {
                operation: operation.to_string(),
                timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            })),
        }
    }
}

impl<K, V, S, Z> AsyncStreamRepository<K, V, S, Z>
where
    K: fmt::Display + Sync + ?Sized,
    V: Send + Sync,
    S: AsyncStreamStorage<K>,
    Z: AsyncValueSerializer<V>,
{
    async fn create<F>(&self, key: &K, initializer: F) -> Result<V, OperationResult>
    where
        F: FnOnce(&mut V) + Send,
    {
        self.core.validate_key(key)?;
        self.core
            .ensure_absent(self.storage.check_exists(key).await, key)?;
        let value = self.core.new_value(initializer);
        self.core.validate_value(&value)?;
        let writer = self.storage.try_create(key).await.into_outcome()?;
        self.write_value(key, writer, &value).await?;
        Ok(value)
    }

    async fn get(&self, key: &K) -> Result<V, OperationResult> {
        self.core.validate_key(key)?;
        self.fetch(key).await
    }

    async fn update<F>(&self, key: &K, mutator: F) -> Result<V, OperationResult>
    where
        F: FnOnce(&mut V) + Send,
    {
        self.core.validate_key(key)?;
        let mut value = self.fetch(key).await?;
        mutator(&mut value);
        self.core.validate_value(&value)?;
        let writer = self.storage.try_update(key).await.into_outcome()?;
        self.write_value(key, writer, &value).await?;
        Ok(value)
    }

    async fn delete(&self, key: &K) -> Result<V, OperationResult> {
        self.core.validate_key(key)?;
        let value = self.fetch(key).await?;
        self.storage.try_delete(key).await.into_outcome()?;
        Ok(value)
    }

    async fn fetch(&self, key: &K) -> Result<V, OperationResult> {
        let mut reader = self.storage.try_open_for_read(key).await.into_outcome()?;
        self.serializer.try_deserialize(&mut reader).await.into_outcome()
    }

    async fn write_value(
        &self,
        key: &K,
        mut writer: S::Writer,
        value: &V,
    ) -> Result<(), OperationResult> {
        self.serializer
            .try_serialize(value, &mut writer)
            .await
            .into_outcome()?;
        writer
            .commit()
            .await
            .map_err(|e| self.core.commit_failed(key, &e))
    }

    /// [`try_create`](AsyncRepository::try_create), failing as soon as `token` is cancelled
    pub async fn try_create_cancellable(&self, key: &K, token: &CancellationToken) -> OperationResultOf<V> {
        cancellable(token, Operation::Create.as_str(), AsyncRepository::try_create(self, key)).await
    }

    /// [`try_get`](AsyncRepository::try_get), failing as soon as `token` is cancelled
    pub async fn try_get_cancellable(&self, key: &K, token: &CancellationToken) -> OperationResultOf<V> {
        cancellable(token, Operation::Get.as_str(), AsyncRepository::try_get(self, key)).await
    }

    /// [`try_update`](AsyncRepository::try_update), failing as soon as `token` is cancelled
    pub async fn try_update_cancellable<F>(
        &self,
        key: &K,
        mutator: F,
        token: &CancellationToken,
    ) -> OperationResultOf<V>
    where
        F: FnOnce(&mut V) + Send,
    {
        cancellable(
            token,
            Operation::Update.as_str(),
            AsyncRepository::try_update(self, key, mutator),
        )
        .await
    }

    /// [`try_delete`](AsyncRepository::try_delete), failing as soon as `token` is cancelled
    pub async fn try_delete_cancellable(&self, key: &K, token: &CancellationToken) -> OperationResultOf<V> {
        cancellable(token, Operation::Delete.as_str(), AsyncRepository::try_delete(self, key)).await
    }
}

impl<K, V, S, Z> AsyncRepository<K, V> for AsyncStreamRepository<K, V, S, Z>
where
    K: fmt::Display + Sync + ?Sized,
    V: Send + Sync,
    S: AsyncStreamStorage<K>,
    Z: AsyncValueSerializer<V>,
{
    async fn try_create_with<F>(&self, key: &K, initializer: F) -> OperationResultOf<V>
    where
        F: FnOnce(&mut V) + Send,
    {
        self.core.begin(Operation::Create, key);
        let outcome = self
            .with_deadline(Operation::Create, self.create(key, initializer))
            .await;
        self.core.finish(Operation::Create, key, outcome)
    }

    async fn try_create(&self, key: &K) -> OperationResultOf<V> {
        self.try_create_with(key, |_| {}).await
    }

    async fn try_get(&self, key: &K) -> OperationResultOf<V> {
        self.core.begin(Operation::Get, key);
        let outcome = self.with_deadline(Operation::Get, self.get(key)).await;
        self.core.finish(Operation::Get, key, outcome)
    }

    async fn try_update<F>(&self, key: &K, mutator: F) -> OperationResultOf<V>
    where
        F: FnOnce(&mut V) + Send,
    {
        self.core.begin(Operation::Update, key);
        let outcome = self
            .with_deadline(Operation::Update, self.update(key, mutator))
            .await;
        self.core.finish(Operation::Update, key, outcome)
    }

    async fn try_delete(&self, key: &K) -> OperationResultOf<V> {
        self.core.begin(Operation::Delete, key);
        let outcome = self.with_deadline(Operation::Delete, self.delete(key)).await;
        self.core.finish(Operation::Delete, key, outcome)
    }
}

impl<K: ?Sized, V, S: fmt::Debug, Z: fmt::Debug> fmt::Debug for AsyncStreamRepository<K, V, S, Z> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncStreamRepository")
            .field("storage", &self.storage)
            .field("serializer", &self.serializer)
            .field("core", &self.core)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancellable_passes_result_through() {
        let token = CancellationToken::new();
        let result = cancellable(&token, "get", async { OperationResultOf::from_value(7) }).await;
        assert_eq!(result.value(), Some(&7));
    }

    #[tokio::test]
    async fn test_cancelled_token_wins() {
        let token = CancellationToken::new();
        token.cancel();
        let result: OperationResultOf<i32> =
            cancellable(&token, "get", async { OperationResultOf::from_value(7) }).await;
        assert!(result.is_failure());
        assert_eq!(result.error_message(), Some("Operation cancelled: get"));
    }

    #[tokio::test]
    async fn test_cancel_while_pending() {
        let token = CancellationToken::new();
        let child = token.child_token();
        let pending = tokio::spawn(async move {
            cancellable(&child, "update", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                OperationResultOf::from_value(1)
            })
            .await
        });

        token.cancel();
        let result: OperationResultOf<i32> = pending.await.unwrap();
        assert_eq!(result.error_message(), Some("Operation cancelled: update"));
    }
}
