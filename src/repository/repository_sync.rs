//! Synchronous repository over a [`StreamStorage`]

use std::fmt;
use std::sync::Arc;

use crate::config::RepositoryConfig;
use crate::repository::protocol::{Operation, RepositoryCore};
use crate::repository::Repository;
use crate::result::{OperationResult, OperationResultOf};
use crate::serializer::ValueSerializer;
use crate::storage::{CommitWrite, StreamStorage};
use crate::validator::KeyValueValidator;

/// Repository storing serialized values in a synchronous stream storage
///
/// ```rust
/// use kv_repository::prelude::*;
///
/// let repository: StreamRepository<str, Vec<String>, _, _> =
///     StreamRepository::new(MemoryStreamStorage::new(), JsonSerializer::new());
///
/// let created = repository.try_create_with("todo", |items| items.push("write docs".into()));
/// assert!(created.is_success());
///
/// let updated = repository.try_update("todo", |items| items.push("ship".into()));
/// assert_eq!(updated.into_value().len(), 2);
/// ```
pub struct StreamRepository<K: ?Sized, V, S, Z> {
    storage: S,
    serializer: Z,
    core: RepositoryCore<K, V>,
}

impl<K: ?Sized, V: Default + 'static, S, Z> StreamRepository<K, V, S, Z> {
    /// Create a repository whose new values start as `V::default()`
    pub fn new(storage: S, serializer: Z) -> Self {
        Self::with_factory(storage, serializer, V::default)
    }
}

impl<K: ?Sized, V, S, Z> StreamRepository<K, V, S, Z> {
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

    /// Replace the repository settings
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
}

impl<K, V, S, Z> StreamRepository<K, V, S, Z>
where
    K: fmt::Display + ?Sized,
    S: StreamStorage<K>,
    Z: ValueSerializer<V>,
{
    fn create<F: FnOnce(&mut V)>(&self, key: &K, initializer: F) -> Result<V, OperationResult> {
        self.core.validate_key(key)?;
        self.core.ensure_absent(self.storage.check_exists(key), key)?;
        let value = self.core.new_value(initializer);
        self.core.validate_value(&value)?;
        let writer = self.storage.try_create(key).into_outcome()?;
        self.write_value(key, writer, &value)?;
        Ok(value)
    }

    fn get(&self, key: &K) -> Result<V, OperationResult> {
        self.core.validate_key(key)?;
        self.fetch(key)
    }

    fn update<F: FnOnce(&mut V)>(&self, key: &K, mutator: F) -> Result<V, OperationResult> {
        self.core.validate_key(key)?;
        let mut value = self.fetch(key)?;
        mutator(&mut value);
        self.core.validate_value(&value)?;
        let writer = self.storage.try_update(key).into_outcome()?;
        self.write_value(key, writer, &value)?;
        Ok(value)
    }

    fn delete(&self, key: &K) -> Result<V, OperationResult> {
        self.core.validate_key(key)?;
        let value = self.fetch(key)?;
        self.storage.try_delete(key).into_outcome()?;
        Ok(value)
    }

    fn fetch(&self, key: &K) -> Result<V, OperationResult> {
        let mut reader = self.storage.try_open_for_read(key).into_outcome()?;
        self.serializer.try_deserialize(&mut reader).into_outcome()
    }

    // The writer is consumed: it is released on every path and committed
    // only after serialization succeeded.
    fn write_value(&self, key: &K, mut writer: S::Writer, value: &V) -> Result<(), OperationResult> {
        self.serializer.try_serialize(value, &mut writer).into_outcome()?;
        writer.commit().map_err(|e| self.core.commit_failed(key, &e))
    }
}

impl<K, V, S, Z> Repository<K, V> for StreamRepository<K, V, S, Z>
where
    K: fmt::Display + ?Sized,
    S: StreamStorage<K>,
    Z: ValueSerializer<V>,
{
    fn try_create_with<F>(&self, key: &K, initializer: F) -> OperationResultOf<V>
    where
        F: FnOnce(&mut V),
    {
        self.core.begin(Operation::Create, key);
        let outcome = self.create(key, initializer);
        self.core.finish(Operation::Create, key, outcome)
    }

    fn try_get(&self, key: &K) -> OperationResultOf<V> {
        self.core.begin(Operation::Get, key);
        let outcome = self.get(key);
        self.core.finish(Operation::Get, key, outcome)
    }

    fn try_update<F>(&self, key: &K, mutator: F) -> OperationResultOf<V>
    where
        F: FnOnce(&mut V),
    {
        self.core.begin(Operation::Update, key);
        let outcome = self.update(key, mutator);
        self.core.finish(Operation::Update, key, outcome)
    }

    fn try_delete(&self, key: &K) -> OperationResultOf<V> {
        self.core.begin(Operation::Delete, key);
        let outcome = self.delete(key);
        self.core.finish(Operation::Delete, key, outcome)
    }
}

impl<K: ?Sized, V, S: fmt::Debug, Z: fmt::Debug> fmt::Debug for StreamRepository<K, V, S, Z> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamRepository")
            .field("storage", &self.storage)
            .field("serializer", &self.serializer)
            .field("core", &self.core)
            .finish()
    }
}
