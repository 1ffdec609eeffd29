//! Steps shared by the synchronous and asynchronous repositories
//!
//! Every step returns `Result<_, OperationResult>` so a repository operation
//! reads as a straight chain of `?`; the first failure is returned unchanged.

use std::fmt;
use std::sync::Arc;

use crate::config::RepositoryConfig;
use crate::error::RepositoryError;
use crate::result::{OperationResult, OperationResultOf};
use crate::validator::KeyValueValidator;

/// Repository operation, as named in log events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `try_create` / `try_create_with`
    Create,
    /// `try_get`
    Get,
    /// `try_update`
    Update,
    /// `try_delete`
    Delete,
}

impl Operation {
    /// Short lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Get => "get",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) type ValueFactory<V> = Arc<dyn Fn() -> V + Send + Sync>;

/// Validator, value factory and settings of one repository
pub(crate) struct RepositoryCore<K: ?Sized, V> {
    validator: Option<Arc<dyn KeyValueValidator<K, V>>>,
    factory: ValueFactory<V>,
    config: RepositoryConfig,
}

impl<K: ?Sized, V> RepositoryCore<K, V> {
    pub(crate) fn new(factory: ValueFactory<V>) -> Self {
        Self {
            validator: None,
            factory,
            config: RepositoryConfig::default(),
        }
    }

    pub(crate) fn set_validator(&mut self, validator: Arc<dyn KeyValueValidator<K, V>>) {
        self.validator = Some(validator);
    }

    pub(crate) fn set_config(&mut self, config: RepositoryConfig) {
        self.config = config;
    }

    pub(crate) fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub(crate) fn has_validator(&self) -> bool {
        self.validator.is_some()
    }

    pub(crate) fn validate_key(&self, key: &K) -> Result<(), OperationResult> {
        match &self.validator {
            Some(validator) => validator.validate_key(key).into_outcome(),
            None => Ok(()),
        }
    }

    pub(crate) fn validate_value(&self, value: &V) -> Result<(), OperationResult> {
        match &self.validator {
            Some(validator) => validator.validate_value(value).into_outcome(),
            None => Ok(()),
        }
    }

    /// Fresh value from the factory, passed through `initializer`
    pub(crate) fn new_value<F: FnOnce(&mut V)>(&self, initializer: F) -> V {
        let mut value = (self.factory)();
        initializer(&mut value);
        value
    }
}

impl<K: fmt::Display + ?Sized, V> RepositoryCore<K, V> {
    pub(crate) fn ensure_absent(&self, exists: bool, key: &K) -> Result<(), OperationResult> {
        if exists {
            return Err(OperationResult::from_error(&RepositoryError::AlreadyExists {
                key: key.to_string(),
            }));
        }
        Ok(())
    }

    pub(crate) fn commit_failed(&self, key: &K, error: &std::io::Error) -> OperationResult {
        OperationResult::from_error(&RepositoryError::CommitFailed {
            key: key.to_string(),
            reason: error.to_string(),
        })
    }

    pub(crate) fn begin(&self, operation: Operation, key: &K) {
        tracing::debug!(repository = %self.config.name, %operation, %key, "operation started");
    }

    /// Log the outcome and fold it into the public result type
    pub(crate) fn finish(
        &self,
        operation: Operation,
        key: &K,
        outcome: Result<V, OperationResult>,
    ) -> OperationResultOf<V> {
        match outcome {
            Ok(value) => {
                tracing::debug!(repository = %self.config.name, %operation, %key, "operation succeeded");
                OperationResultOf::from_value(value)
            }
            Err(failure) => {
                tracing::warn!(
                    repository = %self.config.name,
                    %operation,
                    %key,
                    error = failure.error_message().unwrap_or_default(),
                    "operation failed"
                );
                failure.into_failed()
            }
        }
    }
}

impl<K: ?Sized, V> fmt::Debug for RepositoryCore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryCore")
            .field("config", &self.config)
            .field("has_validator", &self.has_validator())
            .finish()
    }
}
