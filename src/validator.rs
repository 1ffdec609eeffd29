//! Key and value validation
//!
//! A [`KeyValueValidator`] decides whether a key or a value is acceptable to the
//! domain. Repositories consult it before touching storage; a repository built
//! without one accepts everything.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::ValidationError;
use crate::result::OperationResult;
use crate::storage::constants::MAX_KEY_LENGTH;

/// Pluggable check for keys and values
pub trait KeyValueValidator<K: ?Sized, V>: Send + Sync {
    /// Check a key
    fn validate_key(&self, key: &K) -> OperationResult;

    /// Check a value
    fn validate_value(&self, value: &V) -> OperationResult;
}

impl<K: ?Sized, V, T> KeyValueValidator<K, V> for Arc<T>
where
    T: KeyValueValidator<K, V> + ?Sized,
{
    fn validate_key(&self, key: &K) -> OperationResult {
        (**self).validate_key(key)
    }

    fn validate_value(&self, value: &V) -> OperationResult {
        (**self).validate_value(value)
    }
}

/// Accepts every key and value
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<K: ?Sized, V> KeyValueValidator<K, V> for AcceptAll {
    fn validate_key(&self, _key: &K) -> OperationResult {
        OperationResult::successful()
    }

    fn validate_value(&self, _value: &V) -> OperationResult {
        OperationResult::successful()
    }
}

/// Validator built from two closures
pub struct FnValidator<FK, FV> {
    key_check: FK,
    value_check: FV,
}

impl<FK, FV> FnValidator<FK, FV> {
    /// Create a validator from a key check and a value check
    pub fn new(key_check: FK, value_check: FV) -> Self {
        Self {
            key_check,
            value_check,
        }
    }
}

impl<K, V, FK, FV> KeyValueValidator<K, V> for FnValidator<FK, FV>
where
    K: ?Sized,
    FK: Fn(&K) -> OperationResult + Send + Sync,
    FV: Fn(&V) -> OperationResult + Send + Sync,
{
    fn validate_key(&self, key: &K) -> OperationResult {
        (self.key_check)(key)
    }

    fn validate_value(&self, value: &V) -> OperationResult {
        (self.value_check)(value)
    }
}

/// Runs several validators in order; the first failure wins
pub struct ChainedValidator<K: ?Sized, V> {
    validators: Vec<Arc<dyn KeyValueValidator<K, V>>>,
}

impl<K: ?Sized, V> Default for ChainedValidator<K, V> {
    fn default() -> Self {
        Self {
            validators: Vec::new(),
        }
    }
}

impl<K: ?Sized, V> ChainedValidator<K, V> {
    /// Create an empty chain, which accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validator to the chain
    pub fn with(mut self, validator: impl KeyValueValidator<K, V> + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Number of validators in the chain
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl<K: ?Sized, V> KeyValueValidator<K, V> for ChainedValidator<K, V> {
    fn validate_key(&self, key: &K) -> OperationResult {
        self.validators
            .iter()
            .map(|v| v.validate_key(key))
            .find(OperationResult::is_failure)
            .unwrap_or_else(OperationResult::successful)
    }

    fn validate_value(&self, value: &V) -> OperationResult {
        self.validators
            .iter()
            .map(|v| v.validate_value(value))
            .find(OperationResult::is_failure)
            .unwrap_or_else(OperationResult::successful)
    }
}

/// Rejects keys that cannot name a stored resource: empty, longer than
/// [`MAX_KEY_LENGTH`], or containing NUL, CR or LF. Values are not checked.
pub struct StorageKeyValidator<V> {
    _value: PhantomData<fn(&V)>,
}

impl<V> Default for StorageKeyValidator<V> {
    fn default() -> Self {
        Self {
            _value: PhantomData,
        }
    }
}

impl<V> fmt::Debug for StorageKeyValidator<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StorageKeyValidator")
    }
}

impl<V> StorageKeyValidator<V> {
    /// Create the validator
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, V> KeyValueValidator<K, V> for StorageKeyValidator<V>
where
    K: fmt::Display + ?Sized,
{
    fn validate_key(&self, key: &K) -> OperationResult {
        let rendered = key.to_string();
        let reason = if rendered.is_empty() {
            Some("Key cannot be empty".to_string())
        } else if rendered.len() > MAX_KEY_LENGTH {
            Some(format!("Key too long (max {} characters)", MAX_KEY_LENGTH))
        } else if rendered.contains(['\0', '\n', '\r']) {
            Some("Key contains invalid characters".to_string())
        } else {
            None
        };

        match reason {
            Some(reason) => OperationResult::from_error(&ValidationError::InvalidKey {
                key: rendered.escape_debug().to_string(),
                reason,
            }),
            None => OperationResult::successful(),
        }
    }

    fn validate_value(&self, _value: &V) -> OperationResult {
        OperationResult::successful()
    }
}
