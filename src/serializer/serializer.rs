//! Serializer contracts

use std::io::{Read, Write};

#[cfg(feature = "serde_support")]
use crate::error::SerializerError;
use crate::result::{OperationResult, OperationResultOf};

#[cfg(feature = "async")]
use std::future::Future;
#[cfg(feature = "async")]
use tokio::io::{AsyncRead, AsyncWrite};

/// Writes values of type `V` to byte streams and reads them back
///
/// Malformed or truncated input is a failure result, never a panic.
pub trait ValueSerializer<V> {
    /// Serialize `value` into `writer`
    fn try_serialize<W: Write>(&self, value: &V, writer: &mut W) -> OperationResult;

    /// Deserialize one value from `reader`
    fn try_deserialize<R: Read>(&self, reader: &mut R) -> OperationResultOf<V>;
}

/// Asynchronous counterpart of [`ValueSerializer`]
#[cfg(feature = "async")]
pub trait AsyncValueSerializer<V>: Send + Sync {
    /// Serialize `value` into `writer`
    fn try_serialize<W>(
        &self,
        value: &V,
        writer: &mut W,
    ) -> impl Future<Output = OperationResult> + Send
    where
        W: AsyncWrite + Unpin + Send;

    /// Deserialize one value from `reader`
    fn try_deserialize<R>(&self, reader: &mut R) -> impl Future<Output = OperationResultOf<V>> + Send
    where
        R: AsyncRead + Unpin + Send;
}

impl<V, S: ValueSerializer<V> + ?Sized> ValueSerializer<V> for &S {
    fn try_serialize<W: Write>(&self, value: &V, writer: &mut W) -> OperationResult {
        (**self).try_serialize(value, writer)
    }

    fn try_deserialize<R: Read>(&self, reader: &mut R) -> OperationResultOf<V> {
        (**self).try_deserialize(reader)
    }
}

#[cfg(all(feature = "serde_support", feature = "async"))]
pub(crate) fn stream_failure(error: &std::io::Error) -> SerializerError {
    SerializerError::StreamError {
        reason: error.to_string(),
    }
}

#[cfg(feature = "serde_support")]
pub(crate) fn serialize_failure(reason: impl ToString) -> SerializerError {
    SerializerError::SerializationFailed {
        reason: reason.to_string(),
    }
}

#[cfg(feature = "serde_support")]
pub(crate) fn deserialize_failure(reason: impl ToString) -> SerializerError {
    SerializerError::DeserializationFailed {
        reason: reason.to_string(),
    }
}
