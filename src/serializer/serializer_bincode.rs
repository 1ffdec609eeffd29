//! Compact binary value serializer built on `bincode`

use std::io::{Read, Write};

use bincode::config::{self, Configuration};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::result::{OperationResult, OperationResultOf};
use crate::serializer::serializer::{deserialize_failure, serialize_failure, ValueSerializer};

#[cfg(feature = "async")]
use crate::serializer::serializer::{stream_failure, AsyncValueSerializer};
#[cfg(feature = "async")]
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Serializes values with bincode's standard configuration
/// (little endian, variable-length integers)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BincodeSerializer;

impl BincodeSerializer {
    /// Create the serializer
    pub fn new() -> Self {
        Self
    }

    fn config() -> Configuration {
        config::standard()
    }
}

impl<V: Serialize + DeserializeOwned> ValueSerializer<V> for BincodeSerializer {
    fn try_serialize<W: Write>(&self, value: &V, writer: &mut W) -> OperationResult {
        match bincode::serde::encode_into_std_write(value, writer, Self::config()) {
            Ok(_) => OperationResult::successful(),
            Err(e) => OperationResult::from_error(&serialize_failure(e)),
        }
    }

    fn try_deserialize<R: Read>(&self, reader: &mut R) -> OperationResultOf<V> {
        match bincode::serde::decode_from_std_read(reader, Self::config()) {
            Ok(value) => OperationResultOf::from_value(value),
            Err(e) => OperationResultOf::from_error(&deserialize_failure(e)),
        }
    }
}

#[cfg(feature = "async")]
impl<V> AsyncValueSerializer<V> for BincodeSerializer
where
    V: Serialize + DeserializeOwned + Send + Sync,
{
    async fn try_serialize<W>(&self, value: &V, writer: &mut W) -> OperationResult
    where
        W: AsyncWrite + Unpin + Send,
    {
        let bytes = match bincode::serde::encode_to_vec(value, Self::config()) {
            Ok(bytes) => bytes,
            Err(e) => return OperationResult::from_error(&serialize_failure(e)),
        };
        match writer.write_all(&bytes).await {
            Ok(()) => OperationResult::successful(),
            Err(e) => OperationResult::from_error(&stream_failure(&e)),
        }
    }

    async fn try_deserialize<R>(&self, reader: &mut R) -> OperationResultOf<V>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut bytes = Vec::new();
        if let Err(e) = reader.read_to_end(&mut bytes).await {
            return OperationResultOf::from_error(&stream_failure(&e));
        }
        match bincode::serde::decode_from_slice(&bytes, Self::config()) {
            Ok((value, _)) => OperationResultOf::from_value(value),
            Err(e) => OperationResultOf::from_error(&deserialize_failure(e)),
        }
    }
}
