//! JSON value serializer built on `serde_json`

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SerializerError;
use crate::result::{OperationResult, OperationResultOf};
use crate::serializer::serializer::{deserialize_failure, serialize_failure, ValueSerializer};

#[cfg(feature = "async")]
use crate::serializer::serializer::{stream_failure, AsyncValueSerializer};
#[cfg(feature = "async")]
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Serializes values as JSON documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Compact output
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented, human-readable output
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    /// Whether output is indented
    pub fn is_pretty(&self) -> bool {
        self.pretty
    }

    #[cfg(feature = "async")]
    fn to_bytes<V: Serialize>(&self, value: &V) -> Result<Vec<u8>, SerializerError> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        encoded.map_err(serialize_failure)
    }
}

fn classify(error: serde_json::Error, deserializing: bool) -> SerializerError {
    if error.is_io() {
        SerializerError::StreamError {
            reason: error.to_string(),
        }
    } else if deserializing {
        deserialize_failure(error)
    } else {
        serialize_failure(error)
    }
}

impl<V: Serialize + DeserializeOwned> ValueSerializer<V> for JsonSerializer {
    fn try_serialize<W: Write>(&self, value: &V, writer: &mut W) -> OperationResult {
        let written = if self.pretty {
            serde_json::to_writer_pretty(&mut *writer, value)
        } else {
            serde_json::to_writer(&mut *writer, value)
        };
        match written {
            Ok(()) => OperationResult::successful(),
            Err(e) => OperationResult::from_error(&classify(e, false)),
        }
    }

    fn try_deserialize<R: Read>(&self, reader: &mut R) -> OperationResultOf<V> {
        match serde_json::from_reader(reader) {
            Ok(value) => OperationResultOf::from_value(value),
            Err(e) => OperationResultOf::from_error(&classify(e, true)),
        }
    }
}

#[cfg(feature = "async")]
impl<V> AsyncValueSerializer<V> for JsonSerializer
where
    V: Serialize + DeserializeOwned + Send + Sync,
{
    async fn try_serialize<W>(&self, value: &V, writer: &mut W) -> OperationResult
    where
        W: AsyncWrite + Unpin + Send,
    {
        let bytes = match self.to_bytes(value) {
            Ok(bytes) => bytes,
            Err(e) => return OperationResult::from_error(&e),
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
        match serde_json::from_slice(&bytes) {
            Ok(value) => OperationResultOf::from_value(value),
            Err(e) => OperationResultOf::from_error(&deserialize_failure(e)),
        }
    }
}
