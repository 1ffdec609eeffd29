//! Serializer module for value serialization and deserialization
//!
//! This module defines how repository values are written to and read from
//! storage streams, and ships two serde-based formats:
//! - **JSON** via `serde_json`, readable and the default choice
//! - **Bincode** for compact binary payloads
//!
//! Both formats require the `serde_support` feature.

#[allow(clippy::module_inception)]
pub mod serializer;

#[cfg(feature = "serde_support")]
pub mod serializer_bincode;
#[cfg(feature = "serde_support")]
pub mod serializer_json;

// Re-export main types for convenience
pub use serializer::ValueSerializer;

#[cfg(feature = "async")]
pub use serializer::AsyncValueSerializer;

#[cfg(feature = "serde_support")]
pub use serializer_bincode::BincodeSerializer;
#[cfg(feature = "serde_support")]
pub use serializer_json::JsonSerializer;
