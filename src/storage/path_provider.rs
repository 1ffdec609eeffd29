//! Mapping keys to file paths

use std::fmt;
use std::path::{Path, PathBuf};

/// Maps a key to the file that stores its value
pub trait FilePathProvider<K: ?Sized>: Send + Sync {
    /// Path of the file holding the value for `key`
    fn file_path(&self, key: &K) -> PathBuf;
}

impl<K, F> FilePathProvider<K> for F
where
    K: ?Sized,
    F: Fn(&K) -> PathBuf + Send + Sync,
{
    fn file_path(&self, key: &K) -> PathBuf {
        self(key)
    }
}

/// Stores each key as `<base_path>/<encoded key>.<extension>`
///
/// The key's `Display` form is percent-encoded so that it always names a single
/// file directly under the base path: anything other than ASCII letters, digits,
/// `-`, `_` and non-leading `.` becomes `%XX`. Distinct keys map to distinct files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionPathProvider {
    base_path: PathBuf,
    extension: String,
}

impl ExtensionPathProvider {
    /// Create a provider rooted at `base_path`. An empty extension adds none.
    pub fn new(base_path: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    /// Directory holding the files
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// File extension, without the dot
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// File name used for a rendered key
    pub fn file_name(&self, key: &str) -> String {
        let mut name = encode_key(key);
        if !self.extension.is_empty() {
            name.push('.');
            name.push_str(&self.extension);
        }
        name
    }
}

impl<K: fmt::Display + ?Sized> FilePathProvider<K> for ExtensionPathProvider {
    fn file_path(&self, key: &K) -> PathBuf {
        self.base_path.join(self.file_name(&key.to_string()))
    }
}

fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for (i, byte) in key.bytes().enumerate() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => encoded.push(byte as char),
            b'.' if i > 0 => encoded.push('.'),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
