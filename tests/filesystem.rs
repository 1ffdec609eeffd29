//! Repository behaviour on the local filesystem backend
#![cfg(feature = "serde_support")]

use kv_repository::prelude::*;
use kv_repository::storage::ExtensionPathProvider;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Settings {
    theme: String,
    font_size: u8,
    plugins: Vec<String>,
}

/// Writes half a document, flushes it, then gives up
#[derive(Debug)]
struct HalfWrite;

impl ValueSerializer<Settings> for HalfWrite {
    fn try_serialize<W: Write>(&self, _value: &Settings, writer: &mut W) -> OperationResult {
        if let Err(e) = writer.write_all(br#"{"theme":"#).and_then(|_| writer.flush()) {
            return OperationResult::from_error(&e);
        }
        OperationResult::failed("serializer exploded")
    }

    fn try_deserialize<R: Read>(&self, reader: &mut R) -> OperationResultOf<Settings> {
        ValueSerializer::<Settings>::try_deserialize(&JsonSerializer::new(), reader)
    }
}

fn local_config(dir: &TempDir, atomic_writes: bool) -> LocalConfig {
    LocalConfig {
        base_path: dir.path().to_path_buf(),
        atomic_writes,
        ..Default::default()
    }
}

fn settings_repository(
    dir: &TempDir,
    atomic_writes: bool,
) -> StreamRepository<str, Settings, FileSystemStreamStorage, JsonSerializer> {
    let storage = FileSystemStreamStorage::new(local_config(dir, atomic_writes)).unwrap();
    StreamRepository::new(storage, JsonSerializer::pretty())
}

fn file_names(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_crud_on_disk() {
    for atomic_writes in [true, false] {
        let dir = TempDir::new().unwrap();
        let repository = settings_repository(&dir, atomic_writes);

        let created = repository.try_create_with("editor", |s| {
            s.theme = "dark".to_string();
            s.font_size = 12;
        });
        assert!(created.is_success());
        assert_eq!(file_names(&dir), vec!["editor.json".to_string()]);

        let on_disk = fs::read_to_string(dir.path().join("editor.json")).unwrap();
        assert!(on_disk.contains("\"theme\": \"dark\""));

        let updated = repository.try_update("editor", |s| s.plugins.push("vim".to_string()));
        assert_eq!(updated.into_value().plugins, vec!["vim".to_string()]);

        let read = repository.try_get("editor").into_value();
        assert_eq!(read.theme, "dark");
        assert_eq!(read.font_size, 12);

        assert_eq!(repository.try_delete("editor").into_value(), read);
        assert!(file_names(&dir).is_empty());
    }
}

#[test]
fn test_reading_does_not_truncate() {
    let dir = TempDir::new().unwrap();
    let repository = settings_repository(&dir, true);
    repository.try_create_with("k", |s| s.theme = "light".to_string());

    for _ in 0..3 {
        assert_eq!(repository.try_get("k").into_value().theme, "light");
    }
    assert!(fs::metadata(dir.path().join("k.json")).unwrap().len() > 0);
}

#[test]
fn test_duplicate_create_keeps_existing_file() {
    let dir = TempDir::new().unwrap();
    let repository = settings_repository(&dir, true);
    repository.try_create_with("k", |s| s.font_size = 10);
    let before = fs::read(dir.path().join("k.json")).unwrap();

    let duplicate = repository.try_create_with("k", |s| s.font_size = 99);
    assert_eq!(duplicate.error_message(), Some("k already exists in store"));
    assert_eq!(fs::read(dir.path().join("k.json")).unwrap(), before);
}

#[test]
fn test_missing_files() {
    let dir = TempDir::new().unwrap();
    let repository = settings_repository(&dir, false);

    assert!(repository.try_get("nope").error_message().unwrap().contains("does not exist"));
    assert!(repository
        .try_update("nope", |s| s.font_size = 1)
        .error_message()
        .unwrap()
        .contains("does not exist"));
    assert!(repository.try_delete("nope").is_failure());
    assert!(file_names(&dir).is_empty());
}

#[test]
fn test_failed_writes_leave_files_untouched() {
    for atomic_writes in [true, false] {
        let dir = TempDir::new().unwrap();
        let repository = settings_repository(&dir, atomic_writes);
        assert!(repository
            .try_create_with("editor", |s| s.theme = "dark".to_string())
            .is_success());
        let before = fs::read(dir.path().join("editor.json")).unwrap();

        let storage = FileSystemStreamStorage::new(local_config(&dir, atomic_writes)).unwrap();
        let failing: StreamRepository<str, Settings, _, _> = StreamRepository::new(storage, HalfWrite);

        let updated = failing.try_update("editor", |s| s.theme = "light".to_string());
        assert_eq!(updated.error_message(), Some("serializer exploded"));
        assert_eq!(fs::read(dir.path().join("editor.json")).unwrap(), before);
        assert_eq!(repository.try_get("editor").into_value().theme, "dark");

        let created = failing.try_create("fresh");
        assert_eq!(created.error_message(), Some("serializer exploded"));
        assert_eq!(file_names(&dir), vec!["editor.json".to_string()]);
    }
}

#[test]
fn test_corrupt_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let repository = settings_repository(&dir, true);
    fs::write(dir.path().join("broken.json"), b"{ \"theme\": ").unwrap();

    let result = repository.try_get("broken");
    assert!(result.is_failure());
    assert!(result.error_message().unwrap().starts_with("Deserialization failed"));
    assert_eq!(fs::read(dir.path().join("broken.json")).unwrap(), b"{ \"theme\": ");
}

#[test]
fn test_keys_stay_inside_base_directory() {
    let dir = TempDir::new().unwrap();
    let repository = settings_repository(&dir, true);

    assert!(repository.try_create("../escape").is_success());
    assert!(repository.try_create("nested/key").is_success());
    assert_eq!(
        file_names(&dir),
        vec!["%2E.%2Fescape.json".to_string(), "nested%2Fkey.json".to_string()]
    );
    assert!(repository.try_get("../escape").is_success());
}

#[test]
fn test_custom_path_provider_and_bincode() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().to_path_buf();
    let storage = FileSystemStreamStorage::with_path_provider(
        local_config(&dir, true),
        move |id: &u32| base.join(format!("shard-{}", id % 2)).join(format!("{}.bin", id)),
    )
    .unwrap();
    let repository: StreamRepository<u32, Settings, _, _> =
        StreamRepository::new(storage, BincodeSerializer::new());

    assert!(repository.try_create_with(&7, |s| s.font_size = 7).is_success());
    assert!(dir.path().join("shard-1").join("7.bin").is_file());
    assert_eq!(repository.try_get(&7).into_value().font_size, 7);
}

#[test]
fn test_extension_from_config() {
    let dir = TempDir::new().unwrap();
    let config = LocalConfig {
        extension: "settings".to_string(),
        ..local_config(&dir, true)
    };
    let storage = FileSystemStreamStorage::new(config).unwrap();
    assert_eq!(
        storage.path_provider(),
        &ExtensionPathProvider::new(dir.path(), "settings")
    );

    let repository: StreamRepository<str, Settings, _, _> =
        StreamRepository::new(storage, JsonSerializer::new());
    assert!(repository.try_create("user").is_success());
    assert_eq!(file_names(&dir), vec!["user.settings".to_string()]);
    let expected: PathBuf = dir.path().join("user.settings");
    assert!(expected.is_file());
}

#[cfg(feature = "async")]
#[tokio::test]
async fn test_async_repository_on_disk() {
    let dir = TempDir::new().unwrap();
    let storage = FileSystemStreamStorage::new(local_config(&dir, true)).unwrap();
    let repository: AsyncStreamRepository<str, Settings, _, _> =
        AsyncStreamRepository::new(storage, JsonSerializer::new());

    assert!(repository
        .try_create_with("a", |s| s.theme = "x".to_string())
        .await
        .is_success());
    assert_eq!(
        repository.try_create("a").await.error_message(),
        Some("a already exists in store")
    );
    assert_eq!(
        repository
            .try_update("a", |s| s.theme = "y".to_string())
            .await
            .into_value()
            .theme,
        "y"
    );
    assert_eq!(repository.try_get("a").await.into_value().theme, "y");
    assert_eq!(repository.try_delete("a").await.into_value().theme, "y");
    assert!(repository.try_get("a").await.is_failure());
    assert!(file_names(&dir).is_empty());
}
