//! Integration tests for the asynchronous repository
#![cfg(all(feature = "async", feature = "serde_support"))]

use futures::future::join_all;
use kv_repository::prelude::*;
use kv_repository::storage::{MemoryReader, MemoryWriter};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Person {
    name: String,
    age: u32,
    email: String,
}

/// Memory storage whose reads take `read_delay`
#[derive(Debug, Clone, Default)]
struct SlowStorage {
    inner: MemoryStreamStorage,
    read_delay: Duration,
}

impl AsyncStreamStorage<str> for SlowStorage {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    async fn check_exists(&self, key: &str) -> bool {
        AsyncStreamStorage::<str>::check_exists(&self.inner, key).await
    }

    async fn try_open_for_read(&self, key: &str) -> OperationResultOf<MemoryReader> {
        tokio::time::sleep(self.read_delay).await;
        AsyncStreamStorage::<str>::try_open_for_read(&self.inner, key).await
    }

    async fn try_create(&self, key: &str) -> OperationResultOf<MemoryWriter> {
        AsyncStreamStorage::<str>::try_create(&self.inner, key).await
    }

    async fn try_update(&self, key: &str) -> OperationResultOf<MemoryWriter> {
        AsyncStreamStorage::<str>::try_update(&self.inner, key).await
    }

    async fn try_delete(&self, key: &str) -> OperationResult {
        AsyncStreamStorage::<str>::try_delete(&self.inner, key).await
    }
}

/// Writes part of a document and then never finishes
#[derive(Debug)]
struct StallingSerializer;

impl AsyncValueSerializer<Person> for StallingSerializer {
    async fn try_serialize<W>(&self, _value: &Person, writer: &mut W) -> OperationResult
    where
        W: AsyncWrite + Unpin + Send,
    {
        if let Err(e) = writer.write_all(br#"{"name":"#).await {
            return OperationResult::from_error(&e);
        }
        tokio::time::sleep(Duration::from_secs(60)).await;
        OperationResult::successful()
    }

    async fn try_deserialize<R>(&self, reader: &mut R) -> OperationResultOf<Person>
    where
        R: AsyncRead + Unpin + Send,
    {
        AsyncValueSerializer::<Person>::try_deserialize(&JsonSerializer::new(), reader).await
    }
}

/// JSON serializer that counts how often it was asked to do something
#[derive(Debug, Default)]
struct CountingSerializer {
    inner: JsonSerializer,
    calls: AtomicUsize,
}

impl CountingSerializer {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AsyncValueSerializer<Person> for CountingSerializer {
    async fn try_serialize<W>(&self, value: &Person, writer: &mut W) -> OperationResult
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        AsyncValueSerializer::<Person>::try_serialize(&self.inner, value, writer).await
    }

    async fn try_deserialize<R>(&self, reader: &mut R) -> OperationResultOf<Person>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        AsyncValueSerializer::<Person>::try_deserialize(&self.inner, reader).await
    }
}

/// Writes part of a document, flushes it, then fails
#[derive(Debug)]
struct FlushThenFail;

impl AsyncValueSerializer<Person> for FlushThenFail {
    async fn try_serialize<W>(&self, _value: &Person, writer: &mut W) -> OperationResult
    where
        W: AsyncWrite + Unpin + Send,
    {
        if let Err(e) = writer.write_all(br#"{"name":"#).await {
            return OperationResult::from_error(&e);
        }
        if let Err(e) = writer.flush().await {
            return OperationResult::from_error(&e);
        }
        OperationResult::failed("serializer exploded")
    }

    async fn try_deserialize<R>(&self, reader: &mut R) -> OperationResultOf<Person>
    where
        R: AsyncRead + Unpin + Send,
    {
        AsyncValueSerializer::<Person>::try_deserialize(&JsonSerializer::new(), reader).await
    }
}

type People = AsyncStreamRepository<str, Person, MemoryStreamStorage, JsonSerializer>;

fn people() -> People {
    AsyncStreamRepository::new(MemoryStreamStorage::new(), JsonSerializer::new())
}

fn slow_people(read_delay: Duration) -> AsyncStreamRepository<str, Person, SlowStorage, JsonSerializer> {
    let storage = SlowStorage {
        inner: MemoryStreamStorage::new(),
        read_delay,
    };
    AsyncStreamRepository::new(storage, JsonSerializer::new())
}

#[tokio::test]
async fn test_create_update_get_delete_scenario() {
    let repository = people();

    let created = repository
        .try_create_with("a", |p| p.name = "x".to_string())
        .await;
    assert!(created.is_success());

    let duplicate = repository.try_create("a").await;
    assert_eq!(duplicate.error_message(), Some("a already exists in store"));

    let updated = repository
        .try_update("a", |p| p.name = "y".to_string())
        .await;
    assert_eq!(updated.into_value().name, "y");

    assert_eq!(repository.try_get("a").await.into_value().name, "y");
    assert_eq!(repository.try_delete("a").await.into_value().name, "y");

    let gone = repository.try_get("a").await;
    assert!(gone.is_failure());
    assert!(gone.error_message().unwrap().contains("does not exist"));

    let stats = repository.storage().stats();
    assert_eq!(stats.open_streams(), 0);
}

#[tokio::test]
async fn test_update_preserves_unrelated_fields() {
    let repository = people();
    repository
        .try_create_with("p", |p| {
            p.name = "Grace".to_string();
            p.email = "grace@example.com".to_string();
        })
        .await;

    let updated = repository.try_update("p", |p| p.age = 85).await.into_value();
    assert_eq!(updated.name, "Grace");
    assert_eq!(updated.email, "grace@example.com");
    assert_eq!(repository.try_get("p").await.into_value(), updated);
}

#[tokio::test]
async fn test_missing_key_fails_without_writes() {
    let repository = people();

    assert!(repository.try_get("missing").await.is_failure());
    assert!(repository.try_update("missing", |p| p.age = 1).await.is_failure());
    assert!(repository.try_delete("missing").await.is_failure());

    let stats = repository.storage().stats();
    assert_eq!(stats.commits, 0);
    assert_eq!(stats.updates, 0);
    assert_eq!(stats.deletes, 0);
    assert!(repository.storage().is_empty());
}

#[tokio::test]
async fn test_validator_short_circuits_before_storage() {
    let repository: AsyncStreamRepository<str, Person, _, _> =
        AsyncStreamRepository::new(MemoryStreamStorage::new(), CountingSerializer::default())
            .with_validator(FnValidator::new(
                |key: &str| OperationResult::new(!key.is_empty(), Some("empty key".to_string())),
                |person: &Person| OperationResult::new(person.age < 200, Some("age out of range".to_string())),
            ));

    let attempts = [
        repository.try_create("").await,
        repository.try_get("").await,
        repository.try_update("", |p| p.age = 1).await,
        repository.try_delete("").await,
    ];
    for result in attempts {
        assert_eq!(result.error_message(), Some("empty key"));
    }
    assert_eq!(repository.storage().stats().calls(), 0);
    assert_eq!(repository.serializer().calls(), 0);

    let invalid = repository.try_create_with("old", |p| p.age = 500).await;
    assert_eq!(invalid.error_message(), Some("age out of range"));
    assert_eq!(repository.storage().stats().creates, 0);
    assert_eq!(repository.serializer().calls(), 0);
}

#[tokio::test]
async fn test_flushed_partial_write_is_not_stored() {
    let storage = MemoryStreamStorage::new();
    let repository: AsyncStreamRepository<str, Person, _, _> =
        AsyncStreamRepository::new(storage.clone(), FlushThenFail);
    let original = serde_json::to_vec(&Person {
        name: "x".to_string(),
        ..Default::default()
    })
    .unwrap();
    storage.insert_raw("a", original.clone());

    let updated = repository.try_update("a", |p| p.name = "y".to_string()).await;
    assert_eq!(updated.error_message(), Some("serializer exploded"));
    assert_eq!(storage.raw("a").unwrap(), original);
    assert_eq!(repository.try_get("a").await.into_value().name, "x");

    let created = repository.try_create("b").await;
    assert_eq!(created.error_message(), Some("serializer exploded"));
    assert!(!storage.contains_key("b"));
    assert!(AsyncStreamStorage::<str>::try_create(&storage, "b").await.is_success());

    let stats = storage.stats();
    assert_eq!(stats.commits, 0);
    assert_eq!(stats.open_streams(), 0);
}

#[tokio::test]
async fn test_concurrent_creates_in_memory_admit_one() {
    let repository = people();

    let attempts = (0..8).map(|i| {
        let repository = &repository;
        async move {
            repository
                .try_create_with("shared", move |p| p.age = i)
                .await
        }
    });
    let results = join_all(attempts).await;

    assert_eq!(results.iter().filter(|r| r.is_success()).count(), 1);
    for failure in results.iter().filter(|r| r.is_failure()) {
        assert!(failure.error_message().unwrap().contains("already exists"));
    }
    assert_eq!(repository.storage().stats().commits, 1);
}

#[tokio::test]
async fn test_concurrent_creates_on_disk_admit_one() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileSystemStreamStorage::new(LocalConfig::in_directory(dir.path())).unwrap();
    let repository: AsyncStreamRepository<str, Person, _, _> =
        AsyncStreamRepository::new(storage, JsonSerializer::new());

    let attempts = (0..8).map(|i| {
        let repository = &repository;
        async move {
            repository
                .try_create_with("shared", move |p| p.age = i)
                .await
        }
    });
    let results = join_all(attempts).await;

    let winners: Vec<u32> = results
        .iter()
        .filter_map(|r| if r.is_success() { r.value().map(|p| p.age) } else { None })
        .collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(repository.try_get("shared").await.into_value().age, winners[0]);
}

#[tokio::test]
async fn test_operation_timeout() {
    let repository = slow_people(Duration::from_secs(5))
        .with_config(RepositoryConfig::named("slow").with_operation_timeout(Duration::from_millis(50)));
    let writer = AsyncStreamStorage::<str>::try_create(&repository.storage().inner, "a")
        .await
        .into_outcome()
        .unwrap();
    AsyncCommitWrite::commit(writer).await.unwrap();

    let result = repository.try_get("a").await;
    assert!(result.is_failure());
    assert_eq!(
        result.error_message(),
        Some("Operation timed out after 50 ms: get")
    );
}

#[tokio::test]
async fn test_timed_out_write_is_discarded() {
    let storage = MemoryStreamStorage::new();
    let repository: AsyncStreamRepository<str, Person, _, _> =
        AsyncStreamRepository::new(storage.clone(), StallingSerializer)
            .with_config(RepositoryConfig::default().with_operation_timeout(Duration::from_millis(50)));

    let result = repository.try_create("a").await;
    assert!(result.error_message().unwrap().contains("timed out"));

    assert!(!storage.contains_key("a"));
    let stats = storage.stats();
    assert_eq!(stats.commits, 0);
    assert_eq!(stats.open_streams(), 0);

    // the abandoned writer no longer holds the key
    let retry = AsyncStreamStorage::<str>::try_create(&storage, "a").await;
    assert!(retry.is_success());
}

#[tokio::test]
async fn test_cancellation_token() {
    let repository = Arc::new(slow_people(Duration::from_secs(5)));
    let token = CancellationToken::new();

    let pending = {
        let repository = Arc::clone(&repository);
        let token = token.clone();
        tokio::spawn(async move { repository.try_get_cancellable("a", &token).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();

    let result = pending.await.unwrap();
    assert_eq!(result.error_message(), Some("Operation cancelled: get"));

    let cancelled_create = repository.try_create_cancellable("b", &token).await;
    assert!(cancelled_create.is_failure());
    assert!(!repository.storage().inner.contains_key("b"));
}

#[tokio::test]
async fn test_uncancelled_token_passes_through() {
    let repository = people();
    let token = CancellationToken::new();

    assert!(repository.try_create_cancellable("a", &token).await.is_success());
    let updated = repository
        .try_update_cancellable("a", |p| p.age = 9, &token)
        .await;
    assert_eq!(updated.into_value().age, 9);
    assert_eq!(repository.try_delete_cancellable("a", &token).await.into_value().age, 9);
}

#[test]
fn test_runs_on_any_executor() {
    let repository = people();
    tokio_test::block_on(async {
        assert!(repository.try_create("a").await.is_success());
        assert!(repository.try_get("a").await.is_success());
    });
}
