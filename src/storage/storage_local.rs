//! Local filesystem stream storage
//!
//! Each key is stored in its own file, located by a [`FilePathProvider`].
//! This backend supports:
//! - Read-only, non-truncating opens for reads
//! - Exclusive creation, so racing creates of one key cannot both succeed
//! - Atomic writes (write to a temporary file, then link or rename into place)
//! - File and directory permissions (Unix only)
//! - A per-file size limit
//!
//! Updates are always staged in a temporary file and renamed over the stored
//! one on commit, so a failed or abandoned update leaves the old content in
//! place. `atomic_writes` decides whether creates are staged too; without it a
//! create writes the target file directly and removes it again if the writer
//! is dropped before its commit.
//!
//! `try_update` on a missing key fails with "does not exist"; it never creates.

use crate::error::{StorageError, StorageResult};
use crate::result::{OperationResult, OperationResultOf};
use crate::storage::constants::{DEFAULT_BUFFER_SIZE, DEFAULT_EXTENSION};
use crate::storage::path_provider::{ExtensionPathProvider, FilePathProvider};
use crate::storage::storage_api::{CommitWrite, StreamStorage, WriteMode};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "async")]
use crate::storage::storage_api::{AsyncCommitWrite, AsyncStreamStorage};
#[cfg(feature = "async")]
use futures::future::{BoxFuture, FutureExt};
#[cfg(feature = "async")]
use std::pin::Pin;
#[cfg(feature = "async")]
use std::task::{ready, Context, Poll};
#[cfg(feature = "async")]
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Local storage configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde_support", serde(default))]
pub struct LocalConfig {
    /// Base directory for storage
    pub base_path: PathBuf,
    /// Create directories if they don't exist
    pub create_dirs: bool,
    /// Stage creates in a temp file too (updates are always staged)
    pub atomic_writes: bool,
    /// File permissions (Unix only)
    pub file_permissions: Option<u32>,
    /// Directory permissions (Unix only)
    pub dir_permissions: Option<u32>,
    /// Maximum file size (bytes)
    pub max_file_size: u64,
    /// File extension used by the default path provider
    pub extension: String,
    /// Capacity of the read and write buffers
    pub buffer_size: usize,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./storage"),
            create_dirs: true,
            atomic_writes: true,
            file_permissions: Some(0o644),
            dir_permissions: Some(0o755),
            max_file_size: 1024 * 1024 * 1024, // 1GB
            extension: DEFAULT_EXTENSION.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl LocalConfig {
    /// Default configuration rooted at `base_path`
    pub fn in_directory(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Default::default()
        }
    }
}

/// Local filesystem stream storage
pub struct FileSystemStreamStorage<P = ExtensionPathProvider> {
    config: LocalConfig,
    paths: P,
}

impl FileSystemStreamStorage<ExtensionPathProvider> {
    /// Create a storage that keeps `<key>.<extension>` files under the base path
    pub fn new(config: LocalConfig) -> StorageResult<Self> {
        let paths = ExtensionPathProvider::new(&config.base_path, config.extension.as_str());
        Self::with_path_provider(config, paths)
    }
}

impl<P> FileSystemStreamStorage<P> {
    /// Create a storage with a custom key-to-path mapping
    pub fn with_path_provider(config: LocalConfig, paths: P) -> StorageResult<Self> {
        // Create base directory if it doesn't exist
        if config.create_dirs && !config.base_path.exists() {
            fs::create_dir_all(&config.base_path).map_err(|e| StorageError::OperationFailed {
                operation: "create_base_directory".to_string(),
                reason: format!("Failed to create base directory: {}", e),
            })?;
            set_permissions(&config.base_path, config.dir_permissions).map_err(|e| {
                StorageError::OperationFailed {
                    operation: "set_directory_permissions".to_string(),
                    reason: format!("Failed to set directory permissions: {}", e),
                }
            })?;
        }

        if !config.base_path.exists() {
            return Err(StorageError::OperationFailed {
                operation: "verify_base_directory".to_string(),
                reason: "Base directory does not exist and create_dirs is disabled".to_string(),
            });
        }

        if !config.base_path.is_dir() {
            return Err(StorageError::OperationFailed {
                operation: "verify_base_directory".to_string(),
                reason: "Base path exists but is not a directory".to_string(),
            });
        }

        tracing::debug!(base_path = %config.base_path.display(), atomic_writes = config.atomic_writes, "filesystem storage ready");
        Ok(Self { config, paths })
    }

    /// Storage configuration
    pub fn config(&self) -> &LocalConfig {
        &self.config
    }

    /// Key-to-path mapping
    pub fn path_provider(&self) -> &P {
        &self.paths
    }

    /// Ensure parent directory exists
    fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() && self.config.create_dirs {
                fs::create_dir_all(parent).map_err(|e| StorageError::OperationFailed {
                    operation: "create_parent_directory".to_string(),
                    reason: format!("Failed to create parent directory: {}", e),
                })?;
                set_permissions(parent, self.config.dir_permissions).map_err(|e| {
                    StorageError::OperationFailed {
                        operation: "set_directory_permissions".to_string(),
                        reason: format!("Failed to set directory permissions: {}", e),
                    }
                })?;
            }
        }
        Ok(())
    }

    /// Decide where a writer for `path` puts its bytes, failing early on
    /// existence conflicts.
    fn plan_write(&self, path: PathBuf, mode: WriteMode) -> StorageResult<WritePlan> {
        let resource = path.display().to_string();
        match (mode, path.is_file()) {
            (WriteMode::Create, true) => return Err(StorageError::AlreadyExists { resource }),
            (WriteMode::Update, false) => return Err(StorageError::ResourceNotFound { resource }),
            _ => {}
        }

        // the live file is never opened for writing on update
        let staged = self.config.atomic_writes || mode == WriteMode::Update;
        let temp = staged.then(|| temp_path_for(&path));
        Ok(WritePlan {
            target: path,
            temp,
            mode,
            max_file_size: self.config.max_file_size,
            file_permissions: self.config.file_permissions,
        })
    }

    fn open_read(&self, path: &Path) -> OperationResultOf<BufReader<File>> {
        // read-only open: never create, never truncate
        match File::open(path) {
            Ok(file) => {
                tracing::trace!(path = %path.display(), "file opened for read");
                OperationResultOf::from_value(BufReader::with_capacity(self.config.buffer_size, file))
            }
            Err(e) => OperationResultOf::from_error(&StorageError::from_io(
                "open_file",
                &path.display().to_string(),
                &e,
            )),
        }
    }

    fn open_write(&self, path: PathBuf, mode: WriteMode) -> OperationResultOf<FileWriter> {
        let outcome = self.ensure_parent_dir(&path).and_then(|_| {
            let plan = self.plan_write(path, mode)?;
            let file = plan
                .open_options()
                .open(plan.open_path())
                .map_err(|e| plan.open_error(&e))?;
            Ok((plan, file))
        });

        match outcome {
            Ok((plan, file)) => {
                tracing::trace!(path = %plan.target.display(), mode = mode.as_str(), "file opened for write");
                OperationResultOf::from_value(FileWriter {
                    file: BufWriter::with_capacity(self.config.buffer_size, file),
                    target: plan.into_target(),
                    written: 0,
                })
            }
            Err(e) => OperationResultOf::from_error(&e),
        }
    }

    fn remove(&self, path: &Path) -> OperationResult {
        let resource = path.display().to_string();
        if !path.is_file() {
            return OperationResult::from_error(&StorageError::ResourceNotFound { resource });
        }

        match fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!(path = %resource, "file deleted");
                OperationResult::successful()
            }
            Err(e) => OperationResult::from_error(&StorageError::from_io("delete_file", &resource, &e)),
        }
    }
}

impl<P: fmt::Debug> fmt::Debug for FileSystemStreamStorage<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystemStreamStorage")
            .field("config", &self.config)
            .field("paths", &self.paths)
            .finish()
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()))
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    match mode {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}

#[cfg(all(feature = "async", unix))]
async fn set_permissions_async(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    match mode {
        Some(mode) => tokio::fs::set_permissions(path, fs::Permissions::from_mode(mode)).await,
        None => Ok(()),
    }
}

#[cfg(all(feature = "async", not(unix)))]
async fn set_permissions_async(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}

// The value is already linked into place; only the staging file lingers.
fn warn_stale_temp(temp: &Path, error: &io::Error) {
    tracing::warn!(path = %temp.display(), error = %error, "failed to remove temp file after commit");
}

/// Link `temp` into place as `target`, then discard `temp`.
///
/// `hard_link` refuses to replace an existing file. Once the link exists the
/// value is stored, so a failed discard is logged rather than returned.
fn link_new_file<F>(temp: &Path, target: &Path, discard: F) -> io::Result<()>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    fs::hard_link(temp, target)?;
    if let Err(e) = discard(temp) {
        warn_stale_temp(temp, &e);
    }
    Ok(())
}

fn size_limit_error(path: &Path, limit: u64) -> io::Error {
    io::Error::other(
        StorageError::SizeLimitExceeded {
            resource: path.display().to_string(),
            limit,
        }
        .to_string(),
    )
}

/// Where a writer puts its bytes before and after commit
#[derive(Debug)]
struct WritePlan {
    target: PathBuf,
    temp: Option<PathBuf>,
    mode: WriteMode,
    max_file_size: u64,
    file_permissions: Option<u32>,
}

impl WritePlan {
    fn open_path(&self) -> &Path {
        self.temp.as_deref().unwrap_or(&self.target)
    }

    fn open_options(&self) -> OpenOptions {
        // either a fresh temp file or a direct create
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        options
    }

    #[cfg(feature = "async")]
    fn async_open_options(&self) -> tokio::fs::OpenOptions {
        tokio::fs::OpenOptions::from(self.open_options())
    }

    fn open_error(&self, error: &io::Error) -> StorageError {
        StorageError::from_io("open_file", &self.target.display().to_string(), error)
    }

    // Built only after the file was opened, so the drop cleanup never
    // touches a file this writer did not create.
    fn into_target(self) -> WriteTarget {
        WriteTarget {
            plan: self,
            committed: false,
        }
    }
}

#[derive(Debug)]
struct WriteTarget {
    plan: WritePlan,
    committed: bool,
}

impl WriteTarget {
    fn check_size(&self, written: u64, additional: usize) -> io::Result<()> {
        if written.saturating_add(additional as u64) > self.plan.max_file_size {
            return Err(size_limit_error(&self.plan.target, self.plan.max_file_size));
        }
        Ok(())
    }

    fn commit_blocking(&mut self) -> io::Result<()> {
        if let Some(temp) = &self.plan.temp {
            match self.plan.mode {
                WriteMode::Create => link_new_file(temp, &self.plan.target, |temp| fs::remove_file(temp))?,
                WriteMode::Update => {
                    if !self.plan.target.is_file() {
                        return Err(io::Error::new(
                            io::ErrorKind::NotFound,
                            format!("{} does not exist", self.plan.target.display()),
                        ));
                    }
                    fs::rename(temp, &self.plan.target)?;
                }
            }
        }
        set_permissions(&self.plan.target, self.plan.file_permissions)?;
        self.committed = true;
        tracing::trace!(path = %self.plan.target.display(), mode = self.plan.mode.as_str(), "file committed");
        Ok(())
    }

    #[cfg(feature = "async")]
    fn commit_future(&self) -> BoxFuture<'static, io::Result<()>> {
        let target = self.plan.target.clone();
        let temp = self.plan.temp.clone();
        let mode = self.plan.mode;
        let permissions = self.plan.file_permissions;

        async move {
            if let Some(temp) = temp {
                match mode {
                    WriteMode::Create => {
                        tokio::fs::hard_link(&temp, &target).await?;
                        if let Err(e) = tokio::fs::remove_file(&temp).await {
                            warn_stale_temp(&temp, &e);
                        }
                    }
                    WriteMode::Update => {
                        if !tokio::fs::try_exists(&target).await? {
                            return Err(io::Error::new(
                                io::ErrorKind::NotFound,
                                format!("{} does not exist", target.display()),
                            ));
                        }
                        tokio::fs::rename(&temp, &target).await?;
                    }
                }
            }
            set_permissions_async(&target, permissions).await?;
            tracing::trace!(path = %target.display(), mode = mode.as_str(), "file committed");
            Ok(())
        }
        .boxed()
    }
}

impl Drop for WriteTarget {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        // a writer without a temp file is always a direct create
        let leftover = self.plan.temp.as_deref().unwrap_or(&self.plan.target);
        if let Err(e) = fs::remove_file(leftover) {
            tracing::warn!(path = %leftover.display(), error = %e, "failed to remove uncommitted file");
        }
    }
}

/// Buffered write stream into a file
///
/// Nothing becomes visible under the key until [`CommitWrite::commit`].
#[derive(Debug)]
pub struct FileWriter {
    // dropped before `target`, so buffered bytes land before temp cleanup
    file: BufWriter<File>,
    target: WriteTarget,
    written: u64,
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.target.check_size(self.written, buf.len())?;
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl CommitWrite for FileWriter {
    fn commit(mut self) -> io::Result<()> {
        self.file.flush()?;
        self.target.commit_blocking()
    }
}

impl<K, P> StreamStorage<K> for FileSystemStreamStorage<P>
where
    K: ?Sized,
    P: FilePathProvider<K>,
{
    type Reader = BufReader<File>;
    type Writer = FileWriter;

    fn check_exists(&self, key: &K) -> bool {
        self.paths.file_path(key).is_file()
    }

    fn try_open_for_read(&self, key: &K) -> OperationResultOf<Self::Reader> {
        self.open_read(&self.paths.file_path(key))
    }

    fn try_create(&self, key: &K) -> OperationResultOf<Self::Writer> {
        self.open_write(self.paths.file_path(key), WriteMode::Create)
    }

    fn try_update(&self, key: &K) -> OperationResultOf<Self::Writer> {
        self.open_write(self.paths.file_path(key), WriteMode::Update)
    }

    fn try_delete(&self, key: &K) -> OperationResult {
        self.remove(&self.paths.file_path(key))
    }
}

/// Buffered asynchronous write stream into a file
///
/// Nothing becomes visible under the key until [`AsyncCommitWrite::commit`].
#[cfg(feature = "async")]
#[derive(Debug)]
pub struct AsyncFileWriter {
    file: tokio::io::BufWriter<tokio::fs::File>,
    target: WriteTarget,
    written: u64,
}

#[cfg(feature = "async")]
impl AsyncWrite for AsyncFileWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if let Err(e) = this.target.check_size(this.written, buf.len()) {
            return Poll::Ready(Err(e));
        }
        let n = ready!(Pin::new(&mut this.file).poll_write(cx, buf))?;
        this.written += n as u64;
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().file).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().file).poll_shutdown(cx)
    }
}

#[cfg(feature = "async")]
impl AsyncCommitWrite for AsyncFileWriter {
    async fn commit(mut self) -> io::Result<()> {
        self.file.shutdown().await?;
        self.target.commit_future().await?;
        self.target.committed = true;
        Ok(())
    }
}

#[cfg(feature = "async")]
impl<P> FileSystemStreamStorage<P> {
    async fn open_read_async(
        &self,
        path: PathBuf,
    ) -> OperationResultOf<tokio::io::BufReader<tokio::fs::File>> {
        match tokio::fs::File::open(&path).await {
            Ok(file) => {
                tracing::trace!(path = %path.display(), "file opened for read");
                OperationResultOf::from_value(tokio::io::BufReader::with_capacity(
                    self.config.buffer_size,
                    file,
                ))
            }
            Err(e) => OperationResultOf::from_error(&StorageError::from_io(
                "open_file",
                &path.display().to_string(),
                &e,
            )),
        }
    }

    async fn open_write_async(
        &self,
        path: PathBuf,
        mode: WriteMode,
    ) -> OperationResultOf<AsyncFileWriter> {
        if let Err(e) = self.ensure_parent_dir_async(&path).await {
            return OperationResultOf::from_error(&e);
        }

        let plan = match self.plan_write(path, mode) {
            Ok(plan) => plan,
            Err(e) => return OperationResultOf::from_error(&e),
        };
        let file = match plan.async_open_options().open(plan.open_path()).await {
            Ok(file) => file,
            Err(e) => return OperationResultOf::from_error(&plan.open_error(&e)),
        };

        tracing::trace!(path = %plan.target.display(), mode = mode.as_str(), "file opened for write");
        OperationResultOf::from_value(AsyncFileWriter {
            file: tokio::io::BufWriter::with_capacity(self.config.buffer_size, file),
            target: plan.into_target(),
            written: 0,
        })
    }

    async fn ensure_parent_dir_async(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            if self.config.create_dirs && !tokio::fs::try_exists(parent).await.unwrap_or(false) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::OperationFailed {
                        operation: "create_parent_directory".to_string(),
                        reason: format!("Failed to create parent directory: {}", e),
                    })?;
                set_permissions_async(parent, self.config.dir_permissions)
                    .await
                    .map_err(|e| StorageError::OperationFailed {
                        operation: "set_directory_permissions".to_string(),
                        reason: format!("Failed to set directory permissions: {}", e),
                    })?;
            }
        }
        Ok(())
    }

    async fn remove_async(&self, path: PathBuf) -> OperationResult {
        let resource = path.display().to_string();
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false);
        if !is_file {
            return OperationResult::from_error(&StorageError::ResourceNotFound { resource });
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %resource, "file deleted");
                OperationResult::successful()
            }
            Err(e) => OperationResult::from_error(&StorageError::from_io("delete_file", &resource, &e)),
        }
    }
}

#[cfg(feature = "async")]
impl<K, P> AsyncStreamStorage<K> for FileSystemStreamStorage<P>
where
    K: Sync + ?Sized,
    P: FilePathProvider<K>,
{
    type Reader = tokio::io::BufReader<tokio::fs::File>;
    type Writer = AsyncFileWriter;

    async fn check_exists(&self, key: &K) -> bool {
        let path = self.paths.file_path(key);
        tokio::fs::metadata(&path)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false)
    }

    async fn try_open_for_read(&self, key: &K) -> OperationResultOf<Self::Reader> {
        self.open_read_async(self.paths.file_path(key)).await
    }

    async fn try_create(&self, key: &K) -> OperationResultOf<Self::Writer> {
        self.open_write_async(self.paths.file_path(key), WriteMode::Create)
            .await
    }

    async fn try_update(&self, key: &K) -> OperationResultOf<Self::Writer> {
        self.open_write_async(self.paths.file_path(key), WriteMode::Update)
            .await
    }

    async fn try_delete(&self, key: &K) -> OperationResult {
        self.remove_async(self.paths.file_path(key)).await
    }
}
