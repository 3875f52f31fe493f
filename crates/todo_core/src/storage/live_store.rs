use crate::error::AppError;
use crate::model::{NewTask, Task, TaskId};
use crate::storage::TaskStore;
use crate::storage::feed::{FeedPublisher, TaskFeed};
use crate::storage::json_store;
use crate::storage::table::{TableWrite, TaskTable};
use async_trait::async_trait;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Makes writes durable.
#[async_trait]
pub trait CommitBackend: Send + Sync + 'static {
    const NAME: &'static str;

    /// Applies `write` on top of the latest durable table and makes the
    /// result durable. `current` is the table this store last committed or
    /// loaded. Returns the committed table and the id of the touched row.
    async fn commit(
        &self,
        current: &TaskTable,
        write: TableWrite,
    ) -> Result<(TaskTable, TaskId), AppError>;

    /// The latest durable table, for backends that can change outside this
    /// store. `None` means nothing to reload.
    async fn reload(&self) -> Result<Option<TaskTable>, AppError> {
        Ok(None)
    }
}

/// Keeps the table in memory only.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryBackend;

#[async_trait]
impl CommitBackend for MemoryBackend {
    const NAME: &'static str = "memory";

    async fn commit(
        &self,
        current: &TaskTable,
        write: TableWrite,
    ) -> Result<(TaskTable, TaskId), AppError> {
        write.staged(current)
    }
}

/// Saves the table as a JSON file on the blocking pool. Every commit
/// reloads the file under the store lock first, so several processes can
/// share one file.
#[derive(Debug, Clone)]
pub struct JsonBackend {
    path: PathBuf,
}

impl JsonBackend {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CommitBackend for JsonBackend {
    const NAME: &'static str = "json";

    async fn commit(
        &self,
        _current: &TaskTable,
        write: TableWrite,
    ) -> Result<(TaskTable, TaskId), AppError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || json_store::commit_write(&path, write))
            .await
            .map_err(|err| AppError::io(format!("save task aborted: {err}")))?
    }

    async fn reload(&self) -> Result<Option<TaskTable>, AppError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || json_store::load_locked(&path))
            .await
            .map_err(|err| AppError::io(format!("reload tasks aborted: {err}")))?
            .map(Some)
    }
}

/// A [`TaskStore`] that keeps the table in memory, commits every change
/// through `B` and publishes the result.
///
/// Writes are serialized by a fair lock, so they apply in the order they
/// reach it. The in-memory table is only replaced after `B` accepted a
/// write; a failed commit changes nothing. A write that has reached the
/// store finishes even if its caller stops waiting.
pub struct LiveStore<B> {
    inner: Arc<Inner<B>>,
}

struct Inner<B> {
    table: Mutex<TaskTable>,
    publisher: FeedPublisher,
    backend: B,
}

pub type JsonTaskStore = LiveStore<JsonBackend>;
pub type MemoryTaskStore = LiveStore<MemoryBackend>;

impl<B: CommitBackend> LiveStore<B> {
    pub fn with_table(backend: B, table: TaskTable) -> Self {
        let publisher = FeedPublisher::new(table.snapshot());
        Self {
            inner: Arc::new(Inner {
                table: Mutex::new(table),
                publisher,
                backend,
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Pulls in changes made outside this store and publishes them.
    /// Returns whether the table changed.
    pub async fn refresh(&self) -> Result<bool, AppError> {
        self.inner.refresh().await
    }

    async fn run(&self, write: TableWrite) -> Result<TaskId, AppError> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(inner.apply(write))
            .await
            .map_err(|err| AppError::unavailable(format!("task store write aborted: {err}")))?
    }
}

impl<B: CommitBackend> Inner<B> {
    async fn apply(self: Arc<Self>, write: TableWrite) -> Result<TaskId, AppError> {
        if self.publisher.is_failed() {
            return Err(AppError::unavailable("task store is unavailable"));
        }

        let mut table = self.table.lock().await;
        if self.publisher.is_failed() {
            return Err(AppError::unavailable("task store is unavailable"));
        }

        let (committed, id) = match self.backend.commit(&table, write).await {
            Ok(done) => done,
            Err(err) => {
                self.report(&err);
                return Err(err);
            }
        };

        *table = committed;
        self.publisher.publish(table.snapshot());
        debug!(backend = B::NAME, rows = table.len(), "task table committed");

        Ok(id)
    }

    async fn refresh(&self) -> Result<bool, AppError> {
        if self.publisher.is_failed() {
            return Err(AppError::unavailable("task store is unavailable"));
        }

        let mut table = self.table.lock().await;
        let latest = match self.backend.reload().await {
            Ok(Some(latest)) => latest,
            Ok(None) => return Ok(false),
            Err(err) => {
                self.report(&err);
                return Err(err);
            }
        };
        if *table == latest {
            return Ok(false);
        }

        *table = latest;
        self.publisher.publish(table.snapshot());
        debug!(backend = B::NAME, rows = table.len(), "task table reloaded");
        Ok(true)
    }

    fn report(&self, err: &AppError) {
        match err {
            AppError::Unavailable(_) => {
                warn!(backend = B::NAME, error = %err, "task store became unavailable");
                self.publisher.fail(err.clone());
            }
            AppError::Io(_) | AppError::InvalidData(_) => {
                warn!(backend = B::NAME, error = %err, "task commit failed");
            }
            AppError::InvalidInput(_) | AppError::NotFound(_) => {}
        }
    }
}

impl JsonTaskStore {
    /// Opens (or creates) the store file at `path`.
    ///
    /// Any failure to reach the file is reported as
    /// [`AppError::Unavailable`]; a corrupt file stays
    /// [`AppError::InvalidData`].
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Self, AppError> {
        let path = path.into();
        let load_path = path.clone();
        let table = tokio::task::spawn_blocking(move || {
            if let Some(parent) = load_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).map_err(|err| {
                    AppError::unavailable(format!("{}: {}", parent.display(), err))
                })?;
            }
            json_store::load_locked(&load_path)
        })
        .await
        .map_err(|err| AppError::unavailable(err.to_string()))?
        .map_err(|err| match err {
            AppError::Io(message) => AppError::Unavailable(message),
            other => other,
        })?;

        info!(path = %path.display(), rows = table.len(), "opened task store");
        Ok(Self::with_table(JsonBackend::new(path), table))
    }

    pub fn path(&self) -> &Path {
        self.backend().path()
    }

    /// Republishes the table whenever another process changes the store
    /// file. Watching stops when the returned guard is dropped.
    ///
    /// The file is reloaded once right away, so changes made between
    /// [`Self::open`] and this call are not missed.
    pub fn watch_file(&self) -> Result<FileWatch, AppError> {
        let path = self.path().to_path_buf();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| AppError::invalid_input("store path has no file name"))?;

        let (changed_tx, mut changed_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(
            move |event: notify::Result<notify::Event>| {
                let Ok(event) = event else { return };
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                if event
                    .paths
                    .iter()
                    .any(|changed| changed.file_name() == Some(file_name.as_os_str()))
                {
                    let _ = changed_tx.send(());
                }
            },
        )
        .map_err(|err| AppError::unavailable(format!("cannot watch {}: {err}", path.display())))?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|err| AppError::unavailable(format!("cannot watch {}: {err}", dir.display())))?;

        let inner = Arc::clone(&self.inner);
        let reloads = tokio::spawn(async move {
            loop {
                match inner.refresh().await {
                    Ok(changed) => debug!(changed, "store file checked"),
                    Err(err) if err.is_unavailable() => break,
                    Err(err) => warn!(error = %err, "store file reload failed"),
                }
                if changed_rx.recv().await.is_none() {
                    break;
                }
                while changed_rx.try_recv().is_ok() {}
            }
        });

        info!(path = %path.display(), "watching task store file");
        Ok(FileWatch {
            _watcher: watcher,
            reloads,
        })
    }
}

/// Guard returned by [`JsonTaskStore::watch_file`].
pub struct FileWatch {
    _watcher: RecommendedWatcher,
    reloads: JoinHandle<()>,
}

impl Drop for FileWatch {
    fn drop(&mut self) {
        self.reloads.abort();
    }
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::with_table(MemoryBackend, TaskTable::default())
    }
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<B: CommitBackend> TaskStore for LiveStore<B> {
    async fn insert(&self, task: NewTask) -> Result<TaskId, AppError> {
        let id = self.run(TableWrite::Insert(task)).await?;
        debug!(id, "task inserted");
        Ok(id)
    }

    async fn update(&self, task: Task) -> Result<(), AppError> {
        let id = self.run(TableWrite::Update(task)).await?;
        debug!(id, "task updated");
        Ok(())
    }

    fn observe_all(&self) -> TaskFeed {
        self.inner.publisher.subscribe()
    }
}
