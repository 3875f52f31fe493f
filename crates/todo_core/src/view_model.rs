//! Task view-model: the live task list plus fire-and-forget mutations.
//!
//! Writes are spawned on the tokio runtime and never awaited by the caller;
//! their effect shows up as the next snapshot on [`TaskViewModel::tasks`].
//! Failed writes are not retried. They are logged and published as
//! [`WriteFailure`] events so a front end can show them.

use crate::error::AppError;
use crate::model::{NewTask, Task, TaskId};
use crate::repository::TaskRepository;
use crate::storage::TaskFeed;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

const FAILURE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
}

/// A dispatched write that did not make it into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub kind: WriteKind,
    /// Target row for updates; inserts have no id yet.
    pub task_id: Option<TaskId>,
    pub error: AppError,
}

pub struct TaskViewModel {
    repository: TaskRepository,
    runtime: Handle,
    writes: TaskTracker,
    pending: Arc<watch::Sender<usize>>,
    scope: CancellationToken,
    failures: broadcast::Sender<WriteFailure>,
}

/// Counts one dispatched write until it is dropped.
struct PendingWrite {
    pending: Arc<watch::Sender<usize>>,
}

impl PendingWrite {
    fn start(pending: &Arc<watch::Sender<usize>>) -> Self {
        pending.send_modify(|count| *count += 1);
        Self {
            pending: Arc::clone(pending),
        }
    }
}

impl Drop for PendingWrite {
    fn drop(&mut self) {
        self.pending.send_modify(|count| *count -= 1);
    }
}

impl TaskViewModel {
    /// Builds a view-model that dispatches onto the current tokio runtime.
    ///
    /// Panics when called outside a runtime; use [`Self::with_runtime`]
    /// from plain threads.
    pub fn new(repository: TaskRepository) -> Self {
        Self::with_runtime(repository, Handle::current())
    }

    pub fn with_runtime(repository: TaskRepository, runtime: Handle) -> Self {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self {
            repository,
            runtime,
            writes: TaskTracker::new(),
            pending: Arc::new(watch::channel(0).0),
            scope: CancellationToken::new(),
            failures,
        }
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// The repository's live task list, ended when this view-model closes.
    pub fn tasks(&self) -> TaskFeed {
        self.repository
            .get_all_tasks()
            .with_cancellation(self.scope.child_token())
    }

    pub fn add_task(&self, task: NewTask) {
        let repository = self.repository.clone();
        self.dispatch(WriteKind::Insert, None, async move {
            repository.insert_task(task).await.map(|_| ())
        });
    }

    pub fn update_task(&self, task: Task) {
        let repository = self.repository.clone();
        let task_id = task.id;
        self.dispatch(WriteKind::Update, Some(task_id), async move {
            repository.update_task(task).await
        });
    }

    pub fn failures(&self) -> broadcast::Receiver<WriteFailure> {
        self.failures.subscribe()
    }

    /// Writes dispatched but not finished yet.
    pub fn in_flight(&self) -> usize {
        *self.pending.borrow()
    }

    /// Waits until no dispatched write is in flight. Any number of callers
    /// may wait at once, and [`Self::close`] does not disturb them.
    pub async fn settle(&self) {
        let mut pending = self.pending.subscribe();
        let _ = pending.wait_for(|count| *count == 0).await;
    }

    /// Closes the view-model and waits for the writes it was running.
    pub async fn shutdown(&self) {
        self.close();
        self.writes.wait().await;
    }

    /// Tears the scope down. Feeds from [`Self::tasks`] end, in-flight
    /// writes are no longer awaited and later dispatches are dropped.
    /// Writes the store already accepted still commit.
    pub fn close(&self) {
        self.scope.cancel();
        self.writes.close();
    }

    pub fn is_closed(&self) -> bool {
        self.scope.is_cancelled()
    }

    fn dispatch<F>(&self, kind: WriteKind, task_id: Option<TaskId>, write: F)
    where
        F: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        if self.scope.is_cancelled() {
            debug!(?kind, ?task_id, "view model closed; write dropped");
            return;
        }

        let scope = self.scope.clone();
        let failures = self.failures.clone();
        let pending = PendingWrite::start(&self.pending);
        self.writes.spawn_on(
            async move {
                let _pending = pending;
                tokio::select! {
                    biased;
                    () = scope.cancelled() => {
                        debug!(?kind, ?task_id, "write abandoned by closed view model");
                    }
                    result = write => {
                        if let Err(error) = result {
                            warn!(?kind, ?task_id, error = %error, "task write failed");
                            let _ = failures.send(WriteFailure {
                                kind,
                                task_id,
                                error,
                            });
                        }
                    }
                }
            },
            &self.runtime,
        );
    }
}

impl Drop for TaskViewModel {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}
