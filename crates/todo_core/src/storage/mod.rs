//! Task Store: the durable table of tasks and its live "all tasks" query.

use crate::error::AppError;
use crate::model::{NewTask, Task, TaskId};
use async_trait::async_trait;

pub mod feed;
pub mod json_store;
pub mod live_store;
pub mod table;

pub use feed::{FeedPublisher, Snapshot, TaskFeed};
pub use live_store::{
    CommitBackend, FileWatch, JsonBackend, JsonTaskStore, LiveStore, MemoryBackend,
    MemoryTaskStore,
};
pub use table::{TableWrite, TaskTable};

/// Storage seam behind [`crate::repository::TaskRepository`].
///
/// Every committed `insert` or `update` pushes a fresh snapshot to all feeds
/// returned by `observe_all`.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Adds a row and returns the id assigned to it.
    async fn insert(&self, task: NewTask) -> Result<TaskId, AppError>;

    /// Replaces the row with `task.id`. Fails with [`AppError::NotFound`]
    /// when no such row exists.
    async fn update(&self, task: Task) -> Result<(), AppError>;

    fn observe_all(&self) -> TaskFeed;
}
