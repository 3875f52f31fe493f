use crate::error::AppError;
use crate::model::{NewTask, Task, TaskId};
use crate::storage::{TaskFeed, TaskStore};
use std::sync::Arc;

/// Typed access to the task store. Holds no state of its own; swapping the
/// store behind it does not change callers.
#[derive(Clone)]
pub struct TaskRepository {
    store: Arc<dyn TaskStore>,
}

impl TaskRepository {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    pub fn get_all_tasks(&self) -> TaskFeed {
        self.store.observe_all()
    }

    pub async fn insert_task(&self, task: NewTask) -> Result<TaskId, AppError> {
        self.store.insert(task).await
    }

    pub async fn update_task(&self, task: Task) -> Result<(), AppError> {
        self.store.update(task).await
    }

    /// One-shot read of the current task list.
    pub async fn current_tasks(&self) -> Result<Vec<Task>, AppError> {
        match self.store.observe_all().next().await {
            Some(snapshot) => Ok(snapshot?.to_vec()),
            None => Err(AppError::unavailable("task store is closed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TaskRepository;
    use crate::model::NewTask;
    use crate::storage::MemoryTaskStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn forwards_writes_and_reads() {
        let repository = TaskRepository::new(Arc::new(MemoryTaskStore::new()));

        let id = repository
            .insert_task(NewTask::new("Buy milk", "2%"))
            .await
            .unwrap();
        let tasks = repository.current_tasks().await.unwrap();
        assert_eq!(tasks, vec![NewTask::new("Buy milk", "2%").with_id(id)]);

        repository
            .update_task(tasks[0].with_complete(true))
            .await
            .unwrap();
        let mut feed = repository.get_all_tasks();
        let snapshot = feed.next().await.unwrap().unwrap();
        assert!(snapshot[0].complete);
    }

    #[tokio::test]
    async fn clones_share_the_store() {
        let repository = TaskRepository::new(Arc::new(MemoryTaskStore::new()));
        let other = repository.clone();

        other.insert_task(NewTask::new("shared", "")).await.unwrap();

        assert_eq!(repository.current_tasks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_of_missing_task_surfaces_not_found() {
        let repository = TaskRepository::new(Arc::new(MemoryTaskStore::new()));

        let err = repository
            .update_task(NewTask::new("ghost", "").with_id(3))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "not_found");
    }
}
