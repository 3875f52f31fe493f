use crate::error::AppError;
use crate::model::{NewTask, Task};
use crate::view_model::{TaskViewModel, WriteFailure};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

/// What a front end needs: a task list subscription and two dispatchers.
#[derive(Clone)]
pub struct TaskPresenter {
    view_model: Arc<TaskViewModel>,
}

impl TaskPresenter {
    pub fn new(view_model: Arc<TaskViewModel>) -> Self {
        Self { view_model }
    }

    pub fn view_model(&self) -> &TaskViewModel {
        &self.view_model
    }

    /// Calls `handler` with the current list, then again after every
    /// change, until the view-model closes (`Ok`) or the store fails
    /// (`Err`).
    pub fn on_tasks_changed<F>(&self, mut handler: F) -> JoinHandle<Result<(), AppError>>
    where
        F: FnMut(&[Task]) + Send + 'static,
    {
        let mut feed = self.view_model.tasks();
        self.view_model.runtime().spawn(async move {
            while let Some(snapshot) = feed.next().await {
                match snapshot {
                    Ok(tasks) => handler(&tasks[..]),
                    Err(err) => {
                        warn!(error = %err, "task list subscription ended");
                        return Err(err);
                    }
                }
            }
            Ok(())
        })
    }

    pub fn dispatch_add_task(&self, title: &str, description: &str) -> Result<(), AppError> {
        let title = required_title(title)?;
        self.view_model.add_task(NewTask::new(title, description.trim()));
        Ok(())
    }

    pub fn dispatch_toggle_complete(&self, task: &Task, new_value: bool) {
        self.view_model.update_task(task.with_complete(new_value));
    }

    pub fn dispatch_edit_task(
        &self,
        task: &Task,
        title: &str,
        description: &str,
    ) -> Result<(), AppError> {
        let title = required_title(title)?;
        self.view_model.update_task(task.with_content(title, description.trim()));
        Ok(())
    }

    pub fn failures(&self) -> broadcast::Receiver<WriteFailure> {
        self.view_model.failures()
    }
}

fn required_title(title: &str) -> Result<&str, AppError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("title is required"));
    }
    Ok(trimmed)
}
