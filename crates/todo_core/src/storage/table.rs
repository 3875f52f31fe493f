use crate::error::AppError;
use crate::model::{NewTask, Task, TaskId};
use std::collections::BTreeMap;
use std::sync::Arc;

const FIRST_ID: TaskId = 1;

/// The in-memory task table: rows keyed by id plus the id counter.
///
/// Ids come from a counter that only moves forward, so an id is never
/// handed out twice even if the counter is persisted and reloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTable {
    rows: BTreeMap<TaskId, Task>,
    next_id: TaskId,
}

impl Default for TaskTable {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: FIRST_ID,
        }
    }
}

impl TaskTable {
    /// Rebuilds a table from stored rows.
    ///
    /// Duplicate ids are rejected. A stale `next_id` is raised past the
    /// highest stored id.
    pub fn from_rows(tasks: Vec<Task>, next_id: TaskId) -> Result<Self, AppError> {
        let mut rows = BTreeMap::new();
        for task in tasks {
            let id = task.id;
            if rows.insert(id, task).is_some() {
                return Err(AppError::invalid_data(format!("duplicate task id {id}")));
            }
        }

        let floor = match rows.keys().next_back() {
            Some(highest) => highest.checked_add(1).ok_or_else(id_space_exhausted)?,
            None => FIRST_ID,
        };

        Ok(Self {
            rows,
            next_id: next_id.max(floor),
        })
    }

    /// Adds a row under the next id. Fails once the id counter cannot move
    /// forward any more.
    pub fn insert(&mut self, task: NewTask) -> Result<TaskId, AppError> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or_else(id_space_exhausted)?;
        self.rows.insert(id, task.with_id(id));
        Ok(id)
    }

    pub fn update(&mut self, task: Task) -> Result<(), AppError> {
        match self.rows.get_mut(&task.id) {
            Some(row) => {
                *row = task;
                Ok(())
            }
            None => Err(AppError::NotFound(task.id)),
        }
    }

    pub fn next_id(&self) -> TaskId {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows in ascending id order.
    pub fn rows(&self) -> impl Iterator<Item = &Task> {
        self.rows.values()
    }

    pub fn snapshot(&self) -> Arc<[Task]> {
        self.rows.values().cloned().collect()
    }
}

fn id_space_exhausted() -> AppError {
    AppError::invalid_data("task id space exhausted")
}

/// One write against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableWrite {
    Insert(NewTask),
    Update(Task),
}

impl TableWrite {
    /// Applies the write and returns the id of the row it touched.
    pub fn apply(self, table: &mut TaskTable) -> Result<TaskId, AppError> {
        match self {
            TableWrite::Insert(task) => table.insert(task),
            TableWrite::Update(task) => {
                let id = task.id;
                table.update(task)?;
                Ok(id)
            }
        }
    }

    /// Applies the write to a copy of `table`, leaving `table` untouched.
    pub fn staged(self, table: &TaskTable) -> Result<(TaskTable, TaskId), AppError> {
        let mut staged = table.clone();
        let id = self.apply(&mut staged)?;
        Ok((staged, id))
    }
}
