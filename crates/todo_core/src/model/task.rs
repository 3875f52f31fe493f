use serde::{Deserialize, Serialize};

pub type TaskId = i64;

/// A task as it is stored, identified by the id the store assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub complete: bool,
}

/// A task that has not been inserted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub complete: bool,
}

impl NewTask {
    pub fn new<T: Into<String>, D: Into<String>>(title: T, description: D) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            complete: false,
        }
    }

    pub fn with_id(self, id: TaskId) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            complete: self.complete,
        }
    }
}

impl Task {
    /// Replacement record with only the completion flag changed.
    pub fn with_complete(&self, complete: bool) -> Self {
        Self {
            complete,
            ..self.clone()
        }
    }

    /// Replacement record with new content and the same id and flag.
    pub fn with_content<T, D>(&self, title: T, description: D) -> Self
    where
        T: Into<String>,
        D: Into<String>,
    {
        Self {
            title: title.into(),
            description: description.into(),
            ..self.clone()
        }
    }

    /// The task's fields without its id.
    pub fn content(&self) -> NewTask {
        NewTask {
            title: self.title.clone(),
            description: self.description.clone(),
            complete: self.complete,
        }
    }
}
