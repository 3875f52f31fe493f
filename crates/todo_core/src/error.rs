use crate::model::TaskId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("invalid_input - {0}")]
    InvalidInput(String),
    #[error("invalid_data - {0}")]
    InvalidData(String),
    #[error("io_error - {0}")]
    Io(String),
    #[error("not_found - task {0} does not exist")]
    NotFound(TaskId),
    #[error("store_unavailable - {0}")]
    Unavailable(String),
}

impl AppError {
    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn unavailable<M: Into<String>>(message: M) -> Self {
        Self::Unavailable(message.into())
    }

    /// Maps a filesystem error hit while committing a write.
    ///
    /// A missing or forbidden location means the store itself is gone;
    /// anything else only fails the write at hand.
    pub fn from_commit(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                Self::unavailable(err.to_string())
            }
            _ => Self::io(err.to_string()),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidData(_) => "invalid_data",
            Self::Io(_) => "io_error",
            Self::NotFound(_) => "not_found",
            Self::Unavailable(_) => "store_unavailable",
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
