use crate::error::AppError;
use crate::model::{Task, TaskId};
use crate::storage::table::{TableWrite, TaskTable};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 1;
pub const STORE_PATH_ENV_VAR: &str = "TODOAPP_STORE_PATH";
const STORE_FILE_NAME: &str = "tasks.json";

#[derive(Debug, Serialize, Deserialize)]
struct StoredTasks {
    schema_version: u32,
    #[serde(default)]
    next_id: TaskId,
    tasks: Vec<Task>,
}

/// Per-user store location, used when neither the environment nor the
/// config names one.
pub fn default_store_path() -> Result<PathBuf, AppError> {
    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::unavailable("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("todoapp").join(STORE_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::unavailable("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("todoapp")
            .join(STORE_FILE_NAME))
    }
}

pub fn load_table(path: &Path) -> Result<TaskTable, AppError> {
    if !path.exists() {
        return Ok(TaskTable::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let stored: StoredTasks = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;

    if stored.schema_version != SCHEMA_VERSION {
        return Err(AppError::invalid_data("schema_version mismatch"));
    }

    TaskTable::from_rows(stored.tasks, stored.next_id)
}

/// Writes the table next to `path` and renames it into place, so readers
/// see either the old file or the new one.
pub fn save_table(path: &Path, table: &TaskTable) -> Result<(), AppError> {
    let stored = StoredTasks {
        schema_version: SCHEMA_VERSION,
        next_id: table.next_id(),
        tasks: table.rows().cloned().collect(),
    };
    let content = serde_json::to_string_pretty(&stored)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;

    let temp = temp_path_for(path);
    std::fs::write(&temp, content).map_err(|err| AppError::from_commit(&err))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&temp, permissions).map_err(|err| AppError::from_commit(&err))?;
    }

    std::fs::rename(&temp, path).map_err(|err| {
        std::fs::remove_file(&temp).ok();
        AppError::from_commit(&err)
    })
}

/// Reads the store file while holding the shared store lock.
pub fn load_locked(path: &Path) -> Result<TaskTable, AppError> {
    let _lock = StoreLock::shared(path)?;
    load_table(path)
}

/// Applies `write` to the table currently on disk and saves the result,
/// all under the exclusive store lock. Every process sharing the file sees
/// the writes of the others before staging its own.
pub fn commit_write(path: &Path, write: TableWrite) -> Result<(TaskTable, TaskId), AppError> {
    let _lock = StoreLock::exclusive(path)?;
    let (table, id) = write.staged(&load_table(path)?)?;
    save_table(path, &table)?;
    Ok((table, id))
}

/// Advisory lock on a sidecar file next to the store. The store file itself
/// is replaced by rename on every save, so it cannot carry the lock.
struct StoreLock {
    file: File,
}

impl StoreLock {
    fn shared(path: &Path) -> Result<Self, AppError> {
        let file = open_lock_file(path)?;
        FileExt::lock_shared(&file).map_err(|err| AppError::from_commit(&err))?;
        Ok(Self { file })
    }

    fn exclusive(path: &Path) -> Result<Self, AppError> {
        let file = open_lock_file(path)?;
        FileExt::lock_exclusive(&file).map_err(|err| AppError::from_commit(&err))?;
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_lock_file(path: &Path) -> Result<File, AppError> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(sibling_path(path, ".lock"))
        .map_err(|err| AppError::from_commit(&err))
}

fn temp_path_for(path: &Path) -> PathBuf {
    sibling_path(path, ".tmp")
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| STORE_FILE_NAME.into());
    name.push(suffix);
    path.with_file_name(name)
}
