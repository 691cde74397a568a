//! Whole-file JSON array persistence for the participant and result lists.

use std::{fs, path::Path};

use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use super::{PersistError, PersistResult};

/// Reads a JSON array from `path`. A missing file reads as an empty list.
pub fn read_list<T: DeserializeOwned>(path: &Path) -> PersistResult<Vec<T>> {
    if !path.exists() {
        debug!(path = %path.display(), "list file missing, starting empty");
        return Ok(Vec::new());
    }

    let data = fs::read(path).map_err(|source| PersistError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let list = serde_json::from_slice(&data).map_err(|source| PersistError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(list)
}

/// Writes `items` to `path` as an indented JSON array, creating parent
/// directories as needed.
pub fn write_list<T: Serialize>(path: &Path, items: &[T]) -> PersistResult<()> {
    let data = serde_json::to_vec_pretty(items).map_err(|source| PersistError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| PersistError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, data).map_err(|source| PersistError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), count = items.len(), "list saved");
    Ok(())
}
