//! JSON checkpoint files. A checkpoint that exists is a finished stage.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Load a checkpoint, `None` when it has not been written yet.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.is_file() {
        return Ok(None);
    }
    let s = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&s)?))
}

/// Load a checkpoint an earlier stage must have produced.
pub fn require<T: DeserializeOwned>(path: &Path, hint: &'static str) -> Result<T> {
    load(path)?.ok_or_else(|| Error::MissingCheckpoint {
        path: path.to_path_buf(),
        hint,
    })
}

/// Write a checkpoint so that it either appears whole or not at all.
pub fn store<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::shape(format!("checkpoint path {} has no parent", path.display())))?;
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(serde_json::to_string_pretty(value)?.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Plain pretty JSON write for cache bundle files.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
