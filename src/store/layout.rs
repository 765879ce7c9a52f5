use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::naming::safe_filename;

/// Every on-disk location the pipeline reads or writes, rooted at the state
/// directory (`.dsed` by default).
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    pub fn folders_path(&self) -> PathBuf {
        self.index_dir().join("folders.json")
    }

    pub fn folder_shortcodes_path(&self) -> PathBuf {
        self.index_dir().join("shortcodes").join("folders.json")
    }

    pub fn message_ids_path(&self, folder_id: &str) -> PathBuf {
        self.index_dir()
            .join("top-level-messages")
            .join(folder_file(folder_id))
    }

    pub fn metadata_path(&self, folder_id: &str) -> PathBuf {
        self.index_dir()
            .join("top-level-message-metadata")
            .join(folder_file(folder_id))
    }

    pub fn conversations_path(&self, folder_id: &str) -> PathBuf {
        self.index_dir()
            .join("conversations-organized")
            .join(folder_file(folder_id))
    }

    pub fn caches_dir(&self) -> PathBuf {
        self.root.join("caches")
    }

    pub fn folder_cache_dir(&self, folder_shortcode: &str) -> PathBuf {
        self.caches_dir().join(folder_shortcode)
    }

    pub fn message_cache_dir(
        &self,
        folder_shortcode: &str,
        conversation_shortcode: &str,
        message_shortcode: &str,
    ) -> PathBuf {
        self.folder_cache_dir(folder_shortcode)
            .join(conversation_shortcode)
            .join(message_shortcode)
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.root.join("debug")
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.debug_dir().join("error.txt")
    }

    pub fn credential_path(&self) -> PathBuf {
        self.root.join("jwt.json")
    }

    /// Drop every index checkpoint, leaving an empty index directory.
    pub fn reset_index(&self) -> Result<()> {
        reset_dir(&self.index_dir())
    }

    /// Drop every cache bundle, leaving an empty cache directory.
    pub fn reset_caches(&self) -> Result<()> {
        reset_dir(&self.caches_dir())
    }
}

// remote folder ids are URL-safe base64 but may still carry '/' or '='
fn folder_file(folder_id: &str) -> String {
    format!("{}.json", safe_filename(folder_id))
}

fn reset_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_ids_become_single_segments() {
        let state = StateDir::new("/tmp/state");
        let path = state.message_ids_path("AAMk/AG==");
        assert_eq!(path.file_name().unwrap(), "AAMk%2FAG==.json");
        assert_eq!(
            path.parent().unwrap(),
            Path::new("/tmp/state/index/top-level-messages")
        );
    }

    #[test]
    fn reset_leaves_an_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let state = StateDir::new(tmp.path());
        fs::create_dir_all(state.caches_dir().join("x")).unwrap();
        state.reset_caches().unwrap();
        assert!(state.caches_dir().is_dir());
        assert_eq!(fs::read_dir(state.caches_dir()).unwrap().count(), 0);
    }
}
