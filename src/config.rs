use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::store::StateDir;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_STATE_DIR: &str = ".dsed";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_SUBJECT_CHARS: usize = 36;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    pub base_url: Option<String>,
    pub state_dir: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_subject_chars: Option<usize>,
    pub spinner: Option<bool>,
}

impl Config {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn state(&self) -> StateDir {
        StateDir::new(self.state_dir.as_deref().unwrap_or(DEFAULT_STATE_DIR))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn max_subject_chars(&self) -> usize {
        self.max_subject_chars.unwrap_or(DEFAULT_MAX_SUBJECT_CHARS)
    }

    pub fn spinner(&self) -> bool {
        self.spinner.unwrap_or(true)
    }

    fn template() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            state_dir: Some(DEFAULT_STATE_DIR.to_string()),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            max_subject_chars: Some(DEFAULT_MAX_SUBJECT_CHARS),
            spinner: Some(true),
        }
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| std::io::Error::other("no config dir available"))?
        .join("mailbox_archiver"))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load the config at `path` (default location when `None`). A missing file
/// is replaced by a template holding the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    if !path.exists() {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tom = toml::to_string_pretty(&Config::template())?;
        fs::write(&path, tom)?;
        log::info!("Created template config at {}", path.display());
        return Ok(Config::template());
    }
    let s = fs::read_to_string(&path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_template() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        let cfg = load_config(Some(&path)).unwrap();
        assert!(path.is_file());
        assert_eq!(cfg.base_url(), DEFAULT_BASE_URL);
        assert_eq!(load_config(Some(&path)).unwrap(), cfg);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "state_dir = \"/var/archive\"\nmax_subject_chars = 20\n").unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.state().root(), Path::new("/var/archive"));
        assert_eq!(cfg.max_subject_chars(), 20);
        assert_eq!(cfg.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }
}
