use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Bearer credential stored in `<state_dir>/jwt.json`
#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialFile {
    pub jwt: Option<String>,
}

/// Load the bearer token if present
pub fn load_token(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(path)?;
    let cf: CredentialFile = serde_json::from_str(&s)?;
    Ok(cf.jwt.filter(|t| !t.is_empty()))
}

/// Bearer token or the auth error that tells the user to log in.
pub fn require_token(path: &Path) -> Result<String> {
    load_token(path)?.ok_or_else(|| Error::MissingCredential {
        path: path.to_path_buf(),
    })
}
