//! Short, collision-free stand-ins for long opaque remote ids.
//!
//! A shortcode is the SHA-256 hex digest of the id, truncated to the shortest
//! length in [`LENGTH_STEPS`] at which no two ids of the set collide, wrapped
//! in `__` on both sides. The map is always rebuilt from the complete id set.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub const PREFIX: &str = "__";
pub const SUFFIX: &str = "__";
pub const LENGTH_STEPS: [usize; 8] = [8, 12, 16, 20, 24, 32, 40, 64];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortcodeMap {
    pub shortcode_length: usize,
    pub shortcode_to_id: BTreeMap<String, String>,
    pub id_to_shortcode: BTreeMap<String, String>,
}

impl ShortcodeMap {
    /// Build the map over `ids`, ignoring empty and repeated entries.
    pub fn build<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut digests: Vec<(String, String)> = Vec::new();
        for id in ids {
            let id = id.as_ref();
            if id.is_empty() || !seen.insert(id.to_string()) {
                continue;
            }
            digests.push((id.to_string(), hex::encode(Sha256::digest(id.as_bytes()))));
        }

        if digests.is_empty() {
            return Ok(Self::default());
        }

        for length in LENGTH_STEPS {
            let mut shortcode_to_id = BTreeMap::new();
            let mut collided = false;
            for (id, digest) in &digests {
                let code = wrap(&digest[..length]);
                if shortcode_to_id.insert(code, id.clone()).is_some() {
                    collided = true;
                    break;
                }
            }
            if !collided {
                let id_to_shortcode = shortcode_to_id
                    .iter()
                    .map(|(code, id)| (id.clone(), code.clone()))
                    .collect();
                return Ok(Self {
                    shortcode_length: length,
                    shortcode_to_id,
                    id_to_shortcode,
                });
            }
        }

        Err(Error::ShortcodesExhausted { ids: digests.len() })
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.id_to_shortcode.get(id).map(String::as_str)
    }

    pub fn id_for(&self, shortcode: &str) -> Option<&str> {
        self.shortcode_to_id.get(shortcode).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.id_to_shortcode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_shortcode.is_empty()
    }
}

fn wrap(hex_prefix: &str) -> String {
    format!("{PREFIX}{hex_prefix}{SUFFIX}")
}
