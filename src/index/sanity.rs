use std::collections::HashSet;

use log::info;

use crate::error::{Error, Result};

/// Largest indexed-vs-reported gap still explained by mail arriving or
/// leaving while indexing ran.
pub const MAX_DISCREPANCY: u64 = 100;

/// Compare a folder's indexed id list with the remote's own total, and make
/// sure no id was listed twice.
pub fn check_folder(folder: &str, ids: &[String], reported: u64) -> Result<()> {
    let indexed = ids.len() as u64;
    info!("{folder}: indexed {indexed}, remote total {reported}");
    if indexed < reported {
        info!(
            "{} messages may have arrived or been moved in since indexing started",
            reported - indexed
        );
    } else if indexed > reported {
        info!(
            "{} messages may have been deleted or moved since indexing started",
            indexed - reported
        );
    }
    if indexed.abs_diff(reported) > MAX_DISCREPANCY {
        return Err(Error::Discrepancy {
            folder: folder.to_string(),
            indexed: ids.len(),
            reported,
        });
    }

    let mut seen = HashSet::with_capacity(ids.len());
    let mut duplicates: Vec<String> = ids
        .iter()
        .filter(|id| !seen.insert(id.as_str()))
        .cloned()
        .collect();
    if !duplicates.is_empty() {
        duplicates.sort();
        duplicates.dedup();
        return Err(Error::DuplicateIds {
            folder: folder.to_string(),
            duplicates,
        });
    }
    Ok(())
}
