//! Folder tree discovery, per-folder id listing, metadata hydration, sanity
//! checks and threading. Every stage but the sanity check is skipped when its
//! checkpoint already exists.

pub mod sanity;

use std::collections::BTreeMap;

use log::info;

use crate::api::MailboxApi;
use crate::cancel::CancelFlag;
use crate::domain::folder::{self, FolderNode};
use crate::domain::{FolderConversations, MessageMetadata};
use crate::error::{Error, Result};
use crate::store::{StateDir, checkpoint};
use crate::threading;

/// Message ids hydrated per request.
pub const HYDRATE_BATCH: usize = 20;

const RESET_HINT: &str = "Reset the index (`index --reset`) and run indexing again.";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub folders: usize,
    pub messages: usize,
    pub conversations: usize,
}

pub struct Indexer<'a> {
    api: &'a dyn MailboxApi,
    state: &'a StateDir,
    cancel: &'a CancelFlag,
}

impl<'a> Indexer<'a> {
    pub fn new(api: &'a dyn MailboxApi, state: &'a StateDir, cancel: &'a CancelFlag) -> Self {
        Self { api, state, cancel }
    }

    /// Run every indexing stage over every folder, stopping at the first error.
    pub fn run(&self) -> Result<IndexReport> {
        let forest = self.folder_forest()?;
        let folders = folder::preorder(&forest);
        info!("Found {} folders:", folders.len());
        for (ancestors, node) in &folders {
            info!("\t{}", folder::display_path(ancestors, node, "→"));
        }

        let total = folders.len();
        for (i, (ancestors, node)) in folders.iter().enumerate() {
            self.cancel.check()?;
            let name = folder::display_path(ancestors, node, "→");
            info!("Getting top level ids for folder {}/{total}: {name}", i + 1);
            self.list_ids(node, &name)?;
        }

        for (i, (ancestors, node)) in folders.iter().enumerate() {
            self.cancel.check()?;
            let name = folder::display_path(ancestors, node, "→");
            info!("Sanity check for folder {}/{total}: {name}", i + 1);
            self.sanity_check(node, &name)?;
        }

        let mut report = IndexReport {
            folders: total,
            ..IndexReport::default()
        };
        for (i, (ancestors, node)) in folders.iter().enumerate() {
            self.cancel.check()?;
            let name = folder::display_path(ancestors, node, "→");
            info!("Fetching top level metadata for folder {}/{total}: {name}", i + 1);
            report.messages += self.hydrate(node, &name)?.len();
        }

        for (i, (ancestors, node)) in folders.iter().enumerate() {
            self.cancel.check()?;
            let name = folder::display_path(ancestors, node, "→");
            info!("Organizing into conversations for folder {}/{total}: {name}", i + 1);
            report.conversations += self.conversations(node)?.conversations.len();
        }

        info!(
            "Indexed {} messages into {} conversations across {} folders",
            report.messages, report.conversations, report.folders
        );
        Ok(report)
    }

    /// Load the forest checkpoint, or fetch it, then rebuild folder shortcodes
    /// over the full current id set and persist both.
    pub fn folder_forest(&self) -> Result<Vec<FolderNode>> {
        let path = self.state.folders_path();
        let mut forest = match checkpoint::load::<Vec<FolderNode>>(&path)? {
            Some(forest) => forest,
            None => folder::parse_forest(self.api.get_folder_tree()?)?,
        };
        let map = folder::assign_shortcodes(&mut forest)?;
        checkpoint::store(&self.state.folder_shortcodes_path(), &map)?;
        checkpoint::store(&path, &forest)?;
        info!("Folder information saved to {}", path.display());
        Ok(forest)
    }

    /// Follow the listing cursor to the end; the id list is persisted only
    /// once every page has arrived.
    pub fn list_ids(&self, node: &FolderNode, name: &str) -> Result<Vec<String>> {
        let path = self.state.message_ids_path(&node.id);
        if let Some(ids) = checkpoint::load::<Vec<String>>(&path)? {
            return Ok(ids);
        }

        let mut page = self.api.list_message_ids(&node.id, None)?;
        let mut ids = std::mem::take(&mut page.message_ids);
        info!("Discovered {} so far...", ids.len());
        while let Some(cursor) = page.next_link.take() {
            self.cancel.check()?;
            page = self.api.list_message_ids(&node.id, Some(&cursor))?;
            ids.append(&mut page.message_ids);
            info!("Discovered {} so far...", ids.len());
        }

        checkpoint::store(&path, &ids)?;
        info!("Indexed messages in folder {name} ({})", node.id);
        Ok(ids)
    }

    pub fn sanity_check(&self, node: &FolderNode, name: &str) -> Result<()> {
        let ids: Vec<String> = checkpoint::require(&self.state.message_ids_path(&node.id), RESET_HINT)?;
        let reported = self.api.get_folder_total(&node.id)?;
        sanity::check_folder(name, &ids, reported)
    }

    /// Hydrate the listed ids batch by batch into an id-keyed map.
    pub fn hydrate(
        &self,
        node: &FolderNode,
        name: &str,
    ) -> Result<BTreeMap<String, MessageMetadata>> {
        let path = self.state.metadata_path(&node.id);
        if let Some(map) = checkpoint::load(&path)? {
            return Ok(map);
        }
        let ids: Vec<String> = checkpoint::require(&self.state.message_ids_path(&node.id), RESET_HINT)?;

        let batches = ids.len().div_ceil(HYDRATE_BATCH);
        let mut map = BTreeMap::new();
        for (i, batch) in ids.chunks(HYDRATE_BATCH).enumerate() {
            self.cancel.check()?;
            for mut meta in self.api.hydrate_metadata(batch)? {
                if meta.id.is_empty() {
                    return Err(Error::shape(format!("{name}: hydrated message without id")));
                }
                meta.derive_epoch();
                map.insert(meta.id.clone(), meta);
            }
            let missing: Vec<&str> = batch
                .iter()
                .filter(|id| !map.contains_key(id.as_str()))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(Error::shape(format!(
                    "{name}: no metadata returned for {} ids ({})",
                    missing.len(),
                    missing.join(", ")
                )));
            }
            log::debug!("{name}: hydrated batch {}/{batches}", i + 1);
        }

        checkpoint::store(&path, &map)?;
        info!("Hydrated {} messages in folder {name}", map.len());
        Ok(map)
    }

    /// Thread the folder once; an existing grouping is never recomputed.
    pub fn conversations(&self, node: &FolderNode) -> Result<FolderConversations> {
        let path = self.state.conversations_path(&node.id);
        if let Some(existing) = checkpoint::load(&path)? {
            return Ok(existing);
        }
        let metadata: BTreeMap<String, MessageMetadata> =
            checkpoint::require(&self.state.metadata_path(&node.id), RESET_HINT)?;
        let organized = threading::organize(&node.id, node.shortcode.as_deref(), &metadata)?;
        checkpoint::store(&path, &organized)?;
        Ok(organized)
    }
}

/// Display path and remote total of every folder, in pre-order.
pub fn folder_totals(api: &dyn MailboxApi) -> Result<Vec<(String, u64)>> {
    let forest = folder::parse_forest(api.get_folder_tree()?)?;
    folder::preorder(&forest)
        .into_iter()
        .map(|(ancestors, node)| {
            let total = api.get_folder_total(&node.id)?;
            Ok((folder::display_path(&ancestors, node, " -> "), total))
        })
        .collect()
}
