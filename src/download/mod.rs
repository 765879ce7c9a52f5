//! Building the per-message cache bundles from the index checkpoints.

pub mod bundle;
pub mod inline;

use std::fs;

use log::{debug, info, warn};

use crate::api::MailboxApi;
use crate::cancel::CancelFlag;
use crate::domain::folder::{self, FolderNode};
use crate::domain::FolderConversations;
use crate::error::Result;
use crate::store::{StateDir, checkpoint};

pub use bundle::BundleWriter;

const INDEX_HINT: &str = "Run `index` before downloading.";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub folders: usize,
    pub messages: usize,
}

pub struct CacheBuilder<'a> {
    api: &'a dyn MailboxApi,
    state: &'a StateDir,
    cancel: &'a CancelFlag,
}

impl<'a> CacheBuilder<'a> {
    pub fn new(api: &'a dyn MailboxApi, state: &'a StateDir, cancel: &'a CancelFlag) -> Self {
        Self { api, state, cancel }
    }

    /// Write a bundle for every indexed message, folder by folder in
    /// pre-order. Bundles already on disk are rewritten.
    pub fn run(&self) -> Result<DownloadReport> {
        let forest: Vec<FolderNode> = checkpoint::require(&self.state.folders_path(), INDEX_HINT)?;
        let folders = folder::preorder(&forest);
        if folders.is_empty() {
            warn!("No folders in the index, nothing to download");
        }

        let writer = BundleWriter::new(self.api);
        let mut report = DownloadReport::default();
        let total = folders.len();
        for (i, (ancestors, node)) in folders.iter().enumerate() {
            let name = folder::display_path(ancestors, node, "→");
            let folder_code = node.require_shortcode()?;
            let organized: FolderConversations =
                checkpoint::require(&self.state.conversations_path(&node.id), INDEX_HINT)?;
            let count = organized.message_count();
            info!("Downloading folder {}/{total}: {name} ({count} messages)", i + 1);

            let mut done = 0;
            for conversation in &organized.conversations {
                for message in &conversation.messages {
                    self.cancel.check()?;
                    let Some(message_code) = message.shortcode.as_deref() else {
                        warn!("message {} has no shortcode, skipping", message.id);
                        continue;
                    };
                    let dir = self.state.message_cache_dir(
                        folder_code,
                        &conversation.conversation_shortcode,
                        message_code,
                    );
                    fs::create_dir_all(&dir)?;
                    writer.write_remote(&message.id, &dir)?;
                    done += 1;
                    debug!("{name}: {done}/{count} {}", message.id);
                }
            }
            info!("Finished folder {name}: {done} messages cached");
            report.messages += done;
            report.folders += 1;
        }
        Ok(report)
    }
}
