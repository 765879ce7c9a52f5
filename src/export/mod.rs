//! Turning the index and cache bundles into one browsable directory tree.

pub mod times;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde_json::{Value, json};
use walkdir::WalkDir;

use crate::api::MailboxApi;
use crate::cancel::CancelFlag;
use crate::domain::folder::{self, FolderNode};
use crate::domain::{Conversation, FolderConversations, MessageMetadata};
use crate::error::{Error, Result};
use crate::naming::{safe_filename, truncate_subject};
use crate::store::{StateDir, checkpoint};

const INDEX_HINT: &str = "Run `index` before exporting.";
const DOWNLOAD_HINT: &str = "Run `download` before exporting.";
const NO_SUBJECT: &str = "no_subject";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub folders: usize,
    pub conversations: usize,
    pub messages: usize,
}

/// `__07__` style ordinal; at least two digits, more when `total` needs them.
pub fn ordinal_prefix(index: usize, total: usize) -> String {
    let width = total.max(1).to_string().len().max(2);
    format!("__{index:0width$}__")
}

pub fn time_label(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// `<shortcode>__<safe name>`.
pub fn folder_segment(node: &FolderNode) -> Result<String> {
    Ok(format!("{}__{}", node.require_shortcode()?, safe_filename(&node.name)))
}

fn entry_dir_name(
    ordinal: &str,
    shortcode: &str,
    at: DateTime<Utc>,
    subject: Option<&str>,
    max_subject_chars: usize,
) -> String {
    let subject = subject.filter(|s| !s.is_empty()).unwrap_or(NO_SUBJECT);
    format!(
        "{ordinal}{shortcode}__{}__{}",
        time_label(at),
        truncate_subject(&safe_filename(subject), max_subject_chars)
    )
}

// index documents always use forward slashes
fn rel_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(std::io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| Error::shape(format!("{} escaped {}", entry.path().display(), src.display())))?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

pub struct Exporter<'a> {
    api: &'a dyn MailboxApi,
    state: &'a StateDir,
    cancel: &'a CancelFlag,
    max_subject_chars: usize,
}

impl<'a> Exporter<'a> {
    pub fn new(
        api: &'a dyn MailboxApi,
        state: &'a StateDir,
        cancel: &'a CancelFlag,
        max_subject_chars: usize,
    ) -> Self {
        Self {
            api,
            state,
            cancel,
            max_subject_chars,
        }
    }

    pub fn run(&self, outdir: &Path) -> Result<ExportReport> {
        let forest: Vec<FolderNode> = checkpoint::require(&self.state.folders_path(), INDEX_HINT)?;
        let caches = self.state.caches_dir();
        if !caches.is_dir() {
            return Err(Error::MissingCheckpoint {
                path: caches,
                hint: DOWNLOAD_HINT,
            });
        }
        fs::create_dir_all(outdir)?;
        self.write_me(outdir, &forest)?;

        let mut report = ExportReport::default();
        for (ancestors, node) in folder::preorder(&forest) {
            let mut rel = PathBuf::new();
            for parent in &ancestors {
                rel.push(folder_segment(parent)?);
            }
            rel.push(folder_segment(node)?);
            let organized: FolderConversations =
                checkpoint::require(&self.state.conversations_path(&node.id), INDEX_HINT)?;
            info!(
                "Exporting {} ({} conversations)",
                folder::display_path(&ancestors, node, " -> "),
                organized.conversations.len()
            );
            self.export_folder(outdir, &rel, &ancestors, node, &organized, &mut report)?;
            report.folders += 1;
        }

        info!(
            "Output export complete: {} folders, {} conversations, {} messages",
            report.folders, report.conversations, report.messages
        );
        Ok(report)
    }

    fn write_me(&self, outdir: &Path, forest: &[FolderNode]) -> Result<()> {
        let user = match self.api.get_me() {
            Ok(user) => user,
            Err(e) => {
                warn!("could not fetch account record: {e}");
                Value::Null
            }
        };
        let folder_shortcodes: Option<Value> =
            checkpoint::load(&self.state.folder_shortcodes_path())?;
        let me = json!({
            "generatedAtUtc": Utc::now().to_rfc3339(),
            "user": user,
            "folders": forest,
            "folderShortcodes": folder_shortcodes,
            "source": {
                "indexPath": rel_string(&self.state.index_dir()),
                "cachePath": rel_string(&self.state.caches_dir()),
            },
        });
        checkpoint::write_json(&outdir.join("me.json"), &me)
    }

    fn export_folder(
        &self,
        outdir: &Path,
        rel: &Path,
        ancestors: &[&FolderNode],
        node: &FolderNode,
        organized: &FolderConversations,
        report: &mut ExportReport,
    ) -> Result<()> {
        let folder_code = node.require_shortcode()?;
        let folder_dir = outdir.join(rel);
        fs::create_dir_all(&folder_dir)?;

        let folder_index = json!({
            "folderId": node.id,
            "folderShortcode": folder_code,
            "name": node.name,
            "safeFilename": safe_filename(&node.name),
            "displayPath": folder::display_path(ancestors, node, " -> "),
            "conversationShortcodes": organized.conversation_shortcodes,
            "conversationShortcodeLength": organized.conversation_shortcode_length,
            "outputFolder": rel_string(rel),
            "cacheFolder": rel_string(&self.state.folder_cache_dir(folder_code)),
            "conversations": organized.conversations.iter().map(|c| json!({
                "conversationId": c.conversation_id,
                "conversationShortcode": c.conversation_shortcode,
                "messageShortcodes": c.message_shortcodes,
                "messageShortcodeLength": c.message_shortcode_length,
                "messages": c.messages,
            })).collect::<Vec<_>>(),
        });
        checkpoint::write_json(&folder_dir.join("folder_index.json"), &folder_index)?;

        let total = organized.conversations.len();
        for (i, conversation) in organized.conversations.iter().enumerate() {
            let at = conversation
                .latest()
                .map(MessageMetadata::timestamp)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            let subject = conversation.latest().and_then(|m| m.subject.as_deref());
            let name = entry_dir_name(
                &ordinal_prefix(i + 1, total),
                &conversation.conversation_shortcode,
                at,
                subject,
                self.max_subject_chars,
            );
            let conv_rel = rel.join(name);
            report.messages +=
                self.export_conversation(outdir, &conv_rel, node, folder_code, conversation, at)?;
            report.conversations += 1;
        }
        Ok(())
    }

    /// Returns the number of messages exported.
    fn export_conversation(
        &self,
        outdir: &Path,
        rel: &Path,
        node: &FolderNode,
        folder_code: &str,
        conversation: &Conversation,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let conv_dir = outdir.join(rel);
        fs::create_dir_all(&conv_dir)?;
        let conv_cache = self
            .state
            .folder_cache_dir(folder_code)
            .join(&conversation.conversation_shortcode);

        let total = conversation.messages.len();
        let mut entries = Vec::with_capacity(total);
        for (i, message) in conversation.messages.iter().enumerate() {
            self.cancel.check()?;
            let Some(message_code) = message.shortcode.as_deref() else {
                warn!("message {} has no shortcode, skipping", message.id);
                continue;
            };
            let msg_at = message.timestamp();
            let msg_rel = rel.join(entry_dir_name(
                &ordinal_prefix(i + 1, total),
                message_code,
                msg_at,
                message.subject.as_deref(),
                self.max_subject_chars,
            ));
            let msg_dir = outdir.join(&msg_rel);

            let cache = conv_cache.join(message_code);
            if !cache.is_dir() {
                return Err(Error::MissingCheckpoint {
                    path: cache,
                    hint: DOWNLOAD_HINT,
                });
            }
            copy_tree(&cache, &msg_dir)?;

            let message_index = json!({
                "folderId": node.id,
                "folderShortcode": folder_code,
                "conversationId": conversation.conversation_id,
                "conversationShortcode": conversation.conversation_shortcode,
                "messageId": message.id,
                "messageShortcode": message_code,
                "receivedDateTime": message.received_date_time,
                "sentDateTime": message.sent_date_time,
                "subject": message.subject,
                "cacheRelativePath": rel_string(&cache),
                "outputFolder": rel_string(&msg_rel),
            });
            checkpoint::write_json(&msg_dir.join("message_index.json"), &message_index)?;
            times::set_dir_times(&msg_dir, msg_at);

            entries.push(json!({
                "messageId": message.id,
                "messageShortcode": message_code,
                "messageMeta": message,
                "outputFolder": rel_string(&msg_rel),
            }));
        }

        let exported = entries.len();
        let conversation_index = json!({
            "folderId": node.id,
            "folderShortcode": folder_code,
            "conversationId": conversation.conversation_id,
            "conversationShortcode": conversation.conversation_shortcode,
            "conversationDateUtc": at.to_rfc3339(),
            "conversationSubject": conversation.latest().and_then(|m| m.subject.as_deref()),
            "messageShortcodes": conversation.message_shortcodes,
            "messageShortcodeLength": conversation.message_shortcode_length,
            "outputFolder": rel_string(rel),
            "cacheFolder": rel_string(&conv_cache),
            "messages": entries,
        });
        checkpoint::write_json(&conv_dir.join("conversation_index.json"), &conversation_index)?;
        times::set_dir_times(&conv_dir, at);
        Ok(exported)
    }
}
