//! Grouping one folder's messages into conversations.
//!
//! Within a conversation, messages are ordered by the raw bytes of their
//! conversation index (never decoded any further than base64), then receive
//! time, then id, and the result is reversed so the latest message comes
//! first. Conversations are ordered by the receive time of that latest
//! message, newest first, with undated conversations last.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose};

use crate::domain::{Conversation, FolderConversations, MessageMetadata};
use crate::error::{Error, Result};
use crate::shortcode::ShortcodeMap;

fn ordering_bytes(meta: &MessageMetadata) -> Result<Vec<u8>> {
    match meta.conversation_index.as_deref() {
        None | Some("") => Ok(Vec::new()),
        Some(token) => general_purpose::STANDARD
            .decode(token)
            .map_err(|source| Error::InvalidOrderingToken {
                message_id: meta.id.clone(),
                source,
            }),
    }
}

fn newest_first(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Thread one folder's hydrated metadata. Entries without a conversation id
/// are left out.
pub fn organize(
    folder_id: &str,
    folder_shortcode: Option<&str>,
    metadata: &BTreeMap<String, MessageMetadata>,
) -> Result<FolderConversations> {
    let mut groups: BTreeMap<&str, Vec<(Vec<u8>, &MessageMetadata)>> = BTreeMap::new();
    for meta in metadata.values() {
        let Some(conversation_id) = meta.conversation_id.as_deref().filter(|c| !c.is_empty())
        else {
            continue;
        };
        groups
            .entry(conversation_id)
            .or_default()
            .push((ordering_bytes(meta)?, meta));
    }

    let conversation_codes = ShortcodeMap::build(groups.keys())?;

    let mut conversations = Vec::with_capacity(groups.len());
    for (conversation_id, mut members) in groups {
        members.sort_by(|(ka, a), (kb, b)| {
            ka.cmp(kb)
                .then(a.received_epoch.cmp(&b.received_epoch))
                .then(a.id.cmp(&b.id))
        });
        members.reverse();

        let message_codes = ShortcodeMap::build(members.iter().map(|(_, m)| m.id.as_str()))?;
        let messages = members
            .into_iter()
            .map(|(_, meta)| {
                let mut meta = meta.clone();
                meta.shortcode = message_codes.get(&meta.id).map(str::to_string);
                meta
            })
            .collect();

        let conversation_shortcode = conversation_codes
            .get(conversation_id)
            .ok_or_else(|| Error::shape(format!("no shortcode for conversation {conversation_id}")))?
            .to_string();

        conversations.push(Conversation {
            conversation_id: conversation_id.to_string(),
            conversation_shortcode,
            messages,
            message_shortcodes: message_codes.shortcode_to_id,
            message_shortcode_length: message_codes.shortcode_length,
        });
    }

    conversations.sort_by(|a, b| {
        newest_first(
            a.latest().and_then(|m| m.received_epoch),
            b.latest().and_then(|m| m.received_epoch),
        )
        .then_with(|| a.conversation_id.cmp(&b.conversation_id))
    });

    Ok(FolderConversations {
        folder_id: folder_id.to_string(),
        folder_shortcode: folder_shortcode.map(str::to_string),
        conversation_shortcodes: conversation_codes.shortcode_to_id,
        conversation_shortcode_length: conversation_codes.shortcode_length,
        conversations,
    })
}
