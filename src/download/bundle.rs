//! Writing one message and everything attached to it into a bundle directory.

use std::fs;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose};
use log::{debug, warn};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::api::MailboxApi;
use crate::download::inline::{InlineRefs, normalize_cid};
use crate::error::Result;
use crate::naming;
use crate::shortcode::ShortcodeMap;
use crate::store::checkpoint::write_json;

const BODY_FIELDS: [&str; 2] = ["body", "uniqueBody"];

/// Where attachment data for a message comes from.
#[derive(Debug, Clone, Copy)]
pub enum Source<'m> {
    /// A top-level message; attachments can be fetched by its id.
    Remote(&'m str),
    /// A message embedded in an item attachment; only what it carries is used.
    Embedded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    File,
    Reference,
    Item,
}

impl AttachmentKind {
    pub fn classify(attachment: &Value) -> Option<Self> {
        let tag = str_field(attachment, "@odata.type")
            .or_else(|| str_field(attachment, "odataType"))
            .unwrap_or_default();
        if tag.contains("fileAttachment") {
            Some(Self::File)
        } else if tag.contains("referenceAttachment") {
            Some(Self::Reference)
        } else if tag.contains("itemAttachment") {
            Some(Self::Item)
        } else {
            None
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::File => "fileAttachment",
            Self::Reference => "referenceAttachment",
            Self::Item => "itemAttachment",
        }
    }
}

/// One row of `files_map.json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub attachment_id: Option<String>,
    pub attachment_shortcode: Option<String>,
    pub attachment_type: &'static str,
    pub is_inline: bool,
    pub original_name: Option<String>,
    pub sanitized_name: String,
    pub relative_path: Option<String>,
    pub content_type: Option<String>,
    pub size: Option<Value>,
    pub content_id: Option<String>,
    pub content_location: Option<String>,
}

fn str_field<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value.get(key).and_then(Value::as_str)
}

/// The message as stored in `message.json`: bodies are reduced to their
/// content type since they are written out separately.
pub fn strip_bodies(message: &Value) -> Value {
    let mut out = message.clone();
    if let Some(obj) = out.as_object_mut() {
        for field in BODY_FIELDS {
            let kept = obj
                .get(field)
                .and_then(|b| b.get("contentType"))
                .map(|ct| json!({ "contentType": ct }))
                .unwrap_or(Value::Null);
            obj.insert(field.to_string(), kept);
        }
    }
    out
}

pub struct BundleWriter<'a> {
    api: &'a dyn MailboxApi,
}

impl<'a> BundleWriter<'a> {
    pub fn new(api: &'a dyn MailboxApi) -> Self {
        Self { api }
    }

    /// Fetch a top-level message and write its bundle into `dir`.
    pub fn write_remote(&self, message_id: &str, dir: &Path) -> Result<()> {
        let message = self.api.get_message(message_id)?;
        self.write_message(&message, dir, Source::Remote(message_id))
    }

    pub fn write_message(&self, message: &Value, dir: &Path, source: Source<'_>) -> Result<()> {
        let files_dir = dir.join("attachments").join("files");
        let links_dir = dir.join("attachments").join("links");
        let items_dir = dir.join("attachments").join("items");
        let inline_dir = dir.join("inline");
        for d in [&files_dir, &links_dir, &items_dir, &inline_dir] {
            fs::create_dir_all(d)?;
        }

        write_json(&dir.join("message.json"), &strip_bodies(message))?;

        let fetched = match source {
            Source::Remote(id) => self.api.get_attachments(id)?,
            Source::Embedded => None,
        };
        let attachments = match fetched {
            Some(list) if !list.is_empty() => list,
            _ => message
                .get("attachments")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        };
        write_json(&dir.join("attachments.json"), &attachments)?;

        let codes = ShortcodeMap::build(attachments.iter().filter_map(|a| str_field(a, "id")))?;
        write_json(
            &dir.join("attachment_shortcodes.json"),
            &json!({
                "shortcodeLength": codes.shortcode_length,
                "shortcodeToId": codes.shortcode_to_id,
            }),
        )?;

        let mut refs = InlineRefs::default();
        let mut entries = Vec::new();
        for attachment in &attachments {
            let Some(kind) = AttachmentKind::classify(attachment) else {
                debug!("skipping attachment with unknown type");
                continue;
            };
            let id = str_field(attachment, "id");
            let code = id.and_then(|id| codes.get(id));
            let entry = match (kind, id, code) {
                (AttachmentKind::File, Some(id), Some(code)) => {
                    self.write_file(attachment, id, code, dir, source, &mut refs)?
                }
                (AttachmentKind::Reference, Some(_), Some(code)) => {
                    write_json(&links_dir.join(format!("{code}.json")), attachment)?;
                    Self::entry(kind, attachment, id, Some(code), None)
                }
                (AttachmentKind::Reference, ..) => {
                    Self::entry(kind, attachment, id, None, None)
                }
                (AttachmentKind::Item, Some(id), Some(code)) => {
                    self.write_item(attachment, id, code, &items_dir.join(code), source)?;
                    let rel = format!("attachments/items/{code}");
                    Self::entry(kind, attachment, Some(id), Some(code), Some(rel))
                }
                _ => {
                    warn!("skipping {} without id", kind.as_str());
                    continue;
                }
            };
            entries.push(entry);
        }
        write_json(&dir.join("files_map.json"), &entries)?;

        self.write_bodies(message, dir, &refs)
    }

    fn entry(
        kind: AttachmentKind,
        attachment: &Value,
        id: Option<&str>,
        code: Option<&str>,
        relative_path: Option<String>,
    ) -> FileEntry {
        FileEntry {
            attachment_id: id.map(str::to_string),
            attachment_shortcode: code.map(str::to_string),
            attachment_type: kind.as_str(),
            is_inline: attachment
                .get("isInline")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            original_name: str_field(attachment, "name").map(str::to_string),
            sanitized_name: naming::attachment_filename(
                str_field(attachment, "name"),
                str_field(attachment, "contentType"),
            ),
            relative_path,
            content_type: str_field(attachment, "contentType").map(str::to_string),
            size: attachment.get("size").cloned(),
            content_id: str_field(attachment, "contentId").map(str::to_string),
            content_location: str_field(attachment, "contentLocation").map(str::to_string),
        }
    }

    fn write_file(
        &self,
        attachment: &Value,
        id: &str,
        code: &str,
        dir: &Path,
        source: Source<'_>,
        refs: &mut InlineRefs,
    ) -> Result<FileEntry> {
        let mut entry = Self::entry(AttachmentKind::File, attachment, Some(id), Some(code), None);
        let file_name = format!("{code}{}", entry.sanitized_name);

        let rel = if entry.is_inline {
            format!("inline/{file_name}")
        } else {
            format!("attachments/files/{file_name}")
        };

        let embedded = str_field(attachment, "contentBytes").and_then(|b64| {
            general_purpose::STANDARD
                .decode(b64)
                .map_err(|e| warn!("contentBytes of {id} is not base64: {e}"))
                .ok()
        });
        let data = match (embedded, source) {
            (Some(bytes), _) => Some(bytes),
            (None, Source::Remote(message_id)) => {
                Some(self.api.get_attachment_binary(message_id, id)?.data)
            }
            (None, Source::Embedded) => None,
        };
        match data {
            Some(bytes) => fs::write(dir.join(&rel), bytes)?,
            None => warn!("no content available for embedded attachment {id}"),
        }

        // only inline files stand in for body references
        let content_id = normalize_cid(str_field(attachment, "contentId"));
        if entry.is_inline {
            if let Some(cid) = &content_id {
                refs.by_content_id.insert(cid.clone(), rel.clone());
            }
            if let Some(location) = entry.content_location.as_deref().filter(|l| !l.is_empty()) {
                refs.by_location.insert(location.to_string(), rel.clone());
            }
        }

        entry.content_id = content_id;
        entry.relative_path = Some(rel);
        Ok(entry)
    }

    fn write_item(
        &self,
        attachment: &Value,
        id: &str,
        code: &str,
        item_dir: &Path,
        source: Source<'_>,
    ) -> Result<()> {
        fs::create_dir_all(item_dir)?;
        let detail = match source {
            Source::Remote(message_id) => self.api.get_attachment_detail(message_id, id)?,
            Source::Embedded => attachment.clone(),
        };
        write_json(&item_dir.join("attachment.json"), &detail)?;

        let Some(item) = detail.get("item").filter(|i| i.is_object()) else {
            debug!("item attachment {code} carries no item");
            return Ok(());
        };
        let tag = str_field(item, "@odata.type").unwrap_or_default().to_lowercase();
        let item_id = str_field(item, "id");

        if tag.contains("message") {
            self.write_message(item, item_dir, Source::Embedded)
        } else if tag.contains("event") {
            write_json(&item_dir.join("event.json"), item)?;
            self.write_serialized("event", item_id, &item_dir.join("event.ics"))
        } else if tag.contains("contact") {
            write_json(&item_dir.join("contact.json"), item)?;
            self.write_serialized("contact", item_id, &item_dir.join("contact.vcf"))
        } else {
            write_json(&item_dir.join("item.json"), item)
        }
    }

    fn write_serialized(&self, item_type: &str, item_id: Option<&str>, path: &Path) -> Result<()> {
        let Some(item_id) = item_id else {
            return Ok(());
        };
        if let Some(bin) = self.api.get_item_binary(item_type, item_id)? {
            fs::write(path, bin.data)?;
        }
        Ok(())
    }

    fn write_bodies(&self, message: &Value, dir: &Path, refs: &InlineRefs) -> Result<()> {
        for field in BODY_FIELDS {
            let Some(body) = message.get(field).and_then(Value::as_object) else {
                continue;
            };
            let Some(content) = body_content(body) else {
                continue;
            };
            let is_html = body
                .get("contentType")
                .and_then(Value::as_str)
                .is_some_and(|ct| ct.eq_ignore_ascii_case("html"));
            let ext = if is_html { "html" } else { "txt" };

            let rewritten = if is_html && !refs.is_empty() {
                refs.rewrite(content)
            } else {
                None
            };
            match rewritten {
                Some(local) => {
                    fs::write(dir.join(format!("{field}.{ext}")), local)?;
                    fs::write(dir.join(format!("{field}_noParse.html")), content)?;
                }
                None => fs::write(dir.join(format!("{field}.{ext}")), content)?,
            }
        }
        Ok(())
    }
}

fn body_content(body: &Map<String, Value>) -> Option<&str> {
    body.get("content").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_kinds_come_from_odata_tag() {
        let file = json!({ "@odata.type": "#microsoft.graph.fileAttachment" });
        let link = json!({ "odataType": "#microsoft.graph.referenceAttachment" });
        let item = json!({ "@odata.type": "#microsoft.graph.itemAttachment" });
        assert_eq!(AttachmentKind::classify(&file), Some(AttachmentKind::File));
        assert_eq!(AttachmentKind::classify(&link), Some(AttachmentKind::Reference));
        assert_eq!(AttachmentKind::classify(&item), Some(AttachmentKind::Item));
        assert_eq!(AttachmentKind::classify(&json!({ "name": "x" })), None);
    }

    #[test]
    fn bodies_are_reduced_to_content_type() {
        let message = json!({
            "id": "m1",
            "body": { "contentType": "html", "content": "<p>hi</p>" },
        });
        let stripped = strip_bodies(&message);
        assert_eq!(stripped["body"], json!({ "contentType": "html" }));
        assert_eq!(stripped["uniqueBody"], Value::Null);
        assert_eq!(stripped["id"], "m1");
    }
}
