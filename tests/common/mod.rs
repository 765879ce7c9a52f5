#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose};
use serde_json::{Value, json};

use mailbox_archiver::api::{Binary, IdPage, MailboxApi};
use mailbox_archiver::domain::MessageMetadata;
use mailbox_archiver::{Error, Result};

pub const INBOX: &str = "inbox-id";
pub const ARCHIVE: &str = "archive-id";
pub const Y2023: &str = "y2023-id";
pub const SHARED: &str = "CONV-SHARED";

/// In-memory mailbox that counts every call it receives.
#[derive(Default)]
pub struct StubApi {
    pub forest: Value,
    /// Listing pages per folder.
    pub pages: BTreeMap<String, Vec<Vec<String>>>,
    pub metadata: BTreeMap<String, MessageMetadata>,
    /// Remote totals; folders missing here report their listed count.
    pub totals: BTreeMap<String, u64>,
    pub messages: BTreeMap<String, Value>,
    pub attachments: BTreeMap<String, Vec<Value>>,
    pub attachment_details: BTreeMap<(String, String), Value>,
    pub binaries: BTreeMap<(String, String), Vec<u8>>,
    pub items: BTreeMap<(String, String), Vec<u8>>,
    calls: RefCell<BTreeMap<&'static str, usize>>,
}

impl StubApi {
    fn hit(&self, route: &'static str) {
        *self.calls.borrow_mut().entry(route).or_default() += 1;
    }

    pub fn calls(&self, route: &str) -> usize {
        self.calls.borrow().get(route).copied().unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn listed(&self, folder_id: &str) -> u64 {
        self.pages
            .get(folder_id)
            .map(|pages| pages.iter().map(Vec::len).sum::<usize>() as u64)
            .unwrap_or(0)
    }

    pub fn add_message(
        &mut self,
        folder_id: &str,
        id: &str,
        conversation: &str,
        index: &[u8],
        received: &str,
        subject: &str,
    ) {
        let mut meta = MessageMetadata::new(id);
        meta.conversation_id = Some(conversation.to_string());
        meta.conversation_index = Some(general_purpose::STANDARD.encode(index));
        meta.received_date_time = Some(received.to_string());
        meta.subject = Some(subject.to_string());
        self.metadata.insert(id.to_string(), meta);

        let pages = self.pages.entry(folder_id.to_string()).or_default();
        match pages.last_mut() {
            Some(page) => page.push(id.to_string()),
            None => pages.push(vec![id.to_string()]),
        }

        self.messages.insert(
            id.to_string(),
            json!({
                "id": id,
                "subject": subject,
                "conversationId": conversation,
                "receivedDateTime": received,
                "body": { "contentType": "text", "content": format!("body of {id}") },
            }),
        );
    }

    /// Inbox (no children), Archive with child 2023. One conversation id
    /// appears in both Inbox and 2023; 2023 holds enough conversations to
    /// need three ordinal digits.
    pub fn mailbox() -> Self {
        let mut api = StubApi {
            forest: json!([
                { "id": INBOX, "name": "Inbox", "children": [] },
                { "id": ARCHIVE, "name": "Archive", "children": [
                    { "id": Y2023, "name": "2023", "children": [] }
                ]},
            ]),
            ..StubApi::default()
        };
        api.pages.insert(ARCHIVE.to_string(), Vec::new());

        api.add_message(INBOX, "i1", SHARED, &[0x01, 0x02], "2024-01-01T10:00:00Z", "Plans");
        api.add_message(INBOX, "i2", SHARED, &[0x01, 0x03], "2024-01-02T09:00:00Z", "Re: Plans");
        api.add_message(INBOX, "i3", "CONV-SOLO", &[0x05], "2023-12-01T08:00:00Z", "Invoice");

        api.add_message(Y2023, "a1", SHARED, &[0x01, 0x04], "2023-06-01T12:00:00Z", "Old plans");
        for n in 0..100 {
            api.add_message(
                Y2023,
                &format!("y{n:03}"),
                &format!("CONV-{n:03}"),
                &[0x02],
                &format!("2023-03-{:02}T00:00:{:02}Z", n % 28 + 1, n % 60),
                &format!("Note {n}"),
            );
        }

        api.messages.insert(
            "i2".into(),
            json!({
                "id": "i2",
                "subject": "Re: Plans",
                "body": {
                    "contentType": "html",
                    "content": "<p>see</p><img src=\"cid:logo@x\">",
                },
                "uniqueBody": { "contentType": "text", "content": "see" },
            }),
        );
        api.attachments.insert(
            "i2".into(),
            vec![
                json!({
                    "@odata.type": "#microsoft.graph.fileAttachment",
                    "id": "att-logo",
                    "name": "Logo.PNG",
                    "contentType": "image/png",
                    "isInline": true,
                    "contentId": "<logo@x>",
                    "contentBytes": general_purpose::STANDARD.encode([0x89, b'P', b'N', b'G']),
                }),
                json!({
                    "@odata.type": "#microsoft.graph.fileAttachment",
                    "id": "att-report",
                    "name": "Q4 report.pdf",
                    "contentType": "application/pdf",
                    "isInline": false,
                }),
                json!({
                    "@odata.type": "#microsoft.graph.referenceAttachment",
                    "id": "att-link",
                    "name": "shared doc",
                    "sourceUrl": "https://example.com/doc",
                }),
                json!({
                    "@odata.type": "#microsoft.graph.itemAttachment",
                    "id": "att-event",
                    "name": "Kickoff",
                }),
            ],
        );
        api.binaries
            .insert(("i2".into(), "att-report".into()), b"%PDF-1.7".to_vec());
        api.attachment_details.insert(
            ("i2".into(), "att-event".into()),
            json!({
                "id": "att-event",
                "item": { "@odata.type": "#microsoft.graph.event", "id": "ev-1", "subject": "Kickoff" },
            }),
        );
        api.items
            .insert(("event".into(), "ev-1".into()), b"BEGIN:VCALENDAR".to_vec());

        api.attachments.insert(
            "i1".into(),
            vec![json!({
                "@odata.type": "#microsoft.graph.itemAttachment",
                "id": "att-fwd",
                "name": "Forwarded",
            })],
        );
        api.attachment_details.insert(
            ("i1".into(), "att-fwd".into()),
            json!({
                "id": "att-fwd",
                "item": {
                    "@odata.type": "#microsoft.graph.message",
                    "id": "nested-1",
                    "subject": "Original",
                    "body": { "contentType": "text", "content": "forwarded text" },
                    "attachments": [{
                        "@odata.type": "#microsoft.graph.fileAttachment",
                        "id": "nested-file",
                        "name": "notes.txt",
                        "contentType": "text/plain",
                        "contentBytes": general_purpose::STANDARD.encode("hello"),
                    }],
                },
            }),
        );
        api
    }
}

fn not_found(route: &str) -> Error {
    Error::Request {
        route: route.to_string(),
        status: 404,
        body: String::new(),
    }
}

impl MailboxApi for StubApi {
    fn get_folder_tree(&self) -> Result<Value> {
        self.hit("get_folder_tree");
        Ok(self.forest.clone())
    }

    fn list_message_ids(&self, folder_id: &str, cursor: Option<&str>) -> Result<IdPage> {
        self.hit("list_message_ids");
        let pages = self.pages.get(folder_id).cloned().unwrap_or_default();
        let index = match cursor {
            None => 0,
            Some(c) => c
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| not_found("get-id-list"))?,
        };
        Ok(IdPage {
            message_ids: pages.get(index).cloned().unwrap_or_default(),
            next_link: (index + 1 < pages.len()).then(|| format!("page-{}", index + 1)),
        })
    }

    fn hydrate_metadata(&self, message_ids: &[String]) -> Result<Vec<MessageMetadata>> {
        self.hit("hydrate_metadata");
        Ok(message_ids
            .iter()
            .filter_map(|id| self.metadata.get(id).cloned())
            .collect())
    }

    fn get_folder_total(&self, folder_id: &str) -> Result<u64> {
        self.hit("get_folder_total");
        Ok(self
            .totals
            .get(folder_id)
            .copied()
            .unwrap_or_else(|| self.listed(folder_id)))
    }

    fn get_message(&self, message_id: &str) -> Result<Value> {
        self.hit("get_message");
        self.messages
            .get(message_id)
            .cloned()
            .ok_or_else(|| not_found("get-message"))
    }

    fn get_attachments(&self, message_id: &str) -> Result<Option<Vec<Value>>> {
        self.hit("get_attachments");
        Ok(self.attachments.get(message_id).cloned())
    }

    fn get_attachment_detail(&self, message_id: &str, attachment_id: &str) -> Result<Value> {
        self.hit("get_attachment_detail");
        self.attachment_details
            .get(&(message_id.to_string(), attachment_id.to_string()))
            .cloned()
            .ok_or_else(|| not_found("get-attachment"))
    }

    fn get_attachment_binary(&self, message_id: &str, attachment_id: &str) -> Result<Binary> {
        self.hit("get_attachment_binary");
        self.binaries
            .get(&(message_id.to_string(), attachment_id.to_string()))
            .map(|data| Binary {
                data: data.clone(),
                content_type: "application/octet-stream".into(),
            })
            .ok_or_else(|| not_found("get-attachment-value"))
    }

    fn get_item_binary(&self, item_type: &str, item_id: &str) -> Result<Option<Binary>> {
        self.hit("get_item_binary");
        Ok(self
            .items
            .get(&(item_type.to_string(), item_id.to_string()))
            .map(|data| Binary {
                data: data.clone(),
                content_type: "text/plain".into(),
            }))
    }

    fn get_me(&self) -> Result<Value> {
        self.hit("get_me");
        Ok(json!({ "mail": "me@example.com", "displayName": "Me" }))
    }
}

/// The directory entries of `dir`, sorted by name.
pub fn entries(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// The single entry of `dir` whose name ends with `suffix`.
pub fn find(dir: &std::path::Path, suffix: &str) -> std::path::PathBuf {
    let matches: Vec<String> = entries(dir)
        .into_iter()
        .filter(|n| n.ends_with(suffix))
        .collect();
    assert_eq!(matches.len(), 1, "expected one {suffix} in {}: {matches:?}", dir.display());
    dir.join(&matches[0])
}
