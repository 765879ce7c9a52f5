use std::fs;
use std::path::PathBuf;

use log::{debug, warn};
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::summary::ResponseSummary;
use crate::api::{Binary, IdPage, MailboxApi};
use crate::config::Config;
use crate::credential;
use crate::domain::MessageMetadata;
use crate::error::{Error, Result};
use crate::progress::Spinner;

const GET_FOLDERS: &str = "outlook/indexing/get-folders";
const GET_ID_LIST: &str = "outlook/indexing/get-id-list";
const GET_MESSAGE_METADATA: &str = "outlook/indexing/get-message-metadata";
const GET_FOLDER_METADATA: &str = "outlook/indexing/get-folder-metadata";
const GET_MESSAGE: &str = "outlook/download/get-message";
const GET_ATTACHMENTS: &str = "outlook/download/get-attachments";
const GET_ATTACHMENT: &str = "outlook/download/get-attachment";
const GET_ATTACHMENT_VALUE: &str = "outlook/download/get-attachment-value";
const GET_ITEM_VALUE: &str = "outlook/download/get-item-value";
const GET_ME: &str = "outlook/me";

#[derive(Deserialize)]
struct MetadataPage {
    messages: Vec<MessageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FolderCounts {
    total_item_count: u64,
}

#[derive(Deserialize)]
struct FolderMetadata {
    counts: FolderCounts,
}

#[derive(Deserialize)]
struct AttachmentList {
    attachments: Option<Vec<Value>>,
}

/// `MailboxApi` over the backend's `/api/...` HTTP routes, authenticated with
/// the bearer token in the state directory.
pub struct HttpApi {
    client: Client,
    base_url: String,
    credential_path: PathBuf,
    error_log_path: PathBuf,
    spinner: bool,
}

impl HttpApi {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client = Client::builder().timeout(cfg.timeout()).build()?;
        let state = cfg.state();
        Ok(Self {
            client,
            base_url: cfg.base_url().trim_end_matches('/').to_string(),
            credential_path: state.credential_path(),
            error_log_path: state.error_log_path(),
            spinner: cfg.spinner(),
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}/api/{}", self.base_url, route.trim_start_matches('/'))
    }

    fn send(
        &self,
        route: &str,
        method: Method,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<reqwest::blocking::Response> {
        let token = credential::require_token(&self.credential_path)?;
        let mut req = self
            .client
            .request(method, self.url(route))
            .bearer_auth(token);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        debug!("calling {route}");
        Ok(req.send()?)
    }

    /// Invoke one route and summarise the answer. Non-2xx becomes an error;
    /// 401 is reported as an auth failure.
    pub fn call_route(
        &self,
        route: &str,
        method: Method,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<ResponseSummary> {
        let spinner = self.spinner.then(|| Spinner::start(route));
        let outcome = self.send(route, method, query, body).and_then(|resp| {
            let status = resp.status().as_u16();
            let content_type = content_type_of(&resp);
            let bytes = resp.bytes()?;
            Ok(ResponseSummary::new(status, &content_type, &bytes))
        });

        let summary = match outcome {
            Ok(s) => s,
            Err(e) => {
                if let Some(s) = spinner {
                    s.finish("failed");
                }
                return Err(e);
            }
        };
        if let Some(s) = spinner {
            s.finish(if summary.ok { "success" } else { "failed" });
        }

        if summary.ok {
            Ok(summary)
        } else {
            Err(self.failure(route, summary.status, &summary.text, &summary.to_string()))
        }
    }

    fn fetch_binary(&self, route: &str, query: &[(&str, &str)]) -> Result<Binary> {
        let resp = self.send(route, Method::GET, query, None)?;
        let status = resp.status();
        let content_type = content_type_of(&resp);
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(self.failure(route, status.as_u16(), &text, &text));
        }
        let data = resp.bytes()?.to_vec();
        Ok(Binary {
            data,
            content_type: if content_type.is_empty() {
                "application/octet-stream".to_string()
            } else {
                content_type
            },
        })
    }

    fn failure(&self, route: &str, status: u16, text: &str, shown: &str) -> Error {
        self.save_error_body(text);
        if status == 401 {
            Error::Unauthorized {
                route: route.to_string(),
            }
        } else {
            Error::Request {
                route: route.to_string(),
                status,
                body: shown.to_string(),
            }
        }
    }

    // best effort: the error itself is what gets reported
    fn save_error_body(&self, text: &str) {
        if let Some(dir) = self.error_log_path.parent() {
            let _ = fs::create_dir_all(dir);
        }
        if let Err(e) = fs::write(&self.error_log_path, text) {
            debug!("could not save error body: {e}");
        }
    }
}

fn content_type_of(resp: &reqwest::blocking::Response) -> String {
    resp.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Route failures that mean "this resource is not available" rather than
/// "the run cannot continue".
fn unavailable(err: &Error) -> bool {
    matches!(err, Error::Request { status, .. } if (400..500).contains(status))
}

impl MailboxApi for HttpApi {
    fn get_folder_tree(&self) -> Result<Value> {
        let summary = self.call_route(GET_FOLDERS, Method::GET, &[], None)?;
        Ok(summary.data.unwrap_or(Value::Null))
    }

    fn list_message_ids(&self, folder_id: &str, cursor: Option<&str>) -> Result<IdPage> {
        let mut body = json!({ "folderId": folder_id });
        if let Some(next) = cursor {
            body["nextLink"] = json!(next);
        }
        self.call_route(GET_ID_LIST, Method::POST, &[], Some(&body))?
            .json(GET_ID_LIST)
    }

    fn hydrate_metadata(&self, message_ids: &[String]) -> Result<Vec<MessageMetadata>> {
        let body = json!({ "messageIds": message_ids });
        let page: MetadataPage = self
            .call_route(GET_MESSAGE_METADATA, Method::POST, &[], Some(&body))?
            .json(GET_MESSAGE_METADATA)?;
        Ok(page.messages)
    }

    fn get_folder_total(&self, folder_id: &str) -> Result<u64> {
        let body = json!({ "folderId": folder_id });
        let meta: FolderMetadata = self
            .call_route(GET_FOLDER_METADATA, Method::POST, &[], Some(&body))?
            .json(GET_FOLDER_METADATA)?;
        Ok(meta.counts.total_item_count)
    }

    fn get_message(&self, message_id: &str) -> Result<Value> {
        let summary = self.call_route(GET_MESSAGE, Method::GET, &[("messageId", message_id)], None)?;
        match summary.data {
            Some(data @ Value::Object(_)) => Ok(data),
            _ => Err(Error::shape(format!("{GET_MESSAGE}: message {message_id} is not an object"))),
        }
    }

    fn get_attachments(&self, message_id: &str) -> Result<Option<Vec<Value>>> {
        match self.call_route(GET_ATTACHMENTS, Method::GET, &[("messageId", message_id)], None) {
            Ok(summary) => Ok(summary
                .json::<AttachmentList>(GET_ATTACHMENTS)
                .ok()
                .and_then(|list| list.attachments)),
            Err(e) if unavailable(&e) => {
                warn!("attachment listing unavailable for {message_id}: {e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn get_attachment_detail(&self, message_id: &str, attachment_id: &str) -> Result<Value> {
        let query = [("messageId", message_id), ("attachmentId", attachment_id)];
        let summary = self.call_route(GET_ATTACHMENT, Method::GET, &query, None)?;
        summary
            .data
            .ok_or_else(|| Error::shape(format!("{GET_ATTACHMENT}: {attachment_id} has no JSON body")))
    }

    fn get_attachment_binary(&self, message_id: &str, attachment_id: &str) -> Result<Binary> {
        let query = [("messageId", message_id), ("attachmentId", attachment_id)];
        self.fetch_binary(GET_ATTACHMENT_VALUE, &query)
    }

    fn get_item_binary(&self, item_type: &str, item_id: &str) -> Result<Option<Binary>> {
        let query = [("itemType", item_type), ("itemId", item_id)];
        match self.fetch_binary(GET_ITEM_VALUE, &query) {
            Ok(bin) => Ok(Some(bin)),
            Err(e) if unavailable(&e) => {
                warn!("no serialized {item_type} for {item_id}: {e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn get_me(&self) -> Result<Value> {
        let summary = self.call_route(GET_ME, Method::GET, &[], None)?;
        Ok(summary.data.unwrap_or(Value::Null))
    }
}
