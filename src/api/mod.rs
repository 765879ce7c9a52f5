//! The remote mailbox service, as the pipeline sees it.

pub mod http;
pub mod summary;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::MessageMetadata;
use crate::error::Result;

pub use http::HttpApi;

/// One page of a folder's top-level message listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdPage {
    pub message_ids: Vec<String>,
    #[serde(default)]
    pub next_link: Option<String>,
}

/// Raw bytes of an attachment or item plus the content type they came with.
#[derive(Debug, Clone, PartialEq)]
pub struct Binary {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Every remote operation the pipeline consumes. Calls block until the
/// remote has answered or the request timed out.
pub trait MailboxApi {
    /// The whole folder forest, as the remote returns it.
    fn get_folder_tree(&self) -> Result<Value>;

    fn list_message_ids(&self, folder_id: &str, cursor: Option<&str>) -> Result<IdPage>;

    fn hydrate_metadata(&self, message_ids: &[String]) -> Result<Vec<MessageMetadata>>;

    /// Remote-reported total item count of a folder.
    fn get_folder_total(&self, folder_id: &str) -> Result<u64>;

    fn get_message(&self, message_id: &str) -> Result<Value>;

    /// `None` when the dedicated attachment listing is unavailable for this
    /// message; callers then use the attachments embedded in the message.
    fn get_attachments(&self, message_id: &str) -> Result<Option<Vec<Value>>>;

    fn get_attachment_detail(&self, message_id: &str, attachment_id: &str) -> Result<Value>;

    fn get_attachment_binary(&self, message_id: &str, attachment_id: &str) -> Result<Binary>;

    /// Serialized form of an event or contact (`.ics` / `.vcf`), when the
    /// remote can produce one.
    fn get_item_binary(&self, item_type: &str, item_id: &str) -> Result<Option<Binary>>;

    /// Account record of the signed-in user.
    fn get_me(&self) -> Result<Value>;
}
