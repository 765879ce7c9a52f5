pub mod folder;
pub mod message;

pub use folder::FolderNode;
pub use message::{Conversation, FolderConversations, MessageMetadata};
