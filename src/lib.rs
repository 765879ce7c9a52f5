//! Incremental, resumable archiver for a remote mailbox reached through a
//! paginated HTTP API: index, download, then export a browsable tree.

pub mod api;
pub mod cancel;
pub mod config;
pub mod credential;
pub mod domain;
pub mod download;
pub mod error;
pub mod export;
pub mod index;
pub mod naming;
pub mod progress;
pub mod shortcode;
pub mod store;
pub mod threading;

pub use error::{Error, Result};
