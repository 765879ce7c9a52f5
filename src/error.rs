//! Error type shared by every pipeline stage.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No credential file, or it holds no token
    #[error("no credential found at {}", .path.display())]
    MissingCredential { path: PathBuf },

    /// The remote rejected the bearer credential
    #[error("credential expired or invalid (route {route})")]
    Unauthorized { route: String },

    #[error("request to {route} failed with status {status}: {body}")]
    Request {
        route: String,
        status: u16,
        body: String,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote answered successfully but without the fields we need
    #[error("unexpected response shape: {context}")]
    Shape { context: String },

    #[error("message {message_id} has an undecodable conversation index: {source}")]
    InvalidOrderingToken {
        message_id: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error(
        "folder {folder}: indexed {indexed} messages but the remote reports {reported}; \
         messages may have arrived or moved during indexing"
    )]
    Discrepancy {
        folder: String,
        indexed: usize,
        reported: u64,
    },

    #[error(
        "folder {folder}: {} duplicated message ids; messages may have arrived or moved during indexing",
        .duplicates.len()
    )]
    DuplicateIds {
        folder: String,
        duplicates: Vec<String>,
    },

    #[error("missing checkpoint {}", .path.display())]
    MissingCheckpoint { path: PathBuf, hint: &'static str },

    #[error("unable to build unique shortcodes for {ids} ids")]
    ShortcodesExhausted { ids: usize },

    #[error("interrupted by user")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    pub(crate) fn shape(context: impl Into<String>) -> Self {
        Error::Shape {
            context: context.into(),
        }
    }

    /// What the user should do next, when there is something to do.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Error::MissingCredential { .. } | Error::Unauthorized { .. } => {
                Some("Log in again, then rerun.")
            }
            Error::Request { .. } | Error::Network(_) | Error::Cancelled => {
                Some("Rerun the command; completed stages are skipped.")
            }
            Error::Discrepancy { .. } | Error::DuplicateIds { .. } => {
                Some("Reset the index (`index --reset`) and run indexing again.")
            }
            Error::MissingCheckpoint { hint, .. } => Some(*hint),
            Error::Shape { .. } | Error::InvalidOrderingToken { .. } => {
                Some("Inspect debug/error.txt and the remote service; this is not retried.")
            }
            Error::ShortcodesExhausted { .. }
            | Error::Io(_)
            | Error::Json(_)
            | Error::Toml(_)
            | Error::TomlSer(_) => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Error::MissingCredential { .. } | Error::Unauthorized { .. }
        )
    }
}
