use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

const PREVIEW_CHARS: usize = 200;

/// What came back from one remote call.
#[derive(Debug, Clone)]
pub struct ResponseSummary {
    pub ok: bool,
    pub status: u16,
    pub has_body: bool,
    pub text: String,
    /// Present only when the content type is JSON and the body parses.
    pub data: Option<Value>,
}

impl ResponseSummary {
    pub fn new(status: u16, content_type: &str, body: &[u8]) -> Self {
        let has_body = !body.is_empty();
        let text = String::from_utf8_lossy(body).into_owned();
        let data = if has_body && is_json_content_type(content_type) {
            serde_json::from_str(&text).ok()
        } else {
            None
        };
        Self {
            ok: (200..300).contains(&status),
            status,
            has_body,
            text,
            data,
        }
    }

    /// Decode the JSON body as `T`, naming `context` when it does not fit.
    pub fn json<T: DeserializeOwned>(&self, context: &str) -> Result<T> {
        let data = self
            .data
            .clone()
            .ok_or_else(|| Error::shape(format!("{context}: response body is not JSON")))?;
        serde_json::from_value(data).map_err(|e| Error::shape(format!("{context}: {e}")))
    }
}

impl fmt::Display for ResponseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.ok { "✓" } else { "✗" };
        write!(f, "{mark} {}", self.status)?;
        if !self.has_body {
            write!(f, " | (no body)")
        } else if let Some(data) = &self.data {
            write!(f, " | JSON: {}", preview(&data.to_string()))
        } else {
            write!(f, " | Text: {}", preview(self.text.trim()))
        }
    }
}

fn preview(s: &str) -> String {
    if s.chars().count() > PREVIEW_CHARS {
        let head: String = s.chars().take(PREVIEW_CHARS - 3).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

/// `application/json`, or any `*/*+json`, ignoring parameters.
pub fn is_json_content_type(content_type: &str) -> bool {
    let media = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if media == "application/json" {
        return true;
    }
    match media.split_once('/') {
        Some((_, subtype)) => subtype.ends_with("+json"),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_content_types() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("Application/JSON; charset=utf-8"));
        assert!(is_json_content_type("application/ld+json"));
        assert!(!is_json_content_type("text/plain"));
        assert!(!is_json_content_type(""));
    }

    #[test]
    fn data_only_for_parseable_json() {
        let s = ResponseSummary::new(200, "application/json", br#"{"a":1}"#);
        assert!(s.ok);
        assert_eq!(s.data.unwrap()["a"], 1);

        let s = ResponseSummary::new(200, "application/json", b"not json");
        assert!(s.data.is_none());
        assert_eq!(s.text, "not json");

        let s = ResponseSummary::new(200, "text/plain", br#"{"a":1}"#);
        assert!(s.data.is_none());
    }

    #[test]
    fn display_truncates_long_bodies() {
        let body = "x".repeat(500);
        let s = ResponseSummary::new(500, "text/plain", body.as_bytes());
        let shown = s.to_string();
        assert!(shown.starts_with("✗ 500 | Text: "));
        assert!(shown.ends_with("..."));
        assert!(shown.len() < 250);

        let empty = ResponseSummary::new(204, "", b"");
        assert_eq!(empty.to_string(), "✓ 204 | (no body)");
    }
}
