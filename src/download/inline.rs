use std::collections::BTreeMap;

/// Inline attachment tokens found while downloading, mapped to the relative
/// path of the file written for them.
#[derive(Debug, Default, Clone)]
pub struct InlineRefs {
    pub by_content_id: BTreeMap<String, String>,
    pub by_location: BTreeMap<String, String>,
}

impl InlineRefs {
    pub fn is_empty(&self) -> bool {
        self.by_content_id.is_empty() && self.by_location.is_empty()
    }

    /// Rewrite `cid:` references and content-location URLs in `html` to the
    /// local paths. `None` when nothing matched.
    pub fn rewrite(&self, html: &str) -> Option<String> {
        let mut out = html.to_string();
        for (cid, rel) in &self.by_content_id {
            if cid.is_empty() {
                continue;
            }
            out = out.replace(&format!("cid:{cid}"), rel);
            out = out.replace(&format!("cid:<{cid}>"), rel);
        }
        for (location, rel) in &self.by_location {
            if location.is_empty() {
                continue;
            }
            out = out.replace(location.as_str(), rel);
        }
        (out != html).then_some(out)
    }
}

/// Content id without surrounding whitespace or angle brackets.
pub fn normalize_cid(cid: Option<&str>) -> Option<String> {
    let cid = cid?.trim();
    if cid.is_empty() {
        return None;
    }
    let cid = cid
        .strip_prefix('<')
        .and_then(|c| c.strip_suffix('>'))
        .unwrap_or(cid);
    Some(cid.to_string())
}
