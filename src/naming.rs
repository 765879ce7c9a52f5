//! Path segment naming that holds up on the most restrictive host filesystem.

use unicode_normalization::UnicodeNormalization;

/// Stand-in for names that have no usable characters.
pub const PLACEHOLDER: &str = "INVALID_FILENAME";

const RESERVED_DEVICE_NAMES: [&str; 22] = [
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

fn is_control(ch: char) -> bool {
    (ch as u32) <= 0x1F || ch == '\u{7F}'
}

fn needs_escape(ch: char) -> bool {
    is_control(ch) || matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
}

fn percent_encode(ch: char, out: &mut String) {
    let mut buf = [0u8; 4];
    for byte in ch.encode_utf8(&mut buf).bytes() {
        out.push_str(&format!("%{byte:02X}"));
    }
}

/// Turn an arbitrary display string into a single safe path segment.
///
/// The result is never empty, and applying it to its own output changes
/// nothing.
pub fn safe_filename(input: &str) -> String {
    let mut name: String = input.nfc().collect::<String>().trim().to_string();
    if name.is_empty() || name.chars().all(is_control) {
        name = PLACEHOLDER.to_string();
    }

    if name == "." || name == ".." {
        name.insert(0, '_');
    }

    let base = name.split('.').next().unwrap_or_default().to_lowercase();
    if RESERVED_DEVICE_NAMES.contains(&base.as_str()) {
        name.insert(0, '_');
    }

    // only the final character; the `_` it becomes ends the run
    if name.ends_with([' ', '.']) {
        name.pop();
        name.push('_');
    }

    let mut encoded = String::with_capacity(name.len());
    for ch in name.chars() {
        if needs_escape(ch) {
            percent_encode(ch, &mut encoded);
        } else {
            encoded.push(ch);
        }
    }

    if encoded.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        encoded
    }
}

/// Cap an already-safe subject at `limit` characters.
///
/// When anything was cut, a partial `%XX` escape left at the cut point is
/// dropped and `...(N more)` records how many characters went missing.
pub fn truncate_subject(value: &str, limit: usize) -> String {
    let total = value.chars().count();
    if total <= limit {
        return value.to_string();
    }

    let mut kept: Vec<char> = value.chars().take(limit).collect();
    if kept.last() == Some(&'%') {
        kept.pop();
    } else if kept.len() >= 2 && kept[kept.len() - 2] == '%' {
        kept.truncate(kept.len() - 2);
    }

    let removed = total - kept.len();
    let kept: String = kept.into_iter().collect();
    format!("{kept}...({removed} more)")
}

/// File name for a downloaded attachment: lowercase ASCII base plus an
/// extension taken from the name, the content type, or `.bin`.
pub fn attachment_filename(name: Option<&str>, content_type: Option<&str>) -> String {
    let raw = name.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("attachment");

    let (base, ext) = match raw.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < raw.len() => (&raw[..dot], Some(&raw[dot + 1..])),
        _ => (raw, None),
    };

    let ext = ext
        .map(str::to_string)
        .or_else(|| content_type.and_then(extension_for).map(str::to_string))
        .unwrap_or_else(|| "bin".to_string())
        .to_lowercase();

    let mut cleaned = String::with_capacity(base.len());
    let mut last_was_underscore = false;
    for ch in base.trim().to_lowercase().chars() {
        let ch = if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-') {
            ch
        } else {
            '_'
        };
        if ch == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        cleaned.push(ch);
    }
    let cleaned = cleaned.trim_matches(['.', '_', '-']);
    let cleaned = if cleaned.is_empty() { "attachment" } else { cleaned };

    format!("{cleaned}.{ext}")
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    let media = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let ext = match media.as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/svg+xml" => "svg",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "application/json" => "json",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/csv" => "csv",
        "text/calendar" => "ics",
        "text/vcard" | "text/x-vcard" => "vcf",
        "message/rfc822" => "eml",
        _ => return None,
    };
    Some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_control_only_become_placeholder() {
        assert_eq!(safe_filename(""), PLACEHOLDER);
        assert_eq!(safe_filename("   "), PLACEHOLDER);
        assert_eq!(safe_filename("\u{1}\u{2}\u{7F}"), PLACEHOLDER);
    }

    #[test]
    fn dot_names_are_prefixed() {
        // the prefixed name still ends in a dot, which is then replaced
        assert_eq!(safe_filename("."), "__");
        assert_eq!(safe_filename(".."), "_._");
    }

    #[test]
    fn reserved_device_names_are_prefixed() {
        assert_eq!(safe_filename("CON"), "_CON");
        assert_eq!(safe_filename("nul.txt"), "_nul.txt");
        assert_eq!(safe_filename("Com1.tar.gz"), "_Com1.tar.gz");
        assert_eq!(safe_filename("console"), "console");
    }

    #[test]
    fn trailing_dots_and_spaces_become_underscores() {
        assert_eq!(safe_filename("Re: hello."), "Re%3A hello_");
        assert_eq!(safe_filename("wait. ."), "wait. _");
        assert_eq!(safe_filename("dots..."), "dots.._");
    }

    #[test]
    fn composed_and_decomposed_forms_agree() {
        assert_eq!(safe_filename("e\u{301}"), "\u{e9}");
        assert_eq!(safe_filename("Cafe\u{301} menu"), safe_filename("Caf\u{e9} menu"));
    }

    #[test]
    fn forbidden_characters_are_percent_encoded() {
        assert_eq!(safe_filename("a/b\\c"), "a%2Fb%5Cc");
        assert_eq!(safe_filename("<x>|?*\""), "%3Cx%3E%7C%3F%2A%22");
        assert_eq!(safe_filename("tab\there"), "tab%09here");
    }

    #[test]
    fn non_ascii_passes_through() {
        assert_eq!(safe_filename("Grüße 日本"), "Grüße 日本");
    }

    #[test]
    fn idempotent_on_awkward_inputs() {
        for input in [
            "", ".", "..", "aux", "LPT9.log", "x. ", "a:b", "50% off", "\u{0}", "  spaced  ",
            "_..", "%41", "Q4 / Q1?",
        ] {
            let once = safe_filename(input);
            assert!(!once.is_empty());
            assert_eq!(safe_filename(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn short_subjects_are_untouched() {
        assert_eq!(truncate_subject("hello", 36), "hello");
    }

    #[test]
    fn truncation_reports_dropped_count() {
        let subject = "a".repeat(50);
        let out = truncate_subject(&subject, 36);
        assert_eq!(out, format!("{}...(14 more)", "a".repeat(36)));
    }

    #[test]
    fn truncation_never_splits_an_escape() {
        // cut lands right after "%3"
        let subject = format!("{}%3Atail", "b".repeat(10));
        let out = truncate_subject(&subject, 12);
        assert_eq!(out, format!("{}...(7 more)", "b".repeat(10)));

        let out = truncate_subject(&subject, 11);
        assert_eq!(out, format!("{}...(7 more)", "b".repeat(10)));
    }

    #[test]
    fn truncated_body_stays_within_limit() {
        for limit in 1..40 {
            let out = truncate_subject(&"%2F".repeat(20), limit);
            let body = out.split("...(").next().unwrap();
            assert!(body.chars().count() <= limit);
            assert!(out.ends_with(" more)"));
        }
    }

    #[test]
    fn attachment_names_are_sanitized() {
        assert_eq!(attachment_filename(Some("Q3 Report.PDF"), None), "q3_report.pdf");
        assert_eq!(attachment_filename(Some("image001"), Some("image/png")), "image001.png");
        assert_eq!(attachment_filename(None, None), "attachment.bin");
        assert_eq!(attachment_filename(Some("  ???  "), None), "attachment.bin");
        assert_eq!(attachment_filename(Some("__a  b__.txt"), None), "a_b.txt");
    }
}
