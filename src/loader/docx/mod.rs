
use fancy_regex::Regex;
use std::io::{Cursor, Read};
use std::sync::LazyLock;

use crate::{RagError, Result};

static XML_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>|[^<]+").expect("regex is valid"));

static ENTITY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9A-Fa-f]{1,6})|(lt|gt|quot|apos|amp));")
        .expect("regex is valid")
});

/// Extract paragraph text from a DOCX container
#[inline]
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| RagError::Load(format!("Invalid DOCX container: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| RagError::Load(format!("DOCX has no document body: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| RagError::Load(format!("Failed to read DOCX body: {e}")))?;

    document_xml_to_text(&xml)
}

/// Walk WordprocessingML tokens, keeping `w:t` runs and paragraph breaks
#[inline]
pub fn document_xml_to_text(xml: &str) -> Result<String> {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;

    for token in XML_TOKEN_REGEX.find_iter(xml) {
        let token = token
            .map_err(|e| RagError::Load(format!("Failed to scan DOCX XML: {e}")))?
            .as_str();

        if !token.starts_with('<') {
            if in_text_run {
                current.push_str(&decode_entities(token));
            }
            continue;
        }

        let closing = token.starts_with("</");
        let self_closing = token.ends_with("/>");
        match (tag_name(token), closing) {
            ("w:t", false) => in_text_run = !self_closing,
            ("w:t", true) => in_text_run = false,
            ("w:tab", false) => current.push('\t'),
            ("w:br" | "w:cr", false) => current.push('\n'),
            ("w:p", true) => paragraphs.push(std::mem::take(&mut current)),
            ("w:p", false) if self_closing => paragraphs.push(String::new()),
            _ => {}
        }
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    Ok(paragraphs.join("\n"))
}

fn tag_name(token: &str) -> &str {
    token
        .trim_start_matches('<')
        .trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .next()
        .unwrap_or_default()
}

/// Single pass so `&amp;#38;` stays `&#38;`; unknown or invalid references are kept verbatim
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut decoded = String::with_capacity(text.len());
    let mut last = 0;
    for captures in ENTITY_REGEX.captures_iter(text) {
        let Ok(captures) = captures else {
            break;
        };
        let (Some(whole), Some(ch)) = (captures.get(0), entity_char(&captures)) else {
            continue;
        };
        decoded.push_str(text.get(last..whole.start()).unwrap_or_default());
        decoded.push(ch);
        last = whole.end();
    }
    decoded.push_str(text.get(last..).unwrap_or_default());

    decoded
}

fn entity_char(captures: &fancy_regex::Captures<'_>) -> Option<char> {
    if let Some(decimal) = captures.get(1) {
        return decimal.as_str().parse().ok().and_then(char::from_u32);
    }
    if let Some(hex) = captures.get(2) {
        return u32::from_str_radix(hex.as_str(), 16)
            .ok()
            .and_then(char::from_u32);
    }
    match captures.get(3)?.as_str() {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => None,
    }
}
