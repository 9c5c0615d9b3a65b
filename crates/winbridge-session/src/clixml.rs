//! Reduce PowerShell CLIXML error streams to plain text.
//!
//! When stderr of a PowerShell run is serialized, it arrives as
//! `#< CLIXML` followed by an `<Objs>` document. Only the `Error` string
//! records carry user-facing text; progress records are dropped.

use std::{borrow::Cow, sync::LazyLock};

use regex::{Captures, Regex};

const CLIXML_MARKER: &[u8] = b"#< CLIXML";

static ERROR_RECORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<S S="Error">(.*?)</S>"#).expect("static regex"));

static ESCAPED_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_x([0-9A-Fa-f]{4})_").expect("static regex"));

/// Whether `stderr` is a CLIXML document.
#[must_use]
pub fn is_clixml(stderr: &[u8]) -> bool {
    stderr.starts_with(CLIXML_MARKER)
}

/// Plain error text of a CLIXML stderr buffer; other buffers pass through.
#[must_use]
pub fn clean_error_stream(stderr: &[u8]) -> Vec<u8> {
    if !is_clixml(stderr) {
        return stderr.to_vec();
    }

    let document = String::from_utf8_lossy(&stderr[CLIXML_MARKER.len()..]);
    let mut text = String::new();
    for record in ERROR_RECORD.captures_iter(&document) {
        text.push_str(&decode_escapes(&unescape_xml(&record[1])));
    }
    text.trim_end().as_bytes().to_vec()
}

fn unescape_xml(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&"),
    )
}

fn decode_escapes(s: &str) -> Cow<'_, str> {
    ESCAPED_CHAR.replace_all(s, |caps: &Captures<'_>| {
        u32::from_str_radix(&caps[1], 16)
            .ok()
            .and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), String::from)
    })
}
