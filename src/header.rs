//! The metadata header block at the top of every post.
//!
//! Posts are plain markdown with a small delimited block of `Key: "Value"`
//! lines in front of the body:
//!
//! ```text
//! <!-- $header -->
//! Title: "Hello"
//! Description: "First post"
//! ImageURL: "hello"
//! Date: "2025-03-01"
//! <!-- $/header -->
//!
//! Body text...
//! ```
//!
//! The markers are HTML comments so a post still renders cleanly in any
//! markdown viewer that knows nothing about the header.
//!
//! ## Decoding
//!
//! Decoding never fails. A file without both markers (or with the end marker
//! before the start marker) yields an empty [`Meta`] and the whole input as
//! body. Inside a valid block, lines that don't look like `Key: "Value"` are
//! skipped silently.
//!
//! ## Encoding
//!
//! [`encode`] only emits the four well-known keys, in a fixed order, and only
//! when they carry a non-empty value. Double quotes inside values are escaped
//! as `\"`, and [`decode`] reverses that escape, so a header written by the
//! admin backend always reads back to the same mapping.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const START_MARKER: &str = "<!-- $header -->";
pub const END_MARKER: &str = "<!-- $/header -->";

/// Header keys the admin backend writes, in emission order.
pub const KNOWN_KEYS: &[&str] = &["Title", "Description", "ImageURL", "Date"];

/// Free-form header metadata. Sorted so serialized indexes are stable.
pub type Meta = BTreeMap<String, String>;

static LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([A-Za-z0-9_-]+):\s*"(.*)"$"#).expect("header line pattern is valid")
});

/// A decoded post: header metadata plus the markdown body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub meta: Meta,
    pub body: String,
}

/// Split raw post text into header metadata and body.
pub fn decode(raw: &str) -> Document {
    let Some((region, rest)) = header_region(raw) else {
        return Document {
            meta: Meta::new(),
            body: raw.to_string(),
        };
    };

    let meta = region
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let caps = LINE.captures(line)?;
            Some((caps[1].to_string(), unescape(&caps[2])))
        })
        .collect();

    Document {
        meta,
        body: rest.trim_start().to_string(),
    }
}

/// Emit a header block for the well-known keys present in `meta`.
///
/// The block ends with the end marker, a newline, and a blank line so the
/// body can be appended directly.
pub fn encode(meta: &Meta) -> String {
    let mut lines = vec![START_MARKER.to_string()];
    for key in KNOWN_KEYS {
        if let Some(value) = meta.get(*key).filter(|v| !v.is_empty()) {
            lines.push(format!("{key}: \"{}\"", value.replace('"', "\\\"")));
        }
    }
    lines.push(format!("{END_MARKER}\n"));
    let mut block = lines.join("\n");
    block.push('\n');
    block
}

/// Full post text as written by the admin backend.
pub fn compose(meta: &Meta, body: &str) -> String {
    format!("{}{}\n", encode(meta), body)
}

/// Locate the text strictly between the markers and the text after the end.
fn header_region(raw: &str) -> Option<(&str, &str)> {
    let start = raw.find(START_MARKER)?;
    let end = raw.find(END_MARKER)?;
    if end <= start {
        return None;
    }
    let region = &raw[start + START_MARKER.len()..end];
    let rest = &raw[end + END_MARKER.len()..];
    Some((region, rest))
}

fn unescape(value: &str) -> String {
    value.replace("\\\"", "\"")
}
