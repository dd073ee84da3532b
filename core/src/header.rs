//! Header-line convention shared by outbound and inbound headers.
//!
//! Outbound headers are serialized as `"name: value"` lines. Inbound lines
//! arrive raw from the transport, line ending included, and may be the
//! status line or the blank terminator rather than a field.

use std::borrow::Cow;

/// Serialize one header pair as a `"name: value"` line (no line ending).
pub fn format_header_line(name: &str, value: &str) -> String {
    format!("{name}: {value}")
}

/// Parse one raw header line into a `(name, value)` pair.
///
/// The name is everything before the first colon and the value everything
/// after it, both trimmed of surrounding whitespace (which also removes the
/// `\r\n` ending). Returns `None` for lines that are not fields: the status
/// line, the blank terminator, or anything whose name is empty or contains
/// whitespace (so `HTTP/1.1 500 Internal Error: x` is not mistaken for a
/// field). Invalid UTF-8 is replaced, not rejected.
pub fn parse_header_line(line: &[u8]) -> Option<(String, String)> {
    let text = String::from_utf8_lossy(line);
    let (name, value) = split_field(&text)?;
    Some((name.to_string(), value.to_string()))
}

fn split_field(text: &str) -> Option<(&str, &str)> {
    let colon = text.find(':')?;
    let name = text[..colon].trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some((name, text[colon + 1..].trim()))
}

/// Lossy view of a raw line, mainly for trace output.
pub(crate) fn display_line(line: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(line)
}
