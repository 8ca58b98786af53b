//! Character set resolution for request and response bodies.
//!
//! # Design
//! Labels are resolved through `encoding_rs`, which follows the WHATWG
//! label table. That table maps `ISO-8859-1` onto windows-1252, so the
//! latin-1 family is special-cased and handled byte-for-byte through
//! `encoding_rs::mem`, keeping the decoding of 0x80..0x9F faithful.

use std::fmt;

use encoding_rs::Encoding;
use thiserror::Error;

/// Charset used to decode a response that announces none.
pub const DEFAULT_CHARSET: Charset = Charset::Latin1;

/// Raised when a charset label is not known.
#[derive(Debug, Error)]
#[error("unsupported encoding: {label}")]
pub struct UnsupportedEncoding {
    pub label: String,
}

/// A resolved character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// ISO-8859-1, one byte per code point U+0000..U+00FF.
    Latin1,
    /// Any other encoding known to `encoding_rs`.
    Encoding(&'static Encoding),
}

impl Charset {
    pub const UTF_8: Charset = Charset::Encoding(encoding_rs::UTF_8);

    /// Resolve a charset label such as `UTF-8`, `Shift_JIS` or `iso-8859-1`.
    pub fn for_label(label: &str) -> Result<Self, UnsupportedEncoding> {
        let trimmed = label.trim().trim_matches('"');
        if is_latin1_label(trimmed) {
            return Ok(Charset::Latin1);
        }
        Encoding::for_label(trimmed.as_bytes())
            .map(Charset::Encoding)
            .ok_or_else(|| UnsupportedEncoding {
                label: label.to_string(),
            })
    }

    /// Canonical name, suitable for a `charset=` parameter.
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Latin1 => "ISO-8859-1",
            Charset::Encoding(encoding) => encoding.name(),
        }
    }

    /// Encode text; unmappable characters are replaced the way the
    /// underlying encoder does (`?` for latin-1, numeric references otherwise).
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Charset::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            Charset::Encoding(encoding) => encoding.encode(text).0.into_owned(),
        }
    }

    /// Decode bytes; malformed sequences become U+FFFD.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Charset::Latin1 => encoding_rs::mem::decode_latin1(bytes).into_owned(),
            Charset::Encoding(encoding) => encoding
                .decode_without_bom_handling(bytes)
                .0
                .into_owned(),
        }
    }
}

impl Default for Charset {
    fn default() -> Self {
        DEFAULT_CHARSET
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn is_latin1_label(label: &str) -> bool {
    const LABELS: [&str; 6] = [
        "iso-8859-1",
        "iso8859-1",
        "iso_8859-1",
        "iso8859_1",
        "latin1",
        "l1",
    ];
    LABELS.iter().any(|l| l.eq_ignore_ascii_case(label))
}

/// Extract the `charset=` parameter of a `Content-Type` value.
///
/// The value is split on `;`, each attribute is trimmed, and the last
/// `charset=` attribute wins.
pub fn content_type_charset(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .map(str::trim)
        .filter_map(|attr| attr.strip_prefix("charset="))
        .filter(|value| !value.is_empty())
        .last()
}

/// Build a `Content-Type` value from a MIME type and a charset.
pub fn content_type(mime_type: &str, charset: Charset) -> String {
    format!("{mime_type};charset={}", charset.name())
}
