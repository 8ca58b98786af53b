//! Stream adapters between text and the HTTP byte streams.
//!
//! # Design
//! `StreamWriter` and `StreamReader` are the seams the executor writes the
//! request body through and reads the response body through. The
//! character implementations below are the defaults; binary variants can
//! implement the same traits.
//!
//! Neither adapter closes the stream it is handed. The writer flushes the
//! buffer it wraps around the caller's stream and leaves the stream itself
//! to the caller. The reader borrows the stream for the duration of the
//! read; the owner releases it when it goes out of scope.

use std::io::{self, BufReader, BufWriter, Read, Write};

use crate::charset::{self, Charset, DEFAULT_CHARSET};
use crate::http::HeaderFields;

/// Size of the read buffer wrapped around response streams.
const READ_BUF_SIZE: usize = 8192;

/// Serializes a request body into an output stream.
pub trait StreamWriter {
    fn write_stream(&self, output: &mut dyn Write) -> io::Result<()>;
}

/// Consumes a response stream into a string.
pub trait StreamReader {
    fn read_stream(&self, headers: &HeaderFields, input: &mut dyn Read) -> io::Result<String>;
}

/// Writes text fragments in insertion order under a charset.
#[derive(Debug, Clone, Default)]
pub struct CharStreamWriter {
    charset: Option<String>,
    fragments: Vec<String>,
    line_separator: String,
}

impl CharStreamWriter {
    /// `charset` of `None` selects UTF-8.
    pub fn new(charset: Option<&str>) -> Self {
        Self {
            charset: charset.map(str::to_string),
            fragments: Vec::new(),
            line_separator: String::new(),
        }
    }

    /// Insert `separator` between consecutive fragments.
    pub fn with_line_separator(mut self, separator: impl Into<String>) -> Self {
        self.line_separator = separator.into();
        self
    }

    pub fn append(&mut self, fragment: impl Into<String>) {
        self.fragments.push(fragment.into());
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    fn resolve_charset(&self) -> io::Result<Charset> {
        match &self.charset {
            Some(label) => Charset::for_label(label)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e)),
            None => Ok(Charset::UTF_8),
        }
    }
}

impl StreamWriter for CharStreamWriter {
    fn write_stream(&self, output: &mut dyn Write) -> io::Result<()> {
        let charset = self.resolve_charset()?;
        let mut writer = BufWriter::new(output);
        let last = self.fragments.len().saturating_sub(1);
        for (i, fragment) in self.fragments.iter().enumerate() {
            writer.write_all(&charset.encode(fragment))?;
            if i < last {
                writer.write_all(&charset.encode(&self.line_separator))?;
            }
        }
        writer.flush()
    }
}

/// Reads a response stream as text in the charset its `Content-Type` announces.
#[derive(Debug, Clone, Copy)]
pub struct CharStreamReader {
    default_charset: Charset,
}

impl CharStreamReader {
    pub fn new(default_charset: Charset) -> Self {
        Self { default_charset }
    }

    /// Charset label announced by the `Content-Type` header, if any.
    pub fn announced_charset(headers: &HeaderFields) -> Option<&str> {
        headers
            .iter()
            .filter(|(key, _)| {
                key.as_deref()
                    .is_some_and(|k| k.eq_ignore_ascii_case("Content-Type"))
            })
            .flat_map(|(_, values)| values.iter())
            .filter_map(|value| charset::content_type_charset(value))
            .last()
    }

    fn resolve_charset(&self, headers: &HeaderFields) -> io::Result<Charset> {
        match Self::announced_charset(headers) {
            Some(label) => {
                Charset::for_label(label).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            }
            None => Ok(self.default_charset),
        }
    }
}

impl Default for CharStreamReader {
    fn default() -> Self {
        Self::new(DEFAULT_CHARSET)
    }
}

impl StreamReader for CharStreamReader {
    fn read_stream(&self, headers: &HeaderFields, input: &mut dyn Read) -> io::Result<String> {
        let charset = self.resolve_charset(headers)?;
        let mut reader = BufReader::with_capacity(READ_BUF_SIZE, input);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(charset.decode(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(content_type: &str) -> HeaderFields {
        let mut fields = HeaderFields::new();
        fields.insert(None, vec!["HTTP/1.1 200 OK".to_string()]);
        fields.insert(Some("Content-Type".to_string()), vec![content_type.to_string()]);
        fields
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn writes_fragments_in_order_without_separator() {
        let mut writer = CharStreamWriter::new(Some("UTF-8"));
        writer.append("abc");
        writer.append("テスト");
        let mut out: Vec<u8> = Vec::new();
        writer.write_stream(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "abcテスト");
    }

    #[test]
    fn separator_goes_between_fragments_only() {
        let mut writer = CharStreamWriter::new(None).with_line_separator("\r\n");
        writer.append("one");
        writer.append("two");
        writer.append("three");
        let mut out: Vec<u8> = Vec::new();
        writer.write_stream(&mut out).unwrap();
        assert_eq!(out, b"one\r\ntwo\r\nthree");
    }

    #[test]
    fn writes_in_requested_charset() {
        let mut writer = CharStreamWriter::new(Some("Shift_JIS"));
        writer.append("テスト");
        let mut out: Vec<u8> = Vec::new();
        writer.write_stream(&mut out).unwrap();
        assert_eq!(out, vec![0x83, 0x65, 0x83, 0x58, 0x83, 0x67]);
    }

    #[test]
    fn empty_writer_writes_nothing() {
        let writer = CharStreamWriter::new(None);
        let mut out: Vec<u8> = Vec::new();
        writer.write_stream(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn writer_leaves_stream_usable() {
        let mut writer = CharStreamWriter::new(None);
        writer.append("body");
        let mut out: Vec<u8> = Vec::new();
        writer.write_stream(&mut out).unwrap();
        out.write_all(b"-more").unwrap();
        assert_eq!(out, b"body-more");
    }

    #[test]
    fn writer_propagates_io_failure() {
        let mut writer = CharStreamWriter::new(None);
        writer.append("x".repeat(10_000));
        let err = writer.write_stream(&mut FailingWriter).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn writer_rejects_unknown_charset() {
        let mut writer = CharStreamWriter::new(Some("hogehoge"));
        writer.append("x");
        let err = writer.write_stream(&mut Vec::<u8>::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn reads_with_announced_charset() {
        let bytes = [0x83, 0x65, 0x83, 0x58, 0x83, 0x67];
        let text = CharStreamReader::default()
            .read_stream(&headers("text/plain; charset=Shift_JIS"), &mut &bytes[..])
            .unwrap();
        assert_eq!(text, "テスト");
    }

    #[test]
    fn falls_back_to_latin1_without_content_type() {
        let bytes = [0x63, 0x61, 0x66, 0xe9];
        let text = CharStreamReader::default()
            .read_stream(&HeaderFields::new(), &mut &bytes[..])
            .unwrap();
        assert_eq!(text, "café");
    }

    #[test]
    fn content_type_without_charset_uses_default() {
        let bytes = "plain".as_bytes();
        let text = CharStreamReader::new(Charset::UTF_8)
            .read_stream(&headers("text/plain"), &mut &bytes[..])
            .unwrap();
        assert_eq!(text, "plain");
    }

    #[test]
    fn header_name_is_matched_ignoring_case() {
        let mut fields = HeaderFields::new();
        fields.insert(
            Some("content-type".to_string()),
            vec!["text/plain;charset=UTF-8".to_string()],
        );
        let text = CharStreamReader::default()
            .read_stream(&fields, &mut "テスト".as_bytes())
            .unwrap();
        assert_eq!(text, "テスト");
    }

    #[test]
    fn reads_bodies_larger_than_the_buffer() {
        let body = "a".repeat(READ_BUF_SIZE * 3 + 17);
        let text = CharStreamReader::default()
            .read_stream(&headers("text/plain;charset=UTF-8"), &mut body.as_bytes())
            .unwrap();
        assert_eq!(text.len(), body.len());
    }

    #[test]
    fn unknown_announced_charset_fails() {
        let err = CharStreamReader::default()
            .read_stream(&headers("text/plain;charset=hogehoge"), &mut &b"x"[..])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn reader_propagates_io_failure() {
        let err = CharStreamReader::default()
            .read_stream(&HeaderFields::new(), &mut FailingReader)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }
}
