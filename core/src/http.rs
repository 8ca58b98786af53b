//! HTTP transport types shared by the executor and the coordinator.
//!
//! # Design
//! These types describe one wire-level exchange as plain data. The
//! coordinator builds a `TransportRequest` from a logical message, the
//! executor performs the call and hands back a `TransportResult`. All
//! fields use owned types so a result can outlive the connection that
//! produced it.

use std::collections::BTreeMap;
use std::fmt;

use crate::charset::Charset;

/// Request headers: name to values, each value sent as its own header line.
pub type RequestHeaders = BTreeMap<String, Vec<String>>;

/// Response headers as received. The status line is kept under `None`.
pub type HeaderFields = BTreeMap<Option<String>, Vec<String>>;

/// Query parameters appended to the target URL.
pub type QueryParams = BTreeMap<String, String>;

/// HTTP method of a messaging call. No other methods are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Resolve a configured method name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether a messaging call with this method carries a payload body.
    pub fn carries_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a request: text fragments written in order under one charset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    pub charset: Charset,
    pub fragments: Vec<String>,
}

impl RequestBody {
    pub fn new(charset: Charset, text: impl Into<String>) -> Self {
        Self {
            charset,
            fragments: vec![text.into()],
        }
    }

    /// The fragments joined without a separator.
    pub fn text(&self) -> String {
        self.fragments.concat()
    }
}

/// A wire-level request described as plain data.
///
/// Built by `HttpMessagingClient::build_request`. `url` is the target URL
/// before query parameters are appended; the executor resolves the final
/// URL from `url` and `query`.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: QueryParams,
    pub headers: RequestHeaders,
    pub content_type: String,
    pub body: Option<RequestBody>,
}

/// The outcome of one wire-level call.
#[derive(Debug, Clone, Default)]
pub struct TransportResult {
    status_code: Option<u16>,
    header_fields: Option<HeaderFields>,
    body: Option<String>,
}

impl TransportResult {
    pub fn new(
        status_code: Option<u16>,
        header_fields: Option<HeaderFields>,
        body: Option<String>,
    ) -> Self {
        Self {
            status_code,
            header_fields,
            body,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Response headers, `None` only if no response was ever produced.
    pub fn header_fields(&self) -> Option<&HeaderFields> {
        self.header_fields.as_ref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// First value of a header, looked up ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_fields
            .as_ref()?
            .iter()
            .find(|(key, _)| key.as_deref().is_some_and(|k| k.eq_ignore_ascii_case(name)))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }

    /// The status line recorded under the `None` key.
    pub fn status_line(&self) -> Option<&str> {
        self.header_fields
            .as_ref()?
            .get(&None)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}
