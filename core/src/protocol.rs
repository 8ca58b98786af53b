//! Protocol executor: one HTTP method invocation end-to-end.
//!
//! # Design
//! `HttpProtocolClient` owns a single exchange: it resolves the target URL,
//! lets the body writer serialize the request into its output buffer, sends
//! the request through a `ureq::Agent` created for this call only, and
//! reads the response through a `StreamReader`. Nothing is pooled; the agent
//! and every stream are dropped before `execute` returns, on every path.
//!
//! Responses with a status of 400 or above are read from the error stream.
//! That is a business rule, not a failure: the error body is decoded like any
//! other body and the call succeeds with the real status code. Only a
//! failure to obtain a response at all, or to read either stream, becomes a
//! `MessagingError`, split into `Timeout` and `Transport`.
//!
//! Configuration is an immutable `ProtocolConfig` handed to the constructor,
//! and executors are produced through `ProtocolClientFactory` so callers can
//! substitute their own.

use std::fmt;
use std::io;
use std::time::Duration;

use tracing::debug;
use ureq::http::{Response, StatusCode, Version};
use ureq::tls::TlsConfig;
use ureq::{Agent, Body, Proxy, RequestBuilder};

use crate::charset::{Charset, UnsupportedEncoding};
use crate::error::MessagingError;
use crate::http::{HeaderFields, HttpMethod, QueryParams, RequestHeaders, TransportResult};
use crate::stream::{CharStreamReader, StreamReader, StreamWriter};

pub const DEFAULT_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";
pub const DEFAULT_ACCEPT: &str = "text/json, text/xml";
pub const DEFAULT_QUERY_STRING_ENCODING: &str = "UTF-8";

/// Performs one HTTP call and classifies its outcome.
pub trait ProtocolClient {
    /// Execute `method` against `url` with `query` appended.
    ///
    /// `writer` produces the request body; `reader` decodes the response
    /// body and defaults to a `CharStreamReader`.
    fn execute(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &RequestHeaders,
        query: &QueryParams,
        writer: Option<&dyn StreamWriter>,
        reader: Option<&dyn StreamReader>,
    ) -> Result<TransportResult, MessagingError>;
}

/// Creates the executor used for one call.
pub trait ProtocolClientFactory: Send + Sync {
    fn create(&self, config: ProtocolConfig) -> Box<dyn ProtocolClient>;
}

/// Produces `HttpProtocolClient`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpProtocolClientFactory;

impl ProtocolClientFactory for HttpProtocolClientFactory {
    fn create(&self, config: ProtocolConfig) -> Box<dyn ProtocolClient> {
        Box::new(HttpProtocolClient::new(config))
    }
}

/// HTTP proxy address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAddress {
    pub host: String,
    pub port: u16,
}

/// Immutable configuration of an executor.
#[derive(Clone)]
pub struct ProtocolConfig {
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub proxy: Option<ProxyAddress>,
    /// Installed for HTTPS targets; `None` keeps the platform defaults.
    pub tls: Option<TlsConfig>,
    pub content_type: String,
    pub accept: String,
    pub query_string_encoding: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            read_timeout: None,
            proxy: None,
            tls: None,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            query_string_encoding: DEFAULT_QUERY_STRING_ENCODING.to_string(),
        }
    }
}

impl fmt::Debug for ProtocolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolConfig")
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("proxy", &self.proxy)
            .field("tls", &self.tls.is_some())
            .field("content_type", &self.content_type)
            .field("accept", &self.accept)
            .field("query_string_encoding", &self.query_string_encoding)
            .finish()
    }
}

/// Which stream a response body is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseStream {
    Input,
    Error,
}

impl ResponseStream {
    fn for_status(status: u16) -> Self {
        if status >= 400 {
            ResponseStream::Error
        } else {
            ResponseStream::Input
        }
    }
}

/// Executor backed by a per-call `ureq::Agent`.
#[derive(Debug, Clone, Default)]
pub struct HttpProtocolClient {
    config: ProtocolConfig,
}

impl HttpProtocolClient {
    pub fn new(config: ProtocolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    fn agent(&self) -> Result<Agent, ureq::Error> {
        let proxy = match &self.config.proxy {
            Some(proxy) => Some(Proxy::new(&format!("http://{}:{}", proxy.host, proxy.port))?),
            None => None,
        };
        let mut builder = Agent::config_builder()
            .http_status_as_error(false)
            .proxy(proxy)
            .timeout_connect(self.config.connect_timeout)
            .timeout_recv_response(self.config.read_timeout)
            .timeout_recv_body(self.config.read_timeout);
        if let Some(tls) = &self.config.tls {
            builder = builder.tls_config(tls.clone());
        }
        Ok(builder.build().new_agent())
    }

    fn apply_headers<B>(&self, mut request: RequestBuilder<B>, headers: &RequestHeaders) -> RequestBuilder<B> {
        request = request
            .header("Content-Type", self.config.content_type.as_str())
            .header("Accept", self.config.accept.as_str());
        for (name, values) in headers {
            for value in values {
                request = request.header(name.as_str(), value.as_str());
            }
        }
        request
    }

    fn send(
        &self,
        agent: &Agent,
        method: HttpMethod,
        url: &str,
        headers: &RequestHeaders,
        body: Option<&[u8]>,
    ) -> Result<Response<Body>, ureq::Error> {
        match method {
            HttpMethod::Get => self.apply_headers(agent.get(url), headers).call(),
            HttpMethod::Delete => {
                let request = self.apply_headers(agent.delete(url), headers);
                match body {
                    Some(body) => request.force_send_body().send(body),
                    None => request.call(),
                }
            }
            HttpMethod::Post => {
                let request = self.apply_headers(agent.post(url), headers);
                match body {
                    Some(body) => request.send(body),
                    None => request.send_empty(),
                }
            }
            HttpMethod::Put => {
                let request = self.apply_headers(agent.put(url), headers);
                match body {
                    Some(body) => request.send(body),
                    None => request.send_empty(),
                }
            }
        }
    }
}

impl ProtocolClient for HttpProtocolClient {
    fn execute(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &RequestHeaders,
        query: &QueryParams,
        writer: Option<&dyn StreamWriter>,
        reader: Option<&dyn StreamReader>,
    ) -> Result<TransportResult, MessagingError> {
        let target_url = resolve_url(url, query, &self.config.query_string_encoding)
            .map_err(|e| MessagingError::transport(url, None, e))?;

        let default_reader = CharStreamReader::default();
        let reader = reader.unwrap_or(&default_reader);

        let output = match writer {
            Some(writer) => Some(
                write_body(method, writer).map_err(|e| MessagingError::transport(&target_url, None, e))?,
            ),
            None => None,
        };

        let agent = self
            .agent()
            .map_err(|e| MessagingError::transport(&target_url, None, e))?;
        debug!(%method, url = %target_url, "opening connection");

        // Without a response there is no error stream to fall back on.
        let response = self
            .send(&agent, method, &target_url, headers, output.as_deref())
            .map_err(|e| classify(&target_url, None, e))?;

        let status_code = response.status().as_u16();
        let header_fields = collect_header_fields(&response);
        let stream = ResponseStream::for_status(status_code);
        if stream == ResponseStream::Error {
            debug!(status_code, url = %target_url, "reading response body from error stream");
        }

        let mut body = response.into_body().into_reader();
        let read = reader.read_stream(&header_fields, &mut body);
        drop(body);
        drop(agent);
        debug!(status_code, url = %target_url, "connection released");

        let body = read.map_err(|e| classify_io(&target_url, Some(status_code), e))?;
        Ok(TransportResult::new(
            Some(status_code),
            Some(header_fields),
            Some(body),
        ))
    }
}

/// Append `query` to `url` as `key=value` pairs joined by `&`.
///
/// Values are form-encoded in `encoding`; keys are sent as given.
pub fn resolve_url(url: &str, query: &QueryParams, encoding: &str) -> Result<String, UnsupportedEncoding> {
    if query.is_empty() {
        return Ok(url.to_string());
    }
    Ok(format!("{url}?{}", build_query_string(query, encoding)?))
}

pub fn build_query_string(query: &QueryParams, encoding: &str) -> Result<String, UnsupportedEncoding> {
    let charset = Charset::for_label(encoding)?;
    let pairs: Vec<String> = query
        .iter()
        .map(|(key, value)| {
            let encoded: String = form_urlencoded::byte_serialize(&charset.encode(value)).collect();
            format!("{key}={encoded}")
        })
        .collect();
    Ok(pairs.join("&"))
}

fn write_body(method: HttpMethod, writer: &dyn StreamWriter) -> io::Result<Vec<u8>> {
    if method == HttpMethod::Get {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "cannot write a request body for GET",
        ));
    }
    let mut output = Vec::new();
    writer.write_stream(&mut output)?;
    Ok(output)
}

fn classify(target_url: &str, status_code: Option<u16>, err: ureq::Error) -> MessagingError {
    match err {
        ureq::Error::Timeout(_) => MessagingError::timeout(
            target_url,
            status_code,
            io::Error::new(io::ErrorKind::TimedOut, err),
        ),
        ureq::Error::Io(e) => classify_io(target_url, status_code, e),
        other => MessagingError::transport(target_url, status_code, other),
    }
}

fn classify_io(target_url: &str, status_code: Option<u16>, err: io::Error) -> MessagingError {
    if is_timeout(&err) {
        MessagingError::timeout(target_url, status_code, err)
    } else {
        MessagingError::transport(target_url, status_code, err)
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
        || err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<ureq::Error>())
            .is_some_and(|inner| matches!(inner, ureq::Error::Timeout(_)))
}

fn collect_header_fields(response: &Response<Body>) -> HeaderFields {
    let mut fields = HeaderFields::new();
    fields.insert(None, vec![status_line(response.version(), response.status())]);
    for (name, value) in response.headers() {
        fields
            .entry(Some(canonical_header_name(name.as_str())))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    fields
}

fn status_line(version: Version, status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{version:?} {} {reason}", status.as_u16()),
        None => format!("{version:?} {}", status.as_u16()),
    }
}

/// `content-type` -> `Content-Type`.
fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
